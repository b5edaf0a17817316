//! Panel-solver batch execution.
//!
//! One invocation per run case, strictly sequential, each in its own scoped
//! work directory under the output root. A case that fails (spawn error,
//! timeout, missing or incomplete output) becomes a non-converged record and
//! the batch carries on: N cases in, N records out.
//!
//! When the executable is missing or does not answer the probe, the executor
//! runs in mock mode and evaluates [`MockModel`] instead. Mock mode is part of
//! the public behavior: it keeps every downstream stage usable without the
//! solver installed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::context::RunContext;
use crate::error::CaseFailure;
use crate::process::{CaseWorkdir, SolverRunner};
use crate::record::{Coefficients, DerivativeRecord, StabilityDerivatives};
use crate::reducer::{self, ParsedOutput};
use crate::run_matrix::{RunCase, NEGLIGIBLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Mock,
    Real,
}

/// Linear analytic aerodynamics used in mock mode. Angles in the model are
/// radians for alpha/beta and degrees for control deflections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MockModel {
    pub cl0: f64,
    /// per rad
    pub cl_alpha: f64,
    pub cd0: f64,
    /// Induced drag factor in CD = cd0 + k CL²
    pub k: f64,
    pub cy_beta: f64,
    pub cm0: f64,
    pub cm_alpha: f64,
    pub cn_beta: f64,
    pub cl_beta: f64,
    /// per deg of symmetric deflection
    pub cl_sym: f64,
    pub cm_sym: f64,
    /// per deg of differential deflection
    pub roll_diff: f64,
    pub cn_diff: f64,
}

impl Default for MockModel {
    fn default() -> Self {
        Self {
            cl0: 0.1,
            cl_alpha: 5.5,
            cd0: 0.02,
            k: 0.05,
            cy_beta: -0.5,
            cm0: -0.05,
            cm_alpha: -0.8,
            cn_beta: 0.05,
            cl_beta: -0.1,
            cl_sym: 0.01,
            cm_sym: -0.005,
            roll_diff: 0.003,
            cn_diff: -0.0004,
        }
    }
}

impl MockModel {
    pub fn evaluate(&self, case: &RunCase) -> DerivativeRecord {
        let a = case.alpha.to_radians();
        let b = case.beta.to_radians();
        let de = case.symmetric;
        let da = case.differential;

        let lift = self.cl0 + self.cl_alpha * a + self.cl_sym * de;
        let coefficients = Coefficients {
            lift,
            drag: self.cd0 + self.k * lift * lift,
            side: self.cy_beta * b,
            roll: self.cl_beta * b + self.roll_diff * da,
            pitch: self.cm0 + self.cm_alpha * a + self.cm_sym * de,
            yaw: self.cn_beta * b + self.cn_diff * da,
        };

        let mut derivatives = StabilityDerivatives::default();
        derivatives.alpha.lift = Some(self.cl_alpha);
        derivatives.alpha.pitch = Some(self.cm_alpha);
        derivatives.beta.side = Some(self.cy_beta);
        derivatives.beta.yaw = Some(self.cn_beta);
        derivatives.beta.roll = Some(self.cl_beta);

        let control_derivatives = BTreeMap::from([
            ("CLd01".to_string(), self.cl_sym),
            ("Cmd01".to_string(), self.cm_sym),
            ("Cld02".to_string(), self.roll_diff),
            ("Cnd02".to_string(), self.cn_diff),
        ]);

        DerivativeRecord {
            case: case.clone(),
            coefficients,
            derivatives,
            xnp: None,
            control_derivatives,
            converged: true,
            failure: None,
        }
    }
}

/// Solver command script for one case. A setting is written only when it is
/// not negligible; the solver's default for an unset variable is exactly zero.
/// Mach is not set here: it comes from the deck header.
pub fn command_script(case: &RunCase) -> String {
    let mut s = String::from("OPER\n");
    s.push_str(&format!("A A {:?}\n", case.alpha));
    if case.beta.abs() > NEGLIGIBLE {
        s.push_str(&format!("B B {:?}\n", case.beta));
    }
    if case.symmetric.abs() > NEGLIGIBLE {
        s.push_str(&format!("A D1 {:?}\n", case.symmetric));
    }
    if case.differential.abs() > NEGLIGIBLE {
        s.push_str(&format!("A D2 {:?}\n", case.differential));
    }
    s.push_str("X\n");
    s.push_str(&format!("FT\n{}\n", ft_file(case)));
    s.push_str(&format!("ST\n{}\n", st_file(case)));
    s.push_str("\nQUIT\n");
    s
}

pub fn ft_file(case: &RunCase) -> String {
    format!("{}_ft.txt", case.name)
}

pub fn st_file(case: &RunCase) -> String {
    format!("{}_stab.txt", case.name)
}

pub fn commands_file(case: &RunCase) -> String {
    format!("{}_commands.txt", case.name)
}

pub fn console_file(case: &RunCase) -> String {
    format!("{}_output.txt", case.name)
}

/// Combine the three dumps of one case. Console values are superseded by the
/// ST file. For deflected-control cases the FT file then overrides both; for
/// the rest it only fills gaps.
pub fn merge_outputs(
    case: &RunCase,
    console: Option<ParsedOutput>,
    st: Option<ParsedOutput>,
    ft: Option<ParsedOutput>,
) -> ParsedOutput {
    let mut merged = console.unwrap_or_default();
    if let Some(st) = &st {
        merged.overlay(st);
    }
    if let Some(ft) = &ft {
        if case.has_deflection() {
            merged.overlay(ft);
        } else {
            merged.fill(ft);
        }
    }
    merged
}

/// Turn merged output into a record, or the reason it cannot be one.
pub fn record_from_output(case: &RunCase, parsed: ParsedOutput) -> Result<DerivativeRecord, CaseFailure> {
    let coefficients = parsed
        .totals
        .complete()
        .map_err(|missing| CaseFailure::IncompleteOutput { missing })?;
    Ok(DerivativeRecord {
        case: case.clone(),
        coefficients,
        derivatives: parsed.derivatives,
        xnp: parsed.xnp,
        control_derivatives: parsed.control_derivatives,
        converged: true,
        failure: None,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub mode: Mode,
    pub records: Vec<DerivativeRecord>,
}

impl BatchResult {
    pub fn by_name(&self) -> BTreeMap<&str, &DerivativeRecord> {
        self.records.iter().map(|r| (r.case.name.as_str(), r)).collect()
    }

    pub fn converged(&self) -> impl Iterator<Item = &DerivativeRecord> {
        self.records.iter().filter(|r| r.converged)
    }

    pub fn converged_count(&self) -> usize {
        self.converged().count()
    }
}

pub struct SolverExecutor<R: SolverRunner> {
    runner: R,
    mode: Mode,
    mock: MockModel,
    output_root: PathBuf,
    keep_intermediate: bool,
}

impl<R: SolverRunner> SolverExecutor<R> {
    /// Probe the runner and pick the mode.
    pub fn new(runner: R, output_root: impl Into<PathBuf>, keep_intermediate: bool, ctx: &RunContext) -> Self {
        let mode = if runner.probe() {
            Mode::Real
        } else {
            ctx.warn("panel solver not available, using mock aerodynamic model");
            Mode::Mock
        };
        Self::with_mode(runner, mode, output_root, keep_intermediate)
    }

    pub fn with_mode(runner: R, mode: Mode, output_root: impl Into<PathBuf>, keep_intermediate: bool) -> Self {
        Self {
            runner,
            mode,
            mock: MockModel::default(),
            output_root: output_root.into(),
            keep_intermediate,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn execute(&self, deck: &Path, cases: &[RunCase], ctx: &RunContext) -> BatchResult {
        self.execute_reusing(deck, cases, &[], ctx)
    }

    /// As [`execute`](Self::execute), but a case that already has a record in
    /// `known` takes a copy of it instead of running again.
    pub fn execute_reusing(
        &self,
        deck: &Path,
        cases: &[RunCase],
        known: &[DerivativeRecord],
        ctx: &RunContext,
    ) -> BatchResult {
        ctx.info(format!("running {} cases ({:?} mode)", cases.len(), self.mode));
        let deck = fs::canonicalize(deck).unwrap_or_else(|_| deck.to_path_buf());

        let mut records = Vec::with_capacity(cases.len());
        for (i, case) in cases.iter().enumerate() {
            if let Some(done) = known.iter().find(|r| r.case == *case) {
                ctx.debug(format!("[{}/{}] {} (reused)", i + 1, cases.len(), case.name));
                records.push(done.clone());
                continue;
            }
            ctx.debug(format!("[{}/{}] {}", i + 1, cases.len(), case.name));
            let record = match self.mode {
                Mode::Mock => self.mock.evaluate(case),
                Mode::Real => self.run_case(&deck, case, ctx),
            };
            if let Some(f) = &record.failure {
                ctx.warn(format!("case {} failed: {}", case.name, f));
            }
            records.push(record);
        }

        let result = BatchResult { mode: self.mode, records };
        ctx.ok(format!("{}/{} cases converged", result.converged_count(), cases.len()));
        result
    }

    /// Run one case against the real solver. Never fails the batch.
    pub fn run_case(&self, deck: &Path, case: &RunCase, ctx: &RunContext) -> DerivativeRecord {
        match self.try_case(deck, case, ctx) {
            Ok(r) => r,
            Err(f) => DerivativeRecord::failed(case.clone(), f),
        }
    }

    fn try_case(&self, deck: &Path, case: &RunCase, ctx: &RunContext) -> Result<DerivativeRecord, CaseFailure> {
        let workdir = CaseWorkdir::create(self.output_root.join(&case.name), self.keep_intermediate)?;

        let script = command_script(case);
        fs::write(workdir.join(commands_file(case)), &script)?;

        let stdout_path = workdir.join(console_file(case));
        let args = [deck.to_string_lossy().into_owned()];
        let inv = self.runner.run(&args, &script, workdir.path(), &stdout_path)?;
        if inv.exit_code != Some(0) {
            ctx.debug(format!("{}: solver exit code {:?}", case.name, inv.exit_code));
        }

        let (ft_name, st_name) = (ft_file(case), st_file(case));
        let ft = reducer::parse_file(&workdir.join(&ft_name));
        let st = reducer::parse_file(&workdir.join(&st_name));
        if ft.is_none() && st.is_none() {
            return Err(CaseFailure::MissingOutput {
                expected: vec![ft_name, st_name],
            });
        }
        let console = reducer::parse_file(&stdout_path);

        record_from_output(case, merge_outputs(case, console, st, ft))
    }
}
