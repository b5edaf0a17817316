//! Airfoil polars from the 2D section solver.
//!
//! One solver run per Reynolds number, each in a scoped work directory with
//! the command script on stdin and the accumulated polar written to
//! `polar.txt`. A Reynolds number that produces no usable polar is skipped
//! with a warning. Without the solver, a thin-airfoil model stands in.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Xfoil;
use crate::context::RunContext;
use crate::deck::Airfoil;
use crate::error::CaseFailure;
use crate::executor::Mode;
use crate::process::{CaseWorkdir, SolverRunner};

pub const POLAR_FILE: &str = "polar.txt";
pub const AIRFOIL_FILE: &str = "airfoil.dat";

/// Linear interpolation clamped to the end values outside the sample range.
/// `xs` must be ascending.
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let i = xs[..n].partition_point(|v| *v <= x);
    let (x0, x1, y0, y1) = (xs[i - 1], xs[i], ys[i - 1], ys[i]);
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PolarPoint {
    pub alpha: f64,
    pub cl: f64,
    pub cd: f64,
    pub cm: f64,
}

/// One Reynolds/Mach pair with parallel per-alpha samples (deg).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolarCurve {
    pub reynolds: f64,
    pub mach: f64,
    pub alpha: Vec<f64>,
    pub cl: Vec<f64>,
    pub cd: Vec<f64>,
    pub cm: Vec<f64>,
}

impl PolarCurve {
    /// Build from samples in any order; stored sorted by alpha.
    pub fn from_points(reynolds: f64, mach: f64, mut points: Vec<PolarPoint>) -> Self {
        points.sort_by(|a, b| a.alpha.total_cmp(&b.alpha));
        Self {
            reynolds,
            mach,
            alpha: points.iter().map(|p| p.alpha).collect(),
            cl: points.iter().map(|p| p.cl).collect(),
            cd: points.iter().map(|p| p.cd).collect(),
            cm: points.iter().map(|p| p.cm).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = PolarPoint> + '_ {
        (0..self.len()).map(|i| PolarPoint {
            alpha: self.alpha[i],
            cl: self.cl[i],
            cd: self.cd[i],
            cm: self.cm[i],
        })
    }

    /// Coefficients at `alpha`, held at the end values outside the sweep.
    pub fn interpolate(&self, alpha: f64) -> Option<PolarPoint> {
        if self.is_empty() {
            return None;
        }
        Some(PolarPoint {
            alpha,
            cl: interp(alpha, &self.alpha, &self.cl),
            cd: interp(alpha, &self.alpha, &self.cd),
            cm: interp(alpha, &self.alpha, &self.cm),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirfoilPolars {
    pub airfoil_name: String,
    pub mode: Mode,
    pub polars: Vec<PolarCurve>,
}

impl AirfoilPolars {
    /// Polar with the Reynolds number closest to `reynolds`.
    pub fn nearest(&self, reynolds: f64) -> Option<&PolarCurve> {
        self.polars
            .iter()
            .min_by(|a, b| (a.reynolds - reynolds).abs().total_cmp(&(b.reynolds - reynolds).abs()))
    }

    pub fn coefficients(&self, alpha: f64, reynolds: f64) -> Option<PolarPoint> {
        self.nearest(reynolds)?.interpolate(alpha)
    }
}

// ============================================================================
// Solver scripts and output
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PolarSettings {
    pub alpha_range: [f64; 2],
    pub alpha_step: f64,
    pub n_critical: f64,
    pub max_iterations: u32,
    pub panel_count: u32,
    pub mach: f64,
}

impl PolarSettings {
    pub fn from_config(cfg: &Xfoil, mach: f64) -> Self {
        Self {
            alpha_range: cfg.alpha_range,
            alpha_step: cfg.alpha_step,
            n_critical: cfg.n_critical,
            max_iterations: cfg.max_iterations,
            panel_count: cfg.panel_count,
            mach,
        }
    }
}

/// Command script for one Reynolds number. Coordinate files are expected in
/// the work directory as [`AIRFOIL_FILE`]; they get repaneled and an explicit
/// transition amplification factor.
pub fn polar_script(airfoil: &Airfoil, reynolds: f64, s: &PolarSettings) -> String {
    let mut lines: Vec<String> = Vec::new();
    match airfoil {
        Airfoil::Naca(code) => lines.push(format!("NACA {}", code)),
        Airfoil::File(_) => {
            lines.push(format!("LOAD {}", AIRFOIL_FILE));
            lines.push("PPAR".into());
            lines.push(format!("N {}", s.panel_count));
            lines.push("T 1.0".into());
            lines.push(String::new());
            lines.push(String::new());
        }
    }
    lines.push("OPER".into());
    lines.push(format!("ITER {}", s.max_iterations));
    lines.push(format!("VISC {:?}", reynolds));
    lines.push(format!("MACH {:?}", s.mach));
    if let Airfoil::File(_) = airfoil {
        lines.push("VPAR".into());
        lines.push(format!("N {:?}", s.n_critical));
        lines.push(String::new());
    }
    lines.push("PACC".into());
    lines.push(POLAR_FILE.into());
    lines.push(String::new());
    lines.push(format!("ASEQ {:?} {:?} {:?}", s.alpha_range[0], s.alpha_range[1], s.alpha_step));
    lines.push("PACC".into());
    lines.push(String::new());
    lines.push("QUIT".into());

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Accumulated polar text: samples follow the first `---` rule, one row per
/// alpha with at least seven columns (alpha, CL, CD, CDp, CM, ...). Rows that
/// do not parse are skipped. `None` if no row survives.
pub fn parse_polar(text: &str, reynolds: f64, mach: f64) -> Option<PolarCurve> {
    let mut lines = text.lines();
    lines.by_ref().find(|l| l.contains("---"))?;

    let points: Vec<PolarPoint> = lines
        .filter_map(|line| {
            let tok: Vec<&str> = line.split_whitespace().collect();
            if tok.len() < 7 {
                return None;
            }
            Some(PolarPoint {
                alpha: tok[0].parse().ok()?,
                cl: tok[1].parse().ok()?,
                cd: tok[2].parse().ok()?,
                cm: tok[4].parse().ok()?,
            })
        })
        .collect();

    if points.is_empty() {
        return None;
    }
    Some(PolarCurve::from_points(reynolds, mach, points))
}

/// Two-digit scientific notation with a signed, zero-padded exponent
/// (`1.00e+06`), as used in polar file names.
pub fn sci2(x: f64) -> String {
    let s = format!("{:.2e}", x);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let e: i32 = exp.parse().unwrap_or(0);
            let sign = if e < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, e.abs())
        }
        None => s,
    }
}

pub fn polar_csv_name(curve: &PolarCurve) -> String {
    format!("polar_re{}_m{:.2}.csv", sci2(curve.reynolds), curve.mach)
}

// ============================================================================
// Thin-airfoil stand-in
// ============================================================================

/// Lift slope 2π per radian, zero-lift angle of minus the camber percentage
/// in degrees, flat-plate turbulent skin friction on both surfaces plus a
/// quadratic lift term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThinAirfoil {
    /// per rad
    pub cl_alpha: f64,
    pub induced_k: f64,
}

impl Default for ThinAirfoil {
    fn default() -> Self {
        Self {
            cl_alpha: 2.0 * std::f64::consts::PI,
            induced_k: 0.01,
        }
    }
}

/// Max camber in percent chord from a 4-digit NACA code; 0 otherwise.
pub fn naca_camber(airfoil: &Airfoil) -> f64 {
    match airfoil {
        Airfoil::Naca(code) if code.len() == 4 => code
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .map_or(0.0, f64::from),
        _ => 0.0,
    }
}

impl ThinAirfoil {
    pub fn polar(&self, camber_pct: f64, reynolds: f64, s: &PolarSettings) -> PolarCurve {
        let cf = 0.074 / reynolds.max(1.0).powf(0.2);
        let cd0 = 2.0 * cf;
        let alpha_zero_lift = -camber_pct;
        let cm = -std::f64::consts::PI * camber_pct / 100.0;

        let mut points = Vec::new();
        let [lo, hi] = s.alpha_range;
        let step = s.alpha_step.max(1e-6);
        let mut i = 0usize;
        loop {
            let alpha = lo + i as f64 * step;
            if alpha > hi + step * 1e-6 {
                break;
            }
            let cl = self.cl_alpha * (alpha - alpha_zero_lift).to_radians();
            points.push(PolarPoint {
                alpha,
                cl,
                cd: cd0 + self.induced_k * cl * cl,
                cm,
            });
            i += 1;
        }
        PolarCurve::from_points(reynolds, s.mach, points)
    }
}

// ============================================================================
// Generator
// ============================================================================

pub fn airfoil_name(airfoil: &Airfoil) -> String {
    match airfoil {
        Airfoil::Naca(code) => format!("NACA {}", code),
        Airfoil::File(path) => fs::read_to_string(path)
            .ok()
            .and_then(|t| t.lines().next().map(|l| l.trim().to_string()))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| {
                Path::new(path)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.clone())
            }),
    }
}

fn workdir_name(reynolds: f64) -> String {
    format!("xfoil_re{}", sci2(reynolds))
}

pub struct PolarGenerator<R: SolverRunner> {
    runner: R,
    mode: Mode,
    settings: PolarSettings,
    work_root: PathBuf,
    keep_intermediate: bool,
    mock: ThinAirfoil,
}

impl<R: SolverRunner> PolarGenerator<R> {
    pub fn new(
        runner: R,
        settings: PolarSettings,
        work_root: impl Into<PathBuf>,
        keep_intermediate: bool,
        ctx: &RunContext,
    ) -> Self {
        let mode = if runner.probe() {
            Mode::Real
        } else {
            ctx.warn("airfoil solver not available, using thin-airfoil polars");
            Mode::Mock
        };
        Self::with_mode(runner, mode, settings, work_root, keep_intermediate)
    }

    pub fn with_mode(
        runner: R,
        mode: Mode,
        settings: PolarSettings,
        work_root: impl Into<PathBuf>,
        keep_intermediate: bool,
    ) -> Self {
        Self {
            runner,
            mode,
            settings,
            work_root: work_root.into(),
            keep_intermediate,
            mock: ThinAirfoil::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn generate(&self, airfoil: &Airfoil, reynolds_numbers: &[f64], ctx: &RunContext) -> AirfoilPolars {
        let name = airfoil_name(airfoil);
        ctx.info(format!("generating {} polars ({:?} mode)", name, self.mode));

        let mut polars = Vec::with_capacity(reynolds_numbers.len());
        for &re in reynolds_numbers {
            ctx.debug(format!("Re = {}", sci2(re)));
            let polar = match self.mode {
                Mode::Mock => Ok(self.mock.polar(naca_camber(airfoil), re, &self.settings)),
                Mode::Real => self.run_polar(airfoil, re),
            };
            match polar {
                Ok(p) => {
                    ctx.debug(format!("polar with {} points", p.len()));
                    polars.push(p);
                }
                Err(f) => ctx.warn(format!("no polar at Re = {}: {}", sci2(re), f)),
            }
        }

        ctx.ok(format!("generated {}/{} polars", polars.len(), reynolds_numbers.len()));
        AirfoilPolars {
            airfoil_name: name,
            mode: self.mode,
            polars,
        }
    }

    fn run_polar(&self, airfoil: &Airfoil, reynolds: f64) -> Result<PolarCurve, CaseFailure> {
        let workdir = CaseWorkdir::create(self.work_root.join(workdir_name(reynolds)), self.keep_intermediate)?;
        if let Airfoil::File(path) = airfoil {
            fs::copy(path, workdir.join(AIRFOIL_FILE))?;
        }

        let script = polar_script(airfoil, reynolds, &self.settings);
        fs::write(workdir.join("xfoil_commands.txt"), &script)?;
        self.runner
            .run(&[], &script, workdir.path(), &workdir.join("xfoil_output.txt"))?;

        let polar_path = workdir.join(POLAR_FILE);
        let text = fs::read_to_string(&polar_path).map_err(|_| CaseFailure::MissingOutput {
            expected: vec![POLAR_FILE.to_string()],
        })?;
        parse_polar(&text, reynolds, self.settings.mach).ok_or(CaseFailure::IncompleteOutput {
            missing: vec!["polar rows".to_string()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Invocation;
    use approx::assert_relative_eq;
    use std::time::Duration;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
       XFOIL         Version 6.99

 Calculated polar for: NACA 0012

 Mach =   0.000     Re =     1.000 e 6     Ncrit =   9.000

   alpha    CL        CD       CDp       CM     Top_Xtr  Bot_Xtr
  ------ -------- --------- --------- -------- -------- --------
   2.000   0.2200   0.00600   0.00100  -0.0010   0.8000   0.3000
  -2.000  -0.2200   0.00600   0.00100   0.0010   0.3000   0.8000
   0.000   0.0000   0.00540   0.00090   0.0000   0.6000   0.6000
   bad row that does not parse at all
   4.000   0.4400
";

    fn settings() -> PolarSettings {
        PolarSettings::from_config(&Xfoil::default(), 0.1)
    }

    #[test]
    fn test_parse_polar_sample() {
        let p = parse_polar(SAMPLE, 1e6, 0.0).unwrap();
        assert_eq!(p.alpha, vec![-2.0, 0.0, 2.0]);
        assert_eq!(p.cl, vec![-0.22, 0.0, 0.22]);
        assert_eq!(p.cm, vec![0.001, 0.0, -0.001]);
        assert!(parse_polar("alpha CL\n1 2 3 4 5 6 7\n", 1e6, 0.0).is_none());
    }

    #[test]
    fn test_interpolation_clamps_at_ends() {
        let p = parse_polar(SAMPLE, 1e6, 0.0).unwrap();
        let mid = p.interpolate(1.0).unwrap();
        assert_relative_eq!(mid.cl, 0.11);
        assert_relative_eq!(mid.cd, 0.0057);
        assert_eq!(p.interpolate(15.0).unwrap().cl, 0.22);
        assert_eq!(p.interpolate(-15.0).unwrap().cl, -0.22);
    }

    #[test]
    fn test_nearest_reynolds() {
        let s = settings();
        let thin = ThinAirfoil::default();
        let set = AirfoilPolars {
            airfoil_name: "NACA 0012".into(),
            mode: Mode::Mock,
            polars: vec![thin.polar(0.0, 1e6, &s), thin.polar(0.0, 5e6, &s)],
        };
        assert_eq!(set.nearest(1.4e6).unwrap().reynolds, 1e6);
        assert_eq!(set.nearest(4e6).unwrap().reynolds, 5e6);
        let cl = set.coefficients(5.0, 2e6).unwrap().cl;
        assert_relative_eq!(cl, 2.0 * std::f64::consts::PI * 5f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn test_naca_script_sequence() {
        let s = polar_script(&Airfoil::Naca("2412".into()), 1e6, &settings());
        assert_eq!(
            s,
            "NACA 2412\nOPER\nITER 200\nVISC 1000000.0\nMACH 0.1\nPACC\npolar.txt\n\nASEQ -10.0 20.0 0.5\nPACC\n\nQUIT\n"
        );
    }

    #[test]
    fn test_file_script_repanels() {
        let s = polar_script(&Airfoil::File("/tmp/wing.dat".into()), 2e6, &settings());
        assert!(s.starts_with("LOAD airfoil.dat\nPPAR\nN 200\nT 1.0\n\n\nOPER\n"));
        assert!(s.contains("VISC 2000000.0\nMACH 0.1\nVPAR\nN 9.0\n\nPACC\n"));
    }

    #[test]
    fn test_csv_name_matches_scientific_format() {
        assert_eq!(sci2(1e6), "1.00e+06");
        assert_eq!(sci2(2.5e5), "2.50e+05");
        assert_eq!(sci2(0.001), "1.00e-03");
        let p = ThinAirfoil::default().polar(0.0, 1e6, &settings());
        assert_eq!(polar_csv_name(&p), "polar_re1.00e+06_m0.10.csv");
    }

    #[test]
    fn test_thin_airfoil_camber_shifts_lift() {
        let s = settings();
        let sym = ThinAirfoil::default().polar(naca_camber(&Airfoil::Naca("0012".into())), 1e6, &s);
        let cam = ThinAirfoil::default().polar(naca_camber(&Airfoil::Naca("2412".into())), 1e6, &s);
        assert_eq!(sym.len(), 61);
        assert_eq!(sym.interpolate(0.0).unwrap().cl, 0.0);
        assert!(cam.interpolate(0.0).unwrap().cl > 0.2);
        assert!(cam.interpolate(0.0).unwrap().cm < 0.0);
    }

    struct FakeXfoil {
        /// Reynolds numbers (as passed on VISC) that write nothing
        silent_on: Vec<String>,
    }

    impl SolverRunner for FakeXfoil {
        fn probe(&self) -> bool {
            true
        }

        fn run(&self, _args: &[String], script: &str, workdir: &Path, stdout_path: &Path) -> Result<Invocation, CaseFailure> {
            fs::write(stdout_path, "")?;
            let visc = script.lines().find_map(|l| l.strip_prefix("VISC ")).unwrap_or("");
            if !self.silent_on.iter().any(|s| s == visc) {
                fs::write(workdir.join(POLAR_FILE), SAMPLE)?;
            }
            Ok(Invocation {
                exit_code: Some(0),
                elapsed: Duration::ZERO,
            })
        }
    }

    #[test]
    fn test_generator_skips_failed_reynolds() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("xfoil");
        let gen = PolarGenerator::new(
            FakeXfoil {
                silent_on: vec!["2000000.0".into()],
            },
            settings(),
            &root,
            false,
            &RunContext::silent(),
        );
        assert_eq!(gen.mode(), Mode::Real);
        let set = gen.generate(&Airfoil::Naca("0012".into()), &[1e6, 2e6], &RunContext::silent());
        assert_eq!(set.airfoil_name, "NACA 0012");
        assert_eq!(set.polars.len(), 1);
        assert_eq!(set.polars[0].reynolds, 1e6);
        assert_eq!(set.polars[0].mach, 0.1);
        assert!(!root.join(workdir_name(1e6)).exists());
    }

    #[test]
    fn test_file_airfoil_copied_into_workdir() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let dat = root.join("section.dat");
        fs::write(&dat, "MH 45\n1.0 0.0\n0.0 0.0\n1.0 0.0\n").unwrap();
        let airfoil = Airfoil::File(dat.to_string_lossy().into_owned());
        assert_eq!(airfoil_name(&airfoil), "MH 45");

        let gen = PolarGenerator::with_mode(
            FakeXfoil { silent_on: vec![] },
            Mode::Real,
            settings(),
            root,
            true,
        );
        let set = gen.generate(&airfoil, &[1e6], &RunContext::silent());
        assert_eq!(set.polars.len(), 1);
        assert!(root.join(workdir_name(1e6)).join(AIRFOIL_FILE).exists());
    }
}
