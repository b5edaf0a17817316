//! Run cases and the run matrix.
//!
//! A case name is a pure function of its variable tuple and is the key that
//! ties a request to every file the solver writes for it. Variables are held
//! at [`NAME_DECIMALS`] decimal places so that distinct cases always get
//! distinct names.

use serde::Serialize;

/// Magnitudes below this are treated as exactly zero.
pub const NEGLIGIBLE: f64 = 1e-6;

/// Resolution of every case variable, and the widest precision in a name.
pub const NAME_DECIMALS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    /// Same-sign deflection on both halves
    Symmetric,
    /// Opposite-sign deflection
    Differential,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunCase {
    pub name: String,
    /// deg
    pub alpha: f64,
    /// deg
    pub beta: f64,
    pub mach: f64,
    /// Symmetric control deflection, deg
    pub symmetric: f64,
    /// Differential control deflection, deg
    pub differential: f64,
}

fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    // + 0.0 folds -0.0 into 0.0
    (v * scale).round() / scale + 0.0
}

fn quantize(v: f64) -> f64 {
    round_to(v, NAME_DECIMALS as i32)
}

fn significant(v: f64) -> bool {
    v.abs() > NEGLIGIBLE
}

/// At least `min_decimals` places, more only where the value needs them.
fn name_value(v: f64, min_decimals: usize) -> String {
    let v = quantize(v);
    let decimals = (min_decimals..NAME_DECIMALS)
        .find(|&d| (round_to(v, d as i32) - v).abs() < NEGLIGIBLE * 1e-3)
        .unwrap_or(NAME_DECIMALS);
    format!("{:.*}", decimals, v)
}

/// `a{alpha}_b{beta}[_de{sym}][_da{diff}]_M{mach}`, one decimal for angles and
/// two for Mach unless the value carries more.
pub fn case_name(alpha: f64, beta: f64, mach: f64, symmetric: f64, differential: f64) -> String {
    let mut name = format!("a{}_b{}", name_value(alpha, 1), name_value(beta, 1));
    if significant(quantize(symmetric)) {
        name.push_str(&format!("_de{}", name_value(symmetric, 1)));
    }
    if significant(quantize(differential)) {
        name.push_str(&format!("_da{}", name_value(differential, 1)));
    }
    name.push_str(&format!("_M{}", name_value(mach, 2)));
    name
}

impl RunCase {
    pub fn new(alpha: f64, beta: f64, mach: f64) -> Self {
        Self::with_controls(alpha, beta, mach, 0.0, 0.0)
    }

    pub fn with_controls(alpha: f64, beta: f64, mach: f64, symmetric: f64, differential: f64) -> Self {
        let (alpha, beta, mach) = (quantize(alpha), quantize(beta), quantize(mach));
        let (symmetric, differential) = (quantize(symmetric), quantize(differential));
        Self {
            name: case_name(alpha, beta, mach, symmetric, differential),
            alpha,
            beta,
            mach,
            symmetric,
            differential,
        }
    }

    fn same_conditions(&self, other: &RunCase) -> bool {
        (self.alpha, self.beta, self.mach, self.symmetric, self.differential)
            == (other.alpha, other.beta, other.mach, other.symmetric, other.differential)
    }

    pub fn deflection(&self, kind: ControlKind) -> f64 {
        match kind {
            ControlKind::Symmetric => self.symmetric,
            ControlKind::Differential => self.differential,
        }
    }

    pub fn has_deflection(&self) -> bool {
        significant(self.symmetric) || significant(self.differential)
    }
}

/// `[min, max, step]` to the inclusive sequence `min, min+step, ...`, with a
/// half-step allowance at the top so `max` survives rounding.
pub fn expand_range(range: [f64; 3]) -> Vec<f64> {
    let [min, max, step] = range;
    if !(step > 0.0) || min > max {
        return Vec::new();
    }
    let n = ((max + step / 2.0 - min) / step).ceil().max(0.0) as usize;
    (0..n)
        .map(|i| min + i as f64 * step)
        .filter(|v| *v < max + step / 2.0)
        .collect()
}

/// Identical tuples collapse to one case.
fn push_unique(cases: &mut Vec<RunCase>, case: RunCase) {
    if !cases.iter().any(|c| c.same_conditions(&case)) {
        cases.push(case);
    }
}

/// alpha × beta at a shared Mach. Mach is not a matrix axis: the panel solver
/// reads it from the deck header and cannot vary it per case in batch mode.
pub fn build_matrix(alphas: &[f64], betas: &[f64], mach: f64) -> Vec<RunCase> {
    let mut cases = Vec::with_capacity(alphas.len() * betas.len());
    for &alpha in alphas {
        for &beta in betas {
            push_unique(&mut cases, RunCase::new(alpha, beta, mach));
        }
    }
    cases
}

/// Deflection sweep of one control at a fixed flight condition.
pub fn control_sweep(
    kind: ControlKind,
    deflections: &[f64],
    alpha: f64,
    beta: f64,
    mach: f64,
) -> Vec<RunCase> {
    let mut cases = Vec::with_capacity(deflections.len());
    for &d in deflections {
        let case = match kind {
            ControlKind::Symmetric => RunCase::with_controls(alpha, beta, mach, d, 0.0),
            ControlKind::Differential => RunCase::with_controls(alpha, beta, mach, 0.0, d),
        };
        push_unique(&mut cases, case);
    }
    cases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_range_inclusive() {
        assert_eq!(expand_range([-10.0, 20.0, 2.0]).len(), 16);
        assert_eq!(expand_range([-5.0, 5.0, 2.0]), vec![-5.0, -3.0, -1.0, 1.0, 3.0, 5.0]);
        assert_eq!(expand_range([0.0, 0.0, 1.0]), vec![0.0]);
        assert!(expand_range([0.0, 1.0, 0.0]).is_empty());
        let v = expand_range([0.0, 1.0, 0.1]);
        assert_eq!(v.len(), 11);
    }

    #[test]
    fn test_case_name_format() {
        assert_eq!(case_name(5.0, 0.0, 0.1, 0.0, 0.0), "a5.0_b0.0_M0.10");
        assert_eq!(case_name(-2.0, 1.5, 0.3, 10.0, 0.0), "a-2.0_b1.5_de10.0_M0.30");
        assert_eq!(case_name(0.0, 0.0, 0.1, 0.0, -5.0), "a0.0_b0.0_da-5.0_M0.10");
        assert_eq!(case_name(0.0, 0.0, 0.1, 5.0, 5.0), "a0.0_b0.0_de5.0_da5.0_M0.10");
    }

    #[test]
    fn test_no_negative_zero_in_names() {
        assert_eq!(case_name(-0.0, -0.00001, 0.1, 0.0, 0.0), "a0.0_b0.0_M0.10");
        assert_eq!(RunCase::new(-0.0, -1e-7, 0.1).name, "a0.0_b0.0_M0.10");
    }

    #[test]
    fn test_fine_steps_keep_distinct_names() {
        let alphas = expand_range([0.0, 1.0, 0.05]);
        assert_eq!(alphas.len(), 21);
        let cases = build_matrix(&alphas, &[0.0], 0.1);
        assert_eq!(cases.len(), 21);
        let mut names: Vec<&str> = cases.iter().map(|c| c.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 21);
        assert_eq!(cases[1].name, "a0.05_b0.0_M0.10");
        assert_eq!(cases[3].name, "a0.15_b0.0_M0.10");
        assert_eq!(case_name(0.12346, 0.0, 0.125, 0.0, 0.0), "a0.1235_b0.0_M0.125");
    }

    #[test]
    fn test_floating_point_steps_do_not_leak_into_cases() {
        let cases = build_matrix(&expand_range([0.0, 1.0, 0.1]), &[0.0], 0.1);
        assert_eq!(cases[3].alpha, 0.3);
        assert_eq!(cases[3].name, "a0.3_b0.0_M0.10");
    }

    #[test]
    fn test_names_are_idempotent() {
        let a = expand_range([-10.0, 20.0, 2.0]);
        let b = expand_range([-5.0, 5.0, 2.0]);
        let first: Vec<String> = build_matrix(&a, &b, 0.1).into_iter().map(|c| c.name).collect();
        let second: Vec<String> = build_matrix(&a, &b, 0.1).into_iter().map(|c| c.name).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 16 * 6);
    }

    #[test]
    fn test_duplicates_collapse() {
        let cases = build_matrix(&[0.0, 0.0, 2.0], &[0.0], 0.1);
        assert_eq!(cases.len(), 2);
    }

    #[test]
    fn test_control_sweep() {
        let cases = control_sweep(ControlKind::Differential, &[-10.0, 0.0, 10.0], 2.0, 0.0, 0.1);
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[0].differential, -10.0);
        assert_eq!(cases[0].symmetric, 0.0);
        assert!(cases[0].has_deflection());
        assert!(!cases[1].has_deflection());
        assert_eq!(cases[1].name, "a2.0_b0.0_M0.10");
    }
}
