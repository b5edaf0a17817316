//! Aggregated static-stability summary over a batch of records.

use serde::Serialize;

use crate::controls::{least_squares, LinearFit};
use crate::record::{Coef, DerivativeRecord};
use crate::reference::ReferenceGeometry;
use crate::run_matrix::NEGLIGIBLE;

/// Static margin above this fraction of the reference chord is "stable".
pub const STABLE_MARGIN: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    Stable,
    Marginal,
    Unstable,
}

impl Stability {
    pub fn classify(static_margin: f64) -> Self {
        if static_margin > STABLE_MARGIN {
            Stability::Stable
        } else if static_margin > 0.0 {
            Stability::Marginal
        } else {
            Stability::Unstable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NeutralPointSource {
    /// Read from solver output
    Reported,
    /// From the fitted Cm/CL alpha slopes
    Estimated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilitySummary {
    pub baseline: Option<String>,
    /// Per-degree slopes from the alpha sweep at zero sideslip
    pub cl_alpha: Option<LinearFit>,
    pub cd_alpha: Option<LinearFit>,
    pub cm_alpha: Option<LinearFit>,
    /// Per-degree slopes from the beta sweep at the baseline alpha
    pub cy_beta: Option<LinearFit>,
    pub roll_beta: Option<LinearFit>,
    pub cn_beta: Option<LinearFit>,
    pub neutral_point: Option<f64>,
    pub neutral_point_source: Option<NeutralPointSource>,
    pub static_margin: Option<f64>,
    pub stability: Option<Stability>,
}

pub fn static_margin(xnp: f64, x_cg: f64, c_ref: f64) -> f64 {
    (xnp - x_cg) / c_ref
}

fn clean(r: &DerivativeRecord) -> bool {
    r.converged && !r.case.has_deflection()
}

fn near(a: f64, b: f64) -> bool {
    (a - b).abs() <= NEGLIGIBLE
}

fn fit(records: &[&DerivativeRecord], x: impl Fn(&DerivativeRecord) -> f64, c: Coef) -> Option<LinearFit> {
    let xs: Vec<f64> = records.iter().map(|&r| x(r)).collect();
    let ys: Vec<f64> = records.iter().map(|r| r.coefficient(c)).collect();
    least_squares(&xs, &ys).ok()
}

/// Baseline is the clean zero-sideslip record with alpha closest to zero.
pub fn baseline(records: &[DerivativeRecord]) -> Option<&DerivativeRecord> {
    records
        .iter()
        .filter(|r| clean(r) && near(r.case.beta, 0.0))
        .min_by(|a, b| a.case.alpha.abs().total_cmp(&b.case.alpha.abs()))
}

pub fn summarize(records: &[DerivativeRecord], reference: &ReferenceGeometry, x_cg: f64) -> StabilitySummary {
    let base = baseline(records);

    let alpha_sweep: Vec<&DerivativeRecord> = records
        .iter()
        .filter(|r| clean(r) && near(r.case.beta, 0.0))
        .collect();
    let cl_alpha = fit(&alpha_sweep, |r| r.case.alpha, Coef::Lift);
    let cd_alpha = fit(&alpha_sweep, |r| r.case.alpha, Coef::Drag);
    let cm_alpha = fit(&alpha_sweep, |r| r.case.alpha, Coef::Pitch);

    let (cy_beta, roll_beta, cn_beta) = match base {
        Some(b) => {
            let beta_sweep: Vec<&DerivativeRecord> = records
                .iter()
                .filter(|r| clean(r) && near(r.case.alpha, b.case.alpha))
                .collect();
            (
                fit(&beta_sweep, |r| r.case.beta, Coef::Side),
                fit(&beta_sweep, |r| r.case.beta, Coef::Roll),
                fit(&beta_sweep, |r| r.case.beta, Coef::Yaw),
            )
        }
        None => (None, None, None),
    };

    let reported = base.and_then(|b| b.xnp);
    let (neutral_point, neutral_point_source) = match (reported, cl_alpha, cm_alpha) {
        (Some(x), _, _) => (Some(x), Some(NeutralPointSource::Reported)),
        (None, Some(cl), Some(cm)) if cl.slope.abs() > f64::EPSILON => {
            let x_ref = reference.moment_reference[0];
            (
                Some(x_ref - reference.chord * cm.slope / cl.slope),
                Some(NeutralPointSource::Estimated),
            )
        }
        _ => (None, None),
    };

    let margin = neutral_point
        .filter(|_| reference.chord > 0.0)
        .map(|xnp| static_margin(xnp, x_cg, reference.chord));

    StabilitySummary {
        baseline: base.map(|b| b.case.name.clone()),
        cl_alpha,
        cd_alpha,
        cm_alpha,
        cy_beta,
        roll_beta,
        cn_beta,
        neutral_point,
        neutral_point_source,
        static_margin: margin,
        stability: margin.map(Stability::classify),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockModel;
    use crate::run_matrix::{build_matrix, expand_range, RunCase};
    use approx::assert_relative_eq;

    fn reference() -> ReferenceGeometry {
        ReferenceGeometry {
            area: 8.0,
            span: 8.0,
            chord: 1.0,
            moment_reference: [0.25, 0.0, 0.0],
            half_span_model: true,
        }
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(Stability::classify(0.12), Stability::Stable);
        assert_eq!(Stability::classify(0.03), Stability::Marginal);
        assert_eq!(Stability::classify(0.0), Stability::Unstable);
        assert_eq!(Stability::classify(-0.1), Stability::Unstable);
    }

    #[test]
    fn test_summary_from_mock_matrix() {
        let m = MockModel::default();
        let cases = build_matrix(&expand_range([-4.0, 8.0, 2.0]), &expand_range([-4.0, 4.0, 2.0]), 0.1);
        let records: Vec<_> = cases.iter().map(|c| m.evaluate(c)).collect();
        let s = summarize(&records, &reference(), 0.25);

        assert_eq!(s.baseline.as_deref(), Some("a0.0_b0.0_M0.10"));
        let per_deg = 1f64.to_radians();
        assert_relative_eq!(s.cl_alpha.unwrap().slope, m.cl_alpha * per_deg, epsilon = 1e-12);
        assert_relative_eq!(s.cm_alpha.unwrap().slope, m.cm_alpha * per_deg, epsilon = 1e-12);
        assert_relative_eq!(s.cn_beta.unwrap().slope, m.cn_beta * per_deg, epsilon = 1e-12);

        // Mock reports no Xnp: estimated from slopes
        assert_eq!(s.neutral_point_source, Some(NeutralPointSource::Estimated));
        let xnp = 0.25 + 0.8 / 5.5;
        assert_relative_eq!(s.neutral_point.unwrap(), xnp, epsilon = 1e-12);
        assert_relative_eq!(s.static_margin.unwrap(), xnp - 0.25, epsilon = 1e-12);
        assert_eq!(s.stability, Some(Stability::Stable));
    }

    #[test]
    fn test_reported_neutral_point_preferred() {
        let m = MockModel::default();
        let mut r = m.evaluate(&RunCase::new(0.0, 0.0, 0.1));
        r.xnp = Some(0.28);
        let s = summarize(&[r], &reference(), 0.25);
        assert_eq!(s.neutral_point_source, Some(NeutralPointSource::Reported));
        assert_relative_eq!(s.static_margin.unwrap(), 0.03, epsilon = 1e-12);
        assert_eq!(s.stability, Some(Stability::Marginal));
        assert!(s.cl_alpha.is_none());
    }
}
