//! Control derivatives from deflection sweeps.
//!
//! Each coefficient is fitted against deflection by ordinary least squares;
//! the slope is the per-degree derivative. At least [`MIN_FIT_POINTS`] distinct
//! deflections are required. With fewer, no derivative is produced.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::FitError;
use crate::record::{Coef, DerivativeRecord};
use crate::run_matrix::{ControlKind, NEGLIGIBLE};

pub const MIN_FIT_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Ordinary least squares `y = slope x + intercept`.
pub fn least_squares(xs: &[f64], ys: &[f64]) -> Result<LinearFit, FitError> {
    let n = xs.len().min(ys.len());
    let distinct = distinct_count(&xs[..n]);
    if distinct < MIN_FIT_POINTS {
        return Err(FitError::InsufficientPoints {
            found: distinct,
            required: MIN_FIT_POINTS,
        });
    }

    let nf = n as f64;
    let mx = xs[..n].iter().sum::<f64>() / nf;
    let my = ys[..n].iter().sum::<f64>() / nf;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys).take(n) {
        let (dx, dy) = (x - mx, y - my);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let r_squared = if syy > 0.0 { (sxy * sxy) / (sxx * syy) } else { 1.0 };
    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

fn distinct_count(xs: &[f64]) -> usize {
    let mut sorted: Vec<f64> = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup_by(|a, b| (*a - *b).abs() <= NEGLIGIBLE);
    sorted.len()
}

/// Per-degree derivatives of every coefficient for one control.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlDerivatives {
    pub control: String,
    pub kind: ControlKind,
    pub alpha: f64,
    pub beta: f64,
    /// Keyed by coefficient label (`CL`, `Cm`, ...)
    pub per_degree: BTreeMap<String, LinearFit>,
    pub points: usize,
}

impl ControlDerivatives {
    pub fn slope(&self, c: Coef) -> Option<f64> {
        self.per_degree.get(c.label()).map(|f| f.slope)
    }
}

/// Fit a deflection sweep. Only converged records count; they must share one
/// alpha/beta.
pub fn estimate(
    records: &[DerivativeRecord],
    kind: ControlKind,
    control: &str,
) -> Result<ControlDerivatives, FitError> {
    let usable: Vec<&DerivativeRecord> = records.iter().filter(|r| r.converged).collect();
    let Some(first) = usable.first() else {
        return Err(FitError::InsufficientPoints {
            found: 0,
            required: MIN_FIT_POINTS,
        });
    };
    let (alpha, beta) = (first.case.alpha, first.case.beta);
    if usable
        .iter()
        .any(|r| (r.case.alpha - alpha).abs() > NEGLIGIBLE || (r.case.beta - beta).abs() > NEGLIGIBLE)
    {
        return Err(FitError::MixedConditions);
    }

    let xs: Vec<f64> = usable.iter().map(|r| r.case.deflection(kind)).collect();
    let mut per_degree = BTreeMap::new();
    for c in Coef::ALL {
        let ys: Vec<f64> = usable.iter().map(|r| r.coefficient(c)).collect();
        per_degree.insert(c.label().to_string(), least_squares(&xs, &ys)?);
    }

    Ok(ControlDerivatives {
        control: control.to_string(),
        kind,
        alpha,
        beta,
        per_degree,
        points: usable.len(),
    })
}
