//! Canonical per-case result record.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::CaseFailure;
use crate::run_matrix::RunCase;

/// The six force/moment coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Coef {
    Lift,
    Drag,
    Side,
    Roll,
    Pitch,
    Yaw,
}

impl Coef {
    pub const ALL: [Coef; 6] = [Coef::Lift, Coef::Drag, Coef::Side, Coef::Roll, Coef::Pitch, Coef::Yaw];

    /// Solver spelling (`CL`, `CD`, `CY`, `Cl`, `Cm`, `Cn`).
    pub fn label(self) -> &'static str {
        match self {
            Coef::Lift => "CL",
            Coef::Drag => "CD",
            Coef::Side => "CY",
            Coef::Roll => "Cl",
            Coef::Pitch => "Cm",
            Coef::Yaw => "Cn",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Coef::ALL.into_iter().find(|c| c.label() == label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Coefficients<T> {
    #[serde(rename = "CL")]
    pub lift: T,
    #[serde(rename = "CD")]
    pub drag: T,
    #[serde(rename = "CY")]
    pub side: T,
    #[serde(rename = "Cl")]
    pub roll: T,
    #[serde(rename = "Cm")]
    pub pitch: T,
    #[serde(rename = "Cn")]
    pub yaw: T,
}

impl<T> Coefficients<T> {
    pub fn get(&self, c: Coef) -> &T {
        match c {
            Coef::Lift => &self.lift,
            Coef::Drag => &self.drag,
            Coef::Side => &self.side,
            Coef::Roll => &self.roll,
            Coef::Pitch => &self.pitch,
            Coef::Yaw => &self.yaw,
        }
    }

    pub fn get_mut(&mut self, c: Coef) -> &mut T {
        match c {
            Coef::Lift => &mut self.lift,
            Coef::Drag => &mut self.drag,
            Coef::Side => &mut self.side,
            Coef::Roll => &mut self.roll,
            Coef::Pitch => &mut self.pitch,
            Coef::Yaw => &mut self.yaw,
        }
    }
}

impl Coefficients<Option<f64>> {
    /// All six present, or the labels of the absent ones.
    pub fn complete(&self) -> Result<Coefficients<f64>, Vec<String>> {
        let missing: Vec<String> = Coef::ALL
            .into_iter()
            .filter(|c| self.get(*c).is_none())
            .map(|c| c.label().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }
        let mut out = Coefficients::<f64>::default();
        for c in Coef::ALL {
            *out.get_mut(c) = self.get(c).unwrap_or_default();
        }
        Ok(out)
    }

    /// Values from `other` replace ours where present.
    pub fn overlay(&mut self, other: &Self) {
        for c in Coef::ALL {
            if let Some(v) = other.get(c) {
                *self.get_mut(c) = Some(*v);
            }
        }
    }

    /// Values from `other` used only where ours are absent.
    pub fn fill(&mut self, other: &Self) {
        for c in Coef::ALL {
            let slot = self.get_mut(c);
            if slot.is_none() {
                *slot = *other.get(c);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        Coef::ALL.into_iter().all(|c| self.get(c).is_none())
    }
}

/// Axis of a stability or rate derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Alpha,
    Beta,
    /// Roll rate
    P,
    /// Pitch rate
    Q,
    /// Yaw rate
    R,
}

impl Axis {
    pub const ALL: [Axis; 5] = [Axis::Alpha, Axis::Beta, Axis::P, Axis::Q, Axis::R];

    /// Suffix used in solver labels (`CLa`, `Cnb`, `Clp`, ...).
    pub fn suffix(self) -> char {
        match self {
            Axis::Alpha => 'a',
            Axis::Beta => 'b',
            Axis::P => 'p',
            Axis::Q => 'q',
            Axis::R => 'r',
        }
    }

    pub fn from_suffix(c: char) -> Option<Self> {
        Axis::ALL.into_iter().find(|a| a.suffix() == c)
    }
}

/// Per-radian (alpha, beta) and nondimensional-rate derivatives as reported.
/// Absent means "not reported", never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StabilityDerivatives {
    pub alpha: Coefficients<Option<f64>>,
    pub beta: Coefficients<Option<f64>>,
    pub p: Coefficients<Option<f64>>,
    pub q: Coefficients<Option<f64>>,
    pub r: Coefficients<Option<f64>>,
}

impl StabilityDerivatives {
    pub fn axis(&self, a: Axis) -> &Coefficients<Option<f64>> {
        match a {
            Axis::Alpha => &self.alpha,
            Axis::Beta => &self.beta,
            Axis::P => &self.p,
            Axis::Q => &self.q,
            Axis::R => &self.r,
        }
    }

    pub fn axis_mut(&mut self, a: Axis) -> &mut Coefficients<Option<f64>> {
        match a {
            Axis::Alpha => &mut self.alpha,
            Axis::Beta => &mut self.beta,
            Axis::P => &mut self.p,
            Axis::Q => &mut self.q,
            Axis::R => &mut self.r,
        }
    }

    pub fn get(&self, a: Axis, c: Coef) -> Option<f64> {
        *self.axis(a).get(c)
    }

    pub fn overlay(&mut self, other: &Self) {
        for a in Axis::ALL {
            self.axis_mut(a).overlay(other.axis(a));
        }
    }

    pub fn fill(&mut self, other: &Self) {
        for a in Axis::ALL {
            self.axis_mut(a).fill(other.axis(a));
        }
    }
}

/// One run case's result. Non-converged records carry zeroed coefficients and
/// the failure reason; they must not feed any fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivativeRecord {
    pub case: RunCase,
    pub coefficients: Coefficients<f64>,
    pub derivatives: StabilityDerivatives,
    /// Neutral point X [ft]
    pub xnp: Option<f64>,
    /// Solver control derivatives keyed by label (`CLd01`, `Cmd01`, ...)
    pub control_derivatives: BTreeMap<String, f64>,
    pub converged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CaseFailure>,
}

impl DerivativeRecord {
    pub fn failed(case: RunCase, failure: CaseFailure) -> Self {
        Self {
            case,
            coefficients: Coefficients::default(),
            derivatives: StabilityDerivatives::default(),
            xnp: None,
            control_derivatives: BTreeMap::new(),
            converged: false,
            failure: Some(failure),
        }
    }

    pub fn coefficient(&self, c: Coef) -> f64 {
        *self.coefficients.get(c)
    }
}
