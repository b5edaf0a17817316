//! In-memory geometry and mass records, plus the validation gate that must pass
//! before any solver work starts.
//!
//! All coordinates are in feet, mass in lbm, inertia in lbm·ft². The loader is
//! responsible for getting them there.

pub mod loader;

use nalgebra::{Matrix3, Vector3};

use crate::config::ValidationConfig;
use crate::context::RunContext;
use crate::error::{GeometryError, ValidationFailed};

pub type Point3 = Vector3<f64>;

/// Minimum point count for any named feature.
pub const MIN_PANEL_POINTS: usize = 3;

/// Ordered point cloud describing one named feature (LE, TE, winglet, control panel).
#[derive(Debug, Clone, PartialEq)]
pub struct PanelPointSet {
    pub label: String,
    pub points: Vec<Point3>,
}

impl PanelPointSet {
    pub fn new(label: impl Into<String>, points: Vec<Point3>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }

    pub fn from_xyz(label: impl Into<String>, xyz: &[[f64; 3]]) -> Self {
        Self::new(
            label,
            xyz.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    /// Axis-aligned bounds as (min, max).
    pub fn bounds(&self) -> Option<(Point3, Point3)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (lo.inf(p), hi.sup(p))
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MassProperties {
    pub mass: f64,
    pub cg: Point3,
    pub inertia: Matrix3<f64>,
}

impl MassProperties {
    pub fn new(mass: f64, cg: Point3, inertia: Matrix3<f64>) -> Self {
        Self { mass, cg, inertia }
    }

    /// Build the symmetric tensor from its six independent components.
    pub fn from_components(
        mass: f64,
        cg: Point3,
        [ixx, iyy, izz, ixy, ixz, iyz]: [f64; 6],
    ) -> Self {
        let inertia = Matrix3::new(ixx, ixy, ixz, ixy, iyy, iyz, ixz, iyz, izz);
        Self { mass, cg, inertia }
    }

    /// (Ixx, Iyy, Izz, Ixy, Ixz, Iyz)
    pub fn inertia_components(&self) -> [f64; 6] {
        let i = &self.inertia;
        [i[(0, 0)], i[(1, 1)], i[(2, 2)], i[(0, 1)], i[(0, 2)], i[(1, 2)]]
    }

    pub fn is_symmetric(&self) -> bool {
        let scale = self.inertia.amax().max(1.0);
        (self.inertia - self.inertia.transpose()).amax() <= 1e-9 * scale
    }

    pub fn eigenvalues(&self) -> [f64; 3] {
        let ev = self.inertia.symmetric_eigenvalues();
        let mut out = [ev[0], ev[1], ev[2]];
        out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        out
    }

    /// Mass > 0, tensor symmetric and positive definite.
    pub fn check(&self) -> Vec<GeometryError> {
        let mut issues = Vec::new();
        if !(self.mass > 0.0) {
            issues.push(GeometryError::NonPositiveMass(self.mass));
        }
        if !self.is_symmetric() {
            issues.push(GeometryError::AsymmetricInertia);
        } else {
            let ev = self.eigenvalues();
            if ev.iter().any(|&v| !(v > 0.0)) {
                issues.push(GeometryError::InertiaNotPositiveDefinite(ev));
            }
        }
        issues
    }
}

/// Complete geometry of one aircraft as handed over by the loader.
#[derive(Debug, Clone)]
pub struct GeometryData {
    pub mass: MassProperties,
    pub leading_edge: PanelPointSet,
    pub trailing_edge: PanelPointSet,
    pub winglet: Option<PanelPointSet>,
    pub control_panel: Option<PanelPointSet>,
}

impl GeometryData {
    pub fn panels(&self) -> Vec<&PanelPointSet> {
        let mut out = vec![&self.leading_edge, &self.trailing_edge];
        out.extend(self.winglet.iter());
        out.extend(self.control_panel.iter());
        out
    }

    /// Local chord at each LE/TE pair, in input order.
    pub fn local_chords(&self) -> Vec<f64> {
        crate::reference::local_chords(&self.leading_edge.points, &self.trailing_edge.points)
    }

    /// Run every check. Errors are fatal and returned together; warnings are
    /// advisory and come back in the report.
    pub fn validate(
        &self,
        cfg: &ValidationConfig,
        ctx: &RunContext,
    ) -> Result<ValidationReport, ValidationFailed> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for panel in self.panels() {
            if panel.len() < cfg.min_panel_points {
                errors.push(GeometryError::TooFewPoints {
                    label: panel.label.clone(),
                    found: panel.len(),
                    required: cfg.min_panel_points,
                });
            }
            ctx.debug(format!("{}: {} points", panel.label, panel.len()));
        }

        let (le, te) = (self.leading_edge.len(), self.trailing_edge.len());
        if le != te {
            errors.push(GeometryError::MismatchedEdges { le, te });
        }

        errors.extend(self.mass.check());
        ctx.debug(format!("mass: {:.3} lbm", self.mass.mass));
        ctx.debug(format!(
            "CG: [{:.3}, {:.3}, {:.3}] ft",
            self.mass.cg.x, self.mass.cg.y, self.mass.cg.z
        ));

        // Planform checks only make sense on matched edges
        if le == te && le > 0 {
            let chords = self.local_chords();
            for (index, c) in chords.iter().enumerate() {
                if !(*c > 0.0) {
                    errors.push(GeometryError::DegenerateChord { index });
                }
            }
            let ys = self.leading_edge.ys();
            let span = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
                - ys.iter().cloned().fold(f64::INFINITY, f64::min);
            if !(span > 0.0) {
                errors.push(GeometryError::InvalidSpan(span));
            }

            let mean_chord = chords.iter().sum::<f64>() / chords.len() as f64;
            if mean_chord > 0.0 && span > 0.0 {
                let aspect_ratio = span / mean_chord;
                if aspect_ratio > cfg.max_aspect_ratio {
                    warnings.push(format!(
                        "aspect ratio ({:.1}) exceeds recommended maximum ({})",
                        aspect_ratio, cfg.max_aspect_ratio
                    ));
                } else if aspect_ratio < cfg.min_aspect_ratio {
                    warnings.push(format!(
                        "aspect ratio ({:.1}) below recommended minimum ({})",
                        aspect_ratio, cfg.min_aspect_ratio
                    ));
                }
                ctx.debug(format!("aspect ratio: {:.2}", aspect_ratio));
            }
        }

        if let Some(winglet) = &self.winglet {
            if let Some(dihedral) = winglet_dihedral_deg(winglet) {
                if dihedral.abs() > 80.0 {
                    warnings.push(format!("winglet dihedral angle ({:.1} deg) is very high", dihedral));
                }
                ctx.debug(format!("winglet dihedral: {:.1} deg", dihedral));
            }
        }

        for w in &warnings {
            ctx.warn(w);
        }

        if errors.is_empty() {
            Ok(ValidationReport { warnings })
        } else {
            Err(ValidationFailed(errors))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

fn winglet_dihedral_deg(winglet: &PanelPointSet) -> Option<f64> {
    let (lo, hi) = winglet.bounds()?;
    let dy = hi.y - lo.y;
    let dz = hi.z - lo.z;
    (dy > 0.0).then(|| (dz / dy).atan().to_degrees())
}
