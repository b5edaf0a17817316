//! Reference geometry (area, span, mean chord, moment reference) derived from
//! the leading/trailing edge point clouds.
//!
//! Half-span detection is a heuristic: a model whose LE points all sit at
//! `Y >= -HALF_SPAN_TOLERANCE` is treated as one side of a symmetric aircraft
//! and both area and span are doubled. A full-span model that happens to lie
//! entirely at non-negative Y would be doubled too.

use serde::Serialize;

use crate::config::ReferenceConfig;
use crate::geometry::{GeometryData, Point3};

pub const HALF_SPAN_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceGeometry {
    pub area: f64,
    pub span: f64,
    pub chord: f64,
    /// Moment reference point; the CG unless overridden.
    pub moment_reference: [f64; 3],
    pub half_span_model: bool,
}

impl ReferenceGeometry {
    pub fn aspect_ratio(&self) -> f64 {
        self.span * self.span / self.area
    }
}

/// 3D distance between each LE/TE pair.
pub fn local_chords(le: &[Point3], te: &[Point3]) -> Vec<f64> {
    le.iter().zip(te).map(|(a, b)| (b - a).norm()).collect()
}

pub fn is_half_span(le: &[Point3]) -> bool {
    le.iter().all(|p| p.y >= -HALF_SPAN_TOLERANCE)
}

/// Trapezoidal integral of chord(Y) over the sections sorted by Y.
pub fn single_side_area(le: &[Point3], te: &[Point3]) -> f64 {
    let mut stations: Vec<(f64, f64)> = le
        .iter()
        .zip(local_chords(le, te))
        .map(|(p, c)| (p.y, c))
        .collect();
    stations.sort_by(|a, b| a.0.total_cmp(&b.0));

    stations
        .windows(2)
        .map(|w| 0.5 * (w[0].1 + w[1].1) * (w[1].0 - w[0].0))
        .sum::<f64>()
        .abs()
}

pub fn planform_area(le: &[Point3], te: &[Point3]) -> f64 {
    let area = single_side_area(le, te);
    if is_half_span(le) {
        2.0 * area
    } else {
        area
    }
}

pub fn span(le: &[Point3]) -> f64 {
    if le.is_empty() {
        return 0.0;
    }
    let (lo, hi) = le
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    let extent = hi - lo;
    if is_half_span(le) {
        2.0 * extent
    } else {
        extent
    }
}

/// Arithmetic mean of the local chords. This is deliberately not the
/// chord²-weighted MAC integral; downstream reference values depend on it.
pub fn mean_chord(le: &[Point3], te: &[Point3]) -> f64 {
    let chords = local_chords(le, te);
    if chords.is_empty() {
        return 0.0;
    }
    chords.iter().sum::<f64>() / chords.len() as f64
}

/// Compute from geometry, then apply any configured overrides.
pub fn compute(geom: &GeometryData, overrides: &ReferenceConfig) -> ReferenceGeometry {
    let le = &geom.leading_edge.points;
    let te = &geom.trailing_edge.points;
    let cg = geom.mass.cg;

    ReferenceGeometry {
        area: overrides.area.unwrap_or_else(|| planform_area(le, te)),
        span: overrides.span.unwrap_or_else(|| span(le)),
        chord: overrides.chord.unwrap_or_else(|| mean_chord(le, te)),
        moment_reference: overrides.moment_reference.unwrap_or([cg.x, cg.y, cg.z]),
        half_span_model: is_half_span(le),
    }
}
