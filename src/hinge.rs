//! Control-surface hinge placement.
//!
//! The control panel outline and the wing sections are authored independently
//! and do not share spanwise stations. Each wing section inside the control's
//! span gets its own hinge fraction: the control LE X is interpolated at the
//! section's Y and expressed as a fraction of that section's chord.
//!
//! Sections are classified:
//! - `Inside`: fraction within [0, 1], control emitted.
//! - `Clamped`: section at or just beyond an end of the control span. The
//!   fraction is clamped to [0, 1] and the control is emitted so the surface
//!   has a segment to live on (degenerate tip).
//! - `Flagged`: interior section whose fraction falls outside the chord. The
//!   clamped value is reported but no control is emitted.

use serde::Serialize;

use crate::deck::WingSection;
use crate::geometry::{PanelPointSet, Point3};

/// Spanwise tolerance when matching section stations to control ends [ft].
pub const Y_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct ControlOutline {
    /// LE chain sorted root to tip
    pub leading_edge: Vec<Point3>,
    /// TE chain sorted root to tip
    pub trailing_edge: Vec<Point3>,
}

impl ControlOutline {
    /// Split a closed (clockwise) panel outline into LE/TE chains.
    ///
    /// A 4-point outline is `[root LE, tip LE, tip TE, root TE]`. Longer outlines
    /// are split by X: if the first half lies wholly forward of the second it is
    /// the LE, otherwise the chain runs between the min-X and max-X points.
    pub fn from_points(panel: &PanelPointSet) -> Option<Self> {
        let mut pts = panel.points.clone();
        if pts.len() > 3 {
            if let (Some(first), Some(last)) = (pts.first(), pts.last()) {
                if (first - last).norm() < 1e-9 {
                    pts.pop();
                }
            }
        }
        if pts.len() < 3 {
            return None;
        }

        let (le, te) = if pts.len() == 4 {
            (vec![pts[0], pts[1]], vec![pts[3], pts[2]])
        } else {
            split_by_x(&pts)
        };
        if le.is_empty() || te.is_empty() {
            return None;
        }

        Some(Self {
            leading_edge: sorted_by_y(le),
            trailing_edge: sorted_by_y(te),
        })
    }

    pub fn root_y(&self) -> f64 {
        self.leading_edge[0].y
    }

    pub fn tip_y(&self) -> f64 {
        self.leading_edge[self.leading_edge.len() - 1].y
    }

    /// Control LE X at spanwise station `y`, linear between chain points and
    /// held constant beyond the ends.
    pub fn le_x_at(&self, y: f64) -> f64 {
        interp_x(&self.leading_edge, y)
    }
}

fn sorted_by_y(mut pts: Vec<Point3>) -> Vec<Point3> {
    pts.sort_by(|a, b| a.y.total_cmp(&b.y));
    pts
}

fn split_by_x(pts: &[Point3]) -> (Vec<Point3>, Vec<Point3>) {
    let n = pts.len();
    let mid = n / 2;
    let fwd_max = pts[..mid].iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let aft_min = pts[mid..].iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    if fwd_max < aft_min {
        return (pts[..mid].to_vec(), pts[mid..].iter().rev().cloned().collect());
    }

    let argmin = (0..n).min_by(|&a, &b| pts[a].x.total_cmp(&pts[b].x)).unwrap_or(0);
    let argmax = (0..n).max_by(|&a, &b| pts[a].x.total_cmp(&pts[b].x)).unwrap_or(0);
    if argmin < argmax {
        let le = pts[argmin..=argmax].to_vec();
        let te = pts[argmax..].iter().chain(&pts[..=argmin]).cloned().collect();
        (le, te)
    } else {
        let le = pts[argmin..].iter().chain(&pts[..=argmax]).cloned().collect();
        let te = pts[argmax..=argmin].to_vec();
        (le, te)
    }
}

fn interp_x(chain: &[Point3], y: f64) -> f64 {
    let first = chain[0];
    let last = chain[chain.len() - 1];
    if y <= first.y {
        return first.x;
    }
    if y >= last.y {
        return last.x;
    }
    for w in chain.windows(2) {
        let (a, b) = (w[0], w[1]);
        if y <= b.y {
            let dy = b.y - a.y;
            if dy.abs() < Y_TOLERANCE {
                return a.x;
            }
            let t = ((y - a.y) / dy).clamp(0.0, 1.0);
            return a.x + t * (b.x - a.x);
        }
    }
    last.x
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HingeStatus {
    Inside,
    Clamped,
    Flagged,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectionHinge {
    /// Index into the Y-sorted section list
    pub section: usize,
    pub y: f64,
    pub raw_fraction: f64,
    /// Always within [0, 1]
    pub hinge_fraction: f64,
    pub status: HingeStatus,
}

impl SectionHinge {
    pub fn emits_control(&self) -> bool {
        self.status != HingeStatus::Flagged
    }
}

/// Hinge fraction of a section with LE at `le_x` and local chord `chord`, for a
/// control LE at `control_x`.
pub fn hinge_fraction(control_x: f64, le_x: f64, chord: f64) -> f64 {
    (control_x - le_x) / chord
}

/// Assign hinges to every section touched by the control. `sections` must be
/// sorted by Y. Sections outside the control span (other than the bounding
/// ones) are not listed.
pub fn assign(outline: &ControlOutline, sections: &[WingSection]) -> Vec<SectionHinge> {
    let (root_y, tip_y) = (outline.root_y(), outline.tip_y());
    let within = |y: f64| y >= root_y - Y_TOLERANCE && y <= tip_y + Y_TOLERANCE;
    let at_end = |y: f64| (y - root_y).abs() <= Y_TOLERANCE || (y - tip_y).abs() <= Y_TOLERANCE;

    let inside: Vec<usize> = (0..sections.len()).filter(|&i| within(sections[i].le.y)).collect();

    let mut bounding = Vec::new();
    if !inside.iter().any(|&i| (sections[i].le.y - root_y).abs() <= Y_TOLERANCE) {
        if let Some(i) = (0..sections.len()).rev().find(|&i| sections[i].le.y < root_y) {
            bounding.push(i);
        }
    }
    if !inside.iter().any(|&i| (sections[i].le.y - tip_y).abs() <= Y_TOLERANCE) {
        if let Some(i) = (0..sections.len()).find(|&i| sections[i].le.y > tip_y) {
            bounding.push(i);
        }
    }

    let mut out: Vec<SectionHinge> = inside
        .iter()
        .chain(bounding.iter())
        .map(|&i| {
            let s = &sections[i];
            let y = s.le.y;
            let raw = hinge_fraction(outline.le_x_at(y), s.le.x, s.chord);
            let status = if !within(y) || at_end(y) {
                if (0.0..=1.0).contains(&raw) {
                    HingeStatus::Inside
                } else {
                    HingeStatus::Clamped
                }
            } else if (0.0..=1.0).contains(&raw) {
                HingeStatus::Inside
            } else {
                HingeStatus::Flagged
            };
            SectionHinge {
                section: i,
                y,
                raw_fraction: raw,
                hinge_fraction: if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 },
                status,
            }
        })
        .collect();
    out.sort_by_key(|h| h.section);
    out
}
