//! Unit scaling applied at the geometry ingestion boundary.
//!
//! nTop exports are in inches and lbm·in²; everything downstream of the loader
//! works in feet, lbm and lbm·ft².

use nalgebra::{Matrix3, Vector3};

pub const INCHES_TO_FEET: f64 = 1.0 / 12.0;
pub const IN2_TO_FT2: f64 = 1.0 / 144.0;

pub fn inches_to_feet(v: f64) -> f64 {
    v * INCHES_TO_FEET
}

pub fn feet_to_inches(v: f64) -> f64 {
    v / INCHES_TO_FEET
}

pub fn in2_to_ft2(v: f64) -> f64 {
    v * IN2_TO_FT2
}

pub fn ft2_to_in2(v: f64) -> f64 {
    v / IN2_TO_FT2
}

/// Scale a point given in inches to feet.
pub fn point_to_feet(p: Vector3<f64>) -> Vector3<f64> {
    p * INCHES_TO_FEET
}

/// lbm·in² → lbm·ft², component-wise.
pub fn inertia_to_ft2(inertia: Matrix3<f64>) -> Matrix3<f64> {
    inertia * IN2_TO_FT2
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_length_round_trip() {
        assert_relative_eq!(inches_to_feet(18.0), 1.5);
        assert_relative_eq!(feet_to_inches(inches_to_feet(74.634)), 74.634, epsilon = 1e-12);
    }

    #[test]
    fn test_area_and_inertia_scale() {
        assert_relative_eq!(in2_to_ft2(288.0), 2.0);
        assert_relative_eq!(ft2_to_in2(1.0), 144.0);
        let i = inertia_to_ft2(Matrix3::identity() * 144.0);
        assert_relative_eq!(i[(0, 0)], 1.0);
        assert_relative_eq!(i[(0, 1)], 0.0);
    }
}
