//! Local meters-per-degree scale at a given latitude.

use serde::Serialize;

/// Below this many meters per degree the grid denominators are treated as zero.
pub const MIN_METERS_PER_DEGREE: f64 = 1.0;

/// Ground length of one degree of latitude and of longitude around a latitude.
///
/// Only a reasonable approximation over a small latitude span, since a single
/// scale is applied to the whole extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocalScale {
    pub meters_per_degree_latitude: f64,
    pub meters_per_degree_longitude: f64,
}

impl LocalScale {
    /// Scale at the vertical midpoint of `y_min..=y_max` (degrees).
    pub fn at_mid_latitude(y_min: f64, y_max: f64) -> Self {
        Self::at_latitude((y_max + y_min) / 2.0)
    }

    /// Truncated series expansion of the WGS84 meridian and parallel arc
    /// lengths per degree.
    pub fn at_latitude(latitude_degrees: f64) -> Self {
        let phi = latitude_degrees.to_radians();

        let meters_per_degree_latitude = 111_132.92 - 559.82 * (2.0 * phi).cos()
            + 1.175 * (4.0 * phi).cos()
            - 0.0023 * (6.0 * phi).cos();
        let meters_per_degree_longitude =
            111_412.84 * phi.cos() - 93.5 * (3.0 * phi).cos() + 0.118 * (5.0 * phi).cos();

        Self {
            meters_per_degree_latitude,
            meters_per_degree_longitude,
        }
    }

    /// True when both components are finite and large enough to divide by.
    pub fn is_usable(&self) -> bool {
        [
            self.meters_per_degree_latitude,
            self.meters_per_degree_longitude,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= MIN_METERS_PER_DEGREE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equator_matches_reference_constants() {
        let scale = LocalScale::at_mid_latitude(-0.5, 0.5);
        assert!((scale.meters_per_degree_latitude - 110_574.0).abs() < 1.0);
        assert!((scale.meters_per_degree_longitude - 111_320.0).abs() < 1.0);
    }

    #[test]
    fn test_montreal() {
        let scale = LocalScale::at_mid_latitude(45.5, 45.6);
        assert!((scale.meters_per_degree_latitude - 111_142.49).abs() < 0.01);
        assert!((scale.meters_per_degree_longitude - 78_088.83).abs() < 0.01);
    }

    #[test]
    fn test_depends_only_on_midpoint() {
        let a = LocalScale::at_mid_latitude(40.0, 50.0);
        let b = LocalScale::at_mid_latitude(44.0, 46.0);
        assert!((a.meters_per_degree_latitude - b.meters_per_degree_latitude).abs() < 1e-9);
        assert!((a.meters_per_degree_longitude - b.meters_per_degree_longitude).abs() < 1e-9);
    }

    #[test]
    fn test_symmetric_about_equator() {
        let north = LocalScale::at_latitude(30.0);
        let south = LocalScale::at_latitude(-30.0);
        assert!((north.meters_per_degree_longitude - south.meters_per_degree_longitude).abs() < 1e-9);
    }

    #[test]
    fn test_pole_is_not_usable() {
        let scale = LocalScale::at_latitude(90.0);
        assert!(scale.meters_per_degree_longitude.abs() < MIN_METERS_PER_DEGREE);
        assert!(!scale.is_usable());
        assert!(LocalScale::at_latitude(60.0).is_usable());
    }
}
