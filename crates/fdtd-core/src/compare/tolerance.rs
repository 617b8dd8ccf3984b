use serde::{Deserialize, Serialize};

/// Absolute/relative closeness bounds for one category of probe files.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Tolerance {
    #[serde(rename = "absTol")]
    pub abs_tol: f64,
    #[serde(rename = "relTol")]
    pub rel_tol: f64,
    #[serde(rename = "relativeFloor", default = "default_relative_floor")]
    pub relative_floor: f64,
}

pub const DEFAULT_RELATIVE_FLOOR: f64 = 1.0e-12;

fn default_relative_floor() -> f64 {
    DEFAULT_RELATIVE_FLOOR
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            abs_tol: 1.0e-8,
            rel_tol: 1.0e-5,
            relative_floor: DEFAULT_RELATIVE_FLOOR,
        }
    }
}

impl Tolerance {
    pub(super) fn validate(&self) -> Result<(), String> {
        for (label, value) in [
            ("absTol", self.abs_tol),
            ("relTol", self.rel_tol),
            ("relativeFloor", self.relative_floor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{label} must be a finite non-negative number"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueComparison {
    pub abs_diff: f64,
    pub rel_diff: f64,
    pub passes: bool,
}

/// Compares `actual` against `expected`, scaling the relative bound by the
/// expected magnitude (never below `relative_floor`).
pub fn compare_values(expected: f64, actual: f64, tolerance: Tolerance) -> ValueComparison {
    if !expected.is_finite() || !actual.is_finite() {
        let same = (expected.is_nan() && actual.is_nan()) || expected == actual;
        return ValueComparison {
            abs_diff: if same { 0.0 } else { f64::INFINITY },
            rel_diff: if same { 0.0 } else { f64::INFINITY },
            passes: same,
        };
    }

    let abs_diff = (actual - expected).abs();
    let rel_denominator = expected.abs().max(tolerance.relative_floor);
    let rel_diff = abs_diff / rel_denominator;
    let passes = abs_diff <= tolerance.abs_tol || abs_diff <= tolerance.rel_tol * rel_denominator;

    ValueComparison {
        abs_diff,
        rel_diff,
        passes,
    }
}

pub(super) fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value == f64::INFINITY {
        return "inf".to_string();
    }
    if value == f64::NEG_INFINITY {
        return "-inf".to_string();
    }
    format!("{value:.15E}")
}

#[cfg(test)]
mod tests {
    use super::{Tolerance, compare_values, format_value};

    #[test]
    fn relative_bound_scales_with_expected_magnitude() {
        let tolerance = Tolerance {
            abs_tol: 1.0e-9,
            rel_tol: 0.1,
            relative_floor: 1.0e-12,
        };
        let comparison = compare_values(2.0, 2.19, tolerance);
        assert!((comparison.abs_diff - 0.19).abs() < 1.0e-12);
        assert!((comparison.rel_diff - 0.095).abs() < 1.0e-12);
        assert!(comparison.passes);
        assert!(!compare_values(2.0, 2.3, tolerance).passes);
    }

    #[test]
    fn absolute_bound_covers_values_near_zero() {
        let tolerance = Tolerance::default();
        assert!(compare_values(0.0, 5.0e-9, tolerance).passes);
        assert!(!compare_values(0.0, 5.0e-7, tolerance).passes);
    }

    #[test]
    fn non_finite_values_only_match_themselves() {
        let tolerance = Tolerance::default();
        assert!(compare_values(f64::NAN, f64::NAN, tolerance).passes);
        assert!(compare_values(f64::INFINITY, f64::INFINITY, tolerance).passes);
        assert!(!compare_values(f64::INFINITY, 1.0, tolerance).passes);
        assert!(!compare_values(f64::NAN, 0.0, tolerance).passes);
    }

    #[test]
    fn negative_bounds_are_invalid() {
        let tolerance = Tolerance {
            abs_tol: -1.0,
            ..Tolerance::default()
        };
        assert!(tolerance.validate().is_err());
        assert!(Tolerance::default().validate().is_ok());
    }

    #[test]
    fn formats_special_values() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_value(12.5), "1.250000000000000E1");
    }
}
