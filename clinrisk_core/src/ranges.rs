//! Interval scoring tables and guarded arithmetic shared by the calculators.
//!
//! Scoring tables are authored as ordered lists of closed intervals. The first
//! interval containing the value wins and a value matching nothing scores 0.
//! Tables are checked for overlapping rows when the registry is built, so an
//! ambiguous table is a startup error instead of a silent ordering dependency.

use crate::{Error, Result};

/// A closed interval `[min, max]` worth a fixed number of points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Band {
    pub min: f64,
    pub max: f64,
    pub points: i32,
}

impl Band {
    pub const fn new(min: f64, max: f64, points: i32) -> Self {
        Self { min, max, points }
    }

    /// `[min, +inf)`
    pub const fn at_least(min: f64, points: i32) -> Self {
        Self::new(min, f64::INFINITY, points)
    }

    /// `(-inf, max]`
    pub const fn at_most(max: f64, points: i32) -> Self {
        Self::new(f64::NEG_INFINITY, max, points)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn overlaps(&self, other: &Band) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Ordered first-match-wins scoring table.
///
/// `resolution` is the number of decimals the bounds are authored at. Inputs
/// are rounded half away from zero to that resolution before lookup, so a
/// temperature of 40.95 is read as 41.0 rather than falling between the
/// 39.0–40.9 and ≥41.0 rows.
///
/// A value that rounds up onto a bound is scored in the band starting at that
/// bound. A strict clinical cutoff such as "< 300" therefore holds only to the
/// table's resolution: at resolution 0, 299.6 reads as 300. Tables fed by
/// continuous ratios are authored at one decimal to keep such values in the
/// worse band.
#[derive(Clone, Copy, Debug)]
pub struct RangeTable {
    name: &'static str,
    resolution: u32,
    bands: &'static [Band],
}

impl RangeTable {
    pub const fn new(name: &'static str, resolution: u32, bands: &'static [Band]) -> Self {
        Self {
            name,
            resolution,
            bands,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bands(&self) -> &'static [Band] {
        self.bands
    }

    /// Points for `value` after rounding to the table resolution; 0 when no
    /// band matches.
    pub fn score(&self, value: f64) -> i32 {
        let value = round_to(value, self.resolution);
        self.bands
            .iter()
            .find(|band| band.contains(value))
            .map_or(0, |band| band.points)
    }

    /// Check that the table is non-empty, each band is well formed and no two
    /// bands overlap.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidTable {
            table: self.name.to_string(),
            reason,
        };

        if self.bands.is_empty() {
            return Err(invalid("table has no bands".into()));
        }

        for (i, band) in self.bands.iter().enumerate() {
            if band.min.is_nan() || band.max.is_nan() || band.min > band.max {
                return Err(invalid(format!(
                    "band {} has invalid bounds [{}, {}]",
                    i, band.min, band.max
                )));
            }
        }

        for (i, a) in self.bands.iter().enumerate() {
            for (j, b) in self.bands.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    return Err(invalid(format!(
                        "band {} [{}, {}] overlaps band {} [{}, {}]",
                        i, a.min, a.max, j, b.min, b.max
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Round half away from zero to `decimals` places.
///
/// Every rounded output field in the crate goes through this function so
/// fixtures are reproducible.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Division that refuses non-finite operands and denominators `<= 0`.
pub fn safe_div(numerator: f64, denominator: f64) -> Option<f64> {
    if !numerator.is_finite() || !denominator.is_finite() || denominator <= 0.0 {
        return None;
    }
    let quotient = numerator / denominator;
    quotient.is_finite().then_some(quotient)
}

#[cfg(test)]
mod tests {
    use super::*;

    static HEART_RATE: RangeTable = RangeTable::new(
        "heart_rate",
        0,
        &[
            Band::at_least(180.0, 4),
            Band::new(140.0, 179.0, 3),
            Band::new(110.0, 139.0, 2),
            Band::new(70.0, 109.0, 0),
            Band::new(55.0, 69.0, 2),
        ],
    );

    #[test]
    fn test_first_matching_band_wins() {
        assert_eq!(HEART_RATE.score(185.0), 4);
        assert_eq!(HEART_RATE.score(180.0), 4);
        assert_eq!(HEART_RATE.score(179.0), 3);
        assert_eq!(HEART_RATE.score(80.0), 0);
        assert_eq!(HEART_RATE.score(55.0), 2);
    }

    #[test]
    fn test_no_match_scores_zero() {
        assert_eq!(HEART_RATE.score(20.0), 0);
    }

    #[test]
    fn test_values_between_bounds_round_into_a_band() {
        // 179.6 rounds to 180 at resolution 0
        assert_eq!(HEART_RATE.score(179.6), 4);
        assert_eq!(HEART_RATE.score(179.4), 3);
    }

    #[test]
    fn test_rounding_onto_a_bound_takes_that_band() {
        static PF: RangeTable = RangeTable::new(
            "pf",
            1,
            &[Band::at_least(300.0, 1), Band::new(200.0, 299.9, 2)],
        );
        assert_eq!(PF.score(299.6), 2);
        assert_eq!(PF.score(299.94), 2);
        assert_eq!(PF.score(299.96), 1);
        // resolution 0 reads 109.5 as 110
        assert_eq!(HEART_RATE.score(109.5), 2);
        assert_eq!(HEART_RATE.score(109.4), 0);
    }

    #[test]
    fn test_validate_accepts_disjoint_table() {
        assert!(HEART_RATE.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlap() {
        static OVERLAPPING: RangeTable = RangeTable::new(
            "overlapping",
            1,
            &[Band::new(1.0, 2.0, 1), Band::new(2.0, 3.0, 2)],
        );
        let err = OVERLAPPING.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidTable { ref table, .. } if table == "overlapping"));
    }

    #[test]
    fn test_validate_rejects_inverted_band() {
        static INVERTED: RangeTable = RangeTable::new("inverted", 0, &[Band::new(5.0, 1.0, 1)]);
        assert!(INVERTED.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_table() {
        static EMPTY: RangeTable = RangeTable::new("empty", 0, &[]);
        assert!(EMPTY.validate().is_err());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.345, 1), 2.3);
        assert_eq!(round_to(2.35, 1), 2.4);
        assert_eq!(round_to(-1.5, 0), -2.0);
        assert_eq!(round_to(70.0, 2), 70.0);
        assert!(round_to(f64::NAN, 2).is_nan());
    }

    #[test]
    fn test_safe_div_guards_denominator() {
        assert_eq!(safe_div(120.0, 60.0), Some(2.0));
        assert_eq!(safe_div(1.0, 0.0), None);
        assert_eq!(safe_div(1.0, -2.0), None);
        assert_eq!(safe_div(f64::NAN, 2.0), None);
        assert_eq!(safe_div(1.0, f64::INFINITY), None);
    }
}
