//! Pulmonary embolism decision tools: Wells score and the PERC rule-out.

use crate::inputs::{Inputs, Requirements, Scored, Unscored};
use crate::registry::{CalculatorDefinition, CalculatorId, InputSpec, Outcome};
use serde::Serialize;

// ============================================================================
// Wells
// ============================================================================

/// Weighted Wells criteria supplied as flags.
const WELLS_CRITERIA: &[(&str, f64)] = &[
    ("clinical_signs_dvt", 3.0),
    ("pe_most_likely", 3.0),
    ("immobilization_or_recent_surgery", 1.5),
    ("previous_vte", 1.5),
    ("hemoptysis", 1.0),
    ("malignancy", 1.0),
];

const WELLS_TACHYCARDIA_BPM: f64 = 100.0;
const WELLS_TACHYCARDIA_POINTS: f64 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WellsThreeTier {
    Low,
    Moderate,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WellsTwoTier {
    PeUnlikely,
    PeLikely,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WellsScore {
    pub total: f64,
    pub three_tier: WellsThreeTier,
    pub two_tier: WellsTwoTier,
    pub criteria: Vec<&'static str>,
}

pub fn wells_three_tier(total: f64) -> WellsThreeTier {
    if total < 2.0 {
        WellsThreeTier::Low
    } else if total <= 6.0 {
        WellsThreeTier::Moderate
    } else {
        WellsThreeTier::High
    }
}

pub fn wells_two_tier(total: f64) -> WellsTwoTier {
    if total <= 4.0 {
        WellsTwoTier::PeUnlikely
    } else {
        WellsTwoTier::PeLikely
    }
}

/// Heart rate is required; absent flags count as not present.
pub fn score_wells(inputs: &Inputs) -> Scored<WellsScore> {
    let mut req = Requirements::new(inputs);
    let hr = req.number("hr_bpm");
    req.finish()?;

    if hr < 0.0 {
        return Err(Unscored::undefined("heart rate cannot be negative"));
    }

    let mut criteria = Vec::new();
    let mut total = 0.0;
    for (key, points) in WELLS_CRITERIA {
        if inputs.flag_or_false(key) {
            criteria.push(*key);
            total += points;
        }
    }
    if hr > WELLS_TACHYCARDIA_BPM {
        criteria.push("heart_rate_over_100");
        total += WELLS_TACHYCARDIA_POINTS;
    }

    Ok(WellsScore {
        total,
        three_tier: wells_three_tier(total),
        two_tier: wells_two_tier(total),
        criteria,
    })
}

// ============================================================================
// PERC
// ============================================================================

const PERC_FLAGS: &[&str] = &[
    "unilateral_leg_swelling",
    "hemoptysis",
    "recent_surgery_or_trauma",
    "previous_vte",
    "hormone_use",
];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PercResult {
    /// True when no criterion is met and PE can be ruled out clinically
    pub perc_negative: bool,
    pub criteria_met: Vec<&'static str>,
    pub criteria_count: usize,
}

/// Age, heart rate and oxygen saturation are required; history flags are optional.
pub fn score_perc(inputs: &Inputs) -> Scored<PercResult> {
    let mut req = Requirements::new(inputs);
    let age = req.number("age_years");
    let hr = req.number("hr_bpm");
    let sao2 = req.number("sao2_pct");
    req.finish()?;

    let mut criteria_met = Vec::new();
    if age >= 50.0 {
        criteria_met.push("age_50_or_over");
    }
    if hr >= 100.0 {
        criteria_met.push("heart_rate_100_or_over");
    }
    if sao2 < 95.0 {
        criteria_met.push("sao2_under_95");
    }
    criteria_met.extend(PERC_FLAGS.iter().copied().filter(|key| inputs.flag_or_false(key)));

    Ok(PercResult {
        perc_negative: criteria_met.is_empty(),
        criteria_count: criteria_met.len(),
        criteria_met,
    })
}

fn run_wells(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_wells(inputs))
}

fn run_perc(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_perc(inputs))
}

pub fn definitions() -> Vec<CalculatorDefinition> {
    let mut wells_inputs = vec![InputSpec::required("hr_bpm", "bpm")];
    wells_inputs.extend(
        WELLS_CRITERIA
            .iter()
            .map(|(key, _)| InputSpec::optional_plain(*key)),
    );

    let mut perc_inputs = vec![
        InputSpec::required("age_years", "years"),
        InputSpec::required("hr_bpm", "bpm"),
        InputSpec::required("sao2_pct", "%"),
    ];
    perc_inputs.extend(PERC_FLAGS.iter().map(|key| InputSpec::optional_plain(*key)));

    vec![
        CalculatorDefinition::builtin(CalculatorId::WellsPe, run_wells)
            .inputs(wells_inputs)
            .headline("total", None, 1),
        CalculatorDefinition::builtin(CalculatorId::Perc, run_perc)
            .inputs(perc_inputs)
            .headline("criteria_count", None, 0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wells_without_findings_is_low() {
        let result = score_wells(&Inputs::new().with("hr_bpm", 80.0)).unwrap();
        assert_eq!(result.total, 0.0);
        assert_eq!(result.three_tier, WellsThreeTier::Low);
        assert_eq!(result.two_tier, WellsTwoTier::PeUnlikely);
    }

    #[test]
    fn test_wells_weighted_sum() {
        let inputs = Inputs::new()
            .with("hr_bpm", 110.0)
            .with("clinical_signs_dvt", true)
            .with("previous_vte", true);
        let result = score_wells(&inputs).unwrap();
        assert_eq!(result.total, 6.0);
        assert_eq!(result.three_tier, WellsThreeTier::Moderate);
        assert_eq!(result.two_tier, WellsTwoTier::PeLikely);
        assert_eq!(
            result.criteria,
            vec!["clinical_signs_dvt", "previous_vte", "heart_rate_over_100"]
        );
    }

    #[test]
    fn test_wells_tier_boundaries() {
        assert_eq!(wells_three_tier(1.5), WellsThreeTier::Low);
        assert_eq!(wells_three_tier(2.0), WellsThreeTier::Moderate);
        assert_eq!(wells_three_tier(6.0), WellsThreeTier::Moderate);
        assert_eq!(wells_three_tier(6.5), WellsThreeTier::High);
        assert_eq!(wells_two_tier(4.0), WellsTwoTier::PeUnlikely);
        assert_eq!(wells_two_tier(4.5), WellsTwoTier::PeLikely);
    }

    #[test]
    fn test_wells_heart_rate_of_100_scores_nothing() {
        let result = score_wells(&Inputs::new().with("hr_bpm", 100.0)).unwrap();
        assert_eq!(result.total, 0.0);
    }

    #[test]
    fn test_wells_needs_heart_rate() {
        let err = score_wells(&Inputs::new().with("hemoptysis", true)).unwrap_err();
        assert_eq!(err.missing(), &["hr_bpm".to_string()]);
    }

    #[test]
    fn test_perc_negative() {
        let inputs = Inputs::new()
            .with("age_years", 35.0)
            .with("hr_bpm", 80.0)
            .with("sao2_pct", 98.0);
        let result = score_perc(&inputs).unwrap();
        assert!(result.perc_negative);
        assert_eq!(result.criteria_count, 0);
    }

    #[test]
    fn test_perc_positive_lists_criteria() {
        let inputs = Inputs::new()
            .with("age_years", 55.0)
            .with("hr_bpm", 80.0)
            .with("sao2_pct", 94.0)
            .with("hormone_use", true);
        let result = score_perc(&inputs).unwrap();
        assert!(!result.perc_negative);
        assert_eq!(
            result.criteria_met,
            vec!["age_50_or_over", "sao2_under_95", "hormone_use"]
        );
        assert_eq!(result.criteria_count, 3);
    }

    #[test]
    fn test_perc_needs_all_vitals() {
        let err = score_perc(&Inputs::new().with("hr_bpm", 80.0)).unwrap_err();
        assert_eq!(
            err.missing(),
            &["age_years".to_string(), "sao2_pct".to_string()]
        );
    }
}
