//! Caprini venous thromboembolism risk assessment.

use crate::inputs::{Inputs, Requirements, Scored, Unscored};
use crate::ranges::{Band, RangeTable};
use crate::registry::{CalculatorDefinition, CalculatorId, InputSpec, Outcome};
use serde::Serialize;

pub static AGE: RangeTable = RangeTable::new(
    "caprini_age",
    0,
    &[
        Band::at_least(75.0, 3),
        Band::new(61.0, 74.0, 2),
        Band::new(41.0, 60.0, 1),
        Band::at_most(40.0, 0),
    ],
);

static TABLES: &[&RangeTable] = &[&AGE];

/// Boolean risk factors and the points each contributes when present.
pub const FACTORS: &[(&str, i32)] = &[
    // 1 point
    ("minor_surgery", 1),
    ("bmi_over_25", 1),
    ("swollen_legs", 1),
    ("varicose_veins", 1),
    ("pregnant_or_postpartum", 1),
    ("oral_contraceptives_or_hrt", 1),
    ("sepsis_last_month", 1),
    ("serious_lung_disease", 1),
    ("abnormal_pulmonary_function", 1),
    ("acute_myocardial_infarction", 1),
    ("congestive_heart_failure", 1),
    ("inflammatory_bowel_disease", 1),
    ("medical_patient_at_bed_rest", 1),
    // 2 points
    ("major_surgery", 2),
    ("laparoscopic_surgery", 2),
    ("arthroscopic_surgery", 2),
    ("malignancy", 2),
    ("confined_to_bed", 2),
    ("immobilizing_cast", 2),
    ("central_venous_access", 2),
    // 3 points
    ("history_of_vte", 3),
    ("family_history_of_vte", 3),
    ("factor_v_leiden", 3),
    ("prothrombin_20210a", 3),
    ("lupus_anticoagulant", 3),
    ("anticardiolipin_antibodies", 3),
    ("elevated_homocysteine", 3),
    ("heparin_induced_thrombocytopenia", 3),
    ("other_thrombophilia", 3),
    // 5 points
    ("stroke_last_month", 5),
    ("elective_arthroplasty", 5),
    ("hip_pelvis_leg_fracture", 5),
    ("acute_spinal_cord_injury", 5),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapriniBand {
    VeryLow,
    Low,
    Moderate,
    High,
}

impl CapriniBand {
    pub fn from_total(total: i32) -> Self {
        match total {
            i32::MIN..=0 => CapriniBand::VeryLow,
            1..=2 => CapriniBand::Low,
            3..=4 => CapriniBand::Moderate,
            _ => CapriniBand::High,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CapriniScore {
    pub total: i32,
    pub age_points: i32,
    pub band: CapriniBand,
    /// Factors that were present, in declaration order
    pub factors: Vec<&'static str>,
}

/// Score Caprini risk. Age is required; absent factors count as not present.
pub fn score(inputs: &Inputs) -> Scored<CapriniScore> {
    let mut req = Requirements::new(inputs);
    let age = req.number("age_years");
    req.finish()?;

    if age < 0.0 {
        return Err(Unscored::undefined("age cannot be negative"));
    }

    let age_points = AGE.score(age);
    let factors: Vec<&'static str> = FACTORS
        .iter()
        .filter(|(key, _)| inputs.flag_or_false(key))
        .map(|(key, _)| *key)
        .collect();
    let factor_points: i32 = FACTORS
        .iter()
        .filter(|(key, _)| inputs.flag_or_false(key))
        .map(|(_, points)| points)
        .sum();

    let total = age_points + factor_points;
    Ok(CapriniScore {
        total,
        age_points,
        band: CapriniBand::from_total(total),
        factors,
    })
}

fn run(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score(inputs))
}

pub fn definitions() -> Vec<CalculatorDefinition> {
    let mut specs = vec![InputSpec::required("age_years", "years")];
    specs.extend(FACTORS.iter().map(|(key, _)| InputSpec::optional_plain(*key)));

    vec![CalculatorDefinition::builtin(CalculatorId::Caprini, run)
        .inputs(specs)
        .tables(TABLES)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_points() {
        assert_eq!(AGE.score(30.0), 0);
        assert_eq!(AGE.score(40.0), 0);
        assert_eq!(AGE.score(41.0), 1);
        assert_eq!(AGE.score(60.0), 1);
        assert_eq!(AGE.score(61.0), 2);
        assert_eq!(AGE.score(74.0), 2);
        assert_eq!(AGE.score(75.0), 3);
    }

    #[test]
    fn test_bands() {
        assert_eq!(CapriniBand::from_total(0), CapriniBand::VeryLow);
        assert_eq!(CapriniBand::from_total(2), CapriniBand::Low);
        assert_eq!(CapriniBand::from_total(3), CapriniBand::Moderate);
        assert_eq!(CapriniBand::from_total(4), CapriniBand::Moderate);
        assert_eq!(CapriniBand::from_total(5), CapriniBand::High);
    }

    #[test]
    fn test_young_patient_without_factors_is_very_low() {
        let result = score(&Inputs::new().with("age_years", 25.0)).unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.band, CapriniBand::VeryLow);
        assert!(result.factors.is_empty());
    }

    #[test]
    fn test_weighted_factors_sum() {
        let inputs = Inputs::new()
            .with("age_years", 65.0)
            .with("major_surgery", true)
            .with("history_of_vte", true)
            .with("varicose_veins", "yes")
            .with("malignancy", false);
        let result = score(&inputs).unwrap();
        assert_eq!(result.age_points, 2);
        assert_eq!(result.total, 2 + 2 + 3 + 1);
        assert_eq!(result.band, CapriniBand::High);
        assert_eq!(
            result.factors,
            vec!["varicose_veins", "major_surgery", "history_of_vte"]
        );
    }

    #[test]
    fn test_missing_age() {
        let err = score(&Inputs::new().with("major_surgery", true)).unwrap_err();
        assert_eq!(err.missing(), &["age_years".to_string()]);
    }

    #[test]
    fn test_age_table_is_valid() {
        assert!(AGE.validate().is_ok());
    }
}
