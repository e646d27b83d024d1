//! Sequential Organ Failure Assessment.
//!
//! Six organ subscores (0–4 each) summed into a total. Two entry points share
//! the organ scorers:
//! - [`score`]: every organ must be assessable, otherwise `needs`
//! - [`score_surrogate`]: scores whichever organs have data and reports how
//!   many were counted

use crate::calculators::ventilation::{normalize_fio2, pf_ratio};
use crate::inputs::{Inputs, Requirements, Scored, Unscored};
use crate::ranges::{round_to, Band, RangeTable};
use crate::registry::{CalculatorDefinition, CalculatorId, InputSpec, Outcome};
use serde::Serialize;

pub static PF_RATIO: RangeTable = RangeTable::new(
    "sofa.pf_ratio",
    1,
    &[
        Band::at_least(400.0, 0),
        Band::new(300.0, 399.9, 1),
        Band::new(200.0, 299.9, 2),
        Band::new(100.0, 199.9, 3),
        Band::at_most(99.9, 4),
    ],
);

pub static PLATELETS: RangeTable = RangeTable::new(
    "sofa.platelets_k_uL",
    0,
    &[
        Band::at_least(150.0, 0),
        Band::new(100.0, 149.0, 1),
        Band::new(50.0, 99.0, 2),
        Band::new(20.0, 49.0, 3),
        Band::at_most(19.0, 4),
    ],
);

pub static BILIRUBIN: RangeTable = RangeTable::new(
    "sofa.bilirubin_mg_dL",
    1,
    &[
        Band::at_most(1.1, 0),
        Band::new(1.2, 1.9, 1),
        Band::new(2.0, 5.9, 2),
        Band::new(6.0, 11.9, 3),
        Band::at_least(12.0, 4),
    ],
);

pub static GLASGOW_COMA: RangeTable = RangeTable::new(
    "sofa.gcs",
    0,
    &[
        Band::at_least(15.0, 0),
        Band::new(13.0, 14.0, 1),
        Band::new(10.0, 12.0, 2),
        Band::new(6.0, 9.0, 3),
        Band::at_most(5.0, 4),
    ],
);

pub static CREATININE: RangeTable = RangeTable::new(
    "sofa.creatinine_mg_dL",
    1,
    &[
        Band::at_most(1.1, 0),
        Band::new(1.2, 1.9, 1),
        Band::new(2.0, 3.4, 2),
        Band::new(3.5, 4.9, 3),
        Band::at_least(5.0, 4),
    ],
);

pub static URINE_OUTPUT: RangeTable = RangeTable::new(
    "sofa.urine_mL_day",
    0,
    &[
        Band::at_most(199.0, 4),
        Band::new(200.0, 499.0, 3),
        Band::at_least(500.0, 0),
    ],
);

static TABLES: &[&RangeTable] = &[
    &PF_RATIO,
    &PLATELETS,
    &BILIRUBIN,
    &GLASGOW_COMA,
    &CREATININE,
    &URINE_OUTPUT,
];

/// Without respiratory support the respiratory subscore stops at this value
/// once the PF ratio drops below 300.
const UNSUPPORTED_RESPIRATORY_CAP: i32 = 2;

// ============================================================================
// Organ Scorers
// ============================================================================

pub fn respiratory_points(pf: f64, ventilated: bool) -> i32 {
    let points = PF_RATIO.score(pf);
    if !ventilated && points > UNSUPPORTED_RESPIRATORY_CAP {
        UNSUPPORTED_RESPIRATORY_CAP
    } else {
        points
    }
}

pub fn coagulation_points(platelets_k_ul: f64) -> i32 {
    PLATELETS.score(platelets_k_ul)
}

pub fn liver_points(bilirubin_mg_dl: f64) -> i32 {
    BILIRUBIN.score(bilirubin_mg_dl)
}

pub fn cns_points(gcs: f64) -> i32 {
    GLASGOW_COMA.score(gcs)
}

/// Vasopressor doses in mcg/kg/min. Absent agents are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vasopressors {
    pub dopamine: f64,
    pub dobutamine: f64,
    pub epinephrine: f64,
    pub norepinephrine: f64,
}

impl Vasopressors {
    pub fn from_inputs(inputs: &Inputs) -> Scored<Self> {
        let dose = |key: &str| -> Scored<f64> {
            match inputs.number(key) {
                None => Ok(0.0),
                Some(v) if v < 0.0 => Err(Unscored::undefined(format!("{} cannot be negative", key))),
                Some(v) => Ok(v),
            }
        };
        Ok(Self {
            dopamine: dose("dopamine_mcg_kg_min")?,
            dobutamine: dose("dobutamine_mcg_kg_min")?,
            epinephrine: dose("epinephrine_mcg_kg_min")?,
            norepinephrine: dose("norepinephrine_mcg_kg_min")?,
        })
    }
}

/// Highest qualifying tier wins.
pub fn cardiovascular_points(map_mmhg: f64, pressors: &Vasopressors) -> i32 {
    let Vasopressors {
        dopamine,
        dobutamine,
        epinephrine,
        norepinephrine,
    } = *pressors;

    let mut points = if map_mmhg < 70.0 { 1 } else { 0 };
    if (dopamine > 0.0 && dopamine <= 5.0) || dobutamine > 0.0 {
        points = points.max(2);
    }
    if dopamine > 5.0
        || (epinephrine > 0.0 && epinephrine <= 0.1)
        || (norepinephrine > 0.0 && norepinephrine <= 0.1)
    {
        points = points.max(3);
    }
    if dopamine > 15.0 || epinephrine > 0.1 || norepinephrine > 0.1 {
        points = points.max(4);
    }
    points
}

/// Max of the creatinine and urine output criteria; `None` when neither is known.
pub fn renal_points(creatinine_mg_dl: Option<f64>, urine_ml_day: Option<f64>) -> Option<i32> {
    let by_creatinine = creatinine_mg_dl.map(|v| CREATININE.score(v));
    let by_urine = urine_ml_day.map(|v| URINE_OUTPUT.score(v));
    match (by_creatinine, by_urine) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn oxygenation(inputs: &Inputs) -> Scored<Option<f64>> {
    let (Some(pao2), Some(fio2)) = (inputs.number("pao2_mmHg"), inputs.number("fio2")) else {
        return Ok(None);
    };
    let fio2 = normalize_fio2(fio2).ok_or_else(|| Unscored::undefined("fio2 must be in (0, 1] or (1, 100]"))?;
    pf_ratio(pao2, fio2)
        .map(Some)
        .ok_or_else(|| Unscored::undefined("pao2 must be non-negative"))
}

// ============================================================================
// Full SOFA
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SofaSubscores {
    pub respiratory: i32,
    pub coagulation: i32,
    pub liver: i32,
    pub cardiovascular: i32,
    pub cns: i32,
    pub renal: i32,
}

impl SofaSubscores {
    pub fn sum(&self) -> i32 {
        self.respiratory + self.coagulation + self.liver + self.cardiovascular + self.cns + self.renal
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SofaScore {
    pub total: i32,
    pub pf_ratio: f64,
    pub subscores: SofaSubscores,
}

pub fn score(inputs: &Inputs) -> Scored<SofaScore> {
    let mut req = Requirements::new(inputs);
    req.number("pao2_mmHg");
    req.number("fio2");
    let ventilated = req.flag("mechanical_ventilation");
    let platelets = req.number("platelets_k_uL");
    let bilirubin = req.number("bilirubin_mg_dL");
    let map = req.number("map_mmHg");
    let gcs = req.number("gcs");
    let creatinine = inputs.number("creatinine_mg_dL");
    let urine = inputs.number("urine_mL_day");
    if creatinine.is_none() && urine.is_none() {
        req.note_missing("creatinine_mg_dL|urine_mL_day");
    }
    req.finish()?;

    let pressors = Vasopressors::from_inputs(inputs)?;
    let Some(pf) = oxygenation(inputs)? else {
        return Err(Unscored::needs(["pao2_mmHg", "fio2"]));
    };
    let Some(renal) = renal_points(creatinine, urine) else {
        return Err(Unscored::needs(["creatinine_mg_dL|urine_mL_day"]));
    };

    let subscores = SofaSubscores {
        respiratory: respiratory_points(pf, ventilated),
        coagulation: coagulation_points(platelets),
        liver: liver_points(bilirubin),
        cardiovascular: cardiovascular_points(map, &pressors),
        cns: cns_points(gcs),
        renal,
    };

    Ok(SofaScore {
        total: subscores.sum(),
        pf_ratio: round_to(pf, 1),
        subscores,
    })
}

// ============================================================================
// Surrogate SOFA
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PartialSofaSubscores {
    pub respiratory: Option<i32>,
    pub coagulation: Option<i32>,
    pub liver: Option<i32>,
    pub cardiovascular: Option<i32>,
    pub cns: Option<i32>,
    pub renal: Option<i32>,
}

impl PartialSofaSubscores {
    fn components(&self) -> [(&'static str, Option<i32>); 6] {
        [
            ("respiratory", self.respiratory),
            ("coagulation", self.coagulation),
            ("liver", self.liver),
            ("cardiovascular", self.cardiovascular),
            ("cns", self.cns),
            ("renal", self.renal),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SofaSurrogateScore {
    /// Sum over the organs that could be scored
    pub total: i32,
    pub components_counted: u32,
    pub missing_components: Vec<&'static str>,
    pub pf_ratio: Option<f64>,
    pub subscores: PartialSofaSubscores,
}

/// SOFA over whatever organs have data. A missing ventilation flag is read
/// as "not ventilated", which caps the respiratory subscore at 2.
pub fn score_surrogate(inputs: &Inputs) -> Scored<SofaSurrogateScore> {
    let pf = oxygenation(inputs)?;
    let pressors = Vasopressors::from_inputs(inputs)?;

    let subscores = PartialSofaSubscores {
        respiratory: pf.map(|pf| respiratory_points(pf, inputs.flag_or_false("mechanical_ventilation"))),
        coagulation: inputs.number("platelets_k_uL").map(coagulation_points),
        liver: inputs.number("bilirubin_mg_dL").map(liver_points),
        cardiovascular: inputs
            .number("map_mmHg")
            .map(|map| cardiovascular_points(map, &pressors)),
        cns: inputs.number("gcs").map(cns_points),
        renal: renal_points(inputs.number("creatinine_mg_dL"), inputs.number("urine_mL_day")),
    };

    let components = subscores.components();
    let counted: Vec<i32> = components.iter().filter_map(|(_, points)| *points).collect();
    if counted.is_empty() {
        return Err(Unscored::needs([
            "pao2_mmHg",
            "fio2",
            "platelets_k_uL",
            "bilirubin_mg_dL",
            "map_mmHg",
            "gcs",
            "creatinine_mg_dL|urine_mL_day",
        ]));
    }

    let missing_components = components
        .iter()
        .filter(|(_, points)| points.is_none())
        .map(|(name, _)| *name)
        .collect();

    Ok(SofaSurrogateScore {
        total: counted.iter().sum(),
        components_counted: counted.len() as u32,
        missing_components,
        pf_ratio: pf.map(|pf| round_to(pf, 1)),
        subscores,
    })
}

fn run(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score(inputs))
}

fn run_surrogate(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_surrogate(inputs))
}

fn input_specs(surrogate: bool) -> Vec<InputSpec> {
    let spec = |key: &'static str, unit: &'static str| {
        if surrogate {
            InputSpec::optional(key, unit)
        } else {
            InputSpec::required(key, unit)
        }
    };
    vec![
        spec("pao2_mmHg", "mmHg"),
        spec("fio2", "fraction or %"),
        if surrogate {
            InputSpec::optional_plain("mechanical_ventilation")
        } else {
            InputSpec::required_plain("mechanical_ventilation")
        },
        spec("platelets_k_uL", "10^3/uL"),
        spec("bilirubin_mg_dL", "mg/dL"),
        spec("map_mmHg", "mmHg"),
        spec("gcs", "points"),
        InputSpec::optional("creatinine_mg_dL", "mg/dL"),
        InputSpec::optional("urine_mL_day", "mL/day"),
        InputSpec::optional("dopamine_mcg_kg_min", "mcg/kg/min"),
        InputSpec::optional("dobutamine_mcg_kg_min", "mcg/kg/min"),
        InputSpec::optional("epinephrine_mcg_kg_min", "mcg/kg/min"),
        InputSpec::optional("norepinephrine_mcg_kg_min", "mcg/kg/min"),
    ]
}

pub fn definitions() -> Vec<CalculatorDefinition> {
    vec![
        CalculatorDefinition::builtin(CalculatorId::Sofa, run)
            .inputs(input_specs(false))
            .headline("total", Some("points"), 0)
            .tables(TABLES),
        CalculatorDefinition::builtin(CalculatorId::SofaSurrogate, run_surrogate)
            .inputs(input_specs(true))
            .headline("total", Some("points"), 0)
            .tables(TABLES),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_inputs() -> Inputs {
        Inputs::new()
            .with("pao2_mmHg", 80.0)
            .with("fio2", 0.5)
            .with("mechanical_ventilation", true)
            .with("platelets_k_uL", 40.0)
            .with("bilirubin_mg_dL", 2.5)
            .with("map_mmHg", 65.0)
            .with("gcs", 13.0)
            .with("creatinine_mg_dL", 1.5)
            .with("urine_mL_day", 350.0)
    }

    #[test]
    fn test_coagulation_at_40k_scores_3() {
        let result = score(&full_inputs()).unwrap();
        assert_eq!(result.subscores.coagulation, 3);
    }

    #[test]
    fn test_full_example() {
        let result = score(&full_inputs()).unwrap();
        assert_eq!(result.pf_ratio, 160.0);
        assert_eq!(result.subscores.respiratory, 3);
        assert_eq!(result.subscores.liver, 2);
        assert_eq!(result.subscores.cardiovascular, 1);
        assert_eq!(result.subscores.cns, 1);
        // creatinine 1.5 scores 1, urine 350 mL/day scores 3
        assert_eq!(result.subscores.renal, 3);
        assert_eq!(result.total, 13);
    }

    #[test]
    fn test_total_is_sum_of_subscores() {
        let variants = [
            full_inputs(),
            full_inputs().with("platelets_k_uL", 200.0).with("gcs", 15.0),
            full_inputs().with("norepinephrine_mcg_kg_min", 0.3).with("fio2", 100.0),
        ];
        for inputs in variants {
            let result = score(&inputs).unwrap();
            let s = &result.subscores;
            assert_eq!(
                result.total,
                s.respiratory + s.coagulation + s.liver + s.cardiovascular + s.cns + s.renal
            );
        }
    }

    #[test]
    fn test_respiratory_gate_without_ventilation() {
        assert_eq!(respiratory_points(150.0, true), 3);
        assert_eq!(respiratory_points(150.0, false), 2);
        assert_eq!(respiratory_points(80.0, false), 2);
        assert_eq!(respiratory_points(80.0, true), 4);
        assert_eq!(respiratory_points(350.0, false), 1);
    }

    #[test]
    fn test_pf_ratio_just_below_cutoff_keeps_worse_band() {
        assert_eq!(respiratory_points(299.6, true), 2);
        assert_eq!(respiratory_points(299.94, true), 2);
        assert_eq!(respiratory_points(299.96, true), 1);
        assert_eq!(respiratory_points(199.9, true), 3);
        assert_eq!(respiratory_points(99.96, true), 3);
    }

    #[test]
    fn test_fio2_percent_is_normalized() {
        let inputs = full_inputs().with("fio2", 50.0);
        assert_eq!(score(&inputs).unwrap().pf_ratio, 160.0);
    }

    #[test]
    fn test_cardiovascular_highest_tier_wins() {
        let none = Vasopressors::default();
        assert_eq!(cardiovascular_points(75.0, &none), 0);
        assert_eq!(cardiovascular_points(65.0, &none), 1);

        let dobutamine = Vasopressors {
            dobutamine: 2.0,
            ..Default::default()
        };
        assert_eq!(cardiovascular_points(75.0, &dobutamine), 2);

        let low_norepi_and_dobutamine = Vasopressors {
            dobutamine: 5.0,
            norepinephrine: 0.05,
            ..Default::default()
        };
        assert_eq!(cardiovascular_points(60.0, &low_norepi_and_dobutamine), 3);

        let high_dopamine = Vasopressors {
            dopamine: 20.0,
            ..Default::default()
        };
        assert_eq!(cardiovascular_points(60.0, &high_dopamine), 4);
    }

    #[test]
    fn test_negative_pressor_dose_is_undefined() {
        let inputs = full_inputs().with("dopamine_mcg_kg_min", -1.0);
        assert!(matches!(score(&inputs), Err(Unscored::Undefined { .. })));
    }

    #[test]
    fn test_renal_takes_max_of_criteria() {
        assert_eq!(renal_points(Some(1.5), Some(150.0)), Some(4));
        assert_eq!(renal_points(Some(5.2), Some(800.0)), Some(4));
        assert_eq!(renal_points(Some(2.2), None), Some(2));
        assert_eq!(renal_points(None, Some(400.0)), Some(3));
        assert_eq!(renal_points(None, None), None);
    }

    #[test]
    fn test_renal_alternative_reported_when_both_missing() {
        let mut inputs = full_inputs();
        inputs.remove("creatinine_mg_dL");
        inputs.remove("urine_mL_day");
        let err = score(&inputs).unwrap_err();
        assert_eq!(err.missing(), &["creatinine_mg_dL|urine_mL_day".to_string()]);
    }

    #[test]
    fn test_full_sofa_needs_every_organ() {
        let mut inputs = full_inputs();
        inputs.remove("bilirubin_mg_dL");
        let err = score(&inputs).unwrap_err();
        assert_eq!(err.missing(), &["bilirubin_mg_dL".to_string()]);
    }

    #[test]
    fn test_surrogate_counts_available_components() {
        let inputs = Inputs::new()
            .with("platelets_k_uL", 40.0)
            .with("gcs", 9.0)
            .with("creatinine_mg_dL", 2.5);
        let result = score_surrogate(&inputs).unwrap();
        assert_eq!(result.components_counted, 3);
        assert_eq!(result.total, 3 + 3 + 2);
        assert_eq!(
            result.missing_components,
            vec!["respiratory", "liver", "cardiovascular"]
        );
        assert_eq!(result.pf_ratio, None);
    }

    #[test]
    fn test_surrogate_matches_full_when_complete() {
        let full = score(&full_inputs()).unwrap();
        let surrogate = score_surrogate(&full_inputs()).unwrap();
        assert_eq!(surrogate.components_counted, 6);
        assert_eq!(surrogate.total, full.total);
    }

    #[test]
    fn test_surrogate_without_any_data_needs_inputs() {
        let err = score_surrogate(&Inputs::new()).unwrap_err();
        assert!(!err.missing().is_empty());
    }
}
