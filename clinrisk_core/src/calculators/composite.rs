//! Threshold classifiers built from several inputs: DKA severity, ARDS
//! (Berlin), sepsis bundle triggers and shock index class.

use super::hemodynamics::shock_index;
use super::ventilation::{normalize_fio2, pf_ratio};
use crate::inputs::{Inputs, Requirements, Scored, Unscored};
use crate::ranges::{round_to, Band, RangeTable};
use crate::registry::{CalculatorDefinition, CalculatorId, InputSpec, Outcome};
use serde::Serialize;

/// Four-step severity shared by the classifiers in this module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=0 => Severity::None,
            1 => Severity::Mild,
            2 => Severity::Moderate,
            _ => Severity::Severe,
        }
    }
}

// ============================================================================
// DKA
// ============================================================================

pub static DKA_PH: RangeTable = RangeTable::new(
    "dka_ph",
    2,
    &[
        Band::at_most(6.99, 3),
        Band::new(7.00, 7.24, 2),
        Band::new(7.25, 7.30, 1),
        Band::at_least(7.31, 0),
    ],
);

pub static DKA_BICARBONATE: RangeTable = RangeTable::new(
    "dka_bicarbonate",
    1,
    &[
        Band::at_most(9.9, 3),
        Band::new(10.0, 14.9, 2),
        Band::new(15.0, 18.0, 1),
        Band::at_least(18.1, 0),
    ],
);

const DKA_GLUCOSE_MG_DL: f64 = 250.0;
const ANION_GAP_UPPER: f64 = 12.0;

/// Severity level implied by mental status, `None` for an unknown spelling.
pub fn mental_status_level(status: &str) -> Option<i32> {
    match status.to_ascii_lowercase().as_str() {
        "alert" => Some(0),
        "drowsy" => Some(2),
        "stupor" | "coma" | "stupor_or_coma" => Some(3),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DkaSeverity {
    pub dka_criteria_met: bool,
    pub severity: Severity,
    pub severity_level: i32,
    pub ph_level: i32,
    pub bicarbonate_level: i32,
    pub mental_status_level: i32,
    pub anion_gap: Option<f64>,
    pub anion_gap_elevated: Option<bool>,
}

/// Glucose, pH and bicarbonate are required. Mental status defaults to alert.
/// The anion gap is reported when sodium and chloride are both given.
pub fn score_dka(inputs: &Inputs) -> Scored<DkaSeverity> {
    let mut req = Requirements::new(inputs);
    let glucose = req.number("glucose_mg_dL");
    let ph = req.number("ph");
    let bicarbonate = req.number("bicarbonate_mmol_L");
    req.finish()?;

    let mental = match inputs.text("mental_status") {
        Some(status) => mental_status_level(status)
            .ok_or_else(|| Unscored::undefined(format!("unknown mental status '{}'", status)))?,
        None => 0,
    };
    if bicarbonate < 0.0 {
        return Err(Unscored::undefined("bicarbonate cannot be negative"));
    }

    let ph_level = DKA_PH.score(ph);
    let bicarbonate_level = DKA_BICARBONATE.score(bicarbonate);
    let level = ph_level.max(bicarbonate_level).max(mental);

    let ketones = inputs.flag_or_false("ketones_positive");
    let dka_criteria_met =
        glucose > DKA_GLUCOSE_MG_DL && ketones && (ph_level > 0 || bicarbonate_level > 0);

    let anion_gap = match (inputs.number("sodium_mmol_L"), inputs.number("chloride_mmol_L")) {
        (Some(na), Some(cl)) => Some(round_to(na - (cl + bicarbonate), 1)),
        _ => None,
    };

    Ok(DkaSeverity {
        dka_criteria_met,
        severity: Severity::from_level(level),
        severity_level: level,
        ph_level,
        bicarbonate_level,
        mental_status_level: mental,
        anion_gap,
        anion_gap_elevated: anion_gap.map(|gap| gap > ANION_GAP_UPPER),
    })
}

// ============================================================================
// ARDS (Berlin)
// ============================================================================

const ARDS_MIN_PEEP: f64 = 5.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ArdsBerlin {
    pub ards: bool,
    pub severity: Severity,
    pub pf_ratio: f64,
    pub criteria_unmet: Vec<&'static str>,
}

pub fn berlin_severity(pf: f64) -> Severity {
    if pf <= 100.0 {
        Severity::Severe
    } else if pf <= 200.0 {
        Severity::Moderate
    } else if pf <= 300.0 {
        Severity::Mild
    } else {
        Severity::None
    }
}

pub fn score_ards(inputs: &Inputs) -> Scored<ArdsBerlin> {
    let mut req = Requirements::new(inputs);
    let pao2 = req.number("pao2_mmHg");
    let fio2 = req.number("fio2");
    let peep = req.number("peep_cmH2O");
    let onset = req.flag("onset_within_1_week");
    let bilateral = req.flag("bilateral_opacities");
    let not_cardiac = req.flag("not_explained_by_cardiac_failure");
    req.finish()?;

    let fio2 = normalize_fio2(fio2).ok_or_else(|| Unscored::undefined("FiO2 out of range"))?;
    let pf = pf_ratio(pao2, fio2).ok_or_else(|| Unscored::undefined("PaO2 must be positive"))?;

    let mut criteria_unmet = Vec::new();
    if !onset {
        criteria_unmet.push("onset_within_1_week");
    }
    if !bilateral {
        criteria_unmet.push("bilateral_opacities");
    }
    if !not_cardiac {
        criteria_unmet.push("not_explained_by_cardiac_failure");
    }
    if peep < ARDS_MIN_PEEP {
        criteria_unmet.push("peep_at_least_5");
    }
    let by_ratio = berlin_severity(pf);
    if by_ratio == Severity::None {
        criteria_unmet.push("pf_ratio_at_most_300");
    }

    let ards = criteria_unmet.is_empty();
    Ok(ArdsBerlin {
        ards,
        severity: if ards { by_ratio } else { Severity::None },
        pf_ratio: round_to(pf, 0),
        criteria_unmet,
    })
}

// ============================================================================
// Sepsis bundle
// ============================================================================

const FLUID_BOLUS_ML_PER_KG: f64 = 30.0;
const LACTATE_ELEVATED: f64 = 2.0;
const LACTATE_SHOCK: f64 = 4.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SepsisBundle {
    pub qsofa: i32,
    pub qsofa_positive: bool,
    pub hypotension: bool,
    pub lactate_elevated: bool,
    pub bundle_triggered: bool,
    pub fluid_volume_ml: Option<f64>,
    pub actions: Vec<&'static str>,
}

pub fn qsofa(rr: f64, sbp: f64, altered_mentation: bool) -> i32 {
    i32::from(rr >= 22.0) + i32::from(sbp <= 100.0) + i32::from(altered_mentation)
}

/// Respiratory rate, systolic pressure, mentation and lactate are required.
/// A 30 mL/kg fluid volume is given when fluids are indicated and weight is known.
pub fn score_sepsis_bundle(inputs: &Inputs) -> Scored<SepsisBundle> {
    let mut req = Requirements::new(inputs);
    let rr = req.number("rr_bpm");
    let sbp = req.number("sbp_mmHg");
    let altered = req.flag("altered_mentation");
    let lactate = req.number("lactate_mmol_L");
    req.finish()?;

    if lactate < 0.0 {
        return Err(Unscored::undefined("lactate cannot be negative"));
    }

    let score = qsofa(rr, sbp, altered);
    let hypotension = sbp < 90.0 || inputs.number("map_mmHg").is_some_and(|map| map < 65.0);
    let lactate_elevated = lactate >= LACTATE_ELEVATED;
    let qsofa_positive = score >= 2;
    let bundle_triggered = qsofa_positive || hypotension || lactate_elevated;
    let fluids_indicated = hypotension || lactate >= LACTATE_SHOCK;

    let mut actions = Vec::new();
    if bundle_triggered {
        actions.extend(["measure_lactate", "obtain_blood_cultures", "give_broad_spectrum_antibiotics"]);
    }
    if lactate_elevated {
        actions.push("remeasure_lactate");
    }
    if fluids_indicated {
        actions.push("give_30_mL_kg_crystalloid");
    }
    if hypotension {
        actions.push("vasopressors_if_map_below_65_after_fluids");
    }

    let fluid_volume_ml = if fluids_indicated {
        inputs
            .number("weight_kg")
            .filter(|w| *w > 0.0)
            .map(|w| round_to(w * FLUID_BOLUS_ML_PER_KG, 0))
    } else {
        None
    };

    Ok(SepsisBundle {
        qsofa: score,
        qsofa_positive,
        hypotension,
        lactate_elevated,
        bundle_triggered,
        fluid_volume_ml,
        actions,
    })
}

// ============================================================================
// Shock index class
// ============================================================================

pub static SHOCK_INDEX_CLASS: RangeTable = RangeTable::new(
    "shock_index_class",
    2,
    &[
        Band::at_least(1.40, 3),
        Band::new(1.00, 1.39, 2),
        Band::new(0.60, 0.99, 1),
        Band::at_most(0.59, 0),
    ],
);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShockIndexClass {
    pub shock_index: f64,
    pub class: Severity,
    pub class_level: i32,
}

pub fn score_shock_index_class(inputs: &Inputs) -> Scored<ShockIndexClass> {
    let mut req = Requirements::new(inputs);
    let hr = req.number("hr_bpm");
    let sbp = req.number("sbp_mmHg");
    req.finish()?;

    let si = shock_index(hr, sbp)
        .ok_or_else(|| Unscored::undefined("systolic pressure must be positive"))?;
    let level = SHOCK_INDEX_CLASS.score(si);
    Ok(ShockIndexClass {
        shock_index: round_to(si, 2),
        class: Severity::from_level(level),
        class_level: level,
    })
}

static DKA_TABLES: &[&RangeTable] = &[&DKA_PH, &DKA_BICARBONATE];
static SHOCK_TABLES: &[&RangeTable] = &[&SHOCK_INDEX_CLASS];

fn run_dka(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_dka(inputs))
}

fn run_ards(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_ards(inputs))
}

fn run_sepsis_bundle(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_sepsis_bundle(inputs))
}

fn run_shock_index_class(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_shock_index_class(inputs))
}

pub fn definitions() -> Vec<CalculatorDefinition> {
    vec![
        CalculatorDefinition::builtin(CalculatorId::DkaSeverity, run_dka)
            .inputs(vec![
                InputSpec::required("glucose_mg_dL", "mg/dL"),
                InputSpec::required("ph", "pH"),
                InputSpec::required("bicarbonate_mmol_L", "mmol/L"),
                InputSpec::optional_plain("ketones_positive"),
                InputSpec::optional_plain("mental_status"),
                InputSpec::optional("sodium_mmol_L", "mmol/L"),
                InputSpec::optional("chloride_mmol_L", "mmol/L"),
            ])
            .headline("severity_level", None, 0)
            .tables(DKA_TABLES),
        CalculatorDefinition::builtin(CalculatorId::ArdsBerlin, run_ards)
            .inputs(vec![
                InputSpec::required("pao2_mmHg", "mmHg"),
                InputSpec::required("fio2", "fraction or %"),
                InputSpec::required("peep_cmH2O", "cmH2O"),
                InputSpec::required_plain("onset_within_1_week"),
                InputSpec::required_plain("bilateral_opacities"),
                InputSpec::required_plain("not_explained_by_cardiac_failure"),
            ])
            .headline("pf_ratio", Some("mmHg"), 0),
        CalculatorDefinition::builtin(CalculatorId::SepsisBundle, run_sepsis_bundle)
            .inputs(vec![
                InputSpec::required("rr_bpm", "breaths/min"),
                InputSpec::required("sbp_mmHg", "mmHg"),
                InputSpec::required_plain("altered_mentation"),
                InputSpec::required("lactate_mmol_L", "mmol/L"),
                InputSpec::optional("map_mmHg", "mmHg"),
                InputSpec::optional("weight_kg", "kg"),
            ])
            .headline("qsofa", None, 0),
        CalculatorDefinition::builtin(CalculatorId::ShockIndexClass, run_shock_index_class)
            .inputs(vec![
                InputSpec::required("hr_bpm", "bpm"),
                InputSpec::required("sbp_mmHg", "mmHg"),
            ])
            .headline("shock_index", None, 2)
            .tables(SHOCK_TABLES),
    ]
}
