//! KDIGO acute kidney injury staging.
//!
//! The stage is the maximum of the creatinine criterion and the urine output
//! criterion. Starting renal replacement therapy forces stage 3.

use crate::inputs::{Inputs, Scored, Unscored};
use crate::ranges::{round_to, safe_div};
use crate::registry::{CalculatorDefinition, CalculatorId, InputSpec, Outcome};
use serde::Serialize;

/// Absolute creatinine (mg/dL) that qualifies for stage 3 on its own
const STAGE3_ABSOLUTE_CREATININE: f64 = 4.0;
/// 48 hour rise (mg/dL) that qualifies for stage 1
const STAGE1_ABSOLUTE_RISE: f64 = 0.3;

/// Criteria that contributed a non-zero stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KdigoCriterion {
    CreatinineRatio,
    AbsoluteCreatinine,
    CreatinineRise48h,
    UrineOutput,
    Anuria,
    RenalReplacementTherapy,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KdigoStage {
    pub stage: u8,
    /// Current over baseline creatinine, 2 decimals
    pub creatinine_ratio: Option<f64>,
    pub creatinine_stage: Option<u8>,
    pub urine_stage: Option<u8>,
    pub rrt_initiated: bool,
    pub criteria: Vec<KdigoCriterion>,
}

/// Stage from the creatinine criterion. `ratio` is current / baseline.
pub fn creatinine_stage(
    ratio: Option<f64>,
    current_mg_dl: Option<f64>,
    rise_48h_mg_dl: Option<f64>,
    criteria: &mut Vec<KdigoCriterion>,
) -> u8 {
    let ratio = ratio.unwrap_or(0.0);
    let absolute = current_mg_dl.is_some_and(|c| c >= STAGE3_ABSOLUTE_CREATININE);
    let rise = rise_48h_mg_dl.is_some_and(|r| r >= STAGE1_ABSOLUTE_RISE);

    if ratio >= 3.0 || absolute {
        if ratio >= 3.0 {
            criteria.push(KdigoCriterion::CreatinineRatio);
        }
        if absolute {
            criteria.push(KdigoCriterion::AbsoluteCreatinine);
        }
        3
    } else if ratio >= 2.0 {
        criteria.push(KdigoCriterion::CreatinineRatio);
        2
    } else if ratio >= 1.5 || rise {
        if ratio >= 1.5 {
            criteria.push(KdigoCriterion::CreatinineRatio);
        }
        if rise {
            criteria.push(KdigoCriterion::CreatinineRise48h);
        }
        1
    } else {
        0
    }
}

/// Stage from urine output in mL/kg/h sustained over `hours`.
pub fn urine_stage(rate_ml_kg_h: f64, hours: f64, criteria: &mut Vec<KdigoCriterion>) -> u8 {
    if rate_ml_kg_h == 0.0 && hours >= 12.0 {
        criteria.push(KdigoCriterion::Anuria);
        3
    } else if rate_ml_kg_h < 0.3 && hours >= 24.0 {
        criteria.push(KdigoCriterion::UrineOutput);
        3
    } else if rate_ml_kg_h < 0.5 && hours >= 12.0 {
        criteria.push(KdigoCriterion::UrineOutput);
        2
    } else if rate_ml_kg_h < 0.5 && hours >= 6.0 {
        criteria.push(KdigoCriterion::UrineOutput);
        1
    } else {
        0
    }
}

/// Stage AKI from whichever criteria have data.
///
/// At least one criterion must be assessable: a current/baseline creatinine
/// pair, a 48 hour rise, a current creatinine at or above 4.0 mg/dL, a urine
/// rate with its duration, or renal replacement therapy.
pub fn score(inputs: &Inputs) -> Scored<KdigoStage> {
    let current = inputs.number("creatinine_mg_dL");
    let baseline = inputs.number("baseline_creatinine_mg_dL");
    let rise = inputs.number("creatinine_rise_48h_mg_dL");
    let urine_rate = inputs.number("urine_mL_kg_h");
    let urine_hours = inputs.number("urine_window_h");
    let rrt = inputs.flag_or_false("rrt_initiated");

    if baseline.is_some_and(|b| b <= 0.0) {
        return Err(Unscored::undefined("baseline creatinine must be positive"));
    }
    if current.is_some_and(|c| c < 0.0) {
        return Err(Unscored::undefined("creatinine cannot be negative"));
    }
    if urine_rate.is_some_and(|r| r < 0.0) || urine_hours.is_some_and(|h| h < 0.0) {
        return Err(Unscored::undefined("urine output and duration cannot be negative"));
    }

    // Staged on the reported 2-decimal ratio so 0.6 / 0.2 reads as 3.00
    let ratio = match (current, baseline) {
        (Some(c), Some(b)) => safe_div(c, b).map(|r| round_to(r, 2)),
        _ => None,
    };

    let mut criteria = Vec::new();
    let creatinine_assessable = ratio.is_some()
        || rise.is_some()
        || current.is_some_and(|c| c >= STAGE3_ABSOLUTE_CREATININE);
    let creatinine = creatinine_assessable
        .then(|| creatinine_stage(ratio, current, rise, &mut criteria));
    let urine = match (urine_rate, urine_hours) {
        (Some(rate), Some(hours)) => Some(urine_stage(rate, hours, &mut criteria)),
        _ => None,
    };

    if creatinine.is_none() && urine.is_none() && !rrt {
        let missing: Vec<&str> = [
            ("creatinine_mg_dL", current.is_none()),
            ("baseline_creatinine_mg_dL", baseline.is_none()),
            ("urine_window_h", urine_rate.is_some() && urine_hours.is_none()),
            ("urine_mL_kg_h", urine_hours.is_some() && urine_rate.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(key, _)| key)
        .collect();
        return Err(Unscored::needs(missing));
    }

    if rrt {
        criteria.push(KdigoCriterion::RenalReplacementTherapy);
    }

    let stage = [
        creatinine.unwrap_or(0),
        urine.unwrap_or(0),
        if rrt { 3 } else { 0 },
    ]
    .into_iter()
    .max()
    .unwrap_or(0);

    Ok(KdigoStage {
        stage,
        creatinine_ratio: ratio,
        creatinine_stage: creatinine,
        urine_stage: urine,
        rrt_initiated: rrt,
        criteria,
    })
}

fn run(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score(inputs))
}

pub fn definitions() -> Vec<CalculatorDefinition> {
    vec![CalculatorDefinition::builtin(CalculatorId::KdigoAki, run)
        .inputs(vec![
            InputSpec::optional("creatinine_mg_dL", "mg/dL"),
            InputSpec::optional("baseline_creatinine_mg_dL", "mg/dL"),
            InputSpec::optional("creatinine_rise_48h_mg_dL", "mg/dL"),
            InputSpec::optional("urine_mL_kg_h", "mL/kg/h"),
            InputSpec::optional("urine_window_h", "h"),
            InputSpec::optional_plain("rrt_initiated"),
        ])
        .headline("stage", None, 0)]
}
