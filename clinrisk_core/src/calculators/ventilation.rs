//! Oxygenation and ventilator-mechanics formulas.

use crate::inputs::{Inputs, Requirements, Scored, Unscored};
use crate::ranges::{round_to, safe_div};
use crate::registry::{CalculatorDefinition, CalculatorId, InputSpec, Outcome};
use serde::Serialize;

/// Water vapour pressure at body temperature (mmHg)
const WATER_VAPOUR_MMHG: f64 = 47.0;
const RESPIRATORY_QUOTIENT: f64 = 0.8;
const SEA_LEVEL_MMHG: f64 = 760.0;
/// RSBI below this predicts successful weaning
const RSBI_WEANING_THRESHOLD: f64 = 105.0;

/// FiO2 as a fraction. Values above 1 are read as a percentage.
pub fn normalize_fio2(fio2: f64) -> Option<f64> {
    if !fio2.is_finite() || fio2 <= 0.0 {
        None
    } else if fio2 <= 1.0 {
        Some(fio2)
    } else if fio2 <= 100.0 {
        Some(fio2 / 100.0)
    } else {
        None
    }
}

/// PaO2 / FiO2 with FiO2 already a fraction.
pub fn pf_ratio(pao2_mmhg: f64, fio2: f64) -> Option<f64> {
    if pao2_mmhg < 0.0 {
        return None;
    }
    safe_div(pao2_mmhg, fio2)
}

/// Alveolar gas equation.
pub fn alveolar_po2(fio2: f64, paco2_mmhg: f64, barometric_mmhg: f64) -> Option<f64> {
    if ![fio2, paco2_mmhg, barometric_mmhg].iter().all(|v| v.is_finite())
        || barometric_mmhg <= WATER_VAPOUR_MMHG
        || paco2_mmhg < 0.0
    {
        return None;
    }
    Some(fio2 * (barometric_mmhg - WATER_VAPOUR_MMHG) - paco2_mmhg / RESPIRATORY_QUOTIENT)
}

pub fn aa_gradient(pao2_mmhg: f64, paco2_mmhg: f64, fio2: f64, barometric_mmhg: f64) -> Option<f64> {
    if !pao2_mmhg.is_finite() || pao2_mmhg < 0.0 {
        return None;
    }
    alveolar_po2(fio2, paco2_mmhg, barometric_mmhg).map(|pao2_alveolar| pao2_alveolar - pao2_mmhg)
}

/// Plateau minus PEEP; undefined when plateau is below PEEP.
pub fn driving_pressure(plateau_cmh2o: f64, peep_cmh2o: f64) -> Option<f64> {
    if !plateau_cmh2o.is_finite() || !peep_cmh2o.is_finite() || plateau_cmh2o < peep_cmh2o {
        return None;
    }
    Some(plateau_cmh2o - peep_cmh2o)
}

/// Tidal volume over (plateau − PEEP), mL/cmH2O.
pub fn static_compliance(tidal_volume_ml: f64, plateau_cmh2o: f64, peep_cmh2o: f64) -> Option<f64> {
    if tidal_volume_ml <= 0.0 {
        return None;
    }
    safe_div(tidal_volume_ml, plateau_cmh2o - peep_cmh2o)
}

/// Tidal volume over (peak − PEEP), mL/cmH2O.
pub fn dynamic_compliance(tidal_volume_ml: f64, peak_cmh2o: f64, peep_cmh2o: f64) -> Option<f64> {
    if tidal_volume_ml <= 0.0 {
        return None;
    }
    safe_div(tidal_volume_ml, peak_cmh2o - peep_cmh2o)
}

/// (peak − plateau) over inspiratory flow in L/s, cmH2O/L/s.
pub fn airway_resistance(peak_cmh2o: f64, plateau_cmh2o: f64, flow_l_min: f64) -> Option<f64> {
    if peak_cmh2o < plateau_cmh2o {
        return None;
    }
    safe_div(peak_cmh2o - plateau_cmh2o, flow_l_min / 60.0)
}

/// Respiratory rate over tidal volume in litres.
pub fn rapid_shallow_breathing_index(rr_bpm: f64, tidal_volume_ml: f64) -> Option<f64> {
    if rr_bpm < 0.0 {
        return None;
    }
    safe_div(rr_bpm, tidal_volume_ml / 1000.0)
}

fn fio2_fraction(raw: f64) -> Scored<f64> {
    normalize_fio2(raw).ok_or_else(|| Unscored::undefined("fio2 must be in (0, 1] or (1, 100]"))
}

// ============================================================================
// Registry Adapters
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PfRatio {
    pub pf_ratio: f64,
    pub fio2_fraction: f64,
}

pub fn score_pf_ratio(inputs: &Inputs) -> Scored<PfRatio> {
    let mut req = Requirements::new(inputs);
    let pao2 = req.number("pao2_mmHg");
    let fio2 = req.number("fio2");
    req.finish()?;

    let fio2 = fio2_fraction(fio2)?;
    let ratio = pf_ratio(pao2, fio2).ok_or_else(|| Unscored::undefined("pao2 must be non-negative"))?;
    Ok(PfRatio {
        pf_ratio: round_to(ratio, 0),
        fio2_fraction: round_to(fio2, 2),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AaGradient {
    pub aa_gradient: f64,
    pub alveolar_po2: f64,
    /// Age-expected upper limit (age / 4 + 4), when age is known
    pub expected_aa_gradient: Option<f64>,
}

pub fn score_aa_gradient(inputs: &Inputs) -> Scored<AaGradient> {
    let mut req = Requirements::new(inputs);
    let pao2 = req.number("pao2_mmHg");
    let paco2 = req.number("paco2_mmHg");
    let fio2 = req.number("fio2");
    req.finish()?;

    let fio2 = fio2_fraction(fio2)?;
    let barometric = inputs.number("barometric_mmHg").unwrap_or(SEA_LEVEL_MMHG);
    let alveolar = alveolar_po2(fio2, paco2, barometric)
        .ok_or_else(|| Unscored::undefined("barometric pressure must exceed 47 mmHg and PaCO2 be non-negative"))?;
    let gradient = aa_gradient(pao2, paco2, fio2, barometric)
        .ok_or_else(|| Unscored::undefined("pao2 must be non-negative"))?;

    Ok(AaGradient {
        aa_gradient: round_to(gradient, 1),
        alveolar_po2: round_to(alveolar, 1),
        expected_aa_gradient: inputs
            .number("age_years")
            .filter(|age| *age >= 0.0)
            .map(|age| round_to(age / 4.0 + 4.0, 1)),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VentMechanics {
    pub driving_pressure: f64,
    pub static_compliance: f64,
    pub dynamic_compliance: Option<f64>,
    pub airway_resistance: Option<f64>,
}

pub fn score_vent_mechanics(inputs: &Inputs) -> Scored<VentMechanics> {
    let mut req = Requirements::new(inputs);
    let tidal_volume = req.number("tidal_volume_mL");
    let plateau = req.number("plateau_cmH2O");
    let peep = req.number("peep_cmH2O");
    req.finish()?;

    if tidal_volume <= 0.0 {
        return Err(Unscored::undefined("tidal volume must be positive"));
    }
    let driving = driving_pressure(plateau, peep)
        .ok_or_else(|| Unscored::undefined("plateau pressure must not be below PEEP"))?;
    let compliance = static_compliance(tidal_volume, plateau, peep)
        .ok_or_else(|| Unscored::undefined("plateau pressure must exceed PEEP"))?;

    let peak = inputs.number("pip_cmH2O");
    let dynamic = peak.and_then(|pip| dynamic_compliance(tidal_volume, pip, peep));
    let resistance = match (peak, inputs.number("flow_L_min")) {
        (Some(pip), Some(flow)) => airway_resistance(pip, plateau, flow),
        _ => None,
    };

    Ok(VentMechanics {
        driving_pressure: round_to(driving, 1),
        static_compliance: round_to(compliance, 1),
        dynamic_compliance: dynamic.map(|v| round_to(v, 1)),
        airway_resistance: resistance.map(|v| round_to(v, 1)),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Rsbi {
    pub rsbi: f64,
    pub weaning_predicted: bool,
}

pub fn score_rsbi(inputs: &Inputs) -> Scored<Rsbi> {
    let mut req = Requirements::new(inputs);
    let rr = req.number("rr_bpm");
    let tidal_volume = req.number("tidal_volume_mL");
    req.finish()?;

    let rsbi = rapid_shallow_breathing_index(rr, tidal_volume)
        .ok_or_else(|| Unscored::undefined("tidal volume must be positive"))?;
    Ok(Rsbi {
        rsbi: round_to(rsbi, 0),
        weaning_predicted: rsbi < RSBI_WEANING_THRESHOLD,
    })
}

fn run_pf_ratio(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_pf_ratio(inputs))
}

fn run_aa_gradient(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_aa_gradient(inputs))
}

fn run_vent_mechanics(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_vent_mechanics(inputs))
}

fn run_rsbi(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_rsbi(inputs))
}

pub fn definitions() -> Vec<CalculatorDefinition> {
    vec![
        CalculatorDefinition::builtin(CalculatorId::PfRatio, run_pf_ratio)
            .inputs(vec![
                InputSpec::required("pao2_mmHg", "mmHg"),
                InputSpec::required("fio2", "fraction or %"),
            ])
            .headline("pf_ratio", Some("mmHg"), 0),
        CalculatorDefinition::builtin(CalculatorId::AaGradient, run_aa_gradient)
            .inputs(vec![
                InputSpec::required("pao2_mmHg", "mmHg"),
                InputSpec::required("paco2_mmHg", "mmHg"),
                InputSpec::required("fio2", "fraction or %"),
                InputSpec::optional("barometric_mmHg", "mmHg"),
                InputSpec::optional("age_years", "years"),
            ])
            .headline("aa_gradient", Some("mmHg"), 1),
        CalculatorDefinition::builtin(CalculatorId::VentMechanics, run_vent_mechanics)
            .inputs(vec![
                InputSpec::required("tidal_volume_mL", "mL"),
                InputSpec::required("plateau_cmH2O", "cmH2O"),
                InputSpec::required("peep_cmH2O", "cmH2O"),
                InputSpec::optional("pip_cmH2O", "cmH2O"),
                InputSpec::optional("flow_L_min", "L/min"),
            ])
            .headline("static_compliance", Some("mL/cmH2O"), 1),
        CalculatorDefinition::builtin(CalculatorId::Rsbi, run_rsbi)
            .inputs(vec![
                InputSpec::required("rr_bpm", "breaths/min"),
                InputSpec::required("tidal_volume_mL", "mL"),
            ])
            .headline("rsbi", Some("breaths/min/L"), 0),
    ]
}
