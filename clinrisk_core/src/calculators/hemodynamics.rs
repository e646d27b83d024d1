//! Closed-form hemodynamic formulas.
//!
//! The plain helpers take already-validated numbers and return `None` when the
//! formula is undefined for them. The `score_*` functions read [`Inputs`],
//! report missing keys and wrap the helpers.

use crate::inputs::{Inputs, Requirements, Scored, Unscored};
use crate::ranges::{round_to, safe_div};
use crate::registry::{CalculatorDefinition, CalculatorId, InputSpec, Outcome};
use serde::Serialize;
use std::f64::consts::PI;

/// Wood units to dyn·s/cm⁵
const SVR_FACTOR: f64 = 80.0;

// ============================================================================
// Formulas
// ============================================================================

pub fn mean_arterial_pressure(sbp: f64, dbp: f64) -> Option<f64> {
    if !sbp.is_finite() || !dbp.is_finite() || dbp < 0.0 || sbp < dbp {
        return None;
    }
    Some(dbp + (sbp - dbp) / 3.0)
}

pub fn shock_index(hr: f64, sbp: f64) -> Option<f64> {
    if hr < 0.0 {
        return None;
    }
    safe_div(hr, sbp)
}

pub fn modified_shock_index(hr: f64, map: f64) -> Option<f64> {
    if hr < 0.0 {
        return None;
    }
    safe_div(hr, map)
}

/// LVOT cross-sectional area in cm² from its diameter in cm.
pub fn lvot_area(diameter_cm: f64) -> Option<f64> {
    if !diameter_cm.is_finite() || diameter_cm <= 0.0 {
        return None;
    }
    Some(PI * (diameter_cm / 2.0).powi(2))
}

/// Stroke volume in mL from LVOT diameter and VTI, both in cm.
pub fn stroke_volume(lvot_diameter_cm: f64, vti_cm: f64) -> Option<f64> {
    if !vti_cm.is_finite() || vti_cm <= 0.0 {
        return None;
    }
    lvot_area(lvot_diameter_cm).map(|area| area * vti_cm)
}

/// Mosteller body surface area in m².
pub fn body_surface_area(height_cm: f64, weight_kg: f64) -> Option<f64> {
    let product = height_cm * weight_kg;
    if !product.is_finite() || height_cm <= 0.0 || weight_kg <= 0.0 {
        return None;
    }
    Some((product / 3600.0).sqrt())
}

/// Systemic vascular resistance in dyn·s/cm⁵.
pub fn systemic_vascular_resistance(map: f64, cvp: f64, cardiac_output_l_min: f64) -> Option<f64> {
    if map < cvp {
        return None;
    }
    safe_div(SVR_FACTOR * (map - cvp), cardiac_output_l_min)
}

// ============================================================================
// Calculators
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Map {
    pub map: f64,
}

pub fn score_map(inputs: &Inputs) -> Scored<Map> {
    let mut req = Requirements::new(inputs);
    let sbp = req.number("sbp_mmHg");
    let dbp = req.number("dbp_mmHg");
    req.finish()?;

    let map = mean_arterial_pressure(sbp, dbp)
        .ok_or_else(|| Unscored::undefined("systolic must be at least diastolic"))?;
    Ok(Map {
        map: round_to(map, 1),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShockIndex {
    pub shock_index: f64,
}

pub fn score_shock_index(inputs: &Inputs) -> Scored<ShockIndex> {
    let mut req = Requirements::new(inputs);
    let hr = req.number("hr_bpm");
    let sbp = req.number("sbp_mmHg");
    req.finish()?;

    let si = shock_index(hr, sbp)
        .ok_or_else(|| Unscored::undefined("systolic pressure must be positive"))?;
    Ok(ShockIndex {
        shock_index: round_to(si, 2),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModifiedShockIndex {
    pub modified_shock_index: f64,
}

pub fn score_modified_shock_index(inputs: &Inputs) -> Scored<ModifiedShockIndex> {
    let mut req = Requirements::new(inputs);
    let hr = req.number("hr_bpm");
    let map = req.number("map_mmHg");
    req.finish()?;

    let msi = modified_shock_index(hr, map)
        .ok_or_else(|| Unscored::undefined("mean arterial pressure must be positive"))?;
    Ok(ModifiedShockIndex {
        modified_shock_index: round_to(msi, 2),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StrokeVolume {
    pub stroke_volume: f64,
    pub lvot_area: f64,
}

pub fn score_stroke_volume(inputs: &Inputs) -> Scored<StrokeVolume> {
    let mut req = Requirements::new(inputs);
    let diameter = req.number("lvot_diameter_cm");
    let vti = req.number("vti_cm");
    req.finish()?;

    let area = lvot_area(diameter)
        .ok_or_else(|| Unscored::undefined("LVOT diameter must be positive"))?;
    let sv = stroke_volume(diameter, vti)
        .ok_or_else(|| Unscored::undefined("VTI must be positive"))?;
    Ok(StrokeVolume {
        stroke_volume: round_to(sv, 1),
        lvot_area: round_to(area, 2),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CardiacOutput {
    pub cardiac_output: f64,
    pub stroke_volume: f64,
    pub body_surface_area: Option<f64>,
    pub cardiac_index: Option<f64>,
}

/// Stroke volume comes from `sv_mL` when given, otherwise from LVOT diameter
/// and VTI. Cardiac index is reported when height and weight are both given.
pub fn score_cardiac_output(inputs: &Inputs) -> Scored<CardiacOutput> {
    let mut req = Requirements::new(inputs);
    let hr = req.number("hr_bpm");
    let sv = match inputs.number("sv_mL") {
        Some(sv) => Some(sv),
        None => {
            let diameter = inputs.number("lvot_diameter_cm");
            let vti = inputs.number("vti_cm");
            if diameter.is_none() {
                req.note_missing("sv_mL|lvot_diameter_cm");
            }
            if vti.is_none() {
                req.note_missing("sv_mL|vti_cm");
            }
            match (diameter, vti) {
                (Some(d), Some(v)) => stroke_volume(d, v),
                _ => None,
            }
        }
    };
    req.finish()?;

    let sv = sv
        .filter(|sv| *sv > 0.0)
        .ok_or_else(|| Unscored::undefined("stroke volume must be positive"))?;
    if hr < 0.0 {
        return Err(Unscored::undefined("heart rate cannot be negative"));
    }

    let co = sv * hr / 1000.0;
    let bsa = match (inputs.number("height_cm"), inputs.number("weight_kg")) {
        (Some(h), Some(w)) => body_surface_area(h, w),
        _ => None,
    };
    let ci = bsa.and_then(|bsa| safe_div(co, bsa));

    Ok(CardiacOutput {
        cardiac_output: round_to(co, 2),
        stroke_volume: round_to(sv, 1),
        body_surface_area: bsa.map(|v| round_to(v, 2)),
        cardiac_index: ci.map(|v| round_to(v, 2)),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Svr {
    pub svr: f64,
}

pub fn score_svr(inputs: &Inputs) -> Scored<Svr> {
    let mut req = Requirements::new(inputs);
    let map = req.number("map_mmHg");
    let cvp = req.number("cvp_mmHg");
    let co = req.number("co_L_min");
    req.finish()?;

    let svr = systemic_vascular_resistance(map, cvp, co).ok_or_else(|| {
        Unscored::undefined("cardiac output must be positive and MAP at least CVP")
    })?;
    Ok(Svr {
        svr: round_to(svr, 0),
    })
}

fn run_map(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_map(inputs))
}

fn run_shock_index(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_shock_index(inputs))
}

fn run_modified_shock_index(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_modified_shock_index(inputs))
}

fn run_stroke_volume(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_stroke_volume(inputs))
}

fn run_cardiac_output(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_cardiac_output(inputs))
}

fn run_svr(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score_svr(inputs))
}

pub fn definitions() -> Vec<CalculatorDefinition> {
    vec![
        CalculatorDefinition::builtin(CalculatorId::Map, run_map)
            .inputs(vec![
                InputSpec::required("sbp_mmHg", "mmHg"),
                InputSpec::required("dbp_mmHg", "mmHg"),
            ])
            .headline("map", Some("mmHg"), 1),
        CalculatorDefinition::builtin(CalculatorId::ShockIndex, run_shock_index)
            .inputs(vec![
                InputSpec::required("hr_bpm", "bpm"),
                InputSpec::required("sbp_mmHg", "mmHg"),
            ])
            .headline("shock_index", None, 2),
        CalculatorDefinition::builtin(CalculatorId::ModifiedShockIndex, run_modified_shock_index)
            .inputs(vec![
                InputSpec::required("hr_bpm", "bpm"),
                InputSpec::required("map_mmHg", "mmHg"),
            ])
            .headline("modified_shock_index", None, 2),
        CalculatorDefinition::builtin(CalculatorId::StrokeVolume, run_stroke_volume)
            .inputs(vec![
                InputSpec::required("lvot_diameter_cm", "cm"),
                InputSpec::required("vti_cm", "cm"),
            ])
            .headline("stroke_volume", Some("mL"), 1),
        CalculatorDefinition::builtin(CalculatorId::CardiacOutput, run_cardiac_output)
            .inputs(vec![
                InputSpec::required("hr_bpm", "bpm"),
                InputSpec::optional("sv_mL", "mL"),
                InputSpec::optional("lvot_diameter_cm", "cm"),
                InputSpec::optional("vti_cm", "cm"),
                InputSpec::optional("height_cm", "cm"),
                InputSpec::optional("weight_kg", "kg"),
            ])
            .headline("cardiac_output", Some("L/min"), 2),
        CalculatorDefinition::builtin(CalculatorId::Svr, run_svr)
            .inputs(vec![
                InputSpec::required("map_mmHg", "mmHg"),
                InputSpec::required("cvp_mmHg", "mmHg"),
                InputSpec::required("co_L_min", "L/min"),
            ])
            .headline("svr", Some("dyn·s/cm⁵"), 0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_from_90_over_60() {
        let inputs = Inputs::new().with("sbp_mmHg", 90.0).with("dbp_mmHg", 60.0);
        assert_eq!(score_map(&inputs).unwrap().map, 70.0);
    }

    #[test]
    fn test_map_rejects_inverted_pressures() {
        let inputs = Inputs::new().with("sbp_mmHg", 60.0).with("dbp_mmHg", 90.0);
        assert!(matches!(score_map(&inputs), Err(Unscored::Undefined { .. })));
    }

    #[test]
    fn test_map_needs_both_pressures() {
        let err = score_map(&Inputs::new()).unwrap_err();
        assert_eq!(
            err.missing(),
            &["sbp_mmHg".to_string(), "dbp_mmHg".to_string()]
        );
    }

    #[test]
    fn test_modified_shock_index() {
        let inputs = Inputs::new().with("hr_bpm", 120.0).with("map_mmHg", 60.0);
        let result = score_modified_shock_index(&inputs).unwrap();
        assert_eq!(result.modified_shock_index, 2.0);
    }

    #[test]
    fn test_shock_index_zero_pressure_is_undefined() {
        let inputs = Inputs::new().with("hr_bpm", 120.0).with("sbp_mmHg", 0.0);
        assert!(matches!(
            score_shock_index(&inputs),
            Err(Unscored::Undefined { .. })
        ));
        let inputs = Inputs::new().with("hr_bpm", 90.0).with("sbp_mmHg", 120.0);
        assert_eq!(score_shock_index(&inputs).unwrap().shock_index, 0.75);
    }

    #[test]
    fn test_stroke_volume() {
        // 2 cm LVOT: area = pi
        let inputs = Inputs::new()
            .with("lvot_diameter_cm", 2.0)
            .with("vti_cm", 20.0);
        let result = score_stroke_volume(&inputs).unwrap();
        assert_eq!(result.lvot_area, 3.14);
        assert_eq!(result.stroke_volume, 62.8);
    }

    #[test]
    fn test_cardiac_output_from_stroke_volume_with_index() {
        let inputs = Inputs::new()
            .with("hr_bpm", 80.0)
            .with("sv_mL", 70.0)
            .with("height_cm", 180.0)
            .with("weight_kg", 80.0);
        let result = score_cardiac_output(&inputs).unwrap();
        assert_eq!(result.cardiac_output, 5.6);
        assert_eq!(result.body_surface_area, Some(2.0));
        assert_eq!(result.cardiac_index, Some(2.8));
    }

    #[test]
    fn test_cardiac_output_reports_alternatives() {
        let inputs = Inputs::new().with("hr_bpm", 80.0).with("vti_cm", 20.0);
        let err = score_cardiac_output(&inputs).unwrap_err();
        assert_eq!(err.missing(), &["sv_mL|lvot_diameter_cm".to_string()]);
    }

    #[test]
    fn test_svr() {
        let inputs = Inputs::new()
            .with("map_mmHg", 90.0)
            .with("cvp_mmHg", 10.0)
            .with("co_L_min", 5.0);
        assert_eq!(score_svr(&inputs).unwrap().svr, 1280.0);

        let inputs = inputs.with("co_L_min", 0.0);
        assert!(matches!(score_svr(&inputs), Err(Unscored::Undefined { .. })));
    }

    #[test]
    fn test_body_surface_area_guards() {
        assert_eq!(body_surface_area(0.0, 70.0), None);
        assert_eq!(body_surface_area(170.0, -1.0), None);
    }
}
