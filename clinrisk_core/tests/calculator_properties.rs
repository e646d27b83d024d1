//! Registry-wide properties checked against every built-in calculator.

use clinrisk_core::ranges::round_to;
use clinrisk_core::{builtin_registry, CalculatorId, Inputs, Outcome};

/// A complete, valid input set for each built-in calculator.
fn fixture(id: CalculatorId) -> Inputs {
    match id {
        CalculatorId::ApacheIi => Inputs::new()
            .with("temp_c", 39.5)
            .with("map_mmHg", 65.0)
            .with("hr_bpm", 125.0)
            .with("rr_bpm", 30.0)
            .with("aa_gradient_mmHg", 250.0)
            .with("ph", 7.30)
            .with("sodium_mmol_L", 150.0)
            .with("potassium_mmol_L", 3.2)
            .with("creatinine_mg_dL", 2.1)
            .with("hematocrit_pct", 28.0)
            .with("wbc_k_uL", 16.0)
            .with("gcs", 12.0)
            .with("age_years", 67.0)
            .with("chronic_organ_insufficiency", true)
            .with("postoperative", false),
        CalculatorId::Sofa | CalculatorId::SofaSurrogate => Inputs::new()
            .with("pao2_mmHg", 80.0)
            .with("fio2", 0.5)
            .with("mechanical_ventilation", true)
            .with("platelets_k_uL", 40.0)
            .with("bilirubin_mg_dL", 2.5)
            .with("map_mmHg", 65.0)
            .with("gcs", 13.0)
            .with("creatinine_mg_dL", 1.5)
            .with("urine_mL_day", 350.0),
        CalculatorId::KdigoAki => Inputs::new()
            .with("creatinine_mg_dL", 2.2)
            .with("baseline_creatinine_mg_dL", 1.0),
        CalculatorId::Caprini => Inputs::new()
            .with("age_years", 50.0)
            .with("major_surgery", true),
        CalculatorId::WellsPe => Inputs::new()
            .with("hr_bpm", 110.0)
            .with("hemoptysis", true),
        CalculatorId::Perc => Inputs::new()
            .with("age_years", 40.0)
            .with("hr_bpm", 90.0)
            .with("sao2_pct", 97.0),
        CalculatorId::Map => Inputs::new().with("sbp_mmHg", 120.0).with("dbp_mmHg", 80.0),
        CalculatorId::ShockIndex => Inputs::new().with("hr_bpm", 100.0).with("sbp_mmHg", 120.0),
        CalculatorId::ModifiedShockIndex => {
            Inputs::new().with("hr_bpm", 120.0).with("map_mmHg", 60.0)
        }
        CalculatorId::StrokeVolume => Inputs::new()
            .with("lvot_diameter_cm", 2.0)
            .with("vti_cm", 20.0),
        CalculatorId::CardiacOutput => Inputs::new().with("hr_bpm", 80.0).with("sv_mL", 70.0),
        CalculatorId::Svr => Inputs::new()
            .with("map_mmHg", 90.0)
            .with("cvp_mmHg", 10.0)
            .with("co_L_min", 5.0),
        CalculatorId::PfRatio => Inputs::new().with("pao2_mmHg", 80.0).with("fio2", 0.4),
        CalculatorId::AaGradient => Inputs::new()
            .with("pao2_mmHg", 80.0)
            .with("paco2_mmHg", 40.0)
            .with("fio2", 0.21),
        CalculatorId::VentMechanics => Inputs::new()
            .with("tidal_volume_mL", 450.0)
            .with("plateau_cmH2O", 25.0)
            .with("peep_cmH2O", 5.0),
        CalculatorId::Rsbi => Inputs::new().with("rr_bpm", 20.0).with("tidal_volume_mL", 400.0),
        CalculatorId::DkaSeverity => Inputs::new()
            .with("glucose_mg_dL", 400.0)
            .with("ph", 7.2)
            .with("bicarbonate_mmol_L", 12.0)
            .with("ketones_positive", true),
        CalculatorId::ArdsBerlin => Inputs::new()
            .with("pao2_mmHg", 80.0)
            .with("fio2", 0.5)
            .with("peep_cmH2O", 8.0)
            .with("onset_within_1_week", true)
            .with("bilateral_opacities", true)
            .with("not_explained_by_cardiac_failure", true),
        CalculatorId::SepsisBundle => Inputs::new()
            .with("rr_bpm", 24.0)
            .with("sbp_mmHg", 85.0)
            .with("altered_mentation", false)
            .with("lactate_mmol_L", 3.0),
        CalculatorId::ShockIndexClass => {
            Inputs::new().with("hr_bpm", 120.0).with("sbp_mmHg", 100.0)
        }
    }
}

#[test]
fn every_fixture_scores() {
    let registry = builtin_registry().unwrap();
    for id in CalculatorId::ALL {
        let outcome = registry.run(id.as_str(), &fixture(id)).unwrap();
        assert!(outcome.is_scored(), "{} did not score: {:?}", id, outcome);
    }
}

#[test]
fn removing_a_required_field_never_scores() {
    let registry = builtin_registry().unwrap();
    for id in CalculatorId::ALL {
        let definition = registry.get(id.as_str()).unwrap();
        for key in definition.required_keys() {
            let mut inputs = fixture(id);
            inputs.remove(key);

            match registry.run(id.as_str(), &inputs).unwrap() {
                Outcome::Needs(missing) => assert!(
                    missing
                        .needs
                        .iter()
                        .any(|need| need.split('|').any(|k| k == key)),
                    "{} without {} reported {:?}",
                    id,
                    key,
                    missing.needs
                ),
                Outcome::Undefined { .. } => {}
                Outcome::Scored(json) => panic!("{} scored without {}: {}", id, key, json),
            }
        }
    }
}

#[test]
fn non_finite_required_values_count_as_missing() {
    let registry = builtin_registry().unwrap();
    let inputs = fixture(CalculatorId::Map).with("sbp_mmHg", f64::NAN);
    let outcome = registry.run("map", &inputs).unwrap();
    assert_eq!(outcome.needs(), Some(&["sbp_mmHg".to_string()][..]));
}

#[test]
fn calculators_are_idempotent() {
    let registry = builtin_registry().unwrap();
    for id in CalculatorId::ALL {
        let inputs = fixture(id);
        let first = serde_json::to_string(&registry.run(id.as_str(), &inputs).unwrap()).unwrap();
        let second = serde_json::to_string(&registry.run(id.as_str(), &inputs).unwrap()).unwrap();
        assert_eq!(first, second, "{} is not deterministic", id);
    }
}

#[test]
fn empty_inputs_never_score() {
    let registry = builtin_registry().unwrap();
    for id in CalculatorId::ALL {
        let outcome = registry.run(id.as_str(), &Inputs::new()).unwrap();
        assert!(!outcome.is_scored(), "{} scored empty inputs", id);
    }
}

#[test]
fn envelopes_keep_full_detail() {
    let registry = builtin_registry().unwrap();
    for id in CalculatorId::ALL {
        let inputs = fixture(id);
        let outcome = registry.run(id.as_str(), &inputs).unwrap();
        let envelope = registry.envelope(id.as_str(), &inputs).unwrap();
        assert_eq!(envelope.id, id.as_str());
        assert_eq!(envelope.detail, serde_json::to_value(&outcome).unwrap());
    }
}

#[test]
fn documented_fixtures() {
    let registry = builtin_registry().unwrap();

    let map = registry
        .run("map", &Inputs::new().with("sbp_mmHg", 90.0).with("dbp_mmHg", 60.0))
        .unwrap();
    assert_eq!(map.number("map"), Some(70.0));

    let sofa = registry.run("sofa", &fixture(CalculatorId::Sofa)).unwrap();
    let Outcome::Scored(json) = sofa else {
        panic!("sofa did not score");
    };
    assert_eq!(json["subscores"]["coagulation"], 3);
    let subscores: i64 = json["subscores"]
        .as_object()
        .unwrap()
        .values()
        .filter_map(|v| v.as_i64())
        .sum();
    assert_eq!(json["total"].as_i64(), Some(subscores));

    let kdigo = registry.run("kdigo_aki", &fixture(CalculatorId::KdigoAki)).unwrap();
    assert_eq!(kdigo.number("stage"), Some(2.0));
}

#[test]
fn kdigo_ratio_thresholds_hold_for_any_baseline() {
    let registry = builtin_registry().unwrap();
    for baseline in [0.1, 0.2, 0.3, 0.6, 0.7, 0.9, 1.1, 1.3] {
        for (multiple, stage) in [(1.5, 1.0), (2.0, 2.0), (3.0, 3.0)] {
            let current = round_to(baseline * multiple, 3);
            let inputs = Inputs::new()
                .with("creatinine_mg_dL", current)
                .with("baseline_creatinine_mg_dL", baseline);
            let outcome = registry.run("kdigo_aki", &inputs).unwrap();
            assert_eq!(
                outcome.number("creatinine_ratio"),
                Some(multiple),
                "{} / {}",
                current,
                baseline
            );
            assert_eq!(outcome.number("stage"), Some(stage), "{} / {}", current, baseline);
        }
    }
}
