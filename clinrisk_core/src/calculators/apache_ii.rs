//! APACHE II severity score.
//!
//! Total = acute physiology score (twelve banded variables, GCS scored as
//! `15 - GCS`) + age points + chronic health points.
//!
//! Oxygenation is scored from the A-a gradient when one is supplied and from
//! PaO2 otherwise. Both are never scored together.

use crate::inputs::{Inputs, Requirements, Scored, Unscored};
use crate::ranges::{Band, RangeTable};
use crate::registry::{CalculatorDefinition, CalculatorId, InputSpec, Outcome};
use serde::Serialize;

pub static TEMPERATURE: RangeTable = RangeTable::new(
    "apache_ii.temperature_c",
    1,
    &[
        Band::at_least(41.0, 4),
        Band::new(39.0, 40.9, 3),
        Band::new(38.5, 38.9, 1),
        Band::new(36.0, 38.4, 0),
        Band::new(34.0, 35.9, 1),
        Band::new(32.0, 33.9, 2),
        Band::new(30.0, 31.9, 3),
        Band::at_most(29.9, 4),
    ],
);

pub static MEAN_ARTERIAL_PRESSURE: RangeTable = RangeTable::new(
    "apache_ii.map_mmHg",
    0,
    &[
        Band::at_least(160.0, 4),
        Band::new(130.0, 159.0, 3),
        Band::new(110.0, 129.0, 2),
        Band::new(70.0, 109.0, 0),
        Band::new(50.0, 69.0, 2),
        Band::at_most(49.0, 4),
    ],
);

pub static HEART_RATE: RangeTable = RangeTable::new(
    "apache_ii.hr_bpm",
    0,
    &[
        Band::at_least(180.0, 4),
        Band::new(140.0, 179.0, 3),
        Band::new(110.0, 139.0, 2),
        Band::new(70.0, 109.0, 0),
        Band::new(55.0, 69.0, 2),
        Band::new(40.0, 54.0, 3),
        Band::at_most(39.0, 4),
    ],
);

pub static RESPIRATORY_RATE: RangeTable = RangeTable::new(
    "apache_ii.rr_bpm",
    0,
    &[
        Band::at_least(50.0, 4),
        Band::new(35.0, 49.0, 3),
        Band::new(25.0, 34.0, 1),
        Band::new(12.0, 24.0, 0),
        Band::new(10.0, 11.0, 1),
        Band::new(6.0, 9.0, 2),
        Band::at_most(5.0, 4),
    ],
);

pub static AA_GRADIENT: RangeTable = RangeTable::new(
    "apache_ii.aa_gradient_mmHg",
    0,
    &[
        Band::at_least(500.0, 4),
        Band::new(350.0, 499.0, 3),
        Band::new(200.0, 349.0, 2),
        Band::at_most(199.0, 0),
    ],
);

pub static PAO2: RangeTable = RangeTable::new(
    "apache_ii.pao2_mmHg",
    0,
    &[
        Band::at_least(71.0, 0),
        Band::new(61.0, 70.0, 1),
        Band::new(55.0, 60.0, 3),
        Band::at_most(54.0, 4),
    ],
);

pub static ARTERIAL_PH: RangeTable = RangeTable::new(
    "apache_ii.ph",
    2,
    &[
        Band::at_least(7.70, 4),
        Band::new(7.60, 7.69, 3),
        Band::new(7.50, 7.59, 1),
        Band::new(7.33, 7.49, 0),
        Band::new(7.25, 7.32, 2),
        Band::new(7.15, 7.24, 3),
        Band::at_most(7.14, 4),
    ],
);

pub static SODIUM: RangeTable = RangeTable::new(
    "apache_ii.sodium_mmol_L",
    0,
    &[
        Band::at_least(180.0, 4),
        Band::new(160.0, 179.0, 3),
        Band::new(155.0, 159.0, 2),
        Band::new(150.0, 154.0, 1),
        Band::new(130.0, 149.0, 0),
        Band::new(120.0, 129.0, 2),
        Band::new(111.0, 119.0, 3),
        Band::at_most(110.0, 4),
    ],
);

pub static POTASSIUM: RangeTable = RangeTable::new(
    "apache_ii.potassium_mmol_L",
    1,
    &[
        Band::at_least(7.0, 4),
        Band::new(6.0, 6.9, 3),
        Band::new(5.5, 5.9, 1),
        Band::new(3.5, 5.4, 0),
        Band::new(3.0, 3.4, 1),
        Band::new(2.5, 2.9, 2),
        Band::at_most(2.4, 4),
    ],
);

pub static CREATININE: RangeTable = RangeTable::new(
    "apache_ii.creatinine_mg_dL",
    1,
    &[
        Band::at_least(3.5, 4),
        Band::new(2.0, 3.4, 3),
        Band::new(1.5, 1.9, 2),
        Band::new(0.6, 1.4, 0),
        Band::at_most(0.5, 2),
    ],
);

pub static HEMATOCRIT: RangeTable = RangeTable::new(
    "apache_ii.hematocrit_pct",
    1,
    &[
        Band::at_least(60.0, 4),
        Band::new(50.0, 59.9, 2),
        Band::new(46.0, 49.9, 1),
        Band::new(30.0, 45.9, 0),
        Band::new(20.0, 29.9, 2),
        Band::at_most(19.9, 4),
    ],
);

pub static WHITE_BLOOD_CELLS: RangeTable = RangeTable::new(
    "apache_ii.wbc_k_uL",
    1,
    &[
        Band::at_least(40.0, 4),
        Band::new(20.0, 39.9, 2),
        Band::new(15.0, 19.9, 1),
        Band::new(3.0, 14.9, 0),
        Band::new(1.0, 2.9, 2),
        Band::at_most(0.9, 4),
    ],
);

pub static AGE: RangeTable = RangeTable::new(
    "apache_ii.age_years",
    0,
    &[
        Band::at_least(75.0, 6),
        Band::new(65.0, 74.0, 5),
        Band::new(55.0, 64.0, 3),
        Band::new(45.0, 54.0, 2),
        Band::at_most(44.0, 0),
    ],
);

static TABLES: &[&RangeTable] = &[
    &TEMPERATURE,
    &MEAN_ARTERIAL_PRESSURE,
    &HEART_RATE,
    &RESPIRATORY_RATE,
    &AA_GRADIENT,
    &PAO2,
    &ARTERIAL_PH,
    &SODIUM,
    &POTASSIUM,
    &CREATININE,
    &HEMATOCRIT,
    &WHITE_BLOOD_CELLS,
    &AGE,
];

/// Chronic health points for organ insufficiency or immunocompromise.
const CHRONIC_NONOPERATIVE_POINTS: i32 = 5;
const CHRONIC_ELECTIVE_POSTOP_POINTS: i32 = 2;

/// Which measurement the oxygenation subscore was taken from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OxygenationBasis {
    AaGradient,
    Pao2,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Apache2Subscores {
    pub temperature: i32,
    pub mean_arterial_pressure: i32,
    pub heart_rate: i32,
    pub respiratory_rate: i32,
    pub oxygenation: i32,
    pub arterial_ph: i32,
    pub sodium: i32,
    pub potassium: i32,
    pub creatinine: i32,
    pub hematocrit: i32,
    pub white_blood_cells: i32,
    pub glasgow_coma: i32,
}

impl Apache2Subscores {
    pub fn sum(&self) -> i32 {
        self.temperature
            + self.mean_arterial_pressure
            + self.heart_rate
            + self.respiratory_rate
            + self.oxygenation
            + self.arterial_ph
            + self.sodium
            + self.potassium
            + self.creatinine
            + self.hematocrit
            + self.white_blood_cells
            + self.glasgow_coma
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Apache2Score {
    pub total: i32,
    /// Acute physiology score
    pub aps: i32,
    pub age_points: i32,
    pub chronic_points: i32,
    pub oxygenation_basis: OxygenationBasis,
    pub subscores: Apache2Subscores,
}

/// Score APACHE II from raw inputs.
pub fn score(inputs: &Inputs) -> Scored<Apache2Score> {
    let mut req = Requirements::new(inputs);
    let temperature = req.number("temp_c");
    let map = req.number("map_mmHg");
    let heart_rate = req.number("hr_bpm");
    let respiratory_rate = req.number("rr_bpm");

    let oxygenation = match (inputs.number("aa_gradient_mmHg"), inputs.number("pao2_mmHg")) {
        (Some(gradient), _) => Some((OxygenationBasis::AaGradient, AA_GRADIENT.score(gradient))),
        (None, Some(pao2)) => Some((OxygenationBasis::Pao2, PAO2.score(pao2))),
        (None, None) => {
            req.note_missing("aa_gradient_mmHg|pao2_mmHg");
            None
        }
    };

    let ph = req.number("ph");
    let sodium = req.number("sodium_mmol_L");
    let potassium = req.number("potassium_mmol_L");
    let creatinine = req.number("creatinine_mg_dL");
    let hematocrit = req.number("hematocrit_pct");
    let wbc = req.number("wbc_k_uL");
    let gcs = req.number("gcs");
    let age = req.number("age_years");
    let chronic = req.flag("chronic_organ_insufficiency");
    let postoperative = if chronic {
        req.flag("postoperative")
    } else {
        false
    };
    req.finish()?;

    let Some((oxygenation_basis, oxygenation_points)) = oxygenation else {
        return Err(Unscored::needs(["aa_gradient_mmHg|pao2_mmHg"]));
    };

    let gcs = gcs.round();
    if !(3.0..=15.0).contains(&gcs) {
        return Err(Unscored::undefined("gcs must be between 3 and 15"));
    }

    let mut creatinine_points = CREATININE.score(creatinine);
    if inputs.flag_or_false("acute_renal_failure") {
        creatinine_points *= 2;
    }

    let subscores = Apache2Subscores {
        temperature: TEMPERATURE.score(temperature),
        mean_arterial_pressure: MEAN_ARTERIAL_PRESSURE.score(map),
        heart_rate: HEART_RATE.score(heart_rate),
        respiratory_rate: RESPIRATORY_RATE.score(respiratory_rate),
        oxygenation: oxygenation_points,
        arterial_ph: ARTERIAL_PH.score(ph),
        sodium: SODIUM.score(sodium),
        potassium: POTASSIUM.score(potassium),
        creatinine: creatinine_points,
        hematocrit: HEMATOCRIT.score(hematocrit),
        white_blood_cells: WHITE_BLOOD_CELLS.score(wbc),
        glasgow_coma: 15 - gcs as i32,
    };

    let chronic_points = chronic_health_points(
        chronic,
        postoperative,
        inputs.flag_or_false("emergency_surgery"),
    );
    let aps = subscores.sum();
    let age_points = AGE.score(age);

    Ok(Apache2Score {
        total: aps + age_points + chronic_points,
        aps,
        age_points,
        chronic_points,
        oxygenation_basis,
        subscores,
    })
}

/// 5 points for non-operative or emergency post-operative admissions with
/// chronic organ insufficiency, 2 for elective post-operative, else 0.
pub fn chronic_health_points(chronic: bool, postoperative: bool, emergency: bool) -> i32 {
    match (chronic, postoperative, emergency) {
        (false, _, _) => 0,
        (true, false, _) | (true, true, true) => CHRONIC_NONOPERATIVE_POINTS,
        (true, true, false) => CHRONIC_ELECTIVE_POSTOP_POINTS,
    }
}

fn run(inputs: &Inputs) -> Outcome {
    Outcome::from_scored(score(inputs))
}

pub fn definitions() -> Vec<CalculatorDefinition> {
    vec![CalculatorDefinition::builtin(CalculatorId::ApacheIi, run)
        .inputs(vec![
            InputSpec::required("temp_c", "°C"),
            InputSpec::required("map_mmHg", "mmHg"),
            InputSpec::required("hr_bpm", "beats/min"),
            InputSpec::required("rr_bpm", "breaths/min"),
            InputSpec::optional("aa_gradient_mmHg", "mmHg"),
            InputSpec::optional("pao2_mmHg", "mmHg"),
            InputSpec::required("ph", "pH"),
            InputSpec::required("sodium_mmol_L", "mmol/L"),
            InputSpec::required("potassium_mmol_L", "mmol/L"),
            InputSpec::required("creatinine_mg_dL", "mg/dL"),
            InputSpec::required("hematocrit_pct", "%"),
            InputSpec::required("wbc_k_uL", "10^3/uL"),
            InputSpec::required_plain("gcs"),
            InputSpec::required("age_years", "years"),
            InputSpec::required_plain("chronic_organ_insufficiency"),
            InputSpec::optional_plain("postoperative"),
            InputSpec::optional_plain("emergency_surgery"),
            InputSpec::optional_plain("acute_renal_failure"),
        ])
        .headline("total", Some("points"), 0)
        .tables(TABLES)]
}
