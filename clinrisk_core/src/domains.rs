//! Domain risk aggregation and the built-in domain rule sets.
//!
//! Each domain (cardiovascular, metabolic, renal) owns a rule set with one
//! insufficient-data sentinel. [`aggregate`] normalizes rule evaluations into
//! a labelled [`DomainResult`] using the domain's configured cutoffs.

use crate::config::{Config, DomainSettings};
use crate::features::{engineer_features, Demographics, EngineeredFeatures, Observation, WindowKey};
use crate::ranges::{round_to, safe_div};
use crate::rules::{evaluate_rules, RiskFactor, Rule, RuleEvaluation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Cardiovascular,
    Metabolic,
    Renal,
}

impl Condition {
    pub const ALL: [Condition; 3] = [
        Condition::Cardiovascular,
        Condition::Metabolic,
        Condition::Renal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Cardiovascular => "cardiovascular",
            Condition::Metabolic => "metabolic",
            Condition::Renal => "renal",
        }
    }

    /// Built-in rule set for this domain
    pub fn rules(&self) -> Vec<Rule> {
        match self {
            Condition::Cardiovascular => cardiovascular_rules(),
            Condition::Metabolic => metabolic_rules(),
            Condition::Renal => renal_rules(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLabel {
    Low,
    Moderate,
    High,
    InsufficientData,
}

impl RiskLabel {
    /// Label for a normalized score in `[0, 1]`.
    pub fn from_ratio(ratio: f64, settings: &DomainSettings) -> Self {
        if ratio >= settings.high {
            RiskLabel::High
        } else if ratio >= settings.moderate {
            RiskLabel::Moderate
        } else {
            RiskLabel::Low
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResult {
    pub condition: Condition,
    /// `raw_score / max_score` clamped to `[0, 1]`, 3 decimals
    pub risk_score: f64,
    pub raw_score: f64,
    pub max_score: f64,
    pub risk_label: RiskLabel,
    pub top_factors: Vec<RiskFactor>,
    pub generated_at: DateTime<Utc>,
}

/// Combine one or more evaluations for `condition` into a labelled result.
///
/// When the only rules that fired are insufficient-data sentinels the label is
/// [`RiskLabel::InsufficientData`] with a score of 0, never a false "low".
pub fn aggregate(
    condition: Condition,
    evaluations: &[RuleEvaluation],
    settings: &DomainSettings,
    generated_at: DateTime<Utc>,
) -> DomainResult {
    let raw_score: f64 = evaluations.iter().map(|e| e.score).sum();
    let max_score: f64 = evaluations.iter().map(|e| e.max_score).sum();
    let sentinel_fired = evaluations.iter().any(|e| e.sentinel_fired);
    let substantive_fired = evaluations.iter().any(|e| e.substantive_fired);

    let mut factors: Vec<RiskFactor> = evaluations
        .iter()
        .flat_map(|e| e.factors.iter().cloned())
        .collect();
    factors.sort_by(|a, b| b.impact.total_cmp(&a.impact));
    factors.truncate(settings.top_factors);

    let (risk_score, risk_label) = if sentinel_fired && !substantive_fired {
        (0.0, RiskLabel::InsufficientData)
    } else {
        let ratio = safe_div(raw_score, max_score).unwrap_or(0.0).clamp(0.0, 1.0);
        (round_to(ratio, 3), RiskLabel::from_ratio(ratio, settings))
    };

    tracing::debug!(
        "{} risk {:?} ({} of {})",
        condition,
        risk_label,
        raw_score,
        max_score
    );

    DomainResult {
        condition,
        risk_score,
        raw_score,
        max_score,
        risk_label,
        top_factors: factors,
        generated_at,
    }
}

/// Engineer features once and evaluate every built-in domain against them.
///
/// `now` is both the window reference time and `generated_at`.
pub fn evaluate_domains(
    observations: &[Observation],
    now: DateTime<Utc>,
    demographics: Demographics,
    config: &Config,
) -> Vec<DomainResult> {
    let features = engineer_features(observations, now, demographics);
    Condition::ALL
        .iter()
        .map(|condition| {
            let evaluation = evaluate_rules(&features, &condition.rules());
            aggregate(*condition, &[evaluation], config.domains.get(*condition), now)
        })
        .collect()
}

// ============================================================================
// Built-in rule sets
// ============================================================================

fn latest_year(f: &EngineeredFeatures, metric: &str) -> Option<f64> {
    f.latest(WindowKey::Days365, metric)
}

/// True when none of `metrics` has a reading in the window its rules read.
/// Readings older than that window are stale and do not count as data.
fn no_current_data(f: &EngineeredFeatures, metrics: &[(&str, WindowKey)]) -> bool {
    metrics.iter().all(|(metric, window)| f.count(*window, metric) == 0)
}

pub fn cardiovascular_rules() -> Vec<Rule> {
    vec![
        Rule::new("cv_sbp_stage2", "Stage 2 hypertension", 3.0, |f: &EngineeredFeatures| {
            f.mean(WindowKey::Days30, "sbp").is_some_and(|v| v >= 140.0)
        })
        .detail(|f: &EngineeredFeatures| {
            f.mean(WindowKey::Days30, "sbp")
                .map(|v| format!("30-day mean systolic {:.0} mmHg", v))
        }),
        Rule::new("cv_sbp_elevated", "Elevated blood pressure", 1.5, |f: &EngineeredFeatures| {
            f.mean(WindowKey::Days30, "sbp")
                .is_some_and(|v| (130.0..140.0).contains(&v))
        })
        .detail(|f: &EngineeredFeatures| {
            f.mean(WindowKey::Days30, "sbp")
                .map(|v| format!("30-day mean systolic {:.0} mmHg", v))
        }),
        Rule::new("cv_ldl_high", "High LDL cholesterol", 2.0, |f: &EngineeredFeatures| {
            latest_year(f, "ldl").is_some_and(|v| v >= 160.0)
        })
        .detail(|f: &EngineeredFeatures| {
            latest_year(f, "ldl").map(|v| format!("latest LDL {:.0} mg/dL", v))
        }),
        Rule::new("cv_hdl_low", "Low HDL cholesterol", 1.0, |f: &EngineeredFeatures| {
            latest_year(f, "hdl").is_some_and(|v| v < 40.0)
        }),
        Rule::new("cv_age", "Age 65 or over", 1.0, |f: &EngineeredFeatures| {
            f.demographics.age.is_some_and(|age| age >= 65.0)
        }),
        Rule::new("cv_hdl_protective", "Protective HDL cholesterol", -1.0, |f: &EngineeredFeatures| {
            latest_year(f, "hdl").is_some_and(|v| v >= 60.0)
        }),
        Rule::new(
            "cv_insufficient_data",
            "No current blood pressure or lipid results",
            0.0,
            |f: &EngineeredFeatures| {
                no_current_data(
                    f,
                    &[
                        ("sbp", WindowKey::Days30),
                        ("ldl", WindowKey::Days365),
                        ("hdl", WindowKey::Days365),
                    ],
                )
            },
        )
        .insufficient_data_sentinel(),
    ]
}

pub fn metabolic_rules() -> Vec<Rule> {
    vec![
        Rule::new("met_hba1c_diabetes", "HbA1c in diabetic range", 3.0, |f: &EngineeredFeatures| {
            latest_year(f, "hba1c").is_some_and(|v| v >= 6.5)
        })
        .detail(|f: &EngineeredFeatures| {
            latest_year(f, "hba1c").map(|v| format!("latest HbA1c {:.1}%", v))
        }),
        Rule::new("met_hba1c_prediabetes", "HbA1c in prediabetic range", 1.5, |f: &EngineeredFeatures| {
            latest_year(f, "hba1c").is_some_and(|v| (5.7..6.5).contains(&v))
        }),
        Rule::new("met_glucose_high", "Elevated fasting glucose", 2.0, |f: &EngineeredFeatures| {
            f.mean(WindowKey::Days90, "glucose").is_some_and(|v| v >= 126.0)
        })
        .detail(|f: &EngineeredFeatures| {
            f.mean(WindowKey::Days90, "glucose")
                .map(|v| format!("90-day mean glucose {:.0} mg/dL", v))
        }),
        Rule::new("met_bmi_obese", "BMI 30 or over", 2.0, |f: &EngineeredFeatures| {
            latest_year(f, "bmi").is_some_and(|v| v >= 30.0)
        }),
        Rule::new("met_triglycerides_high", "High triglycerides", 1.0, |f: &EngineeredFeatures| {
            latest_year(f, "triglycerides").is_some_and(|v| v >= 150.0)
        }),
        Rule::new("met_hba1c_improving", "HbA1c trending down", -1.0, |f: &EngineeredFeatures| {
            match (f.mean(WindowKey::Days90, "hba1c"), f.mean(WindowKey::Days365, "hba1c")) {
                (Some(recent), Some(year)) => recent <= year - 0.3,
                _ => false,
            }
        }),
        Rule::new(
            "met_insufficient_data",
            "No current HbA1c or glucose results",
            0.0,
            |f: &EngineeredFeatures| {
                no_current_data(f, &[("hba1c", WindowKey::Days365), ("glucose", WindowKey::Days90)])
            },
        )
        .insufficient_data_sentinel(),
    ]
}

pub fn renal_rules() -> Vec<Rule> {
    vec![
        Rule::new("renal_egfr_low", "eGFR below 60", 3.0, |f: &EngineeredFeatures| {
            latest_year(f, "egfr").is_some_and(|v| v < 60.0)
        })
        .detail(|f: &EngineeredFeatures| {
            latest_year(f, "egfr").map(|v| format!("latest eGFR {:.0} mL/min/1.73m2", v))
        }),
        Rule::new("renal_egfr_severe", "eGFR below 30", 2.0, |f: &EngineeredFeatures| {
            latest_year(f, "egfr").is_some_and(|v| v < 30.0)
        }),
        Rule::new("renal_uacr_high", "Albuminuria", 2.0, |f: &EngineeredFeatures| {
            latest_year(f, "uacr").is_some_and(|v| v >= 30.0)
        })
        .detail(|f: &EngineeredFeatures| {
            latest_year(f, "uacr").map(|v| format!("latest UACR {:.0} mg/g", v))
        }),
        Rule::new("renal_potassium_high", "Hyperkalemia", 1.0, |f: &EngineeredFeatures| {
            f.latest(WindowKey::Days30, "potassium").is_some_and(|v| v >= 5.5)
        }),
        Rule::new("renal_creatinine_rising", "Creatinine rising", 1.5, |f: &EngineeredFeatures| {
            match (
                f.latest(WindowKey::Days30, "creatinine"),
                f.mean(WindowKey::Days365, "creatinine"),
            ) {
                (Some(recent), Some(year)) => recent >= year * 1.3,
                _ => false,
            }
        }),
        Rule::new("renal_egfr_preserved", "eGFR 90 or over", -1.0, |f: &EngineeredFeatures| {
            latest_year(f, "egfr").is_some_and(|v| v >= 90.0)
        }),
        Rule::new(
            "renal_insufficient_data",
            "No current eGFR or creatinine results",
            0.0,
            |f: &EngineeredFeatures| {
                no_current_data(f, &[("egfr", WindowKey::Days365), ("creatinine", WindowKey::Days30)])
            },
        )
        .insufficient_data_sentinel(),
    ]
}
