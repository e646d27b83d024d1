//! Weighted rule evaluation over engineered features.

use crate::features::EngineeredFeatures;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Predicate = Box<dyn Fn(&EngineeredFeatures) -> bool + Send + Sync>;
pub type DetailFn = Box<dyn Fn(&EngineeredFeatures) -> Option<String> + Send + Sync>;

/// Whether a factor pushes risk up or down
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increases,
    Decreases,
}

impl Direction {
    /// Direction implied by the sign of a weight; zero counts as increasing.
    pub fn from_weight(weight: f64) -> Self {
        if weight < 0.0 {
            Direction::Decreases
        } else {
            Direction::Increases
        }
    }
}

/// A named, weighted predicate.
pub struct Rule {
    id: String,
    label: String,
    weight: f64,
    direction: Option<Direction>,
    predicate: Predicate,
    detail: Option<DetailFn>,
    sentinel: bool,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        weight: f64,
        predicate: impl Fn(&EngineeredFeatures) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            weight,
            direction: None,
            predicate: Box::new(predicate),
            detail: None,
            sentinel: false,
        }
    }

    /// Override the direction inferred from the weight's sign.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn detail(
        mut self,
        detail: impl Fn(&EngineeredFeatures) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.detail = Some(Box::new(detail));
        self
    }

    /// Mark this rule as the "not enough data" signal of its rule set.
    /// Sentinels never count toward `max_score`.
    pub fn insufficient_data_sentinel(mut self) -> Self {
        self.sentinel = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn is_sentinel(&self) -> bool {
        self.sentinel
    }

    pub fn effective_direction(&self) -> Direction {
        self.direction.unwrap_or_else(|| Direction::from_weight(self.weight))
    }

    pub fn applies(&self, features: &EngineeredFeatures) -> bool {
        (self.predicate)(features)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("weight", &self.weight)
            .field("direction", &self.direction)
            .field("sentinel", &self.sentinel)
            .finish()
    }
}

/// A rule that fired.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    pub rule_id: String,
    pub name: String,
    pub impact: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub direction: Direction,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluation {
    /// Sum of the weights of every rule that fired
    pub score: f64,
    /// Sum of the positive weights of the non-sentinel rules that fired
    pub max_score: f64,
    /// Fired rules, highest impact first; ties keep rule order
    pub factors: Vec<RiskFactor>,
    pub sentinel_fired: bool,
    pub substantive_fired: bool,
}

/// Evaluate every rule against the same snapshot. No rule is skipped.
pub fn evaluate_rules(features: &EngineeredFeatures, rules: &[Rule]) -> RuleEvaluation {
    let mut evaluation = RuleEvaluation::default();

    for rule in rules {
        if !rule.applies(features) {
            continue;
        }

        tracing::trace!("Rule '{}' fired (weight {})", rule.id(), rule.weight());
        evaluation.score += rule.weight();
        if rule.is_sentinel() {
            evaluation.sentinel_fired = true;
        } else {
            evaluation.substantive_fired = true;
            if rule.weight() > 0.0 {
                evaluation.max_score += rule.weight();
            }
        }
        evaluation.factors.push(RiskFactor {
            rule_id: rule.id().to_string(),
            name: rule.label().to_string(),
            impact: rule.weight(),
            detail: rule.detail.as_ref().and_then(|detail| detail(features)),
            direction: rule.effective_direction(),
        });
    }

    // Vec::sort_by is stable
    evaluation
        .factors
        .sort_by(|a, b| b.impact.total_cmp(&a.impact));
    evaluation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{engineer_features, Demographics, Observation, WindowKey};
    use chrono::{Duration, TimeZone, Utc};

    fn features() -> EngineeredFeatures {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let observations = vec![Observation::new("sbp", 150.0, now - Duration::days(2))];
        engineer_features(&observations, now, Demographics::default())
    }

    fn always(_: &EngineeredFeatures) -> bool {
        true
    }

    fn never(_: &EngineeredFeatures) -> bool {
        false
    }

    #[test]
    fn test_score_is_sum_of_fired_impacts() {
        let rules = vec![
            Rule::new("a", "A", 2.0, always),
            Rule::new("b", "B", 1.0, never),
            Rule::new("c", "C", -0.5, always),
            Rule::new("d", "D", 3.0, |f: &EngineeredFeatures| {
                f.mean(WindowKey::Days7, "sbp").is_some_and(|sbp| sbp >= 140.0)
            }),
        ];
        let evaluation = evaluate_rules(&features(), &rules);

        let impacts: f64 = evaluation.factors.iter().map(|f| f.impact).sum();
        assert_eq!(evaluation.score, impacts);
        assert_eq!(evaluation.score, 4.5);
        // "b" never fired and "c" is negative
        assert_eq!(evaluation.max_score, 5.0);
        assert!(evaluation.substantive_fired);
        assert!(!evaluation.sentinel_fired);
    }

    #[test]
    fn test_factors_sorted_by_impact_with_stable_ties() {
        let rules = vec![
            Rule::new("low", "Low", 1.0, always),
            Rule::new("tie_first", "Tie first", 2.0, always),
            Rule::new("negative", "Negative", -1.0, always),
            Rule::new("tie_second", "Tie second", 2.0, always),
        ];
        let evaluation = evaluate_rules(&features(), &rules);
        let order: Vec<&str> = evaluation.factors.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(order, vec!["tie_first", "tie_second", "low", "negative"]);
    }

    #[test]
    fn test_max_score_counts_only_fired_positive_weights() {
        let rules = vec![
            Rule::new("fired", "Fired", 3.0, always),
            Rule::new("idle", "Idle", 10.0, never),
            Rule::new("protective", "Protective", -1.0, always),
        ];
        let evaluation = evaluate_rules(&features(), &rules);
        assert_eq!(evaluation.score, 2.0);
        assert_eq!(evaluation.max_score, 3.0);

        let quiet = evaluate_rules(&features(), &[Rule::new("idle", "Idle", 10.0, never)]);
        assert_eq!(quiet.max_score, 0.0);
        assert!(quiet.factors.is_empty());
    }

    #[test]
    fn test_direction_inferred_or_explicit() {
        let rules = vec![
            Rule::new("up", "Up", 1.0, always),
            Rule::new("down", "Down", -1.0, always),
            Rule::new("forced", "Forced", 1.0, always).direction(Direction::Decreases),
        ];
        let evaluation = evaluate_rules(&features(), &rules);
        let direction = |id: &str| {
            evaluation
                .factors
                .iter()
                .find(|f| f.rule_id == id)
                .map(|f| f.direction)
        };
        assert_eq!(direction("up"), Some(Direction::Increases));
        assert_eq!(direction("down"), Some(Direction::Decreases));
        assert_eq!(direction("forced"), Some(Direction::Decreases));
    }

    #[test]
    fn test_sentinel_excluded_from_max_score() {
        let rules = vec![
            Rule::new("real", "Real", 2.0, never),
            Rule::new("no_data", "No data", 0.5, always).insufficient_data_sentinel(),
        ];
        let evaluation = evaluate_rules(&features(), &rules);
        assert_eq!(evaluation.score, 0.5);
        assert_eq!(evaluation.max_score, 0.0);
        assert!(evaluation.sentinel_fired);
        assert!(!evaluation.substantive_fired);
    }

    #[test]
    fn test_detail_is_attached() {
        let rules = vec![Rule::new("a", "A", 1.0, always)
            .detail(|f: &EngineeredFeatures| {
                f.mean(WindowKey::Days7, "sbp").map(|v| format!("sbp {:.0}", v))
            })];
        let evaluation = evaluate_rules(&features(), &rules);
        assert_eq!(evaluation.factors[0].detail.as_deref(), Some("sbp 150"));
    }
}
