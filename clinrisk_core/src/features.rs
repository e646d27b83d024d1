//! Windowed statistics over time-stamped observations.
//!
//! Observations are grouped by metric name and summarized over fixed trailing
//! windows ending at a reference time. Values are taken as given: no unit
//! conversion and no interpolation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// One lab result or vital sign.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub metric: String,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(metric: impl Into<String>, value: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            metric: metric.into(),
            value,
            observed_at,
        }
    }
}

/// Trailing window lengths
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowKey {
    Days7,
    Days30,
    Days90,
    Days365,
}

impl WindowKey {
    pub const ALL: [WindowKey; 4] = [
        WindowKey::Days7,
        WindowKey::Days30,
        WindowKey::Days90,
        WindowKey::Days365,
    ];

    pub fn days(&self) -> i64 {
        match self {
            WindowKey::Days7 => 7,
            WindowKey::Days30 => 30,
            WindowKey::Days90 => 90,
            WindowKey::Days365 => 365,
        }
    }

    /// Whether `observed_at` falls in `(now - days, now]`.
    pub fn contains(&self, observed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        observed_at <= now && observed_at > now - Duration::days(self.days())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestValue {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

/// Summary of one metric in one window.
///
/// `count == 0` means nothing was observed; `mean` and `latest` are then `None`,
/// never a zero that could be mistaken for a measurement.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricWindowStats {
    pub mean: Option<f64>,
    pub count: usize,
    pub latest: Option<LatestValue>,
}

impl MetricWindowStats {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Female => write!(f, "female"),
            Sex::Male => write!(f, "male"),
        }
    }
}

impl FromStr for Sex {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" | "f" => Ok(Sex::Female),
            "male" | "m" => Ok(Sex::Male),
            other => Err(crate::Error::Other(format!("Unknown sex: {}", other))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<f64>,
    pub sex: Option<Sex>,
}

/// Immutable snapshot that rules are evaluated against.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineeredFeatures {
    pub reference_time: DateTime<Utc>,
    pub windows: BTreeMap<WindowKey, BTreeMap<String, MetricWindowStats>>,
    pub demographics: Demographics,
}

impl EngineeredFeatures {
    pub fn stats(&self, window: WindowKey, metric: &str) -> Option<&MetricWindowStats> {
        self.windows.get(&window)?.get(metric)
    }

    pub fn mean(&self, window: WindowKey, metric: &str) -> Option<f64> {
        self.stats(window, metric)?.mean
    }

    pub fn count(&self, window: WindowKey, metric: &str) -> usize {
        self.stats(window, metric).map_or(0, |s| s.count)
    }

    pub fn latest(&self, window: WindowKey, metric: &str) -> Option<f64> {
        self.stats(window, metric)?.latest.as_ref().map(|l| l.value)
    }

    /// Metrics present in the snapshot, sorted by name
    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.windows
            .get(&WindowKey::Days365)
            .into_iter()
            .flat_map(|metrics| metrics.keys().map(String::as_str))
    }
}

/// Summarize `observations` over every [`WindowKey`] ending at `now`.
///
/// Observations after `now` and non-finite values are ignored. Every metric
/// seen in any window is present in all of them. When two observations share
/// the newest timestamp, the one later in the input is `latest`.
pub fn engineer_features(
    observations: &[Observation],
    now: DateTime<Utc>,
    demographics: Demographics,
) -> EngineeredFeatures {
    let usable: Vec<&Observation> = observations
        .iter()
        .filter(|o| o.value.is_finite() && o.observed_at <= now)
        .collect();

    let metrics: BTreeSet<&str> = usable
        .iter()
        .filter(|o| WindowKey::Days365.contains(o.observed_at, now))
        .map(|o| o.metric.as_str())
        .collect();

    let mut windows = BTreeMap::new();
    for window in WindowKey::ALL {
        let mut per_metric: BTreeMap<String, MetricWindowStats> = metrics
            .iter()
            .map(|m| (m.to_string(), MetricWindowStats::default()))
            .collect();
        let mut sums: BTreeMap<&str, f64> = BTreeMap::new();

        for obs in usable.iter().filter(|o| window.contains(o.observed_at, now)) {
            let Some(stats) = per_metric.get_mut(&obs.metric) else {
                continue;
            };
            stats.count += 1;
            *sums.entry(obs.metric.as_str()).or_insert(0.0) += obs.value;

            let newer = stats
                .latest
                .as_ref()
                .map_or(true, |latest| obs.observed_at >= latest.observed_at);
            if newer {
                stats.latest = Some(LatestValue {
                    value: obs.value,
                    observed_at: obs.observed_at,
                });
            }
        }

        for (metric, stats) in per_metric.iter_mut() {
            if stats.count > 0 {
                stats.mean = sums.get(metric.as_str()).map(|sum| sum / stats.count as f64);
            }
        }
        windows.insert(window, per_metric);
    }

    tracing::debug!(
        "Engineered features for {} metrics from {} of {} observations",
        metrics.len(),
        usable.len(),
        observations.len()
    );

    EngineeredFeatures {
        reference_time: now,
        windows,
        demographics,
    }
}
