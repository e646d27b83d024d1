//! Observation loading from CSV.
//!
//! Expected columns: `metric,value,observed_at` with RFC 3339 timestamps.
//! Rows that fail to parse are skipped with a warning.

use chrono::{DateTime, Utc};
use clinrisk_core::{Error, Observation, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::Path;

/// CSV row format for observations
#[derive(Debug, Deserialize)]
struct CsvRow {
    metric: String,
    value: f64,
    observed_at: String,
}

impl TryFrom<CsvRow> for Observation {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let metric = row.metric.trim();
        if metric.is_empty() {
            return Err(Error::Other("Empty metric name".into()));
        }

        let observed_at = DateTime::parse_from_rfc3339(row.observed_at.trim())
            .map_err(|e| Error::Other(format!("Invalid date '{}': {}", row.observed_at, e)))?
            .with_timezone(&Utc);

        Ok(Observation::new(metric, row.value, observed_at))
    }
}

/// Load every parseable observation from a CSV file
pub fn load_observations(path: &Path) -> Result<Vec<Observation>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::Other(format!("Failed to open {:?}: {}", path, e)))?;

    let mut observations = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match Observation::try_from(row) {
                Ok(observation) => observations.push(observation),
                Err(e) => tracing::warn!("Skipping observation row: {}", e),
            },
            Err(e) => tracing::warn!("Failed to deserialize CSV row: {}", e),
        }
    }

    tracing::debug!("Loaded {} observations from {:?}", observations.len(), path);
    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_skips_malformed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.csv");
        fs::write(
            &path,
            "metric,value,observed_at\n\
             sbp,142,2024-05-30T08:00:00Z\n\
             sbp,not-a-number,2024-05-30T08:00:00Z\n\
             ldl,170,yesterday\n\
             egfr,55,2024-05-01T00:00:00+02:00\n",
        )
        .unwrap();

        let observations = load_observations(&path).unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].metric, "sbp");
        assert_eq!(observations[0].value, 142.0);
        assert_eq!(observations[1].observed_at.to_rfc3339(), "2024-04-30T22:00:00+00:00");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_observations(&dir.path().join("absent.csv")).is_err());
    }
}
