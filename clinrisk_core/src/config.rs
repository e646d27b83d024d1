//! Configuration file support for clinrisk.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/clinrisk/config.toml`.
//! Only the domain risk cutoffs are configurable; calculator thresholds are
//! fixed clinical constants.

use crate::domains::Condition;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub domains: DomainsConfig,
}

/// Label cutoffs and factor count for one risk domain.
///
/// A normalized score at or above `high` is labelled high, at or above
/// `moderate` is labelled moderate, anything lower is low.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainSettings {
    pub moderate: f64,
    pub high: f64,

    #[serde(default = "default_top_factors")]
    pub top_factors: usize,
}

impl DomainSettings {
    pub fn new(moderate: f64, high: f64) -> Self {
        Self {
            moderate,
            high,
            top_factors: default_top_factors(),
        }
    }
}

/// Per-domain settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainsConfig {
    #[serde(default = "default_cardiovascular")]
    pub cardiovascular: DomainSettings,

    #[serde(default = "default_metabolic")]
    pub metabolic: DomainSettings,

    #[serde(default = "default_renal")]
    pub renal: DomainSettings,
}

impl Default for DomainsConfig {
    fn default() -> Self {
        Self {
            cardiovascular: default_cardiovascular(),
            metabolic: default_metabolic(),
            renal: default_renal(),
        }
    }
}

impl DomainsConfig {
    pub fn get(&self, condition: Condition) -> &DomainSettings {
        match condition {
            Condition::Cardiovascular => &self.cardiovascular,
            Condition::Metabolic => &self.metabolic,
            Condition::Renal => &self.renal,
        }
    }
}

// Default value functions
fn default_top_factors() -> usize {
    3
}

fn default_cardiovascular() -> DomainSettings {
    DomainSettings::new(0.3, 0.6)
}

fn default_metabolic() -> DomainSettings {
    DomainSettings::new(0.35, 0.65)
}

fn default_renal() -> DomainSettings {
    DomainSettings::new(0.25, 0.5)
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("clinrisk").join("config.toml")
    }

    /// Check every domain's cutoffs lie in `[0, 1]` with `moderate <= high`.
    pub fn validate(&self) -> Result<()> {
        for condition in Condition::ALL {
            let settings = self.domains.get(condition);
            let in_unit = |v: f64| (0.0..=1.0).contains(&v);
            if !in_unit(settings.moderate) || !in_unit(settings.high) {
                return Err(Error::Config(format!(
                    "{} cutoffs must lie in [0, 1] (moderate = {}, high = {})",
                    condition, settings.moderate, settings.high
                )));
            }
            if settings.moderate > settings.high {
                return Err(Error::Config(format!(
                    "{} moderate cutoff {} exceeds high cutoff {}",
                    condition, settings.moderate, settings.high
                )));
            }
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.to_toml_string()?)?;
        tracing::debug!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.domains.cardiovascular.moderate, 0.3);
        assert_eq!(config.domains.metabolic.high, 0.65);
        assert_eq!(config.domains.renal.top_factors, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[domains.renal]
moderate = 0.2
high = 0.4
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.domains.renal.moderate, 0.2);
        assert_eq!(config.domains.renal.top_factors, 3); // default
        assert_eq!(config.domains.cardiovascular, default_cardiovascular());
    }

    #[test]
    fn test_validate_rejects_inverted_cutoffs() {
        let mut config = Config::default();
        config.domains.metabolic = DomainSettings::new(0.7, 0.4);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.domains.metabolic = DomainSettings::new(0.3, 1.5);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.domains.cardiovascular.top_factors = 5;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.domains.cardiovascular.top_factors, 5);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[domains.renal]\nmoderate = 0.9\nhigh = 0.1\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
