#![forbid(unsafe_code)]

//! Clinical scoring and risk-rule evaluation engine.
//!
//! This crate provides:
//! - A registry of pure scoring calculators (APACHE II, SOFA, KDIGO, Caprini,
//!   PE decision tools, hemodynamic and ventilator formulas, composite
//!   classifiers)
//! - Windowed feature engineering over time-stamped observations
//! - Weighted rule evaluation and per-domain risk aggregation
//! - Configuration and logging shared by the binaries

pub mod error;
pub mod ranges;
pub mod inputs;
pub mod calculators;
pub mod registry;
pub mod features;
pub mod rules;
pub mod domains;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use config::{Config, DomainSettings};
pub use inputs::{InputValue, Inputs, MissingFields, Scored, Unscored};
pub use registry::{builtin_registry, CalculatorDefinition, CalculatorId, Envelope, Outcome, Registry, RegistryBuilder};
pub use features::{engineer_features, Demographics, EngineeredFeatures, Observation, Sex, WindowKey};
pub use rules::{evaluate_rules, Direction, RiskFactor, Rule, RuleEvaluation};
pub use domains::{aggregate, evaluate_domains, Condition, DomainResult, RiskLabel};
