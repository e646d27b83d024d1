//! Error types for the clinrisk_core library.
//!
//! Only failures of the library itself live here. A calculator that cannot
//! score its inputs does not fail: it returns [`crate::Unscored`].

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for clinrisk_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// No calculator is registered under this id
    #[error("Unknown calculator: {0}")]
    UnknownCalculator(String),

    /// A scoring table failed validation (empty, inverted or overlapping rows)
    #[error("Invalid range table '{table}': {reason}")]
    InvalidTable { table: String, reason: String },

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
