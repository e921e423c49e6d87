//! Error types for tiermem.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using TierError.
pub type Result<T> = std::result::Result<T, TierError>;

/// Errors that can occur while building or driving a tiered memory engine.
///
/// None of these are recoverable at runtime: a host receiving one should stop
/// the simulation.
#[derive(Debug, Error)]
pub enum TierError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't open {} for output: {source}", .path.display())]
    StatsOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    #[error("Invalid {option}: {value}")]
    UnknownStrategy { option: &'static str, value: String },

    #[error("{admission} page addition strategy requires LFU page replacement strategy, got {replacement}")]
    IncompatibleStrategies {
        admission: String,
        replacement: String,
    },

    // Model defects
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Unknown chunk token {token} for {leg} completion")]
    UnknownChunk { token: u64, leg: &'static str },
}

impl TierError {
    /// Returns true for errors raised while validating configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            TierError::ConfigError(_)
                | TierError::InvalidParameter { .. }
                | TierError::UnknownStrategy { .. }
                | TierError::IncompatibleStrategies { .. }
        )
    }
}
