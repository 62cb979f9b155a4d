//! Error types for the relaxation solver

use thiserror::Error;

use crate::error::SceneError;

/// Errors raised while configuring or running the solver
#[derive(Debug, Error)]
pub enum SolverError {
    /// Scene lookup or hierarchy failure
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// A constraint that can never be evaluated
    #[error("invalid constraint {constraint}: {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    /// A configuration value outside its usable range
    #[error("invalid solver config '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Failed to read solver config file: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("Failed to parse solver config TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize displacement ledger: {0}")]
    LedgerSerialize(#[from] serde_json::Error),
}

impl SolverError {
    pub fn invalid_constraint(constraint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConstraint {
            constraint: constraint.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
