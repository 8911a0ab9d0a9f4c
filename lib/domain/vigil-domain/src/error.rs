use std::path::PathBuf;

use thiserror::Error;

/// Failure classes the orchestrator distinguishes.
#[derive(Debug, Error)]
pub enum VigilError {
    /// Network error or timeout against an external collaborator. Recovered
    /// within the tick that hit it.
    #[error("{collaborator} call failed: {message}")]
    TransientIo {
        collaborator: &'static str,
        message: String,
    },
    /// Invalid startup configuration. Fatal.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    /// The retrain lock is already held by another attempt.
    #[error("retraining already in progress")]
    ConcurrencyConflict,
}

impl VigilError {
    pub fn transient(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::TransientIo {
            collaborator,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientIo { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("environment override {key}={value:?} is invalid: {reason}")]
    InvalidEnv {
        key: String,
        value: String,
        reason: String,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
