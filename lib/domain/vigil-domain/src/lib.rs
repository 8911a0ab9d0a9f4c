//! Domain models and invariants.

pub mod alert;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod retrain;
pub mod signal;
pub mod verdict;

pub use alert::{AlertCategory, AlertEvent, Severity};
pub use config::{
    CooldownConfig, MonitorConfig, NotificationChannelConfig, NotificationsConfig, RetrainConfig,
    RetryConfig, ServicesConfig, TimeoutConfig, VigilConfig,
};
pub use cooldown::{CooldownKey, CooldownState};
pub use error::{ConfigError, VigilError};
pub use retrain::{
    DatasetRef, RetrainDecision, RetrainOutcome, RetrainReason, RunOutcome, RunRecord, TrackedRun,
};
pub use signal::{LabeledPrediction, Prediction, ServingHealth, Signal};
pub use verdict::{Thresholds, Verdict};

#[cfg(test)]
mod config_test;
