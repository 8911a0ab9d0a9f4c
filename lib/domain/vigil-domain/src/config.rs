//! Unified orchestrator configuration.
//!
//! Values come from built-in defaults, then an optional YAML file, then
//! `VIGIL_*` environment overrides. [`VigilConfig::validate`] runs last and
//! any error it reports is fatal at startup.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::verdict::Thresholds;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub monitor: MonitorConfig,
    pub thresholds: Thresholds,
    pub cooldowns: CooldownConfig,
    pub timeouts: TimeoutConfig,
    pub retry: RetryConfig,
    pub retrain: RetrainConfig,
    pub services: ServicesConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub tick_interval_secs: u64,
    /// Consecutive failing ticks of one step before a health alert is raised.
    pub failure_alert_after: u32,
    /// Emit a status report every N ticks; 0 disables it.
    pub status_report_every: u64,
    /// Number of recent predictions the probe reads per tick.
    pub history_window: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            failure_alert_after: 3,
            status_report_every: 10,
            history_window: 200,
        }
    }
}

impl MonitorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub retrain_secs: u64,
    pub alert_dedup_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            retrain_secs: 10 * 60,
            alert_dedup_secs: 60 * 60,
        }
    }
}

impl CooldownConfig {
    pub fn retrain(&self) -> Duration {
        Duration::from_secs(self.retrain_secs)
    }

    pub fn alert_dedup(&self) -> Duration {
        Duration::from_secs(self.alert_dedup_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub probe_secs: u64,
    pub retrain_secs: u64,
    pub generate_secs: u64,
    pub alert_secs: u64,
    pub tracker_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_secs: 5,
            retrain_secs: 60,
            generate_secs: 30,
            alert_secs: 10,
            tracker_secs: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn retrain(&self) -> Duration {
        Duration::from_secs(self.retrain_secs)
    }

    pub fn generate(&self) -> Duration {
        Duration::from_secs(self.generate_secs)
    }

    pub fn alert(&self) -> Duration {
        Duration::from_secs(self.alert_secs)
    }

    pub fn tracker(&self) -> Duration {
        Duration::from_secs(self.tracker_secs)
    }
}

/// Bounded retry policy shared by probe and dispatcher calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 5_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries; a single attempt.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrainConfig {
    /// Samples requested from the data generator per retraining attempt.
    pub dataset_samples: u64,
    /// Age after which a held retrain lock is considered abandoned.
    /// Defaults to twice the retrain timeout.
    pub lock_stale_after_secs: Option<u64>,
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            dataset_samples: 1000,
            lock_stale_after_secs: None,
        }
    }
}

impl RetrainConfig {
    pub fn lock_stale_after(&self, timeouts: &TimeoutConfig) -> Duration {
        match self.lock_stale_after_secs {
            Some(secs) => Duration::from_secs(secs),
            None => timeouts.retrain().saturating_mul(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub serving_url: String,
    /// Data generator base URL; the serving API hosts it when unset.
    pub generator_url: Option<String>,
    /// MLflow tracking server; runs are only logged locally when unset.
    pub tracker_url: Option<String>,
    pub experiment_id: String,
    /// Bearer token sent to the serving API and data generator.
    pub api_token: Option<String>,
    /// Feature vector sent to `predict` as a liveness canary.
    pub canary_features: Option<Vec<f64>>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            serving_url: "http://localhost:8000".to_string(),
            generator_url: None,
            tracker_url: None,
            experiment_id: "0".to_string(),
            api_token: None,
            canary_features: None,
        }
    }
}

impl ServicesConfig {
    pub fn generator_url(&self) -> &str {
        self.generator_url.as_deref().unwrap_or(&self.serving_url)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub channels: Vec<NotificationChannelConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotificationChannelConfig {
    Discord {
        webhook_url: String,
        #[serde(default)]
        username: Option<String>,
    },
    Ntfy {
        url: String,
        topic: String,
    },
}

impl VigilConfig {
    /// Parse a YAML file without applying overrides or validation.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Full startup load: file (optional unless `required`), process
    /// environment overrides, then validation.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let mut config = if required || path.exists() {
            Self::load_from_path(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup: &lookup };

        env.set(
            "VIGIL_TICK_INTERVAL_SECS",
            &mut self.monitor.tick_interval_secs,
        )?;
        env.set(
            "VIGIL_FAILURE_ALERT_AFTER",
            &mut self.monitor.failure_alert_after,
        )?;
        env.set(
            "VIGIL_STATUS_REPORT_EVERY",
            &mut self.monitor.status_report_every,
        )?;
        env.set("VIGIL_HISTORY_WINDOW", &mut self.monitor.history_window)?;

        env.set("VIGIL_DRIFT_THRESHOLD", &mut self.thresholds.drift_threshold)?;
        env.set(
            "VIGIL_ACCURACY_THRESHOLD",
            &mut self.thresholds.accuracy_threshold,
        )?;
        env.set("VIGIL_MIN_SAMPLES", &mut self.thresholds.min_samples)?;

        env.set("VIGIL_RETRAIN_COOLDOWN_SECS", &mut self.cooldowns.retrain_secs)?;
        env.set("VIGIL_ALERT_DEDUP_SECS", &mut self.cooldowns.alert_dedup_secs)?;

        env.set("VIGIL_PROBE_TIMEOUT_SECS", &mut self.timeouts.probe_secs)?;
        env.set("VIGIL_RETRAIN_TIMEOUT_SECS", &mut self.timeouts.retrain_secs)?;
        env.set("VIGIL_GENERATE_TIMEOUT_SECS", &mut self.timeouts.generate_secs)?;
        env.set("VIGIL_ALERT_TIMEOUT_SECS", &mut self.timeouts.alert_secs)?;
        env.set("VIGIL_TRACKER_TIMEOUT_SECS", &mut self.timeouts.tracker_secs)?;

        env.set("VIGIL_RETRY_MAX_ATTEMPTS", &mut self.retry.max_attempts)?;
        env.set(
            "VIGIL_RETRY_INITIAL_BACKOFF_MS",
            &mut self.retry.initial_backoff_ms,
        )?;

        env.set("VIGIL_DATASET_SAMPLES", &mut self.retrain.dataset_samples)?;

        env.set("VIGIL_SERVING_URL", &mut self.services.serving_url)?;
        if let Some(url) = env.string("VIGIL_GENERATOR_URL") {
            self.services.generator_url = Some(url);
        }
        if let Some(url) = env.string("VIGIL_TRACKER_URL") {
            self.services.tracker_url = Some(url);
        }
        env.set("VIGIL_EXPERIMENT_ID", &mut self.services.experiment_id)?;
        if let Some(token) = env.string("VIGIL_API_TOKEN") {
            self.services.api_token = Some(token);
        }

        if let Some(url) = env.string("DISCORD_WEBHOOK_URL") {
            let existing = self.notifications.channels.iter_mut().find_map(|channel| {
                match channel {
                    NotificationChannelConfig::Discord { webhook_url, .. } => Some(webhook_url),
                    NotificationChannelConfig::Ntfy { .. } => None,
                }
            });
            match existing {
                Some(webhook_url) => *webhook_url = url,
                None => self
                    .notifications
                    .channels
                    .push(NotificationChannelConfig::Discord {
                        webhook_url: url,
                        username: None,
                    }),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.monitor.tick_interval_secs == 0 {
            return invalid("monitor.tick_interval_secs must be greater than zero".into());
        }
        if self.monitor.history_window == 0 {
            return invalid("monitor.history_window must be greater than zero".into());
        }
        for (name, value) in [
            ("thresholds.drift_threshold", self.thresholds.drift_threshold),
            (
                "thresholds.accuracy_threshold",
                self.thresholds.accuracy_threshold,
            ),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be within [0, 1], got {value}"));
            }
        }
        for (name, value) in [
            ("timeouts.probe_secs", self.timeouts.probe_secs),
            ("timeouts.retrain_secs", self.timeouts.retrain_secs),
            ("timeouts.generate_secs", self.timeouts.generate_secs),
            ("timeouts.alert_secs", self.timeouts.alert_secs),
            ("timeouts.tracker_secs", self.timeouts.tracker_secs),
        ] {
            if value == 0 {
                return invalid(format!("{name} must be greater than zero"));
            }
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".into());
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return invalid("retry.multiplier must be a finite value >= 1.0".into());
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return invalid("retry.max_backoff_ms must not be below retry.initial_backoff_ms".into());
        }
        if !(100..=10_000).contains(&self.retrain.dataset_samples) {
            return invalid(format!(
                "retrain.dataset_samples must be within [100, 10000], got {}",
                self.retrain.dataset_samples
            ));
        }
        if self.retrain.lock_stale_after(&self.timeouts) < self.timeouts.retrain() {
            return invalid(
                "retrain.lock_stale_after_secs must not be shorter than timeouts.retrain_secs"
                    .into(),
            );
        }

        check_url("services.serving_url", &self.services.serving_url)?;
        if let Some(url) = &self.services.generator_url {
            check_url("services.generator_url", url)?;
        }
        if let Some(url) = &self.services.tracker_url {
            check_url("services.tracker_url", url)?;
        }
        if let Some(features) = &self.services.canary_features {
            if features.is_empty() || features.iter().any(|value| !value.is_finite()) {
                return invalid(
                    "services.canary_features must be a non-empty list of finite numbers".into(),
                );
            }
        }
        for channel in &self.notifications.channels {
            match channel {
                NotificationChannelConfig::Discord { webhook_url, .. } => {
                    check_url("notifications.discord.webhook_url", webhook_url)?
                }
                NotificationChannelConfig::Ntfy { url, topic } => {
                    check_url("notifications.ntfy.url", url)?;
                    if topic.trim().is_empty() {
                        return invalid("notifications.ntfy.topic must not be empty".into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Non-fatal observations about the effective configuration.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let worst_tick = self.timeouts.probe() + self.timeouts.generate() + self.timeouts.retrain();
        if worst_tick > self.monitor.tick_interval() {
            warnings.push(format!(
                "a tick that retrains may take up to {}s, longer than the {}s tick interval; following ticks will be delayed",
                worst_tick.as_secs(),
                self.monitor.tick_interval_secs
            ));
        }
        if self.notifications.channels.is_empty() {
            warnings.push("no notification channel configured; alerts are only logged".into());
        }
        if self.services.tracker_url.is_none() {
            warnings.push("no tracker configured; run records are only logged".into());
        }
        warnings
    }
}

struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn set<T>(&self, key: &str, target: &mut T) -> Result<(), ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        if let Some(raw) = self.string(key) {
            *target = raw.parse().map_err(|err: T::Err| ConfigError::InvalidEnv {
                key: key.to_string(),
                value: raw.clone(),
                reason: err.to_string(),
            })?;
        }
        Ok(())
    }
}

fn check_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    let valid = ["http://", "https://"].iter().any(|scheme| {
        trimmed
            .strip_prefix(scheme)
            .is_some_and(|rest| !rest.is_empty())
    });
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be an http(s) URL, got {value:?}"
        )))
    }
}
