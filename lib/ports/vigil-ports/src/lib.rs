//! Port traits for the external collaborators of the orchestrator.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vigil_domain::{
    AlertEvent, DatasetRef, LabeledPrediction, Prediction, RetrainOutcome, ServingHealth,
    TrackedRun,
};

/// The model-serving API.
#[async_trait]
pub trait ServingPort: Send + Sync {
    async fn health(&self) -> Result<ServingHealth>;
    async fn predict(&self, features: &[f64]) -> Result<Prediction>;
    async fn retrain(&self, dataset: &DatasetRef) -> Result<RetrainOutcome>;
}

/// Recent prediction/label pairs and the training baseline they are compared to.
#[async_trait]
pub trait HistoryPort: Send + Sync {
    /// Most recent first, at most `limit` entries.
    async fn recent_predictions(&self, limit: usize) -> Result<Vec<LabeledPrediction>>;
    async fn baseline_features(&self) -> Result<Vec<Vec<f64>>>;
}

#[async_trait]
pub trait DataGeneratorPort: Send + Sync {
    async fn generate(&self, samples: u64) -> Result<DatasetRef>;
}

/// Experiment tracker. Returns the tracker-side run id.
#[async_trait]
pub trait TrackerPort: Send + Sync {
    async fn log_run(&self, run: &TrackedRun) -> Result<String>;
}

/// Alert delivery channel. `Ok` is an acknowledgment, any error a failed delivery.
#[async_trait]
pub trait AlertSinkPort: Send + Sync {
    async fn notify(&self, alert: &AlertEvent) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone)]
pub struct PortSet {
    pub serving: Arc<dyn ServingPort>,
    pub history: Arc<dyn HistoryPort>,
    pub generator: Arc<dyn DataGeneratorPort>,
    pub tracker: Arc<dyn TrackerPort>,
    pub alerts: Arc<dyn AlertSinkPort>,
    pub clock: Arc<dyn Clock>,
}

impl PortSet {
    /// Ports for a deployment with only a serving API and generator; runs and
    /// alerts are written to the log.
    pub fn with_null_sinks(
        serving: Arc<dyn ServingPort>,
        history: Arc<dyn HistoryPort>,
        generator: Arc<dyn DataGeneratorPort>,
    ) -> Self {
        Self {
            serving,
            history,
            generator,
            tracker: Arc::new(NullTracker),
            alerts: Arc::new(NullAlertSink),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Tracker used when no tracking server is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracker;

#[async_trait]
impl TrackerPort for NullTracker {
    async fn log_run(&self, run: &TrackedRun) -> Result<String> {
        tracing::info!(
            run = %run.run_name,
            outcome = run.outcome.as_str(),
            params = ?run.params,
            metrics = ?run.metrics,
            "Run record (no tracker configured)"
        );
        Ok(run.run_name.clone())
    }
}

/// Sink used when no notification channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAlertSink;

#[async_trait]
impl AlertSinkPort for NullAlertSink {
    async fn notify(&self, alert: &AlertEvent) -> Result<()> {
        tracing::info!(
            category = %alert.category,
            severity = %alert.severity,
            title = %alert.title,
            "{}",
            alert.message
        );
        Ok(())
    }
}
