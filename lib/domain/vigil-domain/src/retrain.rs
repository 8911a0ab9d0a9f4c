use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::AlertCategory;
use crate::verdict::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrainReason {
    None,
    Drift,
    Degradation,
    Manual,
}

impl RetrainReason {
    pub fn from_verdict(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Drifted => Self::Drift,
            Verdict::Degraded => Self::Degradation,
            Verdict::Healthy | Verdict::Unknown => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Drift => "drift",
            Self::Degradation => "degradation",
            Self::Manual => "manual",
        }
    }

    pub fn alert_category(self) -> AlertCategory {
        match self {
            Self::Drift => AlertCategory::Drift,
            Self::Degradation => AlertCategory::Degradation,
            Self::None | Self::Manual => AlertCategory::Info,
        }
    }
}

impl std::fmt::Display for RetrainReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrainDecision {
    pub should_retrain: bool,
    pub reason: RetrainReason,
}

impl RetrainDecision {
    pub fn skip(reason: RetrainReason) -> Self {
        Self {
            should_retrain: false,
            reason,
        }
    }

    pub fn retrain(reason: RetrainReason) -> Self {
        Self {
            should_retrain: true,
            reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Failed,
    Skipped,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Reference to a generated training dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub generation_id: i64,
    pub samples_created: u64,
}

/// What the serving API reports after a successful retrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainOutcome {
    pub version: String,
    pub accuracy: f64,
}

/// Immutable trace of one retraining attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub trigger_reason: RetrainReason,
    pub pre_accuracy: f64,
    pub post_accuracy: Option<f64>,
    pub training_samples: u64,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub model_version: Option<String>,
    pub error: Option<String>,
}

impl RunRecord {
    /// Flatten into the params/metrics shape an experiment tracker stores.
    pub fn to_tracked_run(&self) -> TrackedRun {
        let mut params = BTreeMap::new();
        params.insert("trigger_reason".to_string(), self.trigger_reason.to_string());
        params.insert("training_samples".to_string(), self.training_samples.to_string());
        params.insert("outcome".to_string(), self.outcome.as_str().to_string());
        if let Some(version) = &self.model_version {
            params.insert("model_version".to_string(), version.clone());
        }
        if let Some(error) = &self.error {
            params.insert("error".to_string(), truncate(error, 250));
        }

        let mut metrics = BTreeMap::new();
        metrics.insert("pre_accuracy".to_string(), self.pre_accuracy);
        if let Some(post) = self.post_accuracy {
            metrics.insert("post_accuracy".to_string(), post);
            metrics.insert("accuracy_delta".to_string(), post - self.pre_accuracy);
        }
        metrics.insert("duration_ms".to_string(), self.duration.as_millis() as f64);

        TrackedRun {
            run_name: format!("retrain-{}-{}", self.trigger_reason, self.run_id),
            started_at: self.timestamp,
            outcome: self.outcome,
            params,
            metrics,
            artifact_ref: self.model_version.clone(),
        }
    }
}

/// Tracker-facing projection of a [`RunRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRun {
    pub run_name: String,
    pub started_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub artifact_ref: Option<String>,
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: RunOutcome, post: Option<f64>) -> RunRecord {
        RunRecord {
            run_id: Uuid::new_v4(),
            trigger_reason: RetrainReason::Drift,
            pre_accuracy: 0.62,
            post_accuracy: post,
            training_samples: 1000,
            duration: Duration::from_millis(1500),
            timestamp: Utc::now(),
            outcome,
            model_version: post.map(|_| "v7".to_string()),
            error: None,
        }
    }

    #[test]
    fn verdict_maps_to_reason() {
        assert_eq!(RetrainReason::from_verdict(Verdict::Drifted), RetrainReason::Drift);
        assert_eq!(
            RetrainReason::from_verdict(Verdict::Degraded),
            RetrainReason::Degradation
        );
        assert_eq!(RetrainReason::from_verdict(Verdict::Healthy), RetrainReason::None);
        assert_eq!(RetrainReason::from_verdict(Verdict::Unknown), RetrainReason::None);
    }

    #[test]
    fn tracked_run_carries_delta_for_successful_runs() {
        let tracked = record(RunOutcome::Success, Some(0.91)).to_tracked_run();
        assert_eq!(tracked.params["trigger_reason"], "drift");
        assert_eq!(tracked.params["model_version"], "v7");
        assert!((tracked.metrics["accuracy_delta"] - 0.29).abs() < 1e-9);
        assert_eq!(tracked.metrics["duration_ms"], 1500.0);
        assert_eq!(tracked.artifact_ref.as_deref(), Some("v7"));
    }

    #[test]
    fn tracked_run_omits_post_metrics_for_failed_runs() {
        let tracked = record(RunOutcome::Failed, None).to_tracked_run();
        assert!(!tracked.metrics.contains_key("post_accuracy"));
        assert_eq!(tracked.params["outcome"], "failed");
    }

    #[test]
    fn record_serializes_duration_as_millis() {
        let value = serde_json::to_value(record(RunOutcome::Success, Some(0.9))).unwrap();
        assert_eq!(value["duration"], 1500);
        assert_eq!(value["outcome"], "success");
    }
}
