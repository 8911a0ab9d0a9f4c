use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time health of the served model, produced once per tick.
///
/// When `api_healthy` is false the remaining fields are unreliable and must
/// not be used for any decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: DateTime<Utc>,
    pub api_healthy: bool,
    pub rolling_accuracy: f64,
    pub drift_score: f64,
    pub sample_count: u64,
}

impl Signal {
    /// Signal for a tick where the serving API could not be reached.
    pub fn unavailable(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            api_healthy: false,
            rolling_accuracy: 0.0,
            drift_score: 0.0,
            sample_count: 0,
        }
    }

    /// True when accuracy and drift are finite and inside `[0, 1]`.
    pub fn is_well_formed(&self) -> bool {
        let in_unit = |value: f64| value.is_finite() && (0.0..=1.0).contains(&value);
        in_unit(self.rolling_accuracy) && in_unit(self.drift_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServingHealth {
    Ok,
    Degraded,
    Down,
}

impl ServingHealth {
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "ok" | "healthy" | "up" => Self::Ok,
            "degraded" => Self::Degraded,
            _ => Self::Down,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: i64,
    pub confidence: f64,
    #[serde(default)]
    pub model_version: Option<String>,
}

/// One served prediction, with its ground-truth label once known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledPrediction {
    pub features: Vec<f64>,
    pub prediction: i64,
    #[serde(default)]
    pub label: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LabeledPrediction {
    pub fn is_correct(&self) -> Option<bool> {
        self.label.map(|label| label == self.prediction)
    }
}
