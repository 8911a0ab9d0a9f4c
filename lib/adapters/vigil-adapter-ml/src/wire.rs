//! JSON bodies exchanged with the serving API and data generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vigil_domain::{DatasetRef, LabeledPrediction, Prediction, RetrainOutcome, ServingHealth};

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn health(&self) -> ServingHealth {
        ServingHealth::from_status(&self.status)
    }
}

#[derive(Debug, Serialize)]
pub struct PredictRequest<'a> {
    pub features: &'a [f64],
}

#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    pub prediction: i64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub model_version: Option<String>,
}

impl From<PredictResponse> for Prediction {
    fn from(response: PredictResponse) -> Self {
        Self {
            label: response.prediction,
            confidence: response.confidence,
            model_version: response.model_version,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RetrainRequest {
    pub generation_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RetrainResponse {
    #[serde(alias = "model_version")]
    pub version: String,
    pub accuracy: f64,
}

impl From<RetrainResponse> for RetrainOutcome {
    fn from(response: RetrainResponse) -> Self {
        Self {
            version: response.version,
            accuracy: response.accuracy,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub samples: u64,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub generation_id: i64,
    pub samples_created: u64,
}

impl From<GenerateResponse> for DatasetRef {
    fn from(response: GenerateResponse) -> Self {
        Self {
            generation_id: response.generation_id,
            samples_created: response.samples_created,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub predictions: Vec<HistoryEntry>,
}

/// Logged prediction. Older API versions flatten the two features into
/// `feature1`/`feature2` instead of a `features` array.
#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub features: Option<Vec<f64>>,
    #[serde(default)]
    pub feature1: Option<f64>,
    #[serde(default)]
    pub feature2: Option<f64>,
    pub prediction: i64,
    #[serde(default, alias = "target", alias = "actual")]
    pub label: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<HistoryEntry> for LabeledPrediction {
    fn from(entry: HistoryEntry) -> Self {
        let features = entry
            .features
            .unwrap_or_else(|| entry.feature1.into_iter().chain(entry.feature2).collect());
        Self {
            features,
            prediction: entry.prediction,
            label: entry.label,
            timestamp: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BaselineResponse {
    #[serde(alias = "samples")]
    pub features: Vec<Vec<f64>>,
}
