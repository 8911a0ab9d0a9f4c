use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use vigil_domain::{DatasetRef, LabeledPrediction, Prediction, RetrainOutcome, ServingHealth};
use vigil_ports::{HistoryPort, ServingPort};

use crate::client::{ApiClient, send};
use crate::wire::{
    BaselineResponse, HealthResponse, HistoryResponse, PredictRequest, PredictResponse,
    RetrainRequest, RetrainResponse,
};

/// Serving API client. Also serves the prediction history, which the API
/// records for every prediction it makes.
#[derive(Debug, Clone)]
pub struct HttpServingClient {
    api: ApiClient,
}

impl HttpServingClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, token)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }
}

#[async_trait]
impl ServingPort for HttpServingClient {
    async fn health(&self) -> Result<ServingHealth> {
        let response = send(self.api.get("/health"), "GET /health").await?;
        let body: HealthResponse = response
            .json()
            .await
            .context("invalid /health response")?;
        Ok(body.health())
    }

    async fn predict(&self, features: &[f64]) -> Result<Prediction> {
        let request = self.api.post("/predict").json(&PredictRequest { features });
        let response = send(request, "POST /predict").await?;
        let body: PredictResponse = response
            .json()
            .await
            .context("invalid /predict response")?;
        Ok(body.into())
    }

    async fn retrain(&self, dataset: &DatasetRef) -> Result<RetrainOutcome> {
        debug!(generation_id = dataset.generation_id, "Requesting retrain");
        let request = self.api.post("/retrain").json(&RetrainRequest {
            generation_id: dataset.generation_id,
        });
        let response = send(request, "POST /retrain").await?;
        let body: RetrainResponse = response
            .json()
            .await
            .context("invalid /retrain response")?;
        Ok(body.into())
    }
}

#[async_trait]
impl HistoryPort for HttpServingClient {
    async fn recent_predictions(&self, limit: usize) -> Result<Vec<LabeledPrediction>> {
        let request = self
            .api
            .get("/predictions/history")
            .query(&[("limit", limit)]);
        let response = send(request, "GET /predictions/history").await?;
        let body: HistoryResponse = response
            .json()
            .await
            .context("invalid /predictions/history response")?;
        Ok(body.predictions.into_iter().map(Into::into).collect())
    }

    async fn baseline_features(&self) -> Result<Vec<Vec<f64>>> {
        let response = send(self.api.get("/datasets/baseline"), "GET /datasets/baseline").await?;
        let body: BaselineResponse = response
            .json()
            .await
            .context("invalid /datasets/baseline response")?;
        Ok(body.features)
    }
}
