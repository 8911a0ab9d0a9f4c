//! MLflow tracking-server adapter.
//!
//! Each run record becomes one MLflow run: `runs/create`, then a single
//! `runs/log-batch` with params and metrics, then `runs/update` to close it.
//! A run whose batch was rejected is still closed, as `FAILED`.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vigil_domain::{RunOutcome, TrackedRun};
use vigil_ports::TrackerPort;

const API_PREFIX: &str = "api/2.0/mlflow";

#[derive(Debug, Clone)]
pub struct MlflowTracker {
    http: Client,
    base_url: String,
    experiment_id: String,
}

impl MlflowTracker {
    pub fn new(base_url: &str, experiment_id: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            experiment_id: experiment_id.into(),
        })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/{API_PREFIX}/{endpoint}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("MLflow {endpoint} request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            bail!("MLflow {endpoint} returned {status}: {body}");
        }
        Ok(response)
    }
}

#[async_trait]
impl TrackerPort for MlflowTracker {
    async fn log_run(&self, run: &TrackedRun) -> Result<String> {
        let created: CreateRunResponse = self
            .post("runs/create", &create_run_request(&self.experiment_id, run))
            .await?
            .json()
            .await
            .context("invalid MLflow runs/create response")?;
        let run_id = created.run.info.run_id;

        if let Err(err) = self
            .post("runs/log-batch", &log_batch_request(&run_id, run))
            .await
        {
            if let Err(close_err) = self
                .post("runs/update", &abandoned_run_request(&run_id, run))
                .await
            {
                let error = format!("{close_err:#}");
                warn!(%run_id, %error, "Could not close MLflow run after a rejected batch");
            }
            return Err(err);
        }
        self.post("runs/update", &update_run_request(&run_id, run))
            .await?;

        debug!(%run_id, run = %run.run_name, "Run logged to MLflow");
        Ok(run_id)
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct CreateRunRequest {
    pub experiment_id: String,
    pub run_name: String,
    pub start_time: i64,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Metric {
    pub key: String,
    pub value: f64,
    pub timestamp: i64,
    pub step: i64,
}

#[derive(Debug, Serialize)]
pub struct LogBatchRequest {
    pub run_id: String,
    pub params: Vec<Tag>,
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Serialize)]
pub struct UpdateRunRequest {
    pub run_id: String,
    pub status: &'static str,
    pub end_time: i64,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    run: RunEnvelope,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    info: RunInfo,
}

#[derive(Debug, Deserialize)]
struct RunInfo {
    run_id: String,
}

pub fn create_run_request(experiment_id: &str, run: &TrackedRun) -> CreateRunRequest {
    let mut tags = vec![
        Tag {
            key: "mlflow.runName".to_string(),
            value: run.run_name.clone(),
        },
        Tag {
            key: "outcome".to_string(),
            value: run.outcome.as_str().to_string(),
        },
    ];
    if let Some(reason) = run.params.get("trigger_reason") {
        tags.push(Tag {
            key: "trigger_reason".to_string(),
            value: reason.clone(),
        });
    }
    if let Some(artifact) = &run.artifact_ref {
        tags.push(Tag {
            key: "model_version".to_string(),
            value: artifact.clone(),
        });
    }
    CreateRunRequest {
        experiment_id: experiment_id.to_string(),
        run_name: run.run_name.clone(),
        start_time: run.started_at.timestamp_millis(),
        tags,
    }
}

pub fn log_batch_request(run_id: &str, run: &TrackedRun) -> LogBatchRequest {
    let timestamp = run.started_at.timestamp_millis();
    LogBatchRequest {
        run_id: run_id.to_string(),
        params: run
            .params
            .iter()
            .map(|(key, value)| Tag {
                key: key.clone(),
                value: value.clone(),
            })
            .collect(),
        metrics: run
            .metrics
            .iter()
            .filter(|(_, value)| value.is_finite())
            .map(|(key, value)| Metric {
                key: key.clone(),
                value: *value,
                timestamp,
                step: 0,
            })
            .collect(),
    }
}

pub fn update_run_request(run_id: &str, run: &TrackedRun) -> UpdateRunRequest {
    let duration_ms = run.metrics.get("duration_ms").copied().unwrap_or(0.0);
    UpdateRunRequest {
        run_id: run_id.to_string(),
        status: match run.outcome {
            RunOutcome::Failed => "FAILED",
            RunOutcome::Success | RunOutcome::Skipped => "FINISHED",
        },
        end_time: run.started_at.timestamp_millis() + duration_ms.max(0.0) as i64,
    }
}

/// Close a run whose params and metrics never landed.
pub fn abandoned_run_request(run_id: &str, run: &TrackedRun) -> UpdateRunRequest {
    UpdateRunRequest {
        status: "FAILED",
        ..update_run_request(run_id, run)
    }
}
