use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use vigil_domain::DatasetRef;
use vigil_ports::DataGeneratorPort;

use crate::client::{ApiClient, send};
use crate::wire::{GenerateRequest, GenerateResponse};

#[derive(Debug, Clone)]
pub struct HttpDataGenerator {
    api: ApiClient,
}

impl HttpDataGenerator {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, token)?,
        })
    }
}

#[async_trait]
impl DataGeneratorPort for HttpDataGenerator {
    async fn generate(&self, samples: u64) -> Result<DatasetRef> {
        let request = self.api.post("/generate").json(&GenerateRequest { samples });
        let response = send(request, "POST /generate").await?;
        let body: GenerateResponse = response
            .json()
            .await
            .context("invalid /generate response")?;
        debug!(
            generation_id = body.generation_id,
            samples_created = body.samples_created,
            "Dataset generated"
        );
        Ok(body.into())
    }
}
