use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;

use vigil_domain::{AlertEvent, Severity};
use vigil_ports::AlertSinkPort;

/// ntfy topic publisher. Any 2xx counts as delivered.
#[derive(Debug, Clone)]
pub struct NtfySink {
    http: Client,
    topic_url: String,
}

impl NtfySink {
    pub fn new(url: &str, topic: &str) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            topic_url: topic_url(url, topic),
        })
    }
}

fn topic_url(url: &str, topic: &str) -> String {
    format!(
        "{}/{}",
        url.trim_end_matches('/'),
        topic.trim().trim_start_matches('/')
    )
}

/// ntfy priority header value, 1 (min) to 5 (urgent).
pub fn priority(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "3",
        Severity::Warning => "4",
        Severity::Critical => "5",
    }
}

#[async_trait]
impl AlertSinkPort for NtfySink {
    async fn notify(&self, alert: &AlertEvent) -> Result<()> {
        let response = self
            .http
            .post(&self.topic_url)
            .header("Title", alert.title.as_str())
            .header("Priority", priority(alert.severity))
            .header("Tags", alert.category.as_str())
            .body(alert.message.clone())
            .send()
            .await
            .context("ntfy request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("ntfy returned {status}");
        }
        Ok(())
    }
}
