use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Serialize;

use vigil_domain::{AlertEvent, Severity};
use vigil_ports::{AlertSinkPort, Clock, SystemClock};

const FOOTER: &str = "vigil model monitor";

/// Discord webhook channel. Only `204 No Content` counts as delivered.
#[derive(Clone)]
pub struct DiscordWebhookSink {
    http: Client,
    webhook_url: String,
    username: Option<String>,
    clock: Arc<dyn Clock>,
}

impl DiscordWebhookSink {
    pub fn new(webhook_url: impl Into<String>, username: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            webhook_url: webhook_url.into(),
            username,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl AlertSinkPort for DiscordWebhookSink {
    async fn notify(&self, alert: &AlertEvent) -> Result<()> {
        let payload = webhook_payload(alert, self.username.as_deref(), self.clock.now());
        let response = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .context("Discord webhook request failed")?;
        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            bail!("Discord webhook returned {status}, expected 204");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
pub struct EmbedField {
    pub name: &'static str,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter {
    pub text: &'static str,
}

pub fn severity_color(severity: Severity) -> u32 {
    match severity {
        Severity::Info => 3_447_003,
        Severity::Warning => 16_776_960,
        Severity::Critical => 15_158_332,
    }
}

pub fn webhook_payload(
    alert: &AlertEvent,
    username: Option<&str>,
    now: DateTime<Utc>,
) -> WebhookPayload {
    let field = |name, value: String| EmbedField {
        name,
        value,
        inline: true,
    };
    WebhookPayload {
        username: username.map(str::to_string),
        embeds: vec![Embed {
            title: alert.title.clone(),
            description: alert.message.clone(),
            color: severity_color(alert.severity),
            fields: vec![
                field("Status", alert.severity.as_str().to_string()),
                field("Category", alert.category.as_str().to_string()),
                field(
                    "Timestamp",
                    now.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                ),
            ],
            footer: EmbedFooter { text: FOOTER },
        }],
    }
}
