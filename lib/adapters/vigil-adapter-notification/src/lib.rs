//! Alert delivery channels.

mod discord;
mod ntfy;

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::warn;

use vigil_domain::{AlertEvent, NotificationChannelConfig, NotificationsConfig};
use vigil_ports::{AlertSinkPort, NullAlertSink};

pub use discord::{DiscordWebhookSink, severity_color, webhook_payload};
pub use ntfy::NtfySink;

/// Delivers to every channel; acknowledged when at least one channel acked.
pub struct FanoutSink {
    channels: Vec<(String, Arc<dyn AlertSinkPort>)>,
}

impl FanoutSink {
    pub fn new(channels: Vec<(String, Arc<dyn AlertSinkPort>)>) -> Self {
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl AlertSinkPort for FanoutSink {
    async fn notify(&self, alert: &AlertEvent) -> Result<()> {
        let mut delivered = false;
        let mut failures = Vec::new();
        for (name, channel) in &self.channels {
            match channel.notify(alert).await {
                Ok(()) => delivered = true,
                Err(err) => {
                    let error = format!("{err:#}");
                    warn!(channel = %name, %error, "Alert channel failed");
                    failures.push(format!("{name}: {error}"));
                }
            }
        }
        if delivered {
            return Ok(());
        }
        if failures.is_empty() {
            bail!("no alert channel configured");
        }
        bail!("every alert channel failed: {}", failures.join("; "))
    }
}

/// Build the sink for the configured channels. No channel means alerts are
/// only written to the log.
pub fn build_alert_sink(config: &NotificationsConfig) -> Result<Arc<dyn AlertSinkPort>> {
    let mut channels: Vec<(String, Arc<dyn AlertSinkPort>)> = Vec::new();
    for channel in &config.channels {
        let built: (String, Arc<dyn AlertSinkPort>) = match channel {
            NotificationChannelConfig::Discord {
                webhook_url,
                username,
            } => (
                "discord".to_string(),
                Arc::new(DiscordWebhookSink::new(webhook_url.clone(), username.clone())?),
            ),
            NotificationChannelConfig::Ntfy { url, topic } => {
                (format!("ntfy:{topic}"), Arc::new(NtfySink::new(url, topic)?))
            }
        };
        channels.push(built);
    }

    if channels.len() > 1 {
        return Ok(Arc::new(FanoutSink::new(channels)));
    }
    match channels.pop() {
        Some((_, channel)) => Ok(channel),
        None => Ok(Arc::new(NullAlertSink)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use vigil_domain::{AlertCategory, Severity};

    struct Scripted {
        ok: bool,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(ok: bool) -> Arc<Self> {
            Arc::new(Self {
                ok,
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl AlertSinkPort for Scripted {
        async fn notify(&self, _alert: &AlertEvent) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            if self.ok {
                Ok(())
            } else {
                bail!("down")
            }
        }
    }

    fn alert() -> AlertEvent {
        AlertEvent::new(AlertCategory::Drift, Severity::Warning, "Drift", "drift 0.9")
    }

    #[tokio::test]
    async fn one_successful_channel_acknowledges() {
        let failing = Scripted::new(false);
        let working = Scripted::new(true);
        let sink = FanoutSink::new(vec![
            ("a".to_string(), failing.clone() as Arc<dyn AlertSinkPort>),
            ("b".to_string(), working.clone() as Arc<dyn AlertSinkPort>),
        ]);
        assert!(sink.notify(&alert()).await.is_ok());
        // every channel is attempted
        assert_eq!(*failing.calls.lock().unwrap(), 1);
        assert_eq!(*working.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn all_channels_failing_is_a_failure() {
        let sink = FanoutSink::new(vec![
            ("a".to_string(), Scripted::new(false) as Arc<dyn AlertSinkPort>),
            ("b".to_string(), Scripted::new(false) as Arc<dyn AlertSinkPort>),
        ]);
        let err = sink.notify(&alert()).await.unwrap_err();
        assert!(err.to_string().contains("a: down"));
        assert!(err.to_string().contains("b: down"));
    }

    #[tokio::test]
    async fn empty_config_logs_alerts() {
        let sink = build_alert_sink(&NotificationsConfig::default()).unwrap();
        assert!(sink.notify(&alert()).await.is_ok());
    }

    #[test]
    fn several_channels_build_a_fanout() {
        let config = NotificationsConfig {
            channels: vec![
                NotificationChannelConfig::Discord {
                    webhook_url: "https://discord.com/api/webhooks/1/x".to_string(),
                    username: None,
                },
                NotificationChannelConfig::Ntfy {
                    url: "https://ntfy.sh".to_string(),
                    topic: "ml".to_string(),
                },
            ],
        };
        assert!(build_alert_sink(&config).is_ok());
    }
}
