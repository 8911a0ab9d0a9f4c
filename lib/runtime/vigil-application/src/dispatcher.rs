use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use vigil_domain::{AlertEvent, CooldownKey, RetryConfig, VigilConfig};
use vigil_ports::{AlertSinkPort, Clock, PortSet};

use crate::cooldowns::CooldownStore;
use crate::retry::call_bounded;

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub dedup_window: Duration,
    /// Per-attempt bound on the sink call.
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl DispatcherSettings {
    pub fn from_config(config: &VigilConfig) -> Self {
        Self {
            dedup_window: config.cooldowns.alert_dedup(),
            timeout: config.timeouts.alert(),
            retry: config.retry.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// Same category already delivered inside the dedup window.
    Deduplicated,
    Failed,
}

impl DispatchOutcome {
    pub fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Single path from alert events to the sink, deduplicated per category.
#[derive(Clone)]
pub struct AlertDispatcher {
    sink: Arc<dyn AlertSinkPort>,
    clock: Arc<dyn Clock>,
    cooldowns: CooldownStore,
    settings: DispatcherSettings,
}

impl AlertDispatcher {
    pub fn new(ports: &PortSet, cooldowns: CooldownStore, settings: DispatcherSettings) -> Self {
        Self {
            sink: Arc::clone(&ports.alerts),
            clock: Arc::clone(&ports.clock),
            cooldowns,
            settings,
        }
    }

    /// `true` only when the sink acknowledged the event.
    pub async fn dispatch(&self, event: &AlertEvent) -> bool {
        self.dispatch_detailed(event).await.is_delivered()
    }

    pub async fn dispatch_detailed(&self, event: &AlertEvent) -> DispatchOutcome {
        let key = CooldownKey::Alert(event.category);
        if self
            .cooldowns
            .is_cooling(key, self.clock.now(), self.settings.dedup_window)
        {
            debug!(category = %event.category, title = %event.title, "Alert deduplicated");
            return DispatchOutcome::Deduplicated;
        }
        self.deliver(event, Some(key)).await
    }

    /// Deliver a one-off notice (lifecycle, recovery, operator-requested run)
    /// without consulting or advancing the category's dedup window.
    pub async fn dispatch_notice(&self, event: &AlertEvent) -> DispatchOutcome {
        self.deliver(event, None).await
    }

    async fn deliver(&self, event: &AlertEvent, dedup_key: Option<CooldownKey>) -> DispatchOutcome {
        match call_bounded(
            "alerts.notify",
            self.settings.timeout,
            &self.settings.retry,
            || self.sink.notify(event),
        )
        .await
        {
            Ok(()) => {
                // marked on acknowledgment only, so a failed send is retried next tick
                if let Some(key) = dedup_key {
                    self.cooldowns.mark(key, self.clock.now());
                }
                debug!(
                    category = %event.category,
                    severity = %event.severity,
                    title = %event.title,
                    "Alert delivered"
                );
                DispatchOutcome::Delivered
            }
            Err(err) => {
                warn!(
                    category = %event.category,
                    title = %event.title,
                    error = %err,
                    "Alert delivery failed"
                );
                DispatchOutcome::Failed
            }
        }
    }
}
