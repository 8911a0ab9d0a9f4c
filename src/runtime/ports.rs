use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use vigil_adapter_ml::{HttpDataGenerator, HttpServingClient};
use vigil_adapter_notification::build_alert_sink;
use vigil_adapter_tracker::MlflowTracker;
use vigil_domain::{NotificationChannelConfig, VigilConfig};
use vigil_ports::{NullTracker, PortSet, SystemClock, TrackerPort};

const REDACTED: &str = "<redacted>";

/// Build the production adapters for every port.
pub fn build_ports(config: &VigilConfig) -> Result<PortSet> {
    let services = &config.services;
    let serving = Arc::new(HttpServingClient::new(
        &services.serving_url,
        services.api_token.clone(),
    )?);
    let generator = Arc::new(HttpDataGenerator::new(
        services.generator_url(),
        services.api_token.clone(),
    )?);

    let tracker: Arc<dyn TrackerPort> = match &services.tracker_url {
        Some(url) => {
            info!(
                tracker_url = %url,
                experiment_id = %services.experiment_id,
                "Logging runs to MLflow"
            );
            Arc::new(MlflowTracker::new(url, services.experiment_id.clone())?)
        }
        None => Arc::new(NullTracker),
    };

    Ok(PortSet {
        serving: serving.clone(),
        history: serving,
        generator,
        tracker,
        alerts: build_alert_sink(&config.notifications)?,
        clock: Arc::new(SystemClock),
    })
}

/// Copy of `config` safe to print: tokens and webhook URLs are masked.
pub fn redacted(config: &VigilConfig) -> VigilConfig {
    let mut config = config.clone();
    if config.services.api_token.is_some() {
        config.services.api_token = Some(REDACTED.to_string());
    }
    for channel in &mut config.notifications.channels {
        if let NotificationChannelConfig::Discord { webhook_url, .. } = channel {
            *webhook_url = REDACTED.to_string();
        }
    }
    config
}
