use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use vigil_domain::{RetryConfig, ServingHealth, Signal, VigilConfig, VigilError};
use vigil_ports::{Clock, HistoryPort, PortSet, ServingPort};

use crate::drift::drift_score;
use crate::retry::call_bounded;

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Per-attempt bound on every probe call.
    pub call_timeout: Duration,
    pub history_window: usize,
    pub retry: RetryConfig,
    pub canary_features: Option<Vec<f64>>,
}

impl ProbeSettings {
    pub fn from_config(config: &VigilConfig) -> Self {
        Self {
            call_timeout: config.timeouts.probe(),
            history_window: config.monitor.history_window,
            retry: config.retry.clone(),
            canary_features: config.services.canary_features.clone(),
        }
    }
}

/// A signal plus the failure that degraded it, if any.
#[derive(Debug)]
pub struct ProbeReading {
    pub signal: Signal,
    pub failure: Option<VigilError>,
}

/// Read-only collector of per-tick health signals.
#[derive(Clone)]
pub struct MetricProbe {
    serving: Arc<dyn ServingPort>,
    history: Arc<dyn HistoryPort>,
    clock: Arc<dyn Clock>,
    settings: ProbeSettings,
}

impl MetricProbe {
    pub fn new(ports: &PortSet, settings: ProbeSettings) -> Self {
        Self {
            serving: Arc::clone(&ports.serving),
            history: Arc::clone(&ports.history),
            clock: Arc::clone(&ports.clock),
            settings,
        }
    }

    pub async fn sample(&self) -> Signal {
        self.read().await.signal
    }

    /// Never fails: collaborator errors become an unhealthy or empty signal.
    pub async fn read(&self) -> ProbeReading {
        let timestamp = self.clock.now();
        let timeout = self.settings.call_timeout;
        let retry = &self.settings.retry;

        match call_bounded("serving.health", timeout, retry, || self.serving.health()).await {
            Ok(ServingHealth::Ok) => {}
            Ok(status) => {
                warn!(?status, "Serving API reports it is not healthy");
                return ProbeReading {
                    signal: Signal::unavailable(timestamp),
                    failure: Some(VigilError::transient(
                        "serving.health",
                        format!("status {status:?}"),
                    )),
                };
            }
            Err(err) => {
                warn!(error = %err, "Serving API health check failed");
                return ProbeReading {
                    signal: Signal::unavailable(timestamp),
                    failure: Some(err),
                };
            }
        }

        if let Some(features) = &self.settings.canary_features {
            if let Err(err) =
                call_bounded("serving.predict", timeout, retry, || self.serving.predict(features))
                    .await
            {
                warn!(error = %err, "Canary prediction failed");
                return ProbeReading {
                    signal: Signal::unavailable(timestamp),
                    failure: Some(err),
                };
            }
        }

        let window = self.settings.history_window;
        let history = async {
            let recent = call_bounded("history.recent", timeout, retry, || {
                self.history.recent_predictions(window)
            })
            .await?;
            let baseline = call_bounded("history.baseline", timeout, retry, || {
                self.history.baseline_features()
            })
            .await?;
            Ok::<_, VigilError>((recent, baseline))
        };

        let (recent, baseline) = match history.await {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, "Prediction history unavailable");
                return ProbeReading {
                    signal: Signal {
                        timestamp,
                        api_healthy: true,
                        rolling_accuracy: 0.0,
                        drift_score: 0.0,
                        sample_count: 0,
                    },
                    failure: Some(err),
                };
            }
        };

        let mut recent = recent;
        recent.truncate(window);
        let (correct, labeled) = recent
            .iter()
            .filter_map(|entry| entry.is_correct())
            .fold((0u64, 0u64), |(correct, labeled), hit| {
                (correct + u64::from(hit), labeled + 1)
            });
        let rolling_accuracy = if labeled == 0 {
            0.0
        } else {
            correct as f64 / labeled as f64
        };

        let features: Vec<Vec<f64>> = recent.into_iter().map(|entry| entry.features).collect();
        let drift = drift_score(&baseline, &features);

        debug!(
            labeled,
            window_size = features.len(),
            baseline_size = baseline.len(),
            rolling_accuracy,
            drift_score = drift,
            "Probe sampled signal"
        );

        ProbeReading {
            signal: Signal {
                timestamp,
                api_healthy: true,
                rolling_accuracy,
                drift_score: drift,
                sample_count: labeled,
            },
            failure: None,
        }
    }
}
