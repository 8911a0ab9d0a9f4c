use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use vigil_domain::{RetryConfig, VigilError};

/// Run `op` under a per-attempt timeout, retrying with backoff up to
/// `policy.max_attempts` times. Every failure mode collapses into
/// [`VigilError::TransientIo`] tagged with `collaborator`.
pub async fn call_bounded<T, F, Fut>(
    collaborator: &'static str,
    timeout: Duration,
    policy: &RetryConfig,
    mut op: F,
) -> Result<T, VigilError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match tokio::time::timeout(timeout, op()).await {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    debug!(collaborator, attempt, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Ok(Err(err)) => last_error = format!("{err:#}"),
            Err(_) => last_error = format!("timed out after {}ms", timeout.as_millis()),
        }

        if attempt < attempts {
            let delay = policy.backoff_after(attempt);
            warn!(
                collaborator,
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "Call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(VigilError::transient(collaborator, last_error))
}

/// Single bounded attempt, for calls that must not be repeated within a tick.
pub async fn call_once<T, Fut>(
    collaborator: &'static str,
    timeout: Duration,
    fut: Fut,
) -> Result<T, VigilError>
where
    Fut: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(VigilError::transient(collaborator, format!("{err:#}"))),
        Err(_) => Err(VigilError::transient(
            collaborator,
            format!("timed out after {}ms", timeout.as_millis()),
        )),
    }
}
