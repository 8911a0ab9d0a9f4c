//! Builders for every alert event the orchestrator emits.

use std::time::Duration;

use vigil_domain::{AlertCategory, AlertEvent, RunOutcome, RunRecord, Severity, Signal, Verdict};

pub fn run_record_alert(record: &RunRecord) -> AlertEvent {
    let reason = record.trigger_reason;
    let (severity, title) = match record.outcome {
        RunOutcome::Success => (Severity::Warning, format!("Model retrained ({reason})")),
        RunOutcome::Failed => (Severity::Critical, format!("Retrain failed ({reason})")),
        RunOutcome::Skipped => (Severity::Info, format!("Retrain skipped ({reason})")),
    };

    let mut message = format!(
        "Run {} | pre-accuracy {:.3}",
        record.run_id, record.pre_accuracy
    );
    if let Some(post) = record.post_accuracy {
        message.push_str(&format!(
            " | post-accuracy {post:.3} ({:+.3})",
            post - record.pre_accuracy
        ));
    }
    if let Some(version) = &record.model_version {
        message.push_str(&format!(" | model {version}"));
    }
    if record.training_samples > 0 {
        message.push_str(&format!(" | {} samples", record.training_samples));
    }
    message.push_str(&format!(" | {}ms", record.duration.as_millis()));
    if let Some(error) = &record.error {
        message.push_str(&format!(" | error: {error}"));
    }

    AlertEvent::new(reason.alert_category(), severity, title, message)
}

/// The model needs attention but the retrain for this reason is cooling down
/// or already running.
pub fn suppressed_notice(verdict: Verdict, signal: &Signal, remaining: Duration) -> AlertEvent {
    let category = match verdict {
        Verdict::Drifted => AlertCategory::Drift,
        Verdict::Degraded => AlertCategory::Degradation,
        Verdict::Healthy | Verdict::Unknown => AlertCategory::Info,
    };
    let wait = if remaining.is_zero() {
        "a retrain is already in progress".to_string()
    } else {
        format!("retrain cooling down for another {}s", remaining.as_secs())
    };
    AlertEvent::new(
        category,
        Severity::Info,
        format!("Model {verdict}, retrain suppressed"),
        format!(
            "accuracy {:.3} | drift {:.3} | {} samples | {wait}",
            signal.rolling_accuracy, signal.drift_score, signal.sample_count
        ),
    )
}

/// One combined low-severity health alert for every step whose failure
/// streak reached the threshold.
pub fn step_failure_alert(failing: &[(&str, u32)]) -> AlertEvent {
    let steps = failing
        .iter()
        .map(|(step, streak)| format!("{step} failed {streak} ticks in a row"))
        .collect::<Vec<_>>()
        .join("; ");
    AlertEvent::new(
        AlertCategory::Health,
        Severity::Info,
        "Monitoring steps failing",
        steps,
    )
}

/// Serving API went down (health check failed or reported not ok).
pub fn api_down_alert(serving_url: &str) -> AlertEvent {
    AlertEvent::new(
        AlertCategory::Health,
        Severity::Critical,
        "Serving API down",
        format!("{serving_url} failed its health check; retraining is paused until it recovers"),
    )
}

pub fn recovery_notice(serving_url: &str, down_ticks: u64, signal: &Signal) -> AlertEvent {
    AlertEvent::new(
        AlertCategory::Health,
        Severity::Info,
        "Serving API recovered",
        format!(
            "{serving_url} healthy again after {down_ticks} tick(s) | accuracy {:.3} | drift {:.3}",
            signal.rolling_accuracy, signal.drift_score
        ),
    )
}

pub fn startup_notice(tick_interval: Duration, serving_url: &str) -> AlertEvent {
    AlertEvent::new(
        AlertCategory::Info,
        Severity::Info,
        "Model monitor started",
        format!(
            "Watching {serving_url} every {}s",
            tick_interval.as_secs()
        ),
    )
}

pub fn status_report(tick: u64, verdict: Verdict, signal: &Signal) -> AlertEvent {
    AlertEvent::new(
        AlertCategory::Info,
        Severity::Info,
        format!("Status report (tick {tick})"),
        format!(
            "verdict {verdict} | api {} | accuracy {:.3} | drift {:.3} | {} samples",
            if signal.api_healthy { "up" } else { "down" },
            signal.rolling_accuracy,
            signal.drift_score,
            signal.sample_count
        ),
    )
}

pub fn shutdown_notice(ticks: u64) -> AlertEvent {
    AlertEvent::new(
        AlertCategory::Info,
        Severity::Info,
        "Model monitor stopped",
        format!("Monitor loop stopped after {ticks} tick(s)"),
    )
}
