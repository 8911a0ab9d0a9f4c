use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vigil_domain::{
    CooldownKey, RetrainDecision, RetrainReason, RunOutcome, RunRecord, Signal, Verdict,
    VigilConfig, VigilError,
};
use vigil_ports::{Clock, DataGeneratorPort, PortSet, ServingPort, TrackerPort};

use crate::cooldowns::CooldownStore;
use crate::lock::RetrainLock;
use crate::retry::call_once;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub cooldown: Duration,
    pub generate_timeout: Duration,
    pub retrain_timeout: Duration,
    pub tracker_timeout: Duration,
    pub dataset_samples: u64,
    pub lock_stale_after: Duration,
}

impl CoordinatorSettings {
    pub fn from_config(config: &VigilConfig) -> Self {
        Self {
            cooldown: config.cooldowns.retrain(),
            generate_timeout: config.timeouts.generate(),
            retrain_timeout: config.timeouts.retrain(),
            tracker_timeout: config.timeouts.tracker(),
            dataset_samples: config.retrain.dataset_samples,
            lock_stale_after: config.retrain.lock_stale_after(&config.timeouts),
        }
    }
}

/// Turns verdicts into at most one retraining attempt per cooldown window and
/// at most one concurrent attempt overall.
#[derive(Clone)]
pub struct RetrainCoordinator {
    serving: Arc<dyn ServingPort>,
    generator: Arc<dyn DataGeneratorPort>,
    tracker: Arc<dyn TrackerPort>,
    clock: Arc<dyn Clock>,
    cooldowns: CooldownStore,
    lock: RetrainLock,
    settings: CoordinatorSettings,
}

impl RetrainCoordinator {
    pub fn new(ports: &PortSet, cooldowns: CooldownStore, settings: CoordinatorSettings) -> Self {
        let lock = RetrainLock::new(Arc::clone(&ports.clock), settings.lock_stale_after);
        Self {
            serving: Arc::clone(&ports.serving),
            generator: Arc::clone(&ports.generator),
            tracker: Arc::clone(&ports.tracker),
            clock: Arc::clone(&ports.clock),
            cooldowns,
            lock,
            settings,
        }
    }

    pub fn decide(&self, verdict: Verdict) -> RetrainDecision {
        let reason = RetrainReason::from_verdict(verdict);
        if reason == RetrainReason::None {
            return RetrainDecision::skip(reason);
        }
        let key = CooldownKey::Retrain(reason);
        if self
            .cooldowns
            .is_cooling(key, self.clock.now(), self.settings.cooldown)
        {
            return RetrainDecision::skip(reason);
        }
        RetrainDecision::retrain(reason)
    }

    /// Time until `verdict` may trigger a retrain again.
    pub fn cooldown_remaining(&self, verdict: Verdict) -> Duration {
        let reason = RetrainReason::from_verdict(verdict);
        if reason == RetrainReason::None {
            return Duration::ZERO;
        }
        self.cooldowns.remaining(
            CooldownKey::Retrain(reason),
            self.clock.now(),
            self.settings.cooldown,
        )
    }

    pub fn retrain_in_progress(&self) -> bool {
        self.lock.is_held()
    }

    /// Returns `None` when no retrain is justified, the reason is cooling
    /// down, or another attempt holds the lock.
    pub async fn handle(&self, verdict: Verdict, signal: &Signal) -> Option<RunRecord> {
        let decision = self.decide(verdict);
        if !decision.should_retrain {
            if decision.reason != RetrainReason::None {
                debug!(
                    reason = %decision.reason,
                    remaining_secs = self.cooldown_remaining(verdict).as_secs(),
                    "Retrain suppressed by cooldown"
                );
            }
            return None;
        }

        let _guard = match self.lock.try_acquire() {
            Ok(guard) => guard,
            Err(err) => {
                info!(reason = %decision.reason, error = %err, "Skipping retrain");
                return None;
            }
        };

        // another attempt may have finished between the first check and the lock
        let key = CooldownKey::Retrain(decision.reason);
        if self
            .cooldowns
            .is_cooling(key, self.clock.now(), self.settings.cooldown)
        {
            return None;
        }

        let record = self
            .run_retrain(decision.reason, signal.rolling_accuracy)
            .await;
        self.log_to_tracker(&record).await;
        self.cooldowns.mark(key, self.clock.now());
        Some(record)
    }

    /// Operator-requested retrain. Bypasses the cooldown but not the lock; a
    /// held lock yields a `skipped` record.
    pub async fn trigger_manual(&self, signal: &Signal) -> RunRecord {
        let guard = match self.lock.try_acquire() {
            Ok(guard) => guard,
            Err(err) => {
                let record = RunRecord {
                    run_id: Uuid::new_v4(),
                    trigger_reason: RetrainReason::Manual,
                    pre_accuracy: signal.rolling_accuracy,
                    post_accuracy: None,
                    training_samples: 0,
                    duration: Duration::ZERO,
                    timestamp: self.clock.now(),
                    outcome: RunOutcome::Skipped,
                    model_version: None,
                    error: Some(err.to_string()),
                };
                info!(run_id = %record.run_id, "Manual retrain skipped, another attempt is running");
                self.log_to_tracker(&record).await;
                return record;
            }
        };

        let record = self
            .run_retrain(RetrainReason::Manual, signal.rolling_accuracy)
            .await;
        self.log_to_tracker(&record).await;
        self.cooldowns
            .mark(CooldownKey::Retrain(RetrainReason::Manual), self.clock.now());
        drop(guard);
        record
    }

    async fn run_retrain(&self, reason: RetrainReason, pre_accuracy: f64) -> RunRecord {
        let run_id = Uuid::new_v4();
        let timestamp = self.clock.now();
        let started = Instant::now();
        info!(%run_id, %reason, pre_accuracy, "Starting retrain");

        let failed = |error: VigilError, training_samples: u64| {
            warn!(%run_id, %reason, error = %error, "Retrain failed");
            RunRecord {
                run_id,
                trigger_reason: reason,
                pre_accuracy,
                post_accuracy: None,
                training_samples,
                duration: started.elapsed(),
                timestamp,
                outcome: RunOutcome::Failed,
                model_version: None,
                error: Some(error.to_string()),
            }
        };

        let dataset = match call_once(
            "generator.generate",
            self.settings.generate_timeout,
            self.generator.generate(self.settings.dataset_samples),
        )
        .await
        {
            Ok(dataset) => dataset,
            Err(err) => return failed(err, 0),
        };
        debug!(
            %run_id,
            generation_id = dataset.generation_id,
            samples = dataset.samples_created,
            "Generated training dataset"
        );

        match call_once(
            "serving.retrain",
            self.settings.retrain_timeout,
            self.serving.retrain(&dataset),
        )
        .await
        {
            Ok(outcome) => {
                let record = RunRecord {
                    run_id,
                    trigger_reason: reason,
                    pre_accuracy,
                    post_accuracy: Some(outcome.accuracy),
                    training_samples: dataset.samples_created,
                    duration: started.elapsed(),
                    timestamp,
                    outcome: RunOutcome::Success,
                    model_version: Some(outcome.version),
                    error: None,
                };
                info!(
                    %run_id,
                    %reason,
                    pre_accuracy,
                    post_accuracy = outcome.accuracy,
                    duration_ms = record.duration.as_millis() as u64,
                    "Retrain completed"
                );
                record
            }
            Err(err) => failed(err, dataset.samples_created),
        }
    }

    /// Fire-and-forget: tracker trouble is logged and never fails the tick.
    async fn log_to_tracker(&self, record: &RunRecord) {
        let tracked = record.to_tracked_run();
        match call_once(
            "tracker.log_run",
            self.settings.tracker_timeout,
            self.tracker.log_run(&tracked),
        )
        .await
        {
            Ok(tracker_run_id) => {
                debug!(run_id = %record.run_id, %tracker_run_id, "Run logged to tracker")
            }
            Err(err) => {
                warn!(run_id = %record.run_id, error = %err, "Failed to log run to tracker")
            }
        }
    }
}
