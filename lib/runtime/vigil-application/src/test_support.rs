//! In-memory fakes for every port plus a harness wiring them together.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use vigil_domain::{
    AlertEvent, DatasetRef, LabeledPrediction, Prediction, RetrainOutcome, ServingHealth,
    TrackedRun, VigilConfig,
};
use vigil_ports::{
    AlertSinkPort, Clock, DataGeneratorPort, HistoryPort, PortSet, ServingPort, TrackerPort,
};

use crate::{
    AlertDispatcher, CooldownStore, CoordinatorSettings, DispatcherSettings, MetricProbe,
    ProbeSettings, RetrainCoordinator, Scheduler, SchedulerHandle, SchedulerSettings,
};

/// Test clock. Starts at a fixed instant; `advance` moves it forward. A
/// clock built with [`ManualClock::following_runtime`] also moves with
/// (paused) tokio time.
pub struct ManualClock {
    base: DateTime<Utc>,
    offset: Mutex<Duration>,
    anchor: Option<tokio::time::Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            base: start_time(),
            offset: Mutex::new(Duration::ZERO),
            anchor: None,
        }
    }
}

impl ManualClock {
    pub fn following_runtime() -> Self {
        Self {
            anchor: Some(tokio::time::Instant::now()),
            ..Self::default()
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut elapsed = *self.offset.lock().unwrap();
        if let Some(anchor) = self.anchor {
            elapsed += anchor.elapsed();
        }
        self.base + chrono::Duration::from_std(elapsed).unwrap()
    }
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

pub fn labeled(features: Vec<f64>, prediction: i64, label: Option<i64>) -> LabeledPrediction {
    LabeledPrediction {
        features,
        prediction,
        label,
        timestamp: None,
    }
}

#[derive(Debug)]
struct ServingState {
    health: ServingHealth,
    fail_health: bool,
    health_delay: Duration,
    fail_predict: bool,
    fail_retrain: bool,
    retrain_delay: Duration,
    retrain_accuracy: f64,
}

pub struct FakeServing {
    state: Mutex<ServingState>,
    health_calls: AtomicU32,
    retrain_calls: AtomicU32,
}

impl Default for FakeServing {
    fn default() -> Self {
        Self {
            state: Mutex::new(ServingState {
                health: ServingHealth::Ok,
                fail_health: false,
                health_delay: Duration::ZERO,
                fail_predict: false,
                fail_retrain: false,
                retrain_delay: Duration::ZERO,
                retrain_accuracy: 0.93,
            }),
            health_calls: AtomicU32::new(0),
            retrain_calls: AtomicU32::new(0),
        }
    }
}

impl FakeServing {
    pub fn set_health(&self, health: ServingHealth) {
        self.state.lock().unwrap().health = health;
    }

    pub fn fail_health(&self, fail: bool) {
        self.state.lock().unwrap().fail_health = fail;
    }

    pub fn set_health_delay(&self, delay: Duration) {
        self.state.lock().unwrap().health_delay = delay;
    }

    pub fn fail_predict(&self, fail: bool) {
        self.state.lock().unwrap().fail_predict = fail;
    }

    pub fn fail_retrain(&self, fail: bool) {
        self.state.lock().unwrap().fail_retrain = fail;
    }

    pub fn set_retrain_delay(&self, delay: Duration) {
        self.state.lock().unwrap().retrain_delay = delay;
    }

    pub fn health_calls(&self) -> u32 {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn retrain_calls(&self) -> u32 {
        self.retrain_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServingPort for FakeServing {
    async fn health(&self) -> Result<ServingHealth> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let (health, fail, delay) = {
            let state = self.state.lock().unwrap();
            (state.health, state.fail_health, state.health_delay)
        };
        tokio::time::sleep(delay).await;
        if fail {
            bail!("connection refused");
        }
        Ok(health)
    }

    async fn predict(&self, _features: &[f64]) -> Result<Prediction> {
        if self.state.lock().unwrap().fail_predict {
            bail!("predict returned 500");
        }
        Ok(Prediction {
            label: 1,
            confidence: 0.9,
            model_version: Some("v1".to_string()),
        })
    }

    async fn retrain(&self, dataset: &DatasetRef) -> Result<RetrainOutcome> {
        let calls = self.retrain_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let (fail, delay, accuracy) = {
            let state = self.state.lock().unwrap();
            (state.fail_retrain, state.retrain_delay, state.retrain_accuracy)
        };
        tokio::time::sleep(delay).await;
        if fail {
            bail!("retrain of generation {} failed", dataset.generation_id);
        }
        Ok(RetrainOutcome {
            version: format!("v{}", calls + 1),
            accuracy,
        })
    }
}

#[derive(Debug, Default)]
struct HistoryState {
    recent: Vec<LabeledPrediction>,
    baseline: Vec<Vec<f64>>,
    fail: bool,
}

#[derive(Default)]
pub struct FakeHistory {
    state: Mutex<HistoryState>,
}

impl FakeHistory {
    pub fn set_recent(&self, recent: Vec<LabeledPrediction>) {
        self.state.lock().unwrap().recent = recent;
    }

    pub fn set_baseline(&self, baseline: Vec<Vec<f64>>) {
        self.state.lock().unwrap().baseline = baseline;
    }

    pub fn fail(&self, fail: bool) {
        self.state.lock().unwrap().fail = fail;
    }

    /// 50 correct predictions drawn from the baseline distribution.
    pub fn show_healthy(&self) {
        self.set_baseline(grid(0.0));
        self.set_recent(window(0.0, 50));
    }

    /// Same distribution as the baseline, 60% accuracy.
    pub fn show_degradation(&self) {
        self.set_baseline(grid(0.0));
        self.set_recent(window(0.0, 30));
    }

    /// Accurate predictions on inputs far outside the baseline.
    pub fn show_drift(&self) {
        self.set_baseline(grid(0.0));
        self.set_recent(window(500.0, 50));
    }
}

fn grid(offset: f64) -> Vec<Vec<f64>> {
    (0..50).map(|i| vec![offset + i as f64]).collect()
}

/// 50 labeled entries, the first `correct` of them predicted correctly.
fn window(offset: f64, correct: usize) -> Vec<LabeledPrediction> {
    grid(offset)
        .into_iter()
        .enumerate()
        .map(|(i, features)| labeled(features, 1, Some(if i < correct { 1 } else { 0 })))
        .collect()
}

#[async_trait]
impl HistoryPort for FakeHistory {
    async fn recent_predictions(&self, limit: usize) -> Result<Vec<LabeledPrediction>> {
        let state = self.state.lock().unwrap();
        if state.fail {
            bail!("history endpoint unavailable");
        }
        Ok(state.recent.iter().take(limit).cloned().collect())
    }

    async fn baseline_features(&self) -> Result<Vec<Vec<f64>>> {
        let state = self.state.lock().unwrap();
        if state.fail {
            bail!("history endpoint unavailable");
        }
        Ok(state.baseline.clone())
    }
}

#[derive(Default)]
pub struct FakeGenerator {
    fail: Mutex<bool>,
    calls: AtomicU32,
}

impl FakeGenerator {
    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataGeneratorPort for FakeGenerator {
    async fn generate(&self, samples: u64) -> Result<DatasetRef> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail.lock().unwrap() {
            bail!("generator returned 503");
        }
        Ok(DatasetRef {
            generation_id: i64::from(calls),
            samples_created: samples,
        })
    }
}

#[derive(Default)]
pub struct RecordingTracker {
    runs: Mutex<Vec<TrackedRun>>,
    fail: Mutex<bool>,
}

impl RecordingTracker {
    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn runs(&self) -> Vec<TrackedRun> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackerPort for RecordingTracker {
    async fn log_run(&self, run: &TrackedRun) -> Result<String> {
        if *self.fail.lock().unwrap() {
            bail!("tracker unreachable");
        }
        let mut runs = self.runs.lock().unwrap();
        runs.push(run.clone());
        Ok(format!("run-{}", runs.len()))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<AlertEvent>>,
    fail: Mutex<bool>,
    attempts: AtomicU32,
}

impl RecordingSink {
    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn delivered(&self) -> Vec<AlertEvent> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertSinkPort for RecordingSink {
    async fn notify(&self, alert: &AlertEvent) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            bail!("webhook returned 500");
        }
        self.delivered.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Fakes plus the configuration the components under test are built from.
/// Coordinator and dispatcher built from one harness share its cooldowns.
pub struct Harness {
    pub config: VigilConfig,
    pub clock: Arc<ManualClock>,
    pub serving: Arc<FakeServing>,
    pub history: Arc<FakeHistory>,
    pub generator: Arc<FakeGenerator>,
    pub tracker: Arc<RecordingTracker>,
    pub sink: Arc<RecordingSink>,
    pub cooldowns: CooldownStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut VigilConfig)) -> Self {
        let mut config = VigilConfig::default();
        configure(&mut config);
        let harness = Self {
            config,
            clock: Arc::new(ManualClock::following_runtime()),
            serving: Arc::new(FakeServing::default()),
            history: Arc::new(FakeHistory::default()),
            generator: Arc::new(FakeGenerator::default()),
            tracker: Arc::new(RecordingTracker::default()),
            sink: Arc::new(RecordingSink::default()),
            cooldowns: CooldownStore::new(),
        };
        harness.history.show_healthy();
        harness
    }

    pub fn ports(&self) -> PortSet {
        PortSet {
            serving: self.serving.clone(),
            history: self.history.clone(),
            generator: self.generator.clone(),
            tracker: self.tracker.clone(),
            alerts: self.sink.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn probe(&self) -> MetricProbe {
        MetricProbe::new(&self.ports(), ProbeSettings::from_config(&self.config))
    }

    pub fn coordinator(&self) -> RetrainCoordinator {
        RetrainCoordinator::new(
            &self.ports(),
            self.cooldowns.clone(),
            CoordinatorSettings::from_config(&self.config),
        )
    }

    pub fn dispatcher(&self) -> AlertDispatcher {
        AlertDispatcher::new(
            &self.ports(),
            self.cooldowns.clone(),
            DispatcherSettings::from_config(&self.config),
        )
    }

    pub fn scheduler(&self) -> (Scheduler, SchedulerHandle) {
        Scheduler::new(
            self.probe(),
            self.coordinator(),
            self.dispatcher(),
            SchedulerSettings::from_config(&self.config),
        )
    }
}
