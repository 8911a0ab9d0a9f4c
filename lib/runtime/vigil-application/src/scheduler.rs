use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use vigil_domain::{AlertEvent, RunOutcome, RunRecord, Signal, Thresholds, Verdict, VigilConfig};
use vigil_ports::PortSet;

use crate::alerts;
use crate::cooldowns::CooldownStore;
use crate::coordinator::{CoordinatorSettings, RetrainCoordinator};
use crate::dispatcher::{AlertDispatcher, DispatchOutcome, DispatcherSettings};
use crate::evaluator::evaluate;
use crate::probe::{MetricProbe, ProbeSettings};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub tick_interval: Duration,
    pub failure_alert_after: u32,
    /// 0 disables status reports.
    pub status_report_every: u64,
    pub thresholds: Thresholds,
    /// Stop after this many ticks; run until shutdown when `None`.
    pub max_ticks: Option<u64>,
    pub serving_url: String,
}

impl SchedulerSettings {
    pub fn from_config(config: &VigilConfig) -> Self {
        Self {
            tick_interval: config.monitor.tick_interval(),
            failure_alert_after: config.monitor.failure_alert_after,
            status_report_every: config.monitor.status_report_every,
            thresholds: config.thresholds,
            max_ticks: None,
            serving_url: config.services.serving_url.clone(),
        }
    }
}

/// Everything one tick observed and did.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub signal: Signal,
    pub verdict: Verdict,
    pub record: Option<RunRecord>,
    pub alerts: Vec<(AlertEvent, DispatchOutcome)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Probe,
    Retrain,
    Dispatch,
}

impl Step {
    const ALL: [Step; 3] = [Step::Probe, Step::Retrain, Step::Dispatch];

    fn as_str(self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::Retrain => "retrain",
            Self::Dispatch => "dispatch",
        }
    }
}

/// Consecutive failing ticks per step.
#[derive(Debug, Default)]
struct FailureStreaks([u32; 3]);

impl FailureStreaks {
    fn record(&mut self, step: Step, ok: bool) {
        let streak = &mut self.0[step as usize];
        *streak = if ok { 0 } else { streak.saturating_add(1) };
    }

    fn at_least(&self, threshold: u32) -> Vec<(&'static str, u32)> {
        Step::ALL
            .iter()
            .map(|step| (step.as_str(), self.0[*step as usize]))
            .filter(|(_, streak)| threshold > 0 && *streak >= threshold)
            .collect()
    }
}

/// Serving API availability as last observed by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ApiState {
    #[default]
    Up,
    /// `reported` once the down alert reached operators (or a health alert
    /// already had); only then does recovery send a notice.
    Down { since_tick: u64, reported: bool },
}

/// Control surface of a running [`Scheduler`]. Dropping it stops the loop
/// after the current tick.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    manual: mpsc::UnboundedSender<()>,
    shutdown: watch::Sender<bool>,
}

impl SchedulerHandle {
    /// Ask for an operator retrain on the next tick, which runs immediately.
    pub fn request_retrain(&self) -> bool {
        self.manual.send(()).is_ok()
    }

    /// Finish the current tick and start no new one.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

enum Wake {
    Tick,
    Manual,
    ManualClosed,
    Shutdown,
    HandleDropped,
}

pub struct Scheduler {
    probe: MetricProbe,
    coordinator: RetrainCoordinator,
    dispatcher: AlertDispatcher,
    settings: SchedulerSettings,
    streaks: FailureStreaks,
    api: ApiState,
    ticks: u64,
    manual: mpsc::UnboundedReceiver<()>,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        probe: MetricProbe,
        coordinator: RetrainCoordinator,
        dispatcher: AlertDispatcher,
        settings: SchedulerSettings,
    ) -> (Self, SchedulerHandle) {
        let (manual_tx, manual_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Self {
            probe,
            coordinator,
            dispatcher,
            settings,
            streaks: FailureStreaks::default(),
            api: ApiState::default(),
            ticks: 0,
            manual: manual_rx,
            shutdown: shutdown_rx,
        };
        let handle = SchedulerHandle {
            manual: manual_tx,
            shutdown: shutdown_tx,
        };
        (scheduler, handle)
    }

    /// Wire the full pipeline over one shared cooldown map.
    pub fn from_config(config: &VigilConfig, ports: PortSet) -> (Self, SchedulerHandle) {
        let cooldowns = CooldownStore::new();
        let probe = MetricProbe::new(&ports, ProbeSettings::from_config(config));
        let coordinator = RetrainCoordinator::new(
            &ports,
            cooldowns.clone(),
            CoordinatorSettings::from_config(config),
        );
        let dispatcher =
            AlertDispatcher::new(&ports, cooldowns, DispatcherSettings::from_config(config));
        Self::new(
            probe,
            coordinator,
            dispatcher,
            SchedulerSettings::from_config(config),
        )
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.settings.max_ticks = max_ticks;
        self
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run ticks until shutdown or `max_ticks`. Returns the number of ticks run.
    /// A startup notice precedes the first tick and a stop notice follows the
    /// last; an in-flight tick always completes.
    pub async fn run(mut self) -> u64 {
        let mut interval = tokio::time::interval(self.settings.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            tick_interval_secs = self.settings.tick_interval.as_secs(),
            serving_url = %self.settings.serving_url,
            "Monitor loop started"
        );
        let notice = alerts::startup_notice(self.settings.tick_interval, &self.settings.serving_url);
        self.dispatcher.dispatch_notice(&notice).await;

        let mut manual_open = true;
        loop {
            if self
                .settings
                .max_ticks
                .is_some_and(|max| self.ticks >= max)
            {
                break;
            }
            if *self.shutdown.borrow() {
                break;
            }

            let wake = tokio::select! {
                biased;
                changed = self.shutdown.changed() => match changed {
                    Ok(()) => Wake::Shutdown,
                    Err(_) => Wake::HandleDropped,
                },
                request = self.manual.recv(), if manual_open => match request {
                    Some(()) => Wake::Manual,
                    None => Wake::ManualClosed,
                },
                _ = interval.tick() => Wake::Tick,
            };

            match wake {
                Wake::Shutdown => {
                    if *self.shutdown.borrow() {
                        break;
                    }
                }
                Wake::HandleDropped => break,
                Wake::ManualClosed => manual_open = false,
                Wake::Manual => {
                    self.run_tick(true).await;
                    interval.reset();
                }
                Wake::Tick => {
                    self.run_tick(false).await;
                }
            }
        }

        info!(ticks = self.ticks, "Monitor loop stopped");
        self.dispatcher
            .dispatch_notice(&alerts::shutdown_notice(self.ticks))
            .await;
        self.ticks
    }

    /// One monitoring cycle. Never fails: every step degrades to a safe default.
    pub async fn tick(&mut self) -> TickReport {
        self.run_tick(false).await
    }

    async fn run_tick(&mut self, manual: bool) -> TickReport {
        self.ticks += 1;
        let tick = self.ticks;

        let reading = self.probe.read().await;
        self.streaks.record(Step::Probe, reading.failure.is_none());
        let signal = reading.signal;

        let verdict = evaluate(&signal, &self.settings.thresholds);
        info!(
            tick,
            %verdict,
            api_healthy = signal.api_healthy,
            rolling_accuracy = signal.rolling_accuracy,
            drift_score = signal.drift_score,
            sample_count = signal.sample_count,
            "Tick evaluated"
        );

        let record = if manual {
            Some(self.coordinator.trigger_manual(&signal).await)
        } else {
            self.coordinator.handle(verdict, &signal).await
        };
        // only attempts count; a cooling tick neither fails nor clears the streak
        if let Some(record) = &record {
            match record.outcome {
                RunOutcome::Success => self.streaks.record(Step::Retrain, true),
                RunOutcome::Failed => self.streaks.record(Step::Retrain, false),
                RunOutcome::Skipped => {}
            }
        }

        let mut sent = HashSet::new();
        let mut dispatched = Vec::new();
        let mut notices = Vec::new();

        if signal.api_healthy {
            if let ApiState::Down {
                since_tick,
                reported: true,
            } = self.api
            {
                notices.push(alerts::recovery_notice(
                    &self.settings.serving_url,
                    tick - since_tick,
                    &signal,
                ));
            }
            self.api = ApiState::Up;
        } else {
            let since_tick = match self.api {
                ApiState::Up => tick,
                ApiState::Down { since_tick, .. } => since_tick,
            };
            let reported = match self.api {
                ApiState::Down { reported: true, .. } => true,
                _ => {
                    // retried every tick until delivered; takes the tick's health slot
                    let alert = alerts::api_down_alert(&self.settings.serving_url);
                    sent.insert(alert.category);
                    let outcome = self.dispatcher.dispatch_detailed(&alert).await;
                    dispatched.push((alert, outcome));
                    outcome != DispatchOutcome::Failed
                }
            };
            self.api = ApiState::Down {
                since_tick,
                reported,
            };
        }

        let mut events = Vec::new();
        match &record {
            // operator-requested runs always report back
            Some(record) if manual => notices.push(alerts::run_record_alert(record)),
            Some(record) => events.push(alerts::run_record_alert(record)),
            None if verdict.is_actionable() => events.push(alerts::suppressed_notice(
                verdict,
                &signal,
                self.coordinator.cooldown_remaining(verdict),
            )),
            None => {}
        }
        let failing = self.streaks.at_least(self.settings.failure_alert_after);
        if !failing.is_empty() {
            warn!(?failing, "Monitoring steps keep failing");
            events.push(alerts::step_failure_alert(&failing));
        }
        let every = self.settings.status_report_every;
        if every > 0 && tick % every == 0 {
            notices.push(alerts::status_report(tick, verdict, &signal));
        }

        // one alert per category per tick; notices take the slot first
        for notice in notices {
            if !sent.insert(notice.category) {
                continue;
            }
            let outcome = self.dispatcher.dispatch_notice(&notice).await;
            dispatched.push((notice, outcome));
        }
        for event in events {
            if !sent.insert(event.category) {
                continue;
            }
            let outcome = self.dispatcher.dispatch_detailed(&event).await;
            dispatched.push((event, outcome));
        }
        let dispatch_failed = dispatched
            .iter()
            .any(|(_, outcome)| *outcome == DispatchOutcome::Failed);
        self.streaks.record(Step::Dispatch, !dispatch_failed);

        TickReport {
            tick,
            signal,
            verdict,
            record,
            alerts: dispatched,
        }
    }
}
