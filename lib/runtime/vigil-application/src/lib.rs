//! Monitoring and conditional-retraining orchestration.
//!
//! One tick runs [`MetricProbe`] -> [`evaluate`] -> [`RetrainCoordinator`] ->
//! [`AlertDispatcher`]; the [`Scheduler`] repeats ticks on a fixed interval.

pub mod alerts;
pub mod cooldowns;
pub mod coordinator;
pub mod dispatcher;
pub mod drift;
pub mod evaluator;
pub mod lock;
pub mod probe;
pub mod retry;
pub mod scheduler;

pub use cooldowns::CooldownStore;
pub use coordinator::{CoordinatorSettings, RetrainCoordinator};
pub use dispatcher::{AlertDispatcher, DispatchOutcome, DispatcherSettings};
pub use evaluator::evaluate;
pub use lock::{RetrainGuard, RetrainLock};
pub use probe::{MetricProbe, ProbeReading, ProbeSettings};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerSettings, TickReport};

#[cfg(test)]
mod test_support;
