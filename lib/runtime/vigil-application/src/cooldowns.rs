use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use vigil_domain::{CooldownKey, CooldownState};

/// Cooldown map shared by the coordinator and the dispatcher.
///
/// The mutex is never held across an await point.
#[derive(Debug, Clone, Default)]
pub struct CooldownStore {
    state: Arc<Mutex<CooldownState>>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: CooldownState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn is_cooling(&self, key: CooldownKey, now: DateTime<Utc>, window: Duration) -> bool {
        self.guard().is_cooling(key, now, window)
    }

    pub fn remaining(&self, key: CooldownKey, now: DateTime<Utc>, window: Duration) -> Duration {
        self.guard().remaining(key, now, window)
    }

    pub fn last_triggered(&self, key: CooldownKey) -> Option<DateTime<Utc>> {
        self.guard().last_triggered(key)
    }

    pub fn mark(&self, key: CooldownKey, at: DateTime<Utc>) {
        self.guard().mark(key, at);
    }

    pub fn snapshot(&self) -> CooldownState {
        self.guard().clone()
    }

    fn guard(&self) -> MutexGuard<'_, CooldownState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
