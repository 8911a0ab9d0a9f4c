use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::alert::AlertCategory;
use crate::retrain::RetrainReason;

/// Key into the cooldown map. Retraining and alerting are tracked separately
/// even when they share a category name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownKey {
    Retrain(RetrainReason),
    Alert(AlertCategory),
}

impl std::fmt::Display for CooldownKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retrain(reason) => write!(f, "retrain:{reason}"),
            Self::Alert(category) => write!(f, "alert:{category}"),
        }
    }
}

/// Last trigger time per key.
#[derive(Debug, Clone, Default)]
pub struct CooldownState {
    entries: HashMap<CooldownKey, DateTime<Utc>>,
}

impl CooldownState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_triggered(&self, key: CooldownKey) -> Option<DateTime<Utc>> {
        self.entries.get(&key).copied()
    }

    /// True while `window` has not yet elapsed since the last trigger of `key`.
    pub fn is_cooling(&self, key: CooldownKey, now: DateTime<Utc>, window: Duration) -> bool {
        !self.remaining(key, now, window).is_zero()
    }

    /// Time left before `key` may fire again.
    ///
    /// A trigger up to one window in the future (clock stepped backwards)
    /// counts as just fired. One further ahead than that is stale and
    /// ignored, so a large step back suppresses a key for one window at most.
    pub fn remaining(&self, key: CooldownKey, now: DateTime<Utc>, window: Duration) -> Duration {
        let Some(last) = self.last_triggered(key) else {
            return Duration::ZERO;
        };
        match now.signed_duration_since(last).to_std() {
            Ok(elapsed) => window.saturating_sub(elapsed),
            Err(_) => match last.signed_duration_since(now).to_std() {
                Ok(ahead) if ahead <= window => window,
                _ => Duration::ZERO,
            },
        }
    }

    /// Record a trigger. The latest call wins, even if the clock went back.
    pub fn mark(&mut self, key: CooldownKey, at: DateTime<Utc>) {
        self.entries.insert(key, at);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
