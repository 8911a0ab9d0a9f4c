use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use vigil_domain::VigilError;
use vigil_ports::Clock;

#[derive(Debug, Clone, Copy)]
struct Lease {
    id: Uuid,
    acquired_at: DateTime<Utc>,
}

type Slot = Arc<Mutex<Option<Lease>>>;

/// Non-blocking "retrain in progress" lock.
///
/// A lease older than `stale_after` is treated as abandoned and may be taken
/// over by the next caller.
#[derive(Clone)]
pub struct RetrainLock {
    slot: Slot,
    clock: Arc<dyn Clock>,
    stale_after: Duration,
}

impl RetrainLock {
    pub fn new(clock: Arc<dyn Clock>, stale_after: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            clock,
            stale_after,
        }
    }

    pub fn try_acquire(&self) -> Result<RetrainGuard, VigilError> {
        let now = self.clock.now();
        let mut slot = lock_slot(&self.slot);
        if let Some(lease) = slot.as_ref() {
            let held_for = now
                .signed_duration_since(lease.acquired_at)
                .to_std()
                .unwrap_or_default();
            if held_for < self.stale_after {
                return Err(VigilError::ConcurrencyConflict);
            }
            warn!(
                lease = %lease.id,
                held_for_secs = held_for.as_secs(),
                "Retrain lock is stale, taking it over"
            );
        }

        let id = Uuid::new_v4();
        *slot = Some(Lease {
            id,
            acquired_at: now,
        });
        Ok(RetrainGuard {
            slot: Arc::clone(&self.slot),
            id,
        })
    }

    pub fn is_held(&self) -> bool {
        lock_slot(&self.slot).is_some()
    }
}

/// Releases the lease on drop, unless it has since been taken over.
#[derive(Debug)]
pub struct RetrainGuard {
    slot: Slot,
    id: Uuid,
}

impl RetrainGuard {
    pub fn lease_id(&self) -> Uuid {
        self.id
    }
}

impl Drop for RetrainGuard {
    fn drop(&mut self) {
        let mut slot = lock_slot(&self.slot);
        if slot.as_ref().is_some_and(|lease| lease.id == self.id) {
            *slot = None;
        }
    }
}

fn lock_slot(slot: &Slot) -> MutexGuard<'_, Option<Lease>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
