use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use super::event::Event;

/// Errors that can occur when emitting an event.
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("event bus closed")]
    Closed,
    #[error("event buffer full; event dropped")]
    Full,
}

/// Cloneable handle that producers use to push events onto the bus.
///
/// Emission is synchronous and never blocks: the underlying channel is
/// bounded, and when it is full the event is dropped (drop-new policy),
/// counted, and logged. The coordinator treats every emit as best-effort.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    tx: flume::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventEmitter {
    pub(super) fn new(tx: flume::Sender<Event>, dropped: Arc<AtomicU64>) -> Self {
        Self { tx, dropped }
    }

    /// Emit an event without blocking.
    ///
    /// Returns `Err(EmitterError::Full)` when the event was dropped because
    /// the buffer is at capacity, `Err(EmitterError::Closed)` after the bus
    /// shut down. Callers on the hot path ignore both.
    pub fn emit(&self, event: Event) -> Result<(), EmitterError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(flume::TrySendError::Full(event)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    run_id = %event.run_id(),
                    dropped_total = total,
                    "event buffer full; dropping event"
                );
                Err(EmitterError::Full)
            }
            Err(flume::TrySendError::Disconnected(_)) => Err(EmitterError::Closed),
        }
    }

    /// Total number of events dropped because the buffer was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
