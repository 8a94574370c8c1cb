//! Bounded, concurrency-safe registry of active and historical runs.
//!
//! The store is an explicit, injectable object owned by whoever owns the
//! [`Executor`](crate::executor::Executor) — never a global. Control calls
//! (pause/resume/cancel/get-status) race with the coordinator's level loop,
//! so live run state sits behind a per-run lock and the active/history maps
//! behind a store-level lock.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::run::{ExecutionRun, RunSnapshot};
use crate::types::{RunId, RunStatus};

/// Shared handle to one live run.
///
/// The coordinator task mutates the inner [`ExecutionRun`] through short
/// lock-held sections (never across an await); control operations apply
/// status transitions through the same lock, and `resume` is signalled
/// through the [`Notify`] the coordinator parks on at level boundaries.
pub struct RunHandle {
    run: Mutex<ExecutionRun>,
    resume: Notify,
}

impl RunHandle {
    #[must_use]
    pub fn new(run: ExecutionRun) -> Arc<Self> {
        Arc::new(Self {
            run: Mutex::new(run),
            resume: Notify::new(),
        })
    }

    /// Deep copy of the current run state.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        self.run.lock().unwrap().snapshot()
    }

    /// Current run status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.run.lock().unwrap().status
    }

    /// Run a closure against the live run under the lock.
    ///
    /// The closure must not block or await.
    pub fn with_run<T>(&self, f: impl FnOnce(&mut ExecutionRun) -> T) -> T {
        f(&mut self.run.lock().unwrap())
    }

    /// Park at a level boundary until the run leaves `Paused`.
    ///
    /// Interest in the notification is registered before the status re-check
    /// so a `resume`/`cancel` landing in between cannot be lost. Returns the
    /// status observed after waking.
    pub async fn wait_while_paused(&self) -> RunStatus {
        loop {
            let notified = self.resume.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let status = self.status();
            if status != RunStatus::Paused {
                return status;
            }
            notified.await;
        }
    }

    /// `Running → Paused`. Takes effect at the next level boundary only.
    pub fn pause(&self) -> bool {
        let mut run = self.run.lock().unwrap();
        if run.status.can_transition_to(RunStatus::Paused) {
            run.status = RunStatus::Paused;
            true
        } else {
            false
        }
    }

    /// `Paused → Running`, waking the parked coordinator.
    pub fn resume(&self) -> bool {
        let resumed = {
            let mut run = self.run.lock().unwrap();
            if run.status == RunStatus::Paused {
                run.status = RunStatus::Running;
                true
            } else {
                false
            }
        };
        if resumed {
            self.resume.notify_waiters();
        }
        resumed
    }

    /// `Running|Paused → Cancelled`, stamping `ended_at` immediately.
    ///
    /// Already-dispatched node handlers are left to run to completion; their
    /// results are recorded but no further levels are scheduled.
    pub fn cancel(&self) -> bool {
        let cancelled = {
            let mut run = self.run.lock().unwrap();
            if run.status.can_transition_to(RunStatus::Cancelled) {
                run.finish(RunStatus::Cancelled, None);
                true
            } else {
                false
            }
        };
        if cancelled {
            // Wake a coordinator parked at a pause boundary.
            self.resume.notify_waiters();
        }
        cancelled
    }
}

struct StoreInner {
    active: FxHashMap<RunId, Arc<RunHandle>>,
    history: VecDeque<RunSnapshot>,
}

/// Registry of live run handles plus a bounded FIFO archive of finished runs.
pub struct ExecutionStore {
    inner: Mutex<StoreInner>,
    capacity: usize,
}

impl ExecutionStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                active: FxHashMap::default(),
                history: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Register a live run.
    pub fn register(&self, run_id: RunId, handle: Arc<RunHandle>) {
        self.inner.lock().unwrap().active.insert(run_id, handle);
    }

    /// Handle for a live run, if still active.
    #[must_use]
    pub fn handle(&self, run_id: &RunId) -> Option<Arc<RunHandle>> {
        self.inner.lock().unwrap().active.get(run_id).cloned()
    }

    /// Move a finished run from the active set into the history ring,
    /// evicting the oldest entry beyond capacity.
    pub fn archive(&self, run_id: &RunId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(handle) = inner.active.remove(run_id) {
            let snapshot = handle.snapshot();
            inner.history.push_front(snapshot);
            inner.history.truncate(self.capacity);
        }
    }

    /// Archive a run that never went live (e.g. rejected by validation).
    pub fn archive_snapshot(&self, snapshot: RunSnapshot) {
        let mut inner = self.inner.lock().unwrap();
        inner.history.push_front(snapshot);
        inner.history.truncate(self.capacity);
    }

    /// Snapshot of a run by id, live or archived.
    #[must_use]
    pub fn get(&self, run_id: &RunId) -> Option<RunSnapshot> {
        let inner = self.inner.lock().unwrap();
        if let Some(handle) = inner.active.get(run_id) {
            return Some(handle.snapshot());
        }
        inner.history.iter().find(|s| &s.id == run_id).cloned()
    }

    /// Archived runs, most recent first.
    #[must_use]
    pub fn list_history(&self) -> Vec<RunSnapshot> {
        self.inner.lock().unwrap().history.iter().cloned().collect()
    }

    /// Snapshots of all currently active runs.
    #[must_use]
    pub fn list_active(&self) -> Vec<RunSnapshot> {
        let handles: Vec<Arc<RunHandle>> = {
            let inner = self.inner.lock().unwrap();
            inner.active.values().cloned().collect()
        };
        handles.iter().map(|h| h.snapshot()).collect()
    }
}
