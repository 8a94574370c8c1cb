//! ExecutionStore and RunHandle behavior: registration, archiving, bounded
//! history, and control-state transitions.

use std::sync::Arc;

use flowgrid::graph::GraphModel;
use flowgrid::run::ExecutionRun;
use flowgrid::store::{ExecutionStore, RunHandle};
use flowgrid::types::{RunId, RunStatus};

fn fresh_run() -> (RunId, ExecutionRun) {
    let run_id = RunId::new();
    let graph = Arc::new(GraphModel::new("g", vec![], vec![]));
    (run_id.clone(), ExecutionRun::new(run_id, graph))
}

#[test]
fn live_runs_are_visible_until_archived() {
    let store = ExecutionStore::new(10);
    let (run_id, run) = fresh_run();
    store.register(run_id.clone(), RunHandle::new(run));

    assert!(store.handle(&run_id).is_some());
    assert_eq!(store.get(&run_id).unwrap().status, RunStatus::Running);
    assert_eq!(store.list_active().len(), 1);
    assert!(store.list_history().is_empty());

    store.archive(&run_id);
    assert!(store.handle(&run_id).is_none());
    assert!(store.list_active().is_empty());
    assert_eq!(store.list_history().len(), 1);
    // Still resolvable by id from history.
    assert!(store.get(&run_id).is_some());
}

#[test]
fn history_is_bounded_and_most_recent_first() {
    let store = ExecutionStore::new(2);
    let mut ids = Vec::new();
    for _ in 0..4 {
        let (run_id, run) = fresh_run();
        store.register(run_id.clone(), RunHandle::new(run));
        store.archive(&run_id);
        ids.push(run_id);
    }

    let history = store.list_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, ids[3]);
    assert_eq!(history[1].id, ids[2]);
    assert!(store.get(&ids[0]).is_none());
    assert!(store.get(&ids[1]).is_none());
}

#[test]
fn archive_snapshot_covers_rejected_runs() {
    let store = ExecutionStore::new(2);
    let (run_id, run) = fresh_run();
    let rejected = ExecutionRun::rejected(run_id.clone(), run.graph.clone(), "graph contains cycles");
    store.archive_snapshot(rejected.snapshot());

    let fetched = store.get(&run_id).unwrap();
    assert_eq!(fetched.status, RunStatus::Failed);
    assert_eq!(fetched.error.as_deref(), Some("graph contains cycles"));
    assert!(fetched.ended_at.is_some());
}

#[test]
fn handle_transitions_follow_the_state_machine() {
    let (_, run) = fresh_run();
    let handle = RunHandle::new(run);

    assert!(!handle.resume(), "resume is invalid while running");
    assert!(handle.pause());
    assert_eq!(handle.status(), RunStatus::Paused);
    assert!(!handle.pause(), "pause is invalid while paused");
    assert!(handle.resume());
    assert_eq!(handle.status(), RunStatus::Running);

    assert!(handle.cancel());
    assert_eq!(handle.status(), RunStatus::Cancelled);
    assert!(handle.snapshot().ended_at.is_some());

    // Terminal: everything rejected, state untouched.
    assert!(!handle.pause());
    assert!(!handle.resume());
    assert!(!handle.cancel());
    assert_eq!(handle.status(), RunStatus::Cancelled);
}

#[test]
fn cancel_is_valid_from_paused() {
    let (_, run) = fresh_run();
    let handle = RunHandle::new(run);
    assert!(handle.pause());
    assert!(handle.cancel());
    assert_eq!(handle.status(), RunStatus::Cancelled);
}

#[tokio::test]
async fn wait_while_paused_wakes_on_resume() {
    let (_, run) = fresh_run();
    let handle = RunHandle::new(run);
    assert!(handle.pause());

    let waiter = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.wait_while_paused().await })
    };
    tokio::task::yield_now().await;

    assert!(handle.resume());
    let observed = waiter.await.unwrap();
    assert_eq!(observed, RunStatus::Running);
}

#[tokio::test]
async fn wait_while_paused_wakes_on_cancel() {
    let (_, run) = fresh_run();
    let handle = RunHandle::new(run);
    assert!(handle.pause());

    let waiter = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.wait_while_paused().await })
    };
    tokio::task::yield_now().await;

    assert!(handle.cancel());
    let observed = waiter.await.unwrap();
    assert!(observed.is_terminal());
}

#[tokio::test]
async fn wait_while_paused_returns_immediately_when_not_paused() {
    let (_, run) = fresh_run();
    let handle = RunHandle::new(run);
    assert_eq!(handle.wait_while_paused().await, RunStatus::Running);
}
