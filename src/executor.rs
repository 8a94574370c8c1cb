//! Run coordination: level-by-level, concurrent-within-level execution.
//!
//! [`Executor::execute`] validates the graph, registers a live run, and
//! spawns one coordinator task that drives the run to a terminal status.
//! Within a level, one task per node executes concurrently (optionally gated
//! by a per-run semaphore); levels are strictly sequential. Pause and cancel
//! are cooperative and take effect only at level boundaries — an in-flight
//! handler is never aborted.
//!
//! Failure policy is fail-fast: the first failed node in a level prevents all
//! subsequent levels from being scheduled, and the nodes in those levels are
//! recorded as skipped.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::instrument;

use crate::action::{ActionContext, ActionError, ActionRegistry};
use crate::config::EngineConfig;
use crate::event_bus::{Event, EventBus, EventEmitter, NodeUpdateEvent, RunStatusEvent};
use crate::graph::{ConfigMap, GraphModel};
use crate::run::{ExecutionRun, RunSnapshot};
use crate::schedule::compute_levels;
use crate::store::{ExecutionStore, RunHandle};
use crate::types::{NodeStatus, RunId, RunStatus};
use crate::validate::validate;

/// Options supplied alongside a graph at execute-time.
///
/// `trigger` is the opaque invocation payload (e.g. a webhook body) exposed
/// to every handler through [`ActionContext::trigger`].
#[derive(Clone, Debug, Default)]
pub struct ExecuteOptions {
    pub trigger: Option<ConfigMap>,
}

/// The engine's control surface: starts runs and owns the store and bus.
///
/// Construction wires the configured sinks into an [`EventBus`] and starts
/// its listener. The registry is consumed, not owned conceptually — the host
/// application registers its handlers before handing it over.
pub struct Executor {
    registry: Arc<ActionRegistry>,
    store: Arc<ExecutionStore>,
    event_bus: EventBus,
    emitter: EventEmitter,
    config: EngineConfig,
}

impl Executor {
    #[must_use]
    pub fn new(registry: ActionRegistry, config: EngineConfig) -> Self {
        let event_bus = config.build_event_bus();
        event_bus.listen_for_events();
        let emitter = event_bus.get_emitter();
        Self {
            registry: Arc::new(registry),
            store: Arc::new(ExecutionStore::new(config.history_capacity)),
            event_bus,
            emitter,
            config,
        }
    }

    /// Start executing a graph, returning the new run's id synchronously.
    ///
    /// The run proceeds on a spawned coordinator task, so this must be called
    /// from within a tokio runtime. An invalid graph produces a run that is
    /// archived directly in the `Failed` status — no node is ever dispatched.
    #[instrument(skip(self, graph, options), fields(graph_id = %graph.id))]
    pub fn execute(&self, graph: GraphModel, options: ExecuteOptions) -> RunId {
        let run_id = RunId::new();
        let graph = Arc::new(graph);

        if let Err(violation) = validate(&graph, &self.registry) {
            tracing::warn!(run_id = %run_id, error = %violation, "graph rejected by validation");
            let run = ExecutionRun::rejected(run_id.clone(), graph, violation.to_string());
            let _ = self.emitter.emit(Event::Run(run_status_event(&run)));
            self.store.archive_snapshot(run.snapshot());
            return run_id;
        }

        let run = ExecutionRun::new(run_id.clone(), graph.clone());
        let handle = RunHandle::new(run);
        self.store.register(run_id.clone(), handle.clone());
        let _ = self
            .emitter
            .emit(Event::Run(handle.with_run(|run| run_status_event(run))));

        let coordinator = Coordinator {
            run_id: run_id.clone(),
            graph,
            handle,
            registry: self.registry.clone(),
            store: self.store.clone(),
            emitter: self.emitter.clone(),
            trigger: options.trigger,
            semaphore: self
                .config
                .max_concurrency
                .map(|limit| Arc::new(Semaphore::new(limit))),
        };
        tokio::spawn(coordinator.drive());

        run_id
    }

    /// Pause a running run. Takes effect at the next level boundary.
    pub fn pause(&self, run_id: &RunId) -> bool {
        self.store.handle(run_id).is_some_and(|h| h.pause())
    }

    /// Resume a paused run, waking its coordinator.
    pub fn resume(&self, run_id: &RunId) -> bool {
        self.store.handle(run_id).is_some_and(|h| h.resume())
    }

    /// Cancel a running or paused run. In-flight handlers settle normally but
    /// no further levels are scheduled.
    pub fn cancel(&self, run_id: &RunId) -> bool {
        self.store.handle(run_id).is_some_and(|h| h.cancel())
    }

    /// Deep-copied snapshot of a run, live or archived.
    #[must_use]
    pub fn get_status(&self, run_id: &RunId) -> Option<RunSnapshot> {
        self.store.get(run_id)
    }

    /// Archived runs, most recent first, bounded by the history capacity.
    #[must_use]
    pub fn list_history(&self) -> Vec<RunSnapshot> {
        self.store.list_history()
    }

    /// Snapshots of all currently active runs.
    #[must_use]
    pub fn list_active(&self) -> Vec<RunSnapshot> {
        self.store.list_active()
    }

    /// The engine's event bus, e.g. for attaching transport sinks.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

/// Per-run coordinator: owns the level loop for exactly one run.
struct Coordinator {
    run_id: RunId,
    graph: Arc<GraphModel>,
    handle: Arc<RunHandle>,
    registry: Arc<ActionRegistry>,
    store: Arc<ExecutionStore>,
    emitter: EventEmitter,
    trigger: Option<ConfigMap>,
    semaphore: Option<Arc<Semaphore>>,
}

impl Coordinator {
    #[instrument(skip(self), fields(run_id = %self.run_id, graph_id = %self.graph.id))]
    async fn drive(self) {
        let levels = match compute_levels(&self.graph) {
            Ok(levels) => levels,
            Err(e) => {
                // Defensive: validation should have rejected this graph.
                tracing::error!(run_id = %self.run_id, error = %e, "level computation failed");
                self.handle
                    .with_run(|run| run.finish(RunStatus::Failed, Some(e.to_string())));
                self.finalize();
                return;
            }
        };

        tracing::debug!(
            run_id = %self.run_id,
            levels = levels.len(),
            nodes = self.graph.nodes.len(),
            "run scheduled"
        );

        for (level_index, level) in levels.iter().enumerate() {
            if !self.await_level_clearance(level_index).await {
                break;
            }

            let any_failed = self.run_level(level_index, level).await;

            // One progress event per settled level, strictly after its node
            // events, while the run is still live.
            let progress = self.handle.with_run(|run| {
                (!run.status.is_terminal()).then(|| run_status_event(run))
            });
            if let Some(event) = progress {
                let _ = self.emitter.emit(Event::Run(event));
            }

            if any_failed {
                tracing::debug!(run_id = %self.run_id, level = level_index, "fail-fast: halting run");
                self.handle
                    .with_run(|run| run.finish(RunStatus::Failed, None));
                break;
            }
        }

        self.handle
            .with_run(|run| run.finish(RunStatus::Completed, None));
        self.finalize();
    }

    /// Cooperative status gate at a level boundary.
    ///
    /// Returns `false` when the run reached a terminal status and no further
    /// level may be dispatched; parks while the run is paused.
    async fn await_level_clearance(&self, level_index: usize) -> bool {
        loop {
            match self.handle.status() {
                RunStatus::Running => return true,
                RunStatus::Paused => {
                    tracing::debug!(
                        run_id = %self.run_id,
                        level = level_index,
                        "paused at level boundary"
                    );
                    if self.handle.wait_while_paused().await.is_terminal() {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    /// Dispatch one level and settle all of its nodes.
    ///
    /// Returns `true` if any node failed. Handler errors and panics are both
    /// converted into failed node results at this boundary; they never
    /// propagate further.
    async fn run_level(&self, level_index: usize, level: &[String]) -> bool {
        let upstream = self.handle.with_run(|run| {
            run.begin_level(level);
            run.completed_outputs()
        });

        let mut join_set: JoinSet<(String, u64, Result<ConfigMap, ActionError>)> = JoinSet::new();
        let mut task_nodes: FxHashMap<tokio::task::Id, String> = FxHashMap::default();

        for node_id in level {
            let node = self
                .graph
                .node(node_id)
                .expect("scheduled node exists in graph")
                .clone();
            let action = self
                .registry
                .get(&node.kind)
                .expect("validated node kind is registered");
            let ctx = ActionContext::new(
                self.run_id.clone(),
                node_id.clone(),
                upstream.clone(),
                self.graph.incoming_edges(node_id).into_iter().cloned().collect(),
                self.trigger.clone(),
                self.emitter.clone(),
            );
            let semaphore = self.semaphore.clone();
            let task_node_id = node_id.clone();

            let abort_handle = join_set.spawn(async move {
                let _permit = match &semaphore {
                    Some(s) => Some(s.acquire().await.expect("semaphore never closed")),
                    None => None,
                };
                let started = Instant::now();
                let result = action.handle(&node.config, ctx).await;
                (task_node_id, started.elapsed().as_millis() as u64, result)
            });
            task_nodes.insert(abort_handle.id(), node_id.clone());
        }

        tracing::debug!(
            run_id = %self.run_id,
            level = level_index,
            nodes = level.len(),
            "level dispatched"
        );

        let mut any_failed = false;
        while let Some(joined) = join_set.join_next_with_id().await {
            let (node_id, duration_ms, result) = match joined {
                Ok((_, settled)) => settled,
                Err(join_err) => {
                    // A panicking handler fails its node, nothing more.
                    let node_id = task_nodes
                        .get(&join_err.id())
                        .cloned()
                        .unwrap_or_default();
                    tracing::error!(
                        run_id = %self.run_id,
                        node_id = %node_id,
                        error = %join_err,
                        "handler task panicked"
                    );
                    (node_id, 0, Err(ActionError::failed(format!("handler task panicked: {join_err}"))))
                }
            };
            any_failed |= self.settle_node(&node_id, duration_ms, result);
        }

        any_failed
    }

    /// Record one node's settle and emit its node-update event.
    ///
    /// Returns `true` if the node failed. Events are suppressed once the run
    /// is terminal (a cancelled run's in-flight level still records results,
    /// but observers see no further node updates).
    fn settle_node(
        &self,
        node_id: &str,
        duration_ms: u64,
        result: Result<ConfigMap, ActionError>,
    ) -> bool {
        let (failed, event) = match result {
            Ok(output) => {
                let status = self.handle.with_run(|run| {
                    run.record_completed(node_id, output.clone(), duration_ms);
                    run.status
                });
                let event = (!status.is_terminal()).then(|| NodeUpdateEvent {
                    run_id: self.run_id.clone(),
                    node_id: node_id.to_string(),
                    status: NodeStatus::Completed,
                    output: Some(output),
                    error: None,
                    duration_ms,
                    at: chrono::Utc::now(),
                });
                (false, event)
            }
            Err(error) => {
                let message = error.to_string();
                let status = self.handle.with_run(|run| {
                    run.record_failed(node_id, message.clone(), duration_ms);
                    run.status
                });
                tracing::warn!(
                    run_id = %self.run_id,
                    node_id = %node_id,
                    error = %message,
                    "node failed"
                );
                let event = (!status.is_terminal()).then(|| NodeUpdateEvent {
                    run_id: self.run_id.clone(),
                    node_id: node_id.to_string(),
                    status: NodeStatus::Failed,
                    output: None,
                    error: Some(message),
                    duration_ms,
                    at: chrono::Utc::now(),
                });
                (true, event)
            }
        };
        if let Some(event) = event {
            let _ = self.emitter.emit(Event::Node(event));
        }
        failed
    }

    /// Mark never-reached nodes skipped, emit the final run-status event, and
    /// archive the run into the store.
    fn finalize(&self) {
        let event = self.handle.with_run(|run| {
            let remaining: Vec<String> = run
                .graph
                .nodes
                .iter()
                .map(|n| n.id.clone())
                .filter(|id| !run.results.contains_key(id))
                .collect();
            run.mark_skipped(remaining.iter());
            run_status_event(run)
        });
        let status = event.status;
        let _ = self.emitter.emit(Event::Run(event));
        self.store.archive(&self.run_id);
        tracing::info!(run_id = %self.run_id, status = %status, "run finished");
    }
}

fn run_status_event(run: &ExecutionRun) -> RunStatusEvent {
    RunStatusEvent {
        run_id: run.id.clone(),
        status: run.status,
        completed: run.completed_nodes.len(),
        failed: run.failed_nodes.len(),
        skipped: run.skipped_nodes.len(),
        total: run.graph.nodes.len(),
        started_at: run.started_at,
        ended_at: run.ended_at,
        error: run.error.clone(),
        at: chrono::Utc::now(),
    }
}
