//! # Flowgrid: Workflow Graph Execution Engine
//!
//! Flowgrid executes declarative directed graphs of typed automation steps.
//! A [`GraphModel`](graph::GraphModel) describes nodes and dependency edges;
//! the engine validates it, schedules it into dependency-respecting levels,
//! runs each level's nodes concurrently, tracks per-node and per-run state,
//! and emits real-time progress events.
//!
//! ## Core Concepts
//!
//! - **Graph**: an immutable DAG of typed nodes with opaque configs
//! - **Action**: the pluggable capability behind a node kind, looked up in an
//!   [`ActionRegistry`](action::ActionRegistry)
//! - **Level**: a maximal batch of nodes with no dependency among them,
//!   executed concurrently
//! - **Run**: one execution instance with its own id, state machine
//!   (`Running → Paused/Completed/Failed/Cancelled`), and results
//! - **Events**: run-status and node-update notifications pushed through a
//!   bounded, non-blocking bus to pluggable sinks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowgrid::action::{Action, ActionContext, ActionError, ActionRegistry};
//! use flowgrid::config::EngineConfig;
//! use flowgrid::executor::{ExecuteOptions, Executor};
//! use flowgrid::graph::{ConfigMap, EdgeSpec, GraphModel, NodeSpec};
//! use async_trait::async_trait;
//! use serde_json::json;
//!
//! struct LogAction;
//!
//! #[async_trait]
//! impl Action for LogAction {
//!     async fn handle(
//!         &self,
//!         config: &ConfigMap,
//!         ctx: ActionContext,
//!     ) -> Result<ConfigMap, ActionError> {
//!         let message = config
//!             .get("message")
//!             .and_then(|v| v.as_str())
//!             .ok_or(ActionError::MissingInput { what: "message" })?;
//!         ctx.emit("log", message)?;
//!         let mut out = ConfigMap::new();
//!         out.insert("logged".into(), json!(true));
//!         Ok(out)
//!     }
//!
//!     fn required_fields(&self) -> &[&str] {
//!         &["message"]
//!     }
//! }
//!
//! # async fn example() {
//! let mut registry = ActionRegistry::new();
//! registry.register("log", LogAction);
//!
//! let executor = Executor::new(registry, EngineConfig::default());
//!
//! let mut config = ConfigMap::new();
//! config.insert("message".into(), json!("hello"));
//! let graph = GraphModel::new(
//!     "wf-1",
//!     vec![
//!         NodeSpec::new("greet", "log", config.clone()),
//!         NodeSpec::new("after", "log", config),
//!     ],
//!     vec![EdgeSpec::new("e1", "greet", "after")],
//! );
//!
//! let run_id = executor.execute(graph, ExecuteOptions::default());
//! // ...poll executor.get_status(&run_id), or attach an event sink.
//! # }
//! ```
//!
//! ## Failure & Control Semantics
//!
//! - **Fail-fast**: the first failed node halts scheduling of later levels;
//!   never-reached nodes are recorded as `Skipped`.
//! - **Cooperative control**: pause/cancel take effect at level boundaries
//!   only; in-flight handlers always settle. No engine-enforced timeouts.
//! - **Isolation**: external readers only ever see deep-copied
//!   [`RunSnapshot`](run::RunSnapshot)s, never the live run.
//!
//! ## Module Guide
//!
//! - [`graph`] - Graph model value types
//! - [`action`] - Action trait, context, and registry
//! - [`validate`] - Structural and configuration validation
//! - [`schedule`] - Dependency leveling (Kahn's algorithm, BFS levels)
//! - [`executor`] - Run coordination and the control surface
//! - [`run`] - Run state and snapshots
//! - [`store`] - Bounded registry of active and historical runs
//! - [`event_bus`] - Progress events, sinks, and the bounded bus
//! - [`config`] - Engine tunables
//! - [`telemetry`] - Tracing bootstrap

pub mod action;
pub mod config;
pub mod event_bus;
pub mod executor;
pub mod graph;
pub mod run;
pub mod schedule;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod validate;
