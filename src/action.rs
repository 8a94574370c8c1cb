//! Action capability interface and registry.
//!
//! Every node kind maps to one [`Action`] implementation registered in an
//! [`ActionRegistry`]. The engine only ever talks to the trait: adding a node
//! type means registering a new implementation, never touching the engine.
//!
//! Concrete handlers (mouse click, text typing, HTTP call, OCR extraction,
//! filesystem write, webhook) live outside this crate and are registered by
//! the host application at startup.
//!
//! # Error Handling
//!
//! A handler failure is returned as `Err(ActionError)`. The executor catches
//! it at the dispatch boundary, records a failed node result, and applies the
//! fail-fast policy; it never propagates up to crash the coordinator. Retry
//! and timeout policy belong inside the action implementation.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::event_bus::{EmitterError, Event, EventEmitter};
use crate::graph::{ConfigMap, EdgeSpec};
use crate::types::RunId;

/// Core trait defining an executable automation step.
///
/// Implementations must be stateless with respect to the run: everything a
/// handler needs arrives through `config` (the node's declarative settings)
/// and `ctx` (run identity, upstream outputs, trigger payload).
///
/// # Examples
///
/// ```rust
/// use flowgrid::action::{Action, ActionContext, ActionError};
/// use flowgrid::graph::ConfigMap;
/// use async_trait::async_trait;
/// use serde_json::json;
///
/// struct Delay;
///
/// #[async_trait]
/// impl Action for Delay {
///     async fn handle(
///         &self,
///         config: &ConfigMap,
///         ctx: ActionContext,
///     ) -> Result<ConfigMap, ActionError> {
///         let ms = config
///             .get("duration_ms")
///             .and_then(|v| v.as_u64())
///             .ok_or(ActionError::MissingInput { what: "duration_ms" })?;
///         tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
///         let mut out = ConfigMap::new();
///         out.insert("slept_ms".into(), json!(ms));
///         let _ = ctx.emit("delay", format!("slept {ms}ms"));
///         Ok(out)
///     }
///
///     fn required_fields(&self) -> &[&str] {
///         &["duration_ms"]
///     }
/// }
/// ```
#[async_trait]
pub trait Action: Send + Sync {
    /// Execute this step with the node's config and execution context.
    async fn handle(&self, config: &ConfigMap, ctx: ActionContext)
    -> Result<ConfigMap, ActionError>;

    /// Config keys that must be present for a node of this kind to be valid.
    ///
    /// The validator checks these before any node executes; handlers may
    /// still reject semantically bad values at run time.
    fn required_fields(&self) -> &[&str] {
        &[]
    }
}

/// Execution context passed to an action handler.
///
/// `upstream` holds the accumulated outputs of every node completed so far in
/// this run, keyed by node id. `incoming` lists the node's incoming edges so
/// handlers can interpret source/target handle labels; the engine itself
/// ignores handles entirely.
#[derive(Clone, Debug)]
pub struct ActionContext {
    pub run_id: RunId,
    pub node_id: String,
    pub upstream: FxHashMap<String, ConfigMap>,
    pub incoming: Vec<EdgeSpec>,
    pub trigger: Option<ConfigMap>,
    emitter: EventEmitter,
}

impl ActionContext {
    pub(crate) fn new(
        run_id: RunId,
        node_id: String,
        upstream: FxHashMap<String, ConfigMap>,
        incoming: Vec<EdgeSpec>,
        trigger: Option<ConfigMap>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            run_id,
            node_id,
            upstream,
            incoming,
            trigger,
            emitter,
        }
    }

    /// Emit a handler-scoped diagnostic event enriched with run and node ids.
    ///
    /// Best-effort: a full event buffer drops the message rather than block
    /// or fail the handler. Only a closed bus surfaces as an error.
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), EmitterError> {
        match self.emitter.emit(Event::handler_message(
            self.run_id.clone(),
            self.node_id.clone(),
            scope,
            message,
        )) {
            Ok(()) | Err(EmitterError::Full) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Output of a specific upstream node, if it has completed.
    #[must_use]
    pub fn upstream_output(&self, node_id: &str) -> Option<&ConfigMap> {
        self.upstream.get(node_id)
    }
}

/// Errors an action handler can return.
#[derive(Debug, Error, Diagnostic)]
pub enum ActionError {
    /// Expected input data is missing from config or upstream outputs.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(flowgrid::action::missing_input),
        help("Check the node's config and that upstream nodes produced the required data.")
    )]
    MissingInput { what: &'static str },

    /// External service or device error.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(flowgrid::action::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(flowgrid::action::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Handler-defined failure with a human-readable reason.
    #[error("{0}")]
    #[diagnostic(code(flowgrid::action::failed))]
    Failed(String),

    /// Event bus communication error.
    #[error("event bus error: {0}")]
    #[diagnostic(code(flowgrid::action::event_bus))]
    Emitter(#[from] EmitterError),
}

impl ActionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Registry mapping node kind tags to action implementations.
///
/// Consumed, not owned, by the engine: the host application builds one,
/// registers its handlers, and hands it to the [`Executor`](crate::executor::Executor)
/// behind an `Arc`.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: FxHashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action for a node kind. A later registration for the same
    /// kind replaces the earlier one.
    pub fn register(&mut self, kind: impl Into<String>, action: impl Action + 'static) {
        self.actions.insert(kind.into(), Arc::new(action));
    }

    /// Look up the action for a node kind.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(kind).cloned()
    }

    /// Required config fields for a node kind, if registered.
    #[must_use]
    pub fn required_fields(&self, kind: &str) -> Option<Vec<String>> {
        self.actions
            .get(kind)
            .map(|a| a.required_fields().iter().map(|f| f.to_string()).collect())
    }

    /// All registered kind tags.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }
}
