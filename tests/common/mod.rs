//! Shared fixtures for integration tests: canned actions, graph builders,
//! and polling helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use flowgrid::action::{Action, ActionContext, ActionError, ActionRegistry};
use flowgrid::executor::Executor;
use flowgrid::graph::{ConfigMap, EdgeSpec, GraphModel, NodeSpec};
use flowgrid::run::RunSnapshot;
use flowgrid::types::RunId;

/// Succeeds immediately, echoing its `value` config field into the output.
pub struct EchoAction;

#[async_trait]
impl Action for EchoAction {
    async fn handle(
        &self,
        config: &ConfigMap,
        _ctx: ActionContext,
    ) -> Result<ConfigMap, ActionError> {
        let value = config
            .get("value")
            .cloned()
            .ok_or(ActionError::MissingInput { what: "value" })?;
        let mut out = ConfigMap::new();
        out.insert("value".into(), value);
        Ok(out)
    }

    fn required_fields(&self) -> &[&str] {
        &["value"]
    }
}

/// Succeeds immediately with an empty output.
pub struct NoopAction;

#[async_trait]
impl Action for NoopAction {
    async fn handle(
        &self,
        _config: &ConfigMap,
        _ctx: ActionContext,
    ) -> Result<ConfigMap, ActionError> {
        Ok(ConfigMap::new())
    }
}

/// Always fails with the configured reason.
pub struct FailingAction;

#[async_trait]
impl Action for FailingAction {
    async fn handle(
        &self,
        config: &ConfigMap,
        _ctx: ActionContext,
    ) -> Result<ConfigMap, ActionError> {
        let reason = config
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("induced failure");
        Err(ActionError::failed(reason))
    }
}

/// Appends its node id to a shared log before succeeding.
pub struct RecordingAction {
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingAction {
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Action for RecordingAction {
    async fn handle(
        &self,
        _config: &ConfigMap,
        ctx: ActionContext,
    ) -> Result<ConfigMap, ActionError> {
        self.log.lock().unwrap().push(ctx.node_id.clone());
        let mut out = ConfigMap::new();
        out.insert("node".into(), json!(ctx.node_id));
        Ok(out)
    }
}

/// Blocks until the shared gate receives a permit.
pub struct GateAction {
    gate: Arc<Semaphore>,
}

impl GateAction {
    pub fn new(gate: Arc<Semaphore>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl Action for GateAction {
    async fn handle(
        &self,
        _config: &ConfigMap,
        _ctx: ActionContext,
    ) -> Result<ConfigMap, ActionError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| ActionError::failed("gate closed"))?;
        permit.forget();
        Ok(ConfigMap::new())
    }
}

/// Reports which upstream outputs and trigger payload it observed.
pub struct UpstreamProbeAction;

#[async_trait]
impl Action for UpstreamProbeAction {
    async fn handle(
        &self,
        _config: &ConfigMap,
        ctx: ActionContext,
    ) -> Result<ConfigMap, ActionError> {
        let mut seen: Vec<&str> = ctx.upstream.keys().map(String::as_str).collect();
        seen.sort_unstable();
        let mut out = ConfigMap::new();
        out.insert("upstream".into(), json!(seen));
        out.insert("has_trigger".into(), json!(ctx.trigger.is_some()));
        if let Some(edge) = ctx.incoming.first() {
            out.insert("first_edge".into(), json!(edge.id));
        }
        Ok(out)
    }
}

/// Registry with the full fixture set registered under their usual kinds.
pub fn fixture_registry(log: Arc<Mutex<Vec<String>>>, gate: Arc<Semaphore>) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register("echo", EchoAction);
    registry.register("noop", NoopAction);
    registry.register("fail", FailingAction);
    registry.register("record", RecordingAction::new(log));
    registry.register("gate", GateAction::new(gate));
    registry.register("probe", UpstreamProbeAction);
    registry
}

pub fn node(id: &str, kind: &str) -> NodeSpec {
    NodeSpec::new(id, kind, ConfigMap::new())
}

pub fn echo_node(id: &str, value: i64) -> NodeSpec {
    let mut config = ConfigMap::new();
    config.insert("value".into(), json!(value));
    NodeSpec::new(id, "echo", config)
}

pub fn edge(id: &str, source: &str, target: &str) -> EdgeSpec {
    EdgeSpec::new(id, source, target)
}

pub fn graph(id: &str, nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> GraphModel {
    GraphModel::new(id, nodes, edges)
}

/// Poll until the run reaches a terminal status, panicking after ~2s.
pub async fn wait_for_terminal(executor: &Executor, run_id: &RunId) -> RunSnapshot {
    for _ in 0..400 {
        if let Some(snapshot) = executor.get_status(run_id)
            && snapshot.status.is_terminal()
        {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("run {run_id} did not reach a terminal status in time");
}

/// Poll until `probe` returns true, panicking after ~2s.
pub async fn wait_until(probe: impl Fn() -> bool) {
    for _ in 0..400 {
        if probe() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
