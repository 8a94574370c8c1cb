use std::io::{self, Result as IoResult};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::event::Event;

/// Abstraction over an output target that consumes full [`Event`] objects.
///
/// The real transport (WebSocket pub/sub) lives outside the engine and plugs
/// in here. Sink calls happen on the bus listener task, never on the run
/// coordinator, so a slow sink degrades observability but not execution.
pub trait EventSink: Send + Sync {
    /// Handle a structured event. The sink decides how to serialize it.
    fn handle(&mut self, event: &Event) -> IoResult<()>;
}

/// Sink that logs events through `tracing` at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        match event {
            Event::Run(e) => tracing::info!(
                run_id = %e.run_id,
                status = %e.status,
                completed = e.completed,
                failed = e.failed,
                skipped = e.skipped,
                total = e.total,
                "run status"
            ),
            Event::Node(e) => tracing::info!(
                run_id = %e.run_id,
                node_id = %e.node_id,
                status = %e.status,
                duration_ms = e.duration_ms,
                error = e.error.as_deref(),
                "node update"
            ),
            Event::Handler(e) => tracing::info!(
                run_id = %e.run_id,
                node_id = %e.node_id,
                scope = %e.scope,
                "{}", e.message
            ),
        }
        Ok(())
    }
}

/// In-memory sink for testing and snapshots.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all captured events.
    pub fn snapshot(&self) -> Vec<Event> {
        self.entries.lock().unwrap().clone()
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl EventSink for MemorySink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        self.entries.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Channel-based sink for streaming to async consumers.
///
/// Events are forwarded to a tokio mpsc channel without blocking. This is the
/// seam the WebSocket layer attaches to: one sink per subscriber topic.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel receiver dropped"))
    }
}
