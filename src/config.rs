//! Engine configuration.
//!
//! Defaults follow the reference design (history cap 100, event buffer 1024,
//! unbounded per-level concurrency). Environment overrides are resolved once
//! via [`EngineConfig::from_env`]:
//!
//! - `FLOWGRID_HISTORY_CAPACITY` — archived runs kept before FIFO eviction
//! - `FLOWGRID_EVENT_BUFFER` — bounded event channel capacity
//! - `FLOWGRID_MAX_CONCURRENCY` — per-run cap on concurrently executing nodes

use crate::event_bus::{EventBus, EventSink, MemorySink, TracingSink};

/// Which built-in sinks the engine's bus starts with.
///
/// Additional sinks, like the WebSocket broadcaster's
/// [`ChannelSink`](crate::event_bus::ChannelSink), can be attached at run
/// time via [`EventBus::add_sink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    Tracing,
    Memory,
}

/// Tunables for [`Executor`](crate::executor::Executor) construction.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Archived runs retained in the store; oldest evicted beyond this.
    pub history_capacity: usize,
    /// Capacity of the bounded event channel between coordinator and sinks.
    pub event_buffer: usize,
    /// Optional cap on concurrently executing nodes within one run.
    ///
    /// `None` preserves the reference behavior: a level with hundreds of
    /// nodes dispatches hundreds of concurrent handler invocations.
    pub max_concurrency: Option<usize>,
    pub sinks: Vec<SinkConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            event_buffer: EventBus::DEFAULT_BUFFER_CAPACITY,
            max_concurrency: None,
            sinks: vec![SinkConfig::Tracing],
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `FLOWGRID_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Some(n) = env_usize("FLOWGRID_HISTORY_CAPACITY") {
            config.history_capacity = n.max(1);
        }
        if let Some(n) = env_usize("FLOWGRID_EVENT_BUFFER") {
            config.event_buffer = n.max(1);
        }
        if let Some(n) = env_usize("FLOWGRID_MAX_CONCURRENCY") {
            config.max_concurrency = Some(n.max(1));
        }
        config
    }

    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: SinkConfig) -> Self {
        if !self.sinks.contains(&sink) {
            self.sinks.push(sink);
        }
        self
    }

    /// Build the event bus described by this config.
    pub(crate) fn build_event_bus(&self) -> EventBus {
        let sinks: Vec<Box<dyn EventSink>> = self
            .sinks
            .iter()
            .map(|s| match s {
                SinkConfig::Tracing => Box::new(TracingSink) as Box<dyn EventSink>,
                SinkConfig::Memory => Box::new(MemorySink::new()) as Box<dyn EventSink>,
            })
            .collect();
        EventBus::with_sinks(self.event_buffer, sinks)
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
