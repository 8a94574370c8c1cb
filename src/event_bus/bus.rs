use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use tokio::{sync::oneshot, task};

use super::emitter::EventEmitter;
use super::event::Event;
use super::sink::{EventSink, TracingSink};

/// EventBus receives events from a bounded channel and broadcasts them to
/// multiple sinks from a background listener task.
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    event_channel: (flume::Sender<Event>, flume::Receiver<Event>),
    dropped: Arc<AtomicU64>,
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(Self::DEFAULT_BUFFER_CAPACITY, TracingSink)
    }
}

impl EventBus {
    pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

    /// Create an EventBus with a single sink and the given buffer capacity.
    pub fn with_sink<T>(capacity: usize, sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self::with_sinks(capacity, vec![Box::new(sink)])
    }

    /// Create an EventBus with multiple sinks and the given buffer capacity.
    pub fn with_sinks(capacity: usize, sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            event_channel: flume::bounded(capacity.max(1)),
            dropped: Arc::new(AtomicU64::new(0)),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Dynamically add a sink (useful for per-subscriber streaming).
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().unwrap().push(Box::new(sink));
    }

    /// Get a cloneable emitter handle so producers can push events.
    #[must_use]
    pub fn get_emitter(&self) -> EventEmitter {
        EventEmitter::new(self.event_channel.0.clone(), self.dropped.clone())
    }

    /// Spawn a background task that listens for events and broadcasts to all
    /// sinks. Idempotent: calling multiple times has no effect.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock().expect("listener poisoned");
        if guard.is_some() {
            return;
        }

        let receiver = self.event_channel.1.clone();
        let sinks = self.sinks.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        Err(_) => break,
                        Ok(event) => {
                            let mut sinks_guard = sinks.lock().unwrap();
                            for sink in sinks_guard.iter_mut() {
                                if let Err(e) = sink.handle(&event) {
                                    tracing::debug!(error = %e, "event sink error");
                                }
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener task, draining nothing further.
    pub async fn stop_listener(&self) {
        let state = {
            let mut guard = self.listener.lock().expect("listener poisoned");
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.lock()
            && let Some(state) = guard.take()
        {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}
