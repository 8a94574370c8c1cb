//! Event bus utilities providing fan-out, sinks, and emitter APIs.
//!
//! Progress events flow from the run coordinator through a **bounded** channel
//! into a background listener task, which broadcasts to the configured sinks.
//! Emission never blocks: when the buffer is full the event is dropped (and
//! counted) so a stalled observer can never stall workflow execution.

pub mod bus;
pub mod emitter;
pub mod event;
pub mod sink;

pub use bus::EventBus;
pub use emitter::{EmitterError, EventEmitter};
pub use event::{Event, HandlerEvent, NodeUpdateEvent, RunStatusEvent};
pub use sink::{ChannelSink, EventSink, MemorySink, TracingSink};
