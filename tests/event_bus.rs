//! Event bus semantics: bounded buffer with drop-new-on-full, sink fan-out,
//! and channel streaming.

use std::time::Duration;

use flowgrid::event_bus::{ChannelSink, EmitterError, Event, EventBus, MemorySink};
use flowgrid::types::{RunId, RunStatus};

fn run_event(run_id: &RunId, status: RunStatus) -> Event {
    Event::Run(flowgrid::event_bus::RunStatusEvent {
        run_id: run_id.clone(),
        status,
        completed: 0,
        failed: 0,
        skipped: 0,
        total: 1,
        started_at: chrono::Utc::now(),
        ended_at: None,
        error: None,
        at: chrono::Utc::now(),
    })
}

#[tokio::test]
async fn full_buffer_drops_new_events_without_blocking() {
    // No listener: the channel fills at its capacity of 2.
    let bus = EventBus::with_sinks(2, vec![]);
    let emitter = bus.get_emitter();
    let run_id = RunId::new();

    assert!(emitter.emit(run_event(&run_id, RunStatus::Running)).is_ok());
    assert!(emitter.emit(run_event(&run_id, RunStatus::Running)).is_ok());
    for _ in 0..3 {
        assert!(matches!(
            emitter.emit(run_event(&run_id, RunStatus::Running)),
            Err(EmitterError::Full)
        ));
    }
    assert_eq!(emitter.dropped_count(), 3);
}

#[tokio::test]
async fn listener_broadcasts_to_all_sinks() {
    let first = MemorySink::new();
    let second = MemorySink::new();
    let bus = EventBus::with_sinks(16, vec![Box::new(first.clone())]);
    bus.add_sink(second.clone());
    bus.listen_for_events();

    let emitter = bus.get_emitter();
    let run_id = RunId::new();
    emitter.emit(run_event(&run_id, RunStatus::Running)).unwrap();
    emitter.emit(run_event(&run_id, RunStatus::Completed)).unwrap();

    for _ in 0..200 {
        if first.snapshot().len() == 2 && second.snapshot().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(first.snapshot().len(), 2);
    assert_eq!(second.snapshot().len(), 2);
    assert_eq!(first.snapshot(), second.snapshot());
}

#[tokio::test]
async fn channel_sink_streams_to_async_consumers() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let bus = EventBus::with_sinks(16, vec![Box::new(ChannelSink::new(tx))]);
    bus.listen_for_events();

    let run_id = RunId::new();
    bus.get_emitter()
        .emit(run_event(&run_id, RunStatus::Running))
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("event within a second")
        .expect("channel open");
    assert_eq!(received.run_id(), &run_id);
}

#[tokio::test]
async fn listener_start_is_idempotent_and_stoppable() {
    let sink = MemorySink::new();
    let bus = EventBus::with_sinks(16, vec![Box::new(sink.clone())]);
    bus.listen_for_events();
    bus.listen_for_events();

    let run_id = RunId::new();
    bus.get_emitter()
        .emit(run_event(&run_id, RunStatus::Running))
        .unwrap();
    for _ in 0..200 {
        if !sink.snapshot().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // Exactly once despite the double listen call.
    assert_eq!(sink.snapshot().len(), 1);

    bus.stop_listener().await;
}

#[test]
fn events_serialize_for_the_transport_layer() {
    let run_id = RunId::from("run-1");
    let event = Event::handler_message(run_id, "n1", "ocr", "region captured");
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "handler");
    assert_eq!(json["node_id"], "n1");
    assert_eq!(json["scope"], "ocr");

    let back: Event = serde_json::from_value(json).unwrap();
    assert_eq!(back, event);
}
