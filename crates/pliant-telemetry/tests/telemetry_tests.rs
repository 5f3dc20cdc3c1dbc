//! Integration tests for pliant-telemetry.

use pliant_telemetry::bus::EventBus;
use pliant_telemetry::events::{EventKind, SimulationEvent};
use pliant_telemetry::sinks::{EventSink, TracingSink, VecSink};

/// Counts `finalize` calls into a shared slot.
struct FinalizeCounter(std::sync::Arc<std::sync::atomic::AtomicUsize>);

impl EventSink for FinalizeCounter {
    fn handle(&mut self, _event: &SimulationEvent) {}

    fn finalize(&mut self) {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "finalize_counter"
    }
}

// ─── Bus Tests ────────────────────────────────────────────────

#[test]
fn emit_and_flush() {
    let mut bus = EventBus::new();
    let sink = VecSink::new();
    bus.add_sink(Box::new(sink.clone()));

    bus.emit(SimulationEvent::new(0, EventKind::TimestepBegin { sim_time: 0.0, dt: 0.01 }));
    bus.emit_kind(0, EventKind::TimestepEnd { wall_time: 0.001 });
    assert!(sink.is_empty(), "events are delivered on flush only");

    assert_eq!(bus.flush(), 2);
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0].kind, EventKind::TimestepBegin { .. }));
    assert!(matches!(events[1].kind, EventKind::TimestepEnd { .. }));
}

#[test]
fn disabled_bus_drops_events() {
    let mut bus = EventBus::new();
    let sink = VecSink::new();
    bus.add_sink(Box::new(sink.clone()));
    bus.set_enabled(false);
    bus.emit_kind(0, EventKind::TimestepBegin { sim_time: 0.0, dt: 0.01 });
    assert_eq!(bus.flush(), 0);
    assert!(sink.is_empty());
}

#[test]
fn every_sink_sees_every_event() {
    let mut bus = EventBus::new();
    let a = VecSink::new();
    let b = VecSink::new();
    bus.add_sink(Box::new(a.clone()));
    bus.add_sink(Box::new(b.clone()));
    bus.add_sink(Box::new(TracingSink::default()));
    assert_eq!(bus.sink_count(), 3);
    assert_eq!(bus.sink_names(), vec!["vec_sink", "vec_sink", "tracing_sink"]);

    for step in 0..3 {
        bus.emit_kind(step, EventKind::TimestepEnd { wall_time: 0.0 });
    }
    bus.flush();
    assert_eq!(a.len(), 3);
    assert_eq!(a.events(), b.events());
}

#[test]
fn shutdown_flushes_and_finalizes() {
    let finalized = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let sink = VecSink::new();
    let mut bus = EventBus::new();
    bus.add_sink(Box::new(sink.clone()));
    bus.add_sink(Box::new(FinalizeCounter(finalized.clone())));

    bus.emit_kind(4, EventKind::TimestepEnd { wall_time: 0.0 });
    bus.shutdown();
    assert_eq!(sink.len(), 1);
    assert_eq!(finalized.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn tracing_sink_handles_every_level() {
    let event = SimulationEvent::new(1, EventKind::TimestepEnd { wall_time: 0.0 });
    for level in [
        tracing::Level::ERROR,
        tracing::Level::WARN,
        tracing::Level::INFO,
        tracing::Level::DEBUG,
        tracing::Level::TRACE,
    ] {
        let mut sink = TracingSink::new(level);
        assert_eq!(sink.level(), level);
        sink.handle(&event);
    }
}

// ─── Event Tests ──────────────────────────────────────────────

#[test]
fn event_serialization() {
    let event = SimulationEvent::new(
        5,
        EventKind::Energy {
            body: 0,
            kinetic: 1.0,
            elastic: 0.5,
        },
    );
    let json = serde_json::to_string(&event).unwrap();
    let recovered: SimulationEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(recovered, event);
}

#[test]
fn convergence_event() {
    let event = SimulationEvent::new(
        10,
        EventKind::Convergence {
            body: 2,
            newton_iterations: 3,
            cg_iterations: 41,
            initial_residual: 1.0,
            final_residual: 1e-9,
        },
    );
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("newton_iterations"));
    assert!(json.contains("Convergence"));
}

#[test]
fn contact_events_round_trip() {
    for kind in [
        EventKind::ContactDetection {
            body: 0,
            contact_count: 9,
            max_penetration: 1e-3,
        },
        EventKind::ContactSolve {
            contact_count: 9,
            iterations: 12,
            total_normal_impulse: 0.25,
        },
    ] {
        let event = SimulationEvent::new(7, kind);
        let json = serde_json::to_string(&event).unwrap();
        let recovered: SimulationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, event);
    }
}
