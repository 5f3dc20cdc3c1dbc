//! # pliant-telemetry
//!
//! Event bus for simulation telemetry. Emits structured events
//! (step timing, Newton convergence, contacts, energy) that can be
//! consumed by pluggable sinks.

pub mod bus;
pub mod events;
pub mod sinks;

pub use bus::EventBus;
pub use events::{EventKind, SimulationEvent};
pub use sinks::{EventSink, TracingSink, VecSink};
