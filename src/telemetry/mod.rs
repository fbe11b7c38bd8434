//! Telemetry module - events, sinks, and operation lifecycle.

mod event;
mod operation;
mod sink;

pub use event::*;
pub use operation::*;
pub use sink::*;
