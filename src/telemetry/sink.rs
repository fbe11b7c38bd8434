//! Event sinks and the fire-and-forget emitter.
//!
//! Epistemic foundation:
//! - K_i: Delivery is best-effort; a sink failure never fails a call
//! - B_i: The sink is reachable (might not be, logged and dropped)

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

use super::TelemetryEvent;
use crate::models::TelemetryConfig;

/// Failure to hand an event to a sink.
///
/// Logged locally by the emitter, never propagated to the call path.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Serializing event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Writing event: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Destination for telemetry events.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Best-effort; the emitter handles failures.
    fn emit(&self, event: &TelemetryEvent) -> Result<(), SinkError>;
}

/// Sink that writes events to the structured log under the `telemetry`
/// target.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &TelemetryEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_string(event)?;
        info!(target: "telemetry", event = %event.event, %payload);
        Ok(())
    }
}

/// Sink that appends events as JSON lines to a file.
pub struct JsonlSink {
    writer: Mutex<BufWriter<std::fs::File>>,
}

impl JsonlSink {
    /// Open (or create) the file at `path` for appending.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl EventSink for JsonlSink {
    fn emit(&self, event: &TelemetryEvent) -> Result<(), SinkError> {
        let json = serde_json::to_string(event)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::Other("JSONL writer poisoned".to_string()))?;
        writeln!(writer, "{json}")?;
        writer.flush()?;
        Ok(())
    }
}

/// In-memory sink capturing events for inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events captured so far, in emission order.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().expect("memory sink poisoned").clone()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &TelemetryEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .map_err(|_| SinkError::Other("memory sink poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

/// Fire-and-forget wrapper around a sink.
///
/// A sink failure is logged locally and swallowed; the business call that
/// produced the event is never affected.
#[derive(Clone)]
pub struct Emitter {
    sink: Arc<dyn EventSink>,
}

impl Emitter {
    /// Wrap a sink.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Build the configured sink: a JSONL file when a path is set, the
    /// structured log otherwise.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, SinkError> {
        let sink: Arc<dyn EventSink> = match &config.jsonl_path {
            Some(path) => Arc::new(JsonlSink::create(path)?),
            None => Arc::new(TracingSink),
        };
        Ok(Self::new(sink))
    }

    /// Emit one event, logging and continuing on sink failure.
    pub fn emit(&self, event: TelemetryEvent) {
        if let Err(e) = self.sink.emit(&event) {
            warn!(
                target: "telemetry",
                event = %event.event,
                error = %e,
                "Telemetry emission failed, continuing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CallRequest;
    use crate::telemetry::EventKind;

    struct FailingSink;

    impl EventSink for FailingSink {
        fn emit(&self, _event: &TelemetryEvent) -> Result<(), SinkError> {
            Err(SinkError::Other("sink outage".to_string()))
        }
    }

    fn sample_event() -> TelemetryEvent {
        TelemetryEvent::llm_request(&CallRequest::new("gpt-4o", "hi", "test"), 1)
    }

    #[test]
    fn emitter_swallows_sink_failures() {
        let emitter = Emitter::new(Arc::new(FailingSink));
        // Must not panic or propagate.
        emitter.emit(sample_event());
    }

    #[test]
    fn memory_sink_captures_in_order() {
        let sink = Arc::new(MemorySink::new());
        let emitter = Emitter::new(sink.clone());
        emitter.emit(sample_event());
        emitter.emit(sample_event());

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, EventKind::LlmRequest);
    }

    #[test]
    fn jsonl_sink_appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let sink = JsonlSink::create(&path).unwrap();
        sink.emit(&sample_event()).unwrap();
        sink.emit(&sample_event()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: TelemetryEvent = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.event, EventKind::LlmRequest);
        }
    }
}
