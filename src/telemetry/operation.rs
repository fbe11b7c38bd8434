//! Operation lifecycle tracking.
//!
//! An operation is a logical, telemetry-bounded unit of business work
//! (e.g. "Parse Template") composed of one or more gateway calls. Its record
//! is created at start and terminated by exactly one of complete/fail; a
//! record dropped unfinished counts as cancelled and is reported, never
//! silently lost.

use std::fmt::Display;
use std::time::Instant;

use tracing::warn;
use uuid::Uuid;

use super::{Emitter, TelemetryEvent};
use crate::models::CallContext;

/// Live record of one operation, from `operation.started` to exactly one of
/// `operation.completed` or `operation.failed`.
pub struct Operation {
    name: String,
    id: String,
    context: CallContext,
    emitter: Emitter,
    started: Instant,
    finished: bool,
}

impl Operation {
    /// Start an operation and emit `operation.started`.
    pub(crate) fn start(name: &str, context: CallContext, emitter: Emitter) -> Self {
        let id = Uuid::new_v4().to_string();
        emitter.emit(TelemetryEvent::operation_started(name, &id, &context));
        Self {
            name: name.to_string(),
            id,
            context,
            emitter,
            started: Instant::now(),
            finished: false,
        }
    }

    /// Operation instance identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Correlation identifiers this operation carries.
    pub fn context(&self) -> &CallContext {
        &self.context
    }

    /// Finish successfully, emitting `operation.completed` with the elapsed
    /// whole seconds.
    pub fn complete(mut self) {
        self.finished = true;
        self.emitter.emit(TelemetryEvent::operation_completed(
            &self.name,
            &self.id,
            &self.context,
            self.started.elapsed(),
        ));
    }

    /// Finish with a failure, emitting `operation.failed` carrying the full
    /// error string.
    pub fn fail(mut self, error: impl Display) {
        self.finished = true;
        self.emitter.emit(TelemetryEvent::operation_failed(
            &self.name,
            &self.id,
            &self.context,
            &error.to_string(),
        ));
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        // An unfinished drop means the operation was cancelled mid-flight.
        if !self.finished {
            warn!(
                operation = %self.name,
                operation_id = %self.id,
                "Operation dropped without complete/fail, reporting as cancelled"
            );
            self.emitter.emit(TelemetryEvent::operation_failed(
                &self.name,
                &self.id,
                &self.context,
                "operation cancelled before completion",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::telemetry::{EventKind, MemorySink};

    fn emitter() -> (Emitter, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Emitter::new(sink.clone()), sink)
    }

    #[test]
    fn complete_emits_started_then_completed() {
        let (emitter, sink) = emitter();
        let op = Operation::start("Parse Template", CallContext::with_trace("t-1"), emitter);
        op.complete();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, EventKind::OperationStarted);
        assert_eq!(events[1].event, EventKind::OperationCompleted);
        assert_eq!(events[1].trace_id.as_deref(), Some("t-1"));
        assert_eq!(events[0].operation_id, events[1].operation_id);
        assert!(events[1].duration_secs.is_some());
    }

    #[test]
    fn fail_carries_error_string() {
        let (emitter, sink) = emitter();
        let op = Operation::start("Edit Section", CallContext::untracked(), emitter);
        op.fail("provider unreachable");

        let events = sink.events();
        assert_eq!(events[1].event, EventKind::OperationFailed);
        assert_eq!(events[1].error.as_deref(), Some("provider unreachable"));
    }

    #[test]
    fn unfinished_drop_reports_cancellation() {
        let (emitter, sink) = emitter();
        {
            let _op = Operation::start("Check Compliance", CallContext::untracked(), emitter);
            // Dropped here without complete/fail.
        }

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event, EventKind::OperationFailed);
        assert!(events[1].error.as_deref().unwrap().contains("cancelled"));
    }
}
