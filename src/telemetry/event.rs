//! Structured telemetry events.
//!
//! K_i: Every event is a flat JSON object; fields that do not apply to a
//! given event kind are omitted entirely, including absent correlation
//! identifiers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CallContext, CallRequest, CallResult};

/// Kind of telemetry event, serialized as its dotted wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A logical operation began
    #[serde(rename = "operation.started")]
    OperationStarted,
    /// A logical operation finished successfully
    #[serde(rename = "operation.completed")]
    OperationCompleted,
    /// A logical operation failed or was abandoned
    #[serde(rename = "operation.failed")]
    OperationFailed,
    /// One outbound provider attempt started
    #[serde(rename = "llm.request")]
    LlmRequest,
    /// One outbound provider attempt finished (success or failure)
    #[serde(rename = "llm.response")]
    LlmResponse,
}

impl EventKind {
    /// Wire name of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OperationStarted => "operation.started",
            EventKind::OperationCompleted => "operation.completed",
            EventKind::OperationFailed => "operation.failed",
            EventKind::LlmRequest => "llm.request",
            EventKind::LlmResponse => "llm.response",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured, correlatable telemetry event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// What happened
    pub event: EventKind,

    /// When it happened
    pub timestamp: DateTime<Utc>,

    /// Correlates a whole user-facing request, when supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// Correlates one queued unit of work, when supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Operation name (operation.* events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,

    /// Operation instance identifier (operation.* events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    /// Caller-supplied purpose label (llm.* events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Model the call was addressed to (llm.* events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// 1-based attempt number (llm.* events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,

    /// Attempt duration in milliseconds (llm.response)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Operation duration in whole seconds (operation.completed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,

    /// Input tokens consumed (successful llm.response)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,

    /// Output tokens generated (successful llm.response)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,

    /// Derived cost in USD (successful llm.response)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,

    /// Human-readable error string (failed llm.response, operation.failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TelemetryEvent {
    fn base(event: EventKind, context: &CallContext) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
            trace_id: context.trace_id.clone(),
            task_id: context.task_id.clone(),
            operation: None,
            operation_id: None,
            purpose: None,
            model: None,
            attempt: None,
            duration_ms: None,
            duration_secs: None,
            input_tokens: None,
            output_tokens: None,
            cost_usd: None,
            error: None,
        }
    }

    /// An operation began.
    pub fn operation_started(name: &str, id: &str, context: &CallContext) -> Self {
        let mut event = Self::base(EventKind::OperationStarted, context);
        event.operation = Some(name.to_string());
        event.operation_id = Some(id.to_string());
        event
    }

    /// An operation finished successfully after `duration`.
    pub fn operation_completed(
        name: &str,
        id: &str,
        context: &CallContext,
        duration: Duration,
    ) -> Self {
        let mut event = Self::base(EventKind::OperationCompleted, context);
        event.operation = Some(name.to_string());
        event.operation_id = Some(id.to_string());
        event.duration_secs = Some(duration.as_secs());
        event
    }

    /// An operation failed with a human-readable error string.
    pub fn operation_failed(name: &str, id: &str, context: &CallContext, error: &str) -> Self {
        let mut event = Self::base(EventKind::OperationFailed, context);
        event.operation = Some(name.to_string());
        event.operation_id = Some(id.to_string());
        event.error = Some(error.to_string());
        event
    }

    /// One provider attempt is about to go out.
    pub fn llm_request(request: &CallRequest, attempt: u32) -> Self {
        let mut event = Self::base(EventKind::LlmRequest, request.context());
        event.purpose = Some(request.purpose().to_string());
        event.model = Some(request.model().to_string());
        event.attempt = Some(attempt);
        event
    }

    /// A provider attempt succeeded.
    pub fn llm_response(request: &CallRequest, attempt: u32, result: &CallResult) -> Self {
        let mut event = Self::base(EventKind::LlmResponse, request.context());
        event.purpose = Some(request.purpose().to_string());
        event.model = Some(request.model().to_string());
        event.attempt = Some(attempt);
        event.duration_ms = Some(result.duration.as_millis() as u64);
        event.input_tokens = Some(result.input_tokens);
        event.output_tokens = Some(result.output_tokens);
        event.cost_usd = Some(result.cost_usd);
        event
    }

    /// A provider attempt failed.
    pub fn llm_failure(
        request: &CallRequest,
        attempt: u32,
        duration: Duration,
        error: &str,
    ) -> Self {
        let mut event = Self::base(EventKind::LlmResponse, request.context());
        event.purpose = Some(request.purpose().to_string());
        event.model = Some(request.model().to_string());
        event.attempt = Some(attempt);
        event.duration_ms = Some(duration.as_millis() as u64);
        event.error = Some(error.to_string());
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_to_dotted_name() {
        let json = serde_json::to_value(EventKind::LlmRequest).unwrap();
        assert_eq!(json, "llm.request");
        assert_eq!(EventKind::OperationFailed.to_string(), "operation.failed");
    }

    #[test]
    fn untracked_events_carry_no_identifier_keys() {
        let request = CallRequest::new("gpt-4o", "hello", "parse_template");
        let event = TelemetryEvent::llm_request(&request, 1);
        let json = serde_json::to_value(&event).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("trace_id"));
        assert!(!obj.contains_key("task_id"));
        assert_eq!(json["event"], "llm.request");
        assert_eq!(json["purpose"], "parse_template");
        assert_eq!(json["attempt"], 1);
    }

    #[test]
    fn tracked_events_carry_exact_identifiers() {
        let request = CallRequest::new("gpt-4o", "hello", "edit_section")
            .with_context(CallContext::new("trace-42", "task-7"));
        let result = CallResult {
            text: "ok".into(),
            model: "gpt-4o".into(),
            input_tokens: 12,
            output_tokens: 3,
            cost_usd: 0.0001,
            duration: Duration::from_millis(250),
        };
        let event = TelemetryEvent::llm_response(&request, 2, &result);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["trace_id"], "trace-42");
        assert_eq!(json["task_id"], "task-7");
        assert_eq!(json["duration_ms"], 250);
        assert_eq!(json["input_tokens"], 12);
        assert_eq!(json["output_tokens"], 3);
    }

    #[test]
    fn completed_operations_report_whole_seconds() {
        let ctx = CallContext::untracked();
        let event = TelemetryEvent::operation_completed(
            "Parse Template",
            "op-1",
            &ctx,
            Duration::from_millis(2900),
        );
        assert_eq!(event.duration_secs, Some(2));
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.as_object().unwrap().get("duration_ms").is_none());
    }
}
