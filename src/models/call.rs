//! Call request and result types for promptgate.
//!
//! K_i: These types represent the core data flow through the gateway.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Correlation context for a call or operation.
///
/// Both identifiers are optional; absence means "untracked" and must never
/// fail a call. A trace spans a whole user-facing request, a task is one
/// queued unit of work within it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Correlates a whole user-facing request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// Correlates one queued unit of work
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl CallContext {
    /// Context with no correlation identifiers.
    pub fn untracked() -> Self {
        Self::default()
    }

    /// Context carrying both identifiers.
    pub fn new(trace_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            trace_id: Some(trace_id.into()),
            task_id: Some(task_id.into()),
        }
    }

    /// Context carrying only a trace identifier.
    pub fn with_trace(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: Some(trace_id.into()),
            task_id: None,
        }
    }
}

/// A single outbound call to the LLM provider.
///
/// K_i: Immutable once constructed; the gateway reads it, never mutates it.
#[derive(Debug, Clone)]
pub struct CallRequest {
    model: String,
    prompt: String,
    purpose: String,
    context: CallContext,
}

impl CallRequest {
    /// Build a request for `model` with an opaque prompt payload and a
    /// caller-supplied purpose label (e.g. "parse_template").
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            purpose: purpose.into(),
            context: CallContext::untracked(),
        }
    }

    /// Attach correlation identifiers.
    #[must_use]
    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }

    /// Model identifier the call is addressed to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Opaque prompt payload.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Caller-supplied purpose label.
    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    /// Correlation identifiers for this call.
    pub fn context(&self) -> &CallContext {
        &self.context
    }
}

/// Result of a successful gateway call.
///
/// Owned exclusively by the caller after return; the gateway keeps no
/// reference to it.
#[derive(Debug, Clone)]
pub struct CallResult {
    /// Generated text
    pub text: String,

    /// Model that served the call (may differ from the requested one)
    pub model: String,

    /// Input tokens consumed
    pub input_tokens: u32,

    /// Output tokens generated
    pub output_tokens: u32,

    /// Cost in USD, derived from the pricing table
    pub cost_usd: f64,

    /// Wall-clock duration of the successful attempt
    pub duration: Duration,
}

/// Lifecycle of one call through the gateway.
///
/// `Pending → Queued → InFlight → {Succeeded | Retrying → InFlight | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Constructed, not yet queued for a slot
    Pending,
    /// Waiting for a concurrency slot
    Queued,
    /// Outbound attempt in progress
    InFlight,
    /// Attempt failed with a retryable cause, backoff pending
    Retrying,
    /// Terminal: a result was returned
    Succeeded,
    /// Terminal: a failure was reported
    Failed,
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CallState::Pending => "pending",
            CallState::Queued => "queued",
            CallState::InFlight => "in_flight",
            CallState::Retrying => "retrying",
            CallState::Succeeded => "succeeded",
            CallState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}
