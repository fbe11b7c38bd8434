//! promptgate - Rate-limited, telemetry-tracked LLM invocation gateway.
//!
//! ## Architecture
//!
//! Every outbound LLM call routes through one [`Gateway`], which composes
//! three concerns around the provider call:
//! - **Slot pool**: bounds simultaneous provider calls process-wide, FIFO
//! - **Retry policy**: re-attempts transient failures with exponential
//!   backoff, up to a bounded number of attempts
//! - **Telemetry emitter**: structured, correlatable events for every
//!   operation and every call, fire-and-forget
//!
//! A [`WorkerPool`] dispatches queued operations through the gateway with
//! its own concurrency bound.
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Compile-time enforced invariants (types, enums)
//! - B_i (Beliefs): Runtime fallible operations (Result, Option)
//! - I^R (Resolvable): User-configurable parameters
//! - I^B (Bounded): Network/API uncertainties (retry, backoff)

pub mod client;
pub mod gateway;
pub mod models;
pub mod pool;
pub mod telemetry;

// Re-exports for convenience
pub use client::{HttpProvider, LlmProvider, ProviderReply, UsageLedger, UsageSnapshot};
pub use gateway::{Gateway, RetryPolicy, SlotPool};
pub use models::{
    CallContext, CallRequest, CallResult, CallState, Config, GatewayError, ModelPricing, Result,
};
pub use pool::{WorkFailure, WorkItem, WorkerPool};
pub use telemetry::{
    Emitter, EventKind, EventSink, JsonlSink, MemorySink, Operation, TelemetryEvent, TracingSink,
};
