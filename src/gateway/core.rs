//! Gateway composition: slot pool, retry policy, telemetry, pricing.
//!
//! Per call: `Pending → Queued (awaiting slot) → InFlight →
//! {Succeeded | Retrying → InFlight | Failed}`. `llm.request` is emitted on
//! each attempt's entry, `llm.response` on its exit, and the slot is
//! released on every path out of the call, including errors and
//! cancellation.

use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use tracing::{debug, warn};

use crate::client::{LlmProvider, UsageLedger, UsageSnapshot};
use crate::gateway::{RetryPolicy, SlotPool};
use crate::models::{
    CallContext, CallRequest, CallResult, CallState, Config, GatewayError, ModelPricing, Result,
};
use crate::telemetry::{Emitter, Operation, TelemetryEvent};

/// The LLM call gateway every agent routes through.
///
/// Holds no per-call state: each call threads its own request and context
/// through, so concurrent calls cannot race on shared fields. The slot pool
/// is injected so several gateways (or several provider endpoints) can share
/// one process-wide pool.
pub struct Gateway<P: LlmProvider> {
    provider: P,
    slots: SlotPool,
    retry: RetryPolicy,
    emitter: Emitter,
    pricing: HashMap<String, ModelPricing>,
    usage: UsageLedger,
}

impl<P: LlmProvider> Gateway<P> {
    /// Compose a gateway from its parts.
    pub fn new(
        provider: P,
        slots: SlotPool,
        retry: RetryPolicy,
        emitter: Emitter,
        pricing: HashMap<String, ModelPricing>,
    ) -> Self {
        Self {
            provider,
            slots,
            retry,
            emitter,
            pricing,
            usage: UsageLedger::new(),
        }
    }

    /// Build slot pool, retry policy and pricing from configuration.
    pub fn with_config(provider: P, config: &Config, emitter: Emitter) -> Self {
        Self::new(
            provider,
            SlotPool::new(config.gateway.max_concurrent_calls),
            RetryPolicy::from_config(&config.gateway),
            emitter,
            config.pricing.clone(),
        )
    }

    /// Shared slot pool backing this gateway.
    pub fn slots(&self) -> &SlotPool {
        &self.slots
    }

    /// Usage recorded by this gateway so far.
    pub fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    /// Start a telemetry-bounded operation carrying `context`.
    pub fn begin_operation(&self, name: &str, context: CallContext) -> Operation {
        Operation::start(name, context, self.emitter.clone())
    }

    /// Run `f` as one operation: `operation.started` before, exactly one of
    /// `operation.completed`/`operation.failed` after.
    pub async fn run_operation<F, Fut, T>(
        &self,
        name: &str,
        context: CallContext,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let operation = self.begin_operation(name, context);
        match f().await {
            Ok(value) => {
                operation.complete();
                Ok(value)
            }
            Err(error) => {
                operation.fail(&error);
                Err(error)
            }
        }
    }

    /// Issue one call through the gateway.
    ///
    /// Waits for a slot (FIFO), then attempts the provider call under the
    /// retry policy. Every attempt emits an `llm.request`/`llm.response`
    /// pair; the final outcome is either a `CallResult` or a classified
    /// error, never a silent drop.
    pub async fn call(&self, request: CallRequest) -> Result<CallResult> {
        let mut state = CallState::Queued;
        debug!(purpose = request.purpose(), %state, "Call waiting for slot");

        // Held until this function returns; dropping it releases the slot
        // on success, error, panic and cancellation alike.
        let _slot = self.slots.acquire().await?;

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            state = CallState::InFlight;
            debug!(purpose = request.purpose(), %state, attempt = attempts, "Attempting call");
            self.emitter
                .emit(TelemetryEvent::llm_request(&request, attempts));

            let started = Instant::now();
            match self.provider.send(request.prompt(), request.model()).await {
                Ok(reply) => {
                    let duration = started.elapsed();
                    let cost = match self.pricing.get(request.model()) {
                        Some(pricing) => pricing.cost(reply.input_tokens, reply.output_tokens),
                        None => {
                            warn!(
                                model = request.model(),
                                "No pricing entry for model, recording zero cost"
                            );
                            0.0
                        }
                    };

                    let result = CallResult {
                        text: reply.text,
                        model: reply.model,
                        input_tokens: reply.input_tokens,
                        output_tokens: reply.output_tokens,
                        cost_usd: cost,
                        duration,
                    };

                    self.usage.record_call(
                        request.model(),
                        result.input_tokens,
                        result.output_tokens,
                        result.cost_usd,
                    );
                    self.emitter
                        .emit(TelemetryEvent::llm_response(&request, attempts, &result));

                    state = CallState::Succeeded;
                    debug!(purpose = request.purpose(), %state, attempt = attempts, "Call succeeded");
                    return Ok(result);
                }
                Err(error) => {
                    let duration = started.elapsed();
                    self.emitter.emit(TelemetryEvent::llm_failure(
                        &request,
                        attempts,
                        duration,
                        &error.to_string(),
                    ));

                    if self.retry.should_retry(&error, attempts) {
                        state = CallState::Retrying;
                        let delay = self.retry.delay_after(&error, attempts);
                        warn!(
                            purpose = request.purpose(),
                            %state,
                            attempt = attempts,
                            backoff_ms = delay.as_millis() as u64,
                            error = %error,
                            "Retryable failure, backing off"
                        );
                        self.usage.record_retry();
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    state = CallState::Failed;
                    let terminal = if error.is_retryable() {
                        GatewayError::exhausted(attempts, error)
                    } else {
                        error
                    };
                    warn!(
                        purpose = request.purpose(),
                        %state,
                        attempts = attempts,
                        error = %terminal,
                        "Call failed"
                    );
                    return Err(terminal);
                }
            }
        }
    }
}
