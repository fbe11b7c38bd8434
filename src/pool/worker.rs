//! Worker pool dispatching queued operations through the gateway.
//!
//! Epistemic foundation:
//! - K_i: Workers run operations by calling the gateway
//! - K_i: At most `worker_concurrency` operations run at once
//! - B_i: Each operation may succeed or fail → Result
//!
//! The pool bounds how many operations are dequeued at once; the gateway's
//! slot pool separately bounds outbound provider calls. With the defaults
//! (one worker, two slots) the pool is the tighter limit.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::warn;

use crate::client::LlmProvider;
use crate::gateway::Gateway;
use crate::models::{CallRequest, CallResult, GatewayError, Result};

/// One queued unit of work: a named operation wrapping a gateway call.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Operation name, e.g. "Parse Template"
    pub operation: String,

    /// The call to route through the gateway
    pub request: CallRequest,
}

impl WorkItem {
    /// Build a work item.
    pub fn new(operation: impl Into<String>, request: CallRequest) -> Self {
        Self {
            operation: operation.into(),
            request,
        }
    }
}

/// A failed work item, reduced to what the end user may see.
///
/// The raw cause was already reported through telemetry and logs.
#[derive(Debug, Clone)]
pub struct WorkFailure {
    /// Operation name of the failed item
    pub operation: String,

    /// Short, actionable user-facing message
    pub message: String,
}

/// Pool running operations with bounded concurrency.
pub struct WorkerPool<P: LlmProvider> {
    gateway: Arc<Gateway<P>>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl<P: LlmProvider + 'static> WorkerPool<P> {
    /// Create a pool over `gateway` running at most `worker_concurrency`
    /// operations at once.
    pub fn new(gateway: Arc<Gateway<P>>, worker_concurrency: usize) -> Self {
        Self {
            gateway,
            semaphore: Arc::new(Semaphore::new(worker_concurrency)),
            concurrency: worker_concurrency,
        }
    }

    /// Configured worker concurrency.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run a single work item as a telemetry-bounded operation.
    pub async fn run(&self, item: WorkItem) -> Result<CallResult> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| GatewayError::Internal("Worker semaphore closed".to_string()))?;

        let context = item.request.context().clone();
        self.gateway
            .run_operation(&item.operation, context, || {
                self.gateway.call(item.request.clone())
            })
            .await
    }

    /// Run a batch of work items, interleaving up to `worker_concurrency`
    /// of them.
    ///
    /// Returns (successful results, user-facing failures).
    pub async fn run_batch(&self, items: Vec<WorkItem>) -> (Vec<CallResult>, Vec<WorkFailure>) {
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let gateway = Arc::clone(&self.gateway);
            let semaphore = Arc::clone(&self.semaphore);
            let handle = tokio::spawn(async move {
                let operation = item.operation;
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        let error =
                            GatewayError::Internal("Worker semaphore closed".to_string());
                        return Err((operation, error));
                    }
                };
                let context = item.request.context().clone();
                let result = gateway
                    .run_operation(&operation, context, || gateway.call(item.request.clone()))
                    .await;
                result.map_err(|e| (operation, e))
            });
            handles.push(handle);
        }

        let mut results = Vec::new();
        let mut failures = Vec::new();

        for handle in handles {
            match handle.await {
                Ok(Ok(result)) => results.push(result),
                Ok(Err((operation, error))) => {
                    warn!(operation = %operation, error = %error, "Operation failed");
                    failures.push(WorkFailure {
                        operation,
                        message: error.user_message().to_string(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Worker task panicked");
                }
            }
        }

        (results, failures)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::client::ProviderReply;
    use crate::gateway::{RetryPolicy, SlotPool};
    use crate::models::{CallContext, ModelPricing};
    use crate::telemetry::{Emitter, EventKind, MemorySink};

    struct CountingProvider {
        outcomes: Mutex<VecDeque<Result<ProviderReply>>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl CountingProvider {
        fn new(outcomes: Vec<Result<ProviderReply>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    impl LlmProvider for CountingProvider {
        async fn send(&self, _prompt: &str, _model: &str) -> Result<ProviderReply> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match self.outcomes.lock().unwrap().pop_front() {
                Some(outcome) => outcome,
                None => Ok(ProviderReply {
                    text: "done".to_string(),
                    model: "gpt-4o".to_string(),
                    input_tokens: 5,
                    output_tokens: 2,
                }),
            }
        }
    }

    fn pool_with(
        provider: Arc<CountingProvider>,
        worker_concurrency: usize,
        max_concurrent_calls: usize,
    ) -> (WorkerPool<Arc<CountingProvider>>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let gateway = Arc::new(Gateway::new(
            provider,
            SlotPool::new(max_concurrent_calls),
            RetryPolicy::default(),
            Emitter::new(sink.clone()),
            std::collections::HashMap::from([(
                "gpt-4o".to_string(),
                ModelPricing {
                    input_price_per_1m: 2.5,
                    output_price_per_1m: 10.0,
                },
            )]),
        ));
        (WorkerPool::new(gateway, worker_concurrency), sink)
    }

    fn item(name: &str) -> WorkItem {
        WorkItem::new(
            name,
            CallRequest::new("gpt-4o", "do the work", "dispatch")
                .with_context(CallContext::with_trace("trace-batch")),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn worker_concurrency_bounds_dispatch() {
        let provider = CountingProvider::new(Vec::new());
        // Gateway slots are wide; the single worker is the tight bound.
        let (pool, _sink) = pool_with(provider.clone(), 1, 4);

        let items = (0..4).map(|i| item(&format!("Op {i}"))).collect();
        let (results, failures) = pool.run_batch(items).await;

        assert_eq!(results.len(), 4);
        assert!(failures.is_empty());
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_surface_user_facing_messages() {
        let provider = CountingProvider::new(vec![Err(GatewayError::AuthenticationFailed)]);
        let (pool, sink) = pool_with(provider, 2, 2);

        let (results, failures) =
            pool.run_batch(vec![item("Parse Template"), item("Edit Section")]).await;

        assert_eq!(results.len() + failures.len(), 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].message,
            "The AI service rejected our credentials. Check the configured API key."
        );
        // The raw cause is not part of the user-facing message.
        assert!(!failures[0].message.contains("Authentication failed:"));

        let events = sink.events();
        let started = events
            .iter()
            .filter(|e| e.event == EventKind::OperationStarted)
            .count();
        let failed = events
            .iter()
            .filter(|e| e.event == EventKind::OperationFailed)
            .count();
        let completed = events
            .iter()
            .filter(|e| e.event == EventKind::OperationCompleted)
            .count();
        assert_eq!(started, 2);
        assert_eq!(failed, 1);
        assert_eq!(completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_item_run_returns_the_result() {
        let provider = CountingProvider::new(Vec::new());
        let (pool, sink) = pool_with(provider, 1, 2);

        let result = pool.run(item("Parse Template")).await.unwrap();
        assert_eq!(result.text, "done");

        let events = sink.events();
        assert!(events
            .iter()
            .any(|e| e.event == EventKind::OperationCompleted
                && e.operation.as_deref() == Some("Parse Template")));
    }
}
