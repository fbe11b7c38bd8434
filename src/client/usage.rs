//! Per-model usage ledger.
//!
//! Epistemic foundation:
//! - K_i: Every successful call reports token counts and derived cost
//! - K_i: Ledger writes happen on the call path and must stay lock-light
//! - B_i: Aggregate cost drifts by at most one microdollar per call

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Usage counters for a single model.
///
/// Cost is stored as microdollars so it can live in an atomic.
#[derive(Debug, Default)]
struct ModelUsage {
    calls: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    cost_micros: AtomicU64,
}

/// Process-wide ledger of provider usage, keyed by requested model.
///
/// Shared by reference from the gateway; all updates go through
/// `record_call`/`record_retry`, reads through `snapshot`.
#[derive(Debug, Default)]
pub struct UsageLedger {
    models: DashMap<String, ModelUsage>,
    total_calls: AtomicU64,
    total_retries: AtomicU64,
}

impl UsageLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed call against `model`.
    pub fn record_call(&self, model: &str, input_tokens: u32, output_tokens: u32, cost_usd: f64) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let usage = self.models.entry(model.to_string()).or_default();
        usage.calls.fetch_add(1, Ordering::Relaxed);
        usage
            .input_tokens
            .fetch_add(input_tokens as u64, Ordering::Relaxed);
        usage
            .output_tokens
            .fetch_add(output_tokens as u64, Ordering::Relaxed);
        usage
            .cost_micros
            .fetch_add((cost_usd * 1_000_000.0) as u64, Ordering::Relaxed);
    }

    /// Record one retried attempt.
    pub fn record_retry(&self) {
        self.total_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of the ledger, per-model rows sorted by name.
    pub fn snapshot(&self) -> UsageSnapshot {
        let mut per_model: Vec<ModelUsageSnapshot> = self
            .models
            .iter()
            .map(|entry| {
                let usage = entry.value();
                ModelUsageSnapshot {
                    model: entry.key().clone(),
                    calls: usage.calls.load(Ordering::Relaxed),
                    input_tokens: usage.input_tokens.load(Ordering::Relaxed),
                    output_tokens: usage.output_tokens.load(Ordering::Relaxed),
                    cost_usd: usage.cost_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
                }
            })
            .collect();
        per_model.sort_by(|a, b| a.model.cmp(&b.model));

        UsageSnapshot {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
            total_cost_usd: per_model.iter().map(|m| m.cost_usd).sum(),
            per_model,
        }
    }
}

/// Point-in-time aggregate of all recorded usage.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub total_calls: u64,
    pub total_retries: u64,
    pub total_cost_usd: f64,
    pub per_model: Vec<ModelUsageSnapshot>,
}

/// Usage aggregate for one model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelUsageSnapshot {
    pub model: String,
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}
