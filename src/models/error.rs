//! Error types for promptgate.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Fatal failures (bad input, bad credentials), never retried
//! - I^B materialized: Transient infrastructure failures, retried with backoff
//! - Exhausted: Retries used up, last cause preserved

use thiserror::Error;

/// Top-level error type for promptgate.
///
/// Every variant is either fatal (propagated immediately) or retryable
/// (eligible for backoff-and-retry); `is_retryable` encodes the split so the
/// retry policy can branch on classification instead of error downcasting.
#[derive(Debug, Error)]
pub enum GatewayError {
    // ═══════════════════════════════════════════════════════════════════
    // FATAL — caller or configuration is wrong, retrying cannot help
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication failed: provider rejected credentials")]
    AuthenticationFailed,

    #[error("Content policy rejection: {0}")]
    ContentPolicy(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    // ═══════════════════════════════════════════════════════════════════
    // RETRYABLE — transient provider/network conditions
    // ═══════════════════════════════════════════════════════════════════

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited by provider")]
    RateLimited { retry_after_secs: Option<f64> },

    #[error("Provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    // ═══════════════════════════════════════════════════════════════════
    // TERMINAL — retries exhausted or the call was abandoned
    // ═══════════════════════════════════════════════════════════════════

    #[error("Call failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<GatewayError>,
    },

    #[error("Call cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Wrap the last failure of an exhausted retry sequence.
    pub fn exhausted(attempts: u32, cause: GatewayError) -> Self {
        Self::Exhausted {
            attempts,
            source: Box::new(cause),
        }
    }

    /// Check if this error is retryable.
    ///
    /// Timeouts, provider rate limits, network errors and 5xx-class provider
    /// responses are transient; everything else is not worth re-attempting.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited { .. } | Self::Network(_) => true,
            Self::Provider { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get retry delay hint in seconds, if the provider supplied one.
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            Self::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }

    /// Short, actionable message suitable for an end user.
    ///
    /// The raw cause stays in telemetry and logs; this is what surfaces
    /// outward.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Config(_) => "The service is misconfigured. Contact an administrator.",
            Self::InvalidInput(_) => {
                "The request was rejected as invalid. Review the input and try again."
            }
            Self::AuthenticationFailed => {
                "The AI service rejected our credentials. Check the configured API key."
            }
            Self::ContentPolicy(_) => {
                "The request was declined by the provider's content policy."
            }
            Self::ModelNotFound(_) => "The configured model is not available from the provider.",
            Self::InvalidResponse(_) => {
                "The AI service returned an unreadable response. Please try again."
            }
            Self::Network(_) | Self::Timeout(_) => {
                "The AI service did not respond in time. Please try again."
            }
            Self::RateLimited { .. } => {
                "The AI service is busy right now. Please try again shortly."
            }
            Self::Provider { .. } => "The AI service returned an error. Please try again.",
            Self::Exhausted { .. } => {
                "The AI service is temporarily unavailable. Please try again later."
            }
            Self::Cancelled => "The request was cancelled.",
            Self::Internal(_) => "An internal error occurred. Please try again.",
        }
    }
}

/// Result type alias for promptgate.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_splits_fatal_from_retryable() {
        assert!(GatewayError::Timeout(std::time::Duration::from_secs(1)).is_retryable());
        assert!(GatewayError::RateLimited {
            retry_after_secs: None
        }
        .is_retryable());
        assert!(GatewayError::Provider {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());

        assert!(!GatewayError::AuthenticationFailed.is_retryable());
        assert!(!GatewayError::InvalidInput("empty".into()).is_retryable());
        assert!(!GatewayError::Provider {
            status: 422,
            message: "bad request".into()
        }
        .is_retryable());
        assert!(!GatewayError::exhausted(
            3,
            GatewayError::Timeout(std::time::Duration::from_secs(1))
        )
        .is_retryable());
    }

    #[test]
    fn exhausted_preserves_last_cause() {
        let err = GatewayError::exhausted(
            3,
            GatewayError::RateLimited {
                retry_after_secs: Some(2.0),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("after 3 attempts"));
        assert!(msg.contains("Rate limited"));
    }

    #[test]
    fn retry_after_hint_only_from_rate_limits() {
        let limited = GatewayError::RateLimited {
            retry_after_secs: Some(1.5),
        };
        assert_eq!(limited.retry_after(), Some(1.5));
        assert_eq!(
            GatewayError::Timeout(std::time::Duration::from_secs(1)).retry_after(),
            None
        );
    }

    #[test]
    fn user_messages_hide_raw_causes() {
        let err = GatewayError::Provider {
            status: 500,
            message: "stack trace: panic at llm_backend.c:42".into(),
        };
        assert!(!err.user_message().contains("stack trace"));
    }
}
