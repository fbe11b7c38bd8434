//! LLM provider clients for OpenAI-compatible endpoints.
//!
//! Epistemic foundation:
//! - K_i: OpenAI API schema is the de facto standard
//! - K_i: Aggregators and on-prem (vLLM, Ollama) all support it
//! - B_i: API will respond within timeout (might fail)
//! - B_i: Response will be valid JSON (might fail)
//!
//! A provider performs exactly one attempt per `send`; retry and backoff
//! belong to the gateway's retry policy, which classifies the returned
//! `GatewayError`.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{GatewayError, ProviderConfig, Result};

/// Raw reply from a provider, before pricing and telemetry are applied.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    /// Generated text
    pub text: String,
    /// Model that served the request (may differ from the requested one)
    pub model: String,
    /// Input tokens consumed
    pub input_tokens: u32,
    /// Output tokens generated
    pub output_tokens: u32,
}

/// Opaque message-generation capability the gateway routes through.
///
/// One call to `send` is one outbound attempt: no internal retries, no
/// internal concurrency control. Failures come back classified as fatal or
/// retryable via `GatewayError`.
pub trait LlmProvider: Send + Sync {
    /// Send a prompt to `model` and return the generated text with token
    /// counts.
    fn send(
        &self,
        prompt: &str,
        model: &str,
    ) -> impl Future<Output = Result<ProviderReply>> + Send;
}

impl<P: LlmProvider> LlmProvider for std::sync::Arc<P> {
    fn send(
        &self,
        prompt: &str,
        model: &str,
    ) -> impl Future<Output = Result<ProviderReply>> + Send {
        (**self).send(prompt, model)
    }
}

/// Message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request payload.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
}

/// Chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// API error response (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    code: Option<String>,
}

/// HTTP client for any OpenAI-compatible endpoint.
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    custom_headers: HashMap<String, String>,
    timeout: Duration,
}

impl HttpProvider {
    /// Create a provider client.
    ///
    /// `api_key` may be `None` for local endpoints without auth.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        custom_headers: HashMap<String, String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
            custom_headers,
            timeout,
        })
    }

    /// Create a provider client from configuration, resolving the API key
    /// and expanding `${VAR}` placeholders in custom headers.
    pub fn from_config(config: &crate::models::Config) -> Result<Self> {
        let ProviderConfig {
            base_url,
            timeout_secs,
            headers,
            ..
        } = &config.provider;

        Self::new(
            base_url.clone(),
            config.resolve_api_key(),
            crate::models::expand_headers(headers),
            *timeout_secs,
        )
    }

    /// Base URL of the endpoint.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build headers for a request.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(ref api_key) = self.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (key, value) in &self.custom_headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::try_from(key.as_str()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, val);
            }
        }

        headers
    }

    /// Map a non-success HTTP response to a classified error.
    fn classify_failure(status: u16, model: &str, body: &str) -> GatewayError {
        let detail = serde_json::from_str::<ApiErrorResponse>(body)
            .map(|r| r.error)
            .ok();
        let message = detail
            .as_ref()
            .map(|d| d.message.clone())
            .unwrap_or_else(|| body.to_string());

        match status {
            401 | 403 => GatewayError::AuthenticationFailed,
            404 => GatewayError::ModelNotFound(model.to_string()),
            400 | 422 => {
                let code = detail.and_then(|d| d.code).unwrap_or_default();
                if code.contains("content_policy") {
                    GatewayError::ContentPolicy(message)
                } else {
                    GatewayError::InvalidInput(message)
                }
            }
            _ => GatewayError::Provider { status, message },
        }
    }
}

impl LlmProvider for HttpProvider {
    async fn send(&self, prompt: &str, model: &str) -> Result<ProviderReply> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![Message::user(prompt)],
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = model, url = %url, "Sending provider request");

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout)
                } else {
                    GatewayError::Network(e)
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<f64>().ok());
            return Err(GatewayError::RateLimited { retry_after_secs });
        }

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_failure(status, model, &body));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            GatewayError::InvalidResponse(format!("Failed to parse response: {e}"))
        })?;

        let text = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GatewayError::InvalidResponse("No choices in response".to_string()))?;

        let usage = body.usage.unwrap_or_default();

        Ok(ProviderReply {
            text,
            model: body.model.unwrap_or_else(|| model.to_string()),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}
