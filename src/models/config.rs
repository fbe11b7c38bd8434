//! Configuration models for promptgate.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at runtime via config file and
//! environment overrides.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable overriding `gateway.max_concurrent_calls`.
pub const ENV_MAX_CONCURRENT_CALLS: &str = "MAX_CONCURRENT_CALLS";

/// Environment variable overriding `gateway.worker_concurrency`.
pub const ENV_WORKER_CONCURRENCY: &str = "WORKER_CONCURRENCY";

/// Top-level configuration for promptgate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// LLM provider endpoint configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Gateway concurrency and retry settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Telemetry sink settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Pricing table keyed by model name
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
}

/// LLM provider endpoint configuration.
///
/// K_i: The endpoint must be OpenAI-compatible (chat completions API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key (can also be set via the `api_key_env` variable)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL for the API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Custom headers to include in requests
    /// Values can contain ${ENV_VAR} for environment variable expansion
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_api_key_env() -> String {
    "LLM_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            headers: HashMap::new(),
        }
    }
}

/// Gateway concurrency and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Size of the shared slot pool bounding simultaneous provider calls
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,

    /// How many operations the worker pool may run at once
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Total attempts per call (1 initial + retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff multiplier applied per retry
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_concurrent_calls() -> usize {
    2
}

fn default_worker_concurrency() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: default_max_concurrent_calls(),
            worker_concurrency: default_worker_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Telemetry sink settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Append events as JSON lines to this file; when unset, events go to
    /// the structured log
    #[serde(default)]
    pub jsonl_path: Option<PathBuf>,
}

/// Per-model pricing, USD per million tokens.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Input price per 1M tokens (USD)
    #[serde(default)]
    pub input_price_per_1m: f64,

    /// Output price per 1M tokens (USD)
    #[serde(default)]
    pub output_price_per_1m: f64,
}

impl ModelPricing {
    /// Cost of a call in USD.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_price_per_1m;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_price_per_1m;
        input_cost + output_cost
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Apply environment-level overrides.
    ///
    /// Recognized variables: `MAX_CONCURRENT_CALLS`, `WORKER_CONCURRENCY`.
    /// An unparseable value is a configuration error, not a silent fallback.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw) = std::env::var(ENV_MAX_CONCURRENT_CALLS) {
            self.gateway.max_concurrent_calls = raw.parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{ENV_MAX_CONCURRENT_CALLS} must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        if let Ok(raw) = std::env::var(ENV_WORKER_CONCURRENCY) {
            self.gateway.worker_concurrency = raw.parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{ENV_WORKER_CONCURRENCY} must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        self.validate()
    }

    /// Validate settings that serde defaults cannot enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.max_concurrent_calls == 0 {
            return Err(ConfigError::Invalid(
                "gateway.max_concurrent_calls must be at least 1".to_string(),
            ));
        }
        if self.gateway.worker_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "gateway.worker_concurrency must be at least 1".to_string(),
            ));
        }
        if self.gateway.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "gateway.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.gateway.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "gateway.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the provider API key from config or environment.
    ///
    /// Returns `None` when neither is set, which is valid for local
    /// endpoints without auth.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.provider.api_key {
            return Some(expand_env_vars(key));
        }
        std::env::var(&self.provider.api_key_env).ok()
    }

    /// Pricing entry for a model, if one is configured.
    pub fn pricing_for(&self, model: &str) -> Option<&ModelPricing> {
        self.pricing.get(model)
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(s) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Expand environment variables in all headers.
pub fn expand_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.clone(), expand_env_vars(v)))
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_gets_documented_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.gateway.max_concurrent_calls, 2);
        assert_eq!(config.gateway.worker_concurrency, 1);
        assert_eq!(config.gateway.max_attempts, 3);
        assert_eq!(config.gateway.backoff_base_ms, 500);
        assert_eq!(config.provider.timeout_secs, 120);
        config.validate().unwrap();
    }

    #[test]
    fn from_file_parses_pricing_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[provider]
base_url = "http://localhost:11434/v1"

[gateway]
max_concurrent_calls = 4

[pricing."gpt-4o"]
input_price_per_1m = 2.5
output_price_per_1m = 10.0
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.gateway.max_concurrent_calls, 4);
        let pricing = config.pricing_for("gpt-4o").unwrap();
        assert!((pricing.cost(1_000_000, 1_000_000) - 12.5).abs() < 1e-9);
        assert!(config.pricing_for("unknown-model").is_none());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = Config::default();
        std::env::set_var(ENV_MAX_CONCURRENT_CALLS, "7");
        let result = config.apply_env_overrides();
        std::env::remove_var(ENV_MAX_CONCURRENT_CALLS);
        result.unwrap();
        assert_eq!(config.gateway.max_concurrent_calls, 7);
    }

    #[test]
    fn unparseable_env_override_is_an_error() {
        let mut config = Config::default();
        std::env::set_var(ENV_WORKER_CONCURRENCY, "many");
        let result = config.apply_env_overrides();
        std::env::remove_var(ENV_WORKER_CONCURRENCY);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = Config::default();
        config.gateway.max_concurrent_calls = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn expand_env_vars_substitutes_known_variables() {
        std::env::set_var("PROMPTGATE_TEST_TOKEN", "secret");
        assert_eq!(
            expand_env_vars("Bearer ${PROMPTGATE_TEST_TOKEN}"),
            "Bearer secret"
        );
        assert_eq!(expand_env_vars("${NOT_SET_ANYWHERE_42}"), "${NOT_SET_ANYWHERE_42}");
        std::env::remove_var("PROMPTGATE_TEST_TOKEN");
    }
}
