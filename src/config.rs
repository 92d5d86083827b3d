use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Top-level configuration for the extraction core
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Gemini model client settings
    #[serde(default)]
    pub gemini: GeminiConfig,
    /// Webpage fetcher settings
    #[serde(default)]
    pub fetcher: FetcherConfig,
    /// Retry/backoff settings
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Settings for the Gemini model client
#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    /// API key (can also be set via RECIPE__GEMINI__API_KEY)
    pub api_key: Option<String>,
    /// Model identifier used for extraction and refinement
    #[serde(default = "default_model")]
    pub model: String,
    /// API base URL (overridable for proxies and tests)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Temperature for generation (0.0-1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Hard per-call timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Interval between upload status polls in seconds
    #[serde(default = "default_poll_interval")]
    pub upload_poll_interval_secs: u64,
    /// Independent wall-clock deadline for upload processing in seconds
    #[serde(default = "default_upload_deadline")]
    pub upload_deadline_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_secs: default_request_timeout(),
            upload_poll_interval_secs: default_poll_interval(),
            upload_deadline_secs: default_upload_deadline(),
        }
    }
}

/// Settings for the SSRF-safe webpage fetcher
#[derive(Debug, Deserialize, Clone)]
pub struct FetcherConfig {
    /// Request timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    /// Maximum response body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Maximum redirects to follow
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Character cap on extracted recipe text
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_body_bytes: default_max_body_bytes(),
            max_redirects: default_max_redirects(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

/// Retry attempt counts and backoff windows
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Attempts for extraction/refinement calls
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

// Default value functions
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_request_timeout() -> u64 {
    150
}

fn default_poll_interval() -> u64 {
    5
}

fn default_upload_deadline() -> u64 {
    600
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_redirects() -> usize {
    10
}

fn default_max_content_chars() -> usize {
    50_000
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with RECIPE__ prefix
    /// 2. config.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: RECIPE__GEMINI__API_KEY
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            // Optional config file (can be missing)
            .add_source(File::with_name("config").required(false))
            // Environment variables with RECIPE_ prefix
            // Use double underscore for nested: RECIPE__GEMINI__API_KEY
            .add_source(
                Environment::with_prefix("RECIPE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
