use thiserror::Error;

/// Errors that can occur during recipe extraction and conversion
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Request rejected before any network call was made
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failed to fetch a resource over HTTP
    #[error("Failed to fetch URL: {0}")]
    Fetch(#[from] reqwest::Error),

    /// URL refused by the SSRF guard
    #[error("Refusing to fetch {0}: resolves to a non-public address")]
    UnsafeUrl(String),

    /// Fetched resource did not declare an HTML content type
    #[error("Expected HTML content, got '{0}'")]
    NotHtml(String),

    /// Response body exceeded the configured size cap
    #[error("Response body exceeded {0} bytes")]
    BodyTooLarge(usize),

    /// Upstream API returned a non-success status
    #[error("API error ({status}): {message}")]
    ApiStatus { status: u16, message: String },

    /// A call exceeded its time budget
    #[error("Timed out during {0}")]
    Timeout(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// The model returned no candidates or no content
    #[error("Model returned an empty response")]
    EmptyResponse,

    /// Generation was stopped by the safety policy
    #[error("Content blocked by safety policy")]
    SafetyBlocked,

    /// Generation was stopped for reciting training material
    #[error("Content blocked for recitation")]
    RecitationBlocked,

    /// Generation hit the output token limit; the payload may be incomplete
    #[error("Response truncated at the output limit and may be incomplete")]
    Truncated,

    /// The model stopped for a reason this crate does not recognize
    #[error("Generation stopped unexpectedly: {0}")]
    UnexpectedFinish(String),

    /// The model judged the source not to be a recipe
    #[error("Source is not a recipe: {0}")]
    NotARecipe(String),

    /// Model output did not decode into the expected shape
    #[error("Failed to parse model output: {message} (excerpt: {excerpt})")]
    Parse { message: String, excerpt: String },

    /// Uploaded media ended in a failed processing state
    #[error("File processing failed: {0}")]
    FileProcessing(String),

    /// Reading a local media file failed
    #[error("Failed to read media file: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ExtractError {
    /// Whether a retry has any chance of succeeding.
    ///
    /// Rate limits, server errors, timeouts, and dropped connections are
    /// transient; everything else fails the call immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExtractError::ApiStatus { status, message } => {
                *status == 429
                    || (500..=599).contains(status)
                    || message.contains("RESOURCE_EXHAUSTED")
            }
            ExtractError::Timeout(_) => true,
            ExtractError::Fetch(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Whether the error signals a quota or rate limit.
    ///
    /// These get a shorter backoff window with a one second floor so a
    /// throttled endpoint is not hammered but recovery stays quick.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ExtractError::ApiStatus { status, message } => {
                *status == 429 || message.contains("RESOURCE_EXHAUSTED")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        let err = ExtractError::ApiStatus {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        assert!(err.is_retryable());
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_rate_limit_is_retryable_and_flagged() {
        let err = ExtractError::ApiStatus {
            status: 429,
            message: "Too Many Requests".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_resource_exhausted_message_is_rate_limited() {
        let err = ExtractError::ApiStatus {
            status: 400,
            message: "RESOURCE_EXHAUSTED: quota exceeded".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_validation_and_content_errors_are_terminal() {
        assert!(!ExtractError::InvalidRequest("bad language".into()).is_retryable());
        assert!(!ExtractError::SafetyBlocked.is_retryable());
        assert!(!ExtractError::NotARecipe("a travel vlog".into()).is_retryable());
        assert!(!ExtractError::Truncated.is_retryable());
    }
}
