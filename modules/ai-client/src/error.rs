use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

/// Provider errors, classified so callers can decide retry vs skip vs abort.
/// Timeouts are `Transient` — a hung completion must never hang the caller.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("permanent provider error: {0}")]
    Permanent(String),

    #[error("schema validation failed: {0}")]
    Schema(String),
}

impl AiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AiError::RateLimited(_) | AiError::Transient(_))
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            AiError::Transient(err.to_string())
        } else {
            AiError::Permanent(err.to_string())
        }
    }
}
