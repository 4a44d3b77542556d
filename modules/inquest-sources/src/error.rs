use thiserror::Error;

pub type Result<T> = std::result::Result<T, SourceError>;

/// Uniform error classes across every source client, so the orchestrator
/// can decide retry (rate limit, transient) vs disable-for-session
/// (permanent, e.g. bad credentials) without knowing the source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("permanent error: {0}")]
    Permanent(String),
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::RateLimited(_) | SourceError::Transient(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            SourceError::Transient(err.to_string())
        } else if err.is_decode() {
            SourceError::Transient(format!("response parse failed: {err}"))
        } else {
            SourceError::Permanent(err.to_string())
        }
    }
}
