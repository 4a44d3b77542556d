use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{AiError, Result};
use crate::schema::StructuredOutput;

/// One schema-constrained completion request. The schema drives the
/// provider's structured-output mechanism; the timeout is mandatory —
/// there is no untimed variant.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub response_schema: serde_json::Value,
    pub timeout: Duration,
}

/// Provider contract consumed by the strategy generator and the finding
/// evaluator. Object-safe: the raw JSON value crosses the boundary and
/// typed deserialization happens in [`extract`].
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete_value(&self, request: CompletionRequest) -> Result<serde_json::Value>;
}

/// Run a completion and deserialize into `T`. A response that does not
/// match the schema surfaces as `AiError::Schema` — the caller owns the
/// single stricter-prompt retry.
pub async fn extract<T>(
    provider: &dyn LlmProvider,
    system_prompt: impl Into<String>,
    user_prompt: impl Into<String>,
    timeout: Duration,
) -> Result<T>
where
    T: StructuredOutput + DeserializeOwned,
{
    let request = CompletionRequest {
        system_prompt: system_prompt.into(),
        user_prompt: user_prompt.into(),
        response_schema: T::response_schema(),
        timeout,
    };

    let value = provider.complete_value(request).await?;
    serde_json::from_value(value).map_err(|e| AiError::Schema(e.to_string()))
}
