use std::time::Duration;

use tracing::warn;

use ai_client::{extract, AiError, LlmProvider, StructuredOutput};

use crate::backoff::{sleep_before_retry, MAX_ATTEMPTS};

const STRICT_RETRY_SUFFIX: &str = "\
Your previous response did not match the required schema. \
Respond with values for EVERY required field, exactly as typed in the schema. \
Do not add fields, do not omit fields, do not nest JSON inside strings.";

/// One LLM decision point: schema failures get exactly one stricter-prompt
/// retry; rate limits and transient failures get bounded backoff retries;
/// permanent errors fail immediately. Anything still failing after that is
/// the caller's fallback to handle.
pub(crate) async fn extract_with_retry<T: StructuredOutput>(
    llm: &dyn LlmProvider,
    system_prompt: &str,
    user_prompt: &str,
    timeout: Duration,
) -> Result<T, AiError> {
    let mut schema_retried = false;
    let mut transient_attempts = 0;
    let mut system = system_prompt.to_string();

    loop {
        match extract::<T>(llm, &system, user_prompt, timeout).await {
            Ok(value) => return Ok(value),
            Err(AiError::Schema(e)) if !schema_retried => {
                warn!(error = %e, "LLM response failed schema validation, retrying with stricter prompt");
                schema_retried = true;
                system = format!("{system_prompt}\n\n{STRICT_RETRY_SUFFIX}");
            }
            Err(e) if e.is_retryable() && transient_attempts + 1 < MAX_ATTEMPTS => {
                warn!(error = %e, attempt = transient_attempts + 1, "LLM call failed, backing off");
                sleep_before_retry(transient_attempts).await;
                transient_attempts += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
