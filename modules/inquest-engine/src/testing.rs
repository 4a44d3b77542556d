//! Deterministic doubles for engine tests: an LLM that replays scripted
//! structured responses and a source client with scripted outcomes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use ai_client::{AiError, CompletionRequest, LlmProvider};
use inquest_common::{RawResult, SearchParams};
use inquest_sources::{SourceClient, SourceError};

use crate::evaluator::EVALUATOR_SYSTEM;
use crate::strategy::STRATEGY_SYSTEM;
use crate::synthesis::SYNTHESIS_SYSTEM;

type Scripted = Mutex<VecDeque<Result<Value, AiError>>>;

/// Scripted LLM. Calls are routed to a queue by which stage's system prompt
/// they carry; an exhausted queue yields that stage's empty plan, so a test
/// only scripts the rounds it cares about.
#[derive(Default)]
pub struct MockLlm {
    strategy: Scripted,
    evaluation: Scripted,
    synthesis: Scripted,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_strategy(self, response: Result<Value, AiError>) -> Self {
        self.strategy.lock().unwrap().push_back(response);
        self
    }

    pub fn on_evaluation(self, response: Result<Value, AiError>) -> Self {
        self.evaluation.lock().unwrap().push_back(response);
        self
    }

    pub fn on_synthesis(self, response: Result<Value, AiError>) -> Self {
        self.synthesis.lock().unwrap().push_back(response);
        self
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn complete_value(&self, request: CompletionRequest) -> Result<Value, AiError> {
        let (queue, empty) = if request.system_prompt.starts_with(STRATEGY_SYSTEM) {
            (&self.strategy, serde_json::json!({ "searches": [] }))
        } else if request.system_prompt.starts_with(EVALUATOR_SYSTEM) {
            (&self.evaluation, serde_json::json!({ "assessments": [] }))
        } else if request.system_prompt.starts_with(SYNTHESIS_SYSTEM) {
            (&self.synthesis, serde_json::json!({ "insights": [] }))
        } else {
            return Err(AiError::Permanent(format!(
                "unrecognized system prompt: {}",
                request.system_prompt
            )));
        };

        queue.lock().unwrap().pop_front().unwrap_or(Ok(empty))
    }
}

/// Fully-populated assessment JSON for one result index.
pub fn assessment(index: usize, is_significant: bool, score: u8) -> Value {
    serde_json::json!({
        "index": index,
        "is_significant": is_significant,
        "relevance_score": score,
        "specificity_score": score,
        "extracted_entities": ["Example Corp"],
        "reasoning": if is_significant {
            "names a concrete, checkable fact"
        } else {
            "restates the goal without new information"
        },
        "emergent_question": null,
    })
}

pub fn raw_result(title: &str) -> RawResult {
    RawResult {
        title: title.to_string(),
        text: format!("{title} full text"),
        url: Some(format!("https://example.com/{}", title.replace(' ', "-"))),
        published_at: None,
    }
}

#[derive(Debug, Clone)]
pub enum SourceBehavior {
    Results(Vec<RawResult>),
    RateLimited,
    Transient,
    Permanent,
}

/// Scripted source client. One-shot behaviors queued with [`respond`] are
/// consumed first; after that every call gets the default behavior. Counts
/// calls so tests can assert retry and disable semantics.
///
/// [`respond`]: MockSource::respond
pub struct MockSource {
    endpoint: &'static str,
    queued: Mutex<VecDeque<SourceBehavior>>,
    default: SourceBehavior,
    calls: AtomicU32,
}

impl MockSource {
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            queued: Mutex::new(VecDeque::new()),
            default: SourceBehavior::Results(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Set the behavior used once the queue is empty.
    pub fn with_default(mut self, behavior: SourceBehavior) -> Self {
        self.default = behavior;
        self
    }

    /// Queue a one-shot behavior for the next call.
    pub fn respond(self, behavior: SourceBehavior) -> Self {
        self.queued.lock().unwrap().push_back(behavior);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for MockSource {
    fn endpoint(&self) -> &str {
        self.endpoint
    }

    async fn search(
        &self,
        _params: &SearchParams,
        _timeout: Duration,
    ) -> Result<Vec<RawResult>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        match behavior {
            SourceBehavior::Results(results) => Ok(results),
            SourceBehavior::RateLimited => Err(SourceError::RateLimited("scripted".into())),
            SourceBehavior::Transient => Err(SourceError::Transient("scripted".into())),
            SourceBehavior::Permanent => Err(SourceError::Permanent("scripted".into())),
        }
    }
}
