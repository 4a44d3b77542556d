use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use ai_client::util::truncate_to_char_boundary;
use ai_client::{AiError, LlmProvider};
use inquest_common::{InvestigationConfig, RawResult, ResultAssessment};

use crate::llm::extract_with_retry;

pub const EVALUATOR_SYSTEM: &str = "\
You are the finding evaluator for an OSINT investigation. \
Judge each search result ON ITS OWN against the investigation goal — the \
other results in the batch must not influence a result's classification. \
A result is significant only if it contains a concrete, checkable fact \
that advances the goal: a name, a date, a contract number, a location, a \
documented relationship. Score relevance and specificity 0-10. Extract \
named entities. If a result raises a genuinely new question the \
investigation should pursue, record it in emergent_question.";

/// Max bytes of result text included per item in the evaluation prompt.
const RESULT_TEXT_CAP: usize = 1500;

// --- LLM structured output types ---

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BatchAssessment {
    pub assessments: Vec<AssessmentWire>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AssessmentWire {
    /// Zero-based index of the result this assessment judges.
    pub index: usize,
    pub is_significant: bool,
    pub relevance_score: u8,
    pub specificity_score: u8,
    pub extracted_entities: Vec<String>,
    pub reasoning: String,
    pub emergent_question: Option<String>,
}

pub struct FindingEvaluator {
    llm: Arc<dyn LlmProvider>,
    config: InvestigationConfig,
}

impl FindingEvaluator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: InvestigationConfig) -> Self {
        Self { llm, config }
    }

    /// Evaluate one search's raw results against the goal. Returns one
    /// assessment per evaluated result, aligned with batch order; results
    /// past the batch cap are dropped unevaluated. Errors here fail only
    /// this batch — the caller keeps findings already accumulated from
    /// other batches.
    pub async fn evaluate(
        &self,
        goal: &str,
        results: &[RawResult],
    ) -> Result<Vec<ResultAssessment>, AiError> {
        let batch: Vec<&RawResult> = results
            .iter()
            .take(self.config.max_results_per_batch)
            .collect();
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let user_prompt = build_prompt(goal, &batch);

        let wire: BatchAssessment = extract_with_retry(
            self.llm.as_ref(),
            EVALUATOR_SYSTEM,
            &user_prompt,
            self.config.llm_timeout,
        )
        .await?;

        Ok(normalize(wire, batch.len()))
    }
}

fn build_prompt(goal: &str, batch: &[&RawResult]) -> String {
    let mut prompt = format!(
        "Investigation goal: {}\n\nJudge each result independently. Return one assessment per result, keyed by index.\n",
        goal,
    );
    for (i, result) in batch.iter().enumerate() {
        prompt.push_str(&format!(
            "\n--- Result {} ---\nTitle: {}\nURL: {}\nText: {}\n",
            i,
            result.title,
            result.url.as_deref().unwrap_or("(none)"),
            truncate_to_char_boundary(&result.text, RESULT_TEXT_CAP),
        ));
    }
    prompt
}

/// Align assessments with the batch: clamp scores to 0-10, drop
/// out-of-range or duplicate indices, and treat results the model skipped
/// as not significant rather than losing them.
fn normalize(wire: BatchAssessment, batch_len: usize) -> Vec<ResultAssessment> {
    let mut by_index: Vec<Option<ResultAssessment>> = (0..batch_len).map(|_| None).collect();

    for a in wire.assessments {
        if a.index >= batch_len {
            warn!(index = a.index, batch_len, "Assessment index out of range, dropping");
            continue;
        }
        if by_index[a.index].is_some() {
            continue;
        }
        by_index[a.index] = Some(ResultAssessment {
            index: a.index,
            is_significant: a.is_significant,
            relevance_score: a.relevance_score.min(10),
            specificity_score: a.specificity_score.min(10),
            extracted_entities: a.extracted_entities,
            reasoning: a.reasoning,
            emergent_question: a.emergent_question,
        });
    }

    by_index
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.unwrap_or(ResultAssessment {
                index: i,
                is_significant: false,
                relevance_score: 0,
                specificity_score: 0,
                extracted_entities: Vec::new(),
                reasoning: "not assessed by evaluator".to_string(),
                emergent_question: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assessment, MockLlm};

    fn result(title: &str) -> RawResult {
        RawResult {
            title: title.to_string(),
            text: format!("{title} body"),
            url: Some("https://example.com".to_string()),
            published_at: None,
        }
    }

    fn evaluator(llm: MockLlm) -> FindingEvaluator {
        FindingEvaluator::new(Arc::new(llm), InvestigationConfig::default())
    }

    #[tokio::test]
    async fn evaluation_is_idempotent_for_same_result() {
        // Deterministic stub: same single result, same response, twice.
        let response = serde_json::json!({ "assessments": [assessment(0, true, 8)] });
        let llm = MockLlm::new()
            .on_evaluation(Ok(response.clone()))
            .on_evaluation(Ok(response));
        let evaluator = evaluator(llm);
        let results = vec![result("contract award W912DY")];

        let first = evaluator.evaluate("goal", &results).await.unwrap();
        let second = evaluator.evaluate("goal", &results).await.unwrap();
        assert_eq!(first[0].is_significant, second[0].is_significant);
        assert_eq!(first[0].relevance_score, second[0].relevance_score);
    }

    #[tokio::test]
    async fn skipped_results_become_insignificant_not_lost() {
        let llm = MockLlm::new().on_evaluation(Ok(serde_json::json!({
            "assessments": [assessment(2, true, 9)],
        })));
        let evaluator = evaluator(llm);
        let results = vec![result("a"), result("b"), result("c")];

        let assessments = evaluator.evaluate("goal", &results).await.unwrap();
        assert_eq!(assessments.len(), 3);
        assert!(!assessments[0].is_significant);
        assert!(!assessments[1].is_significant);
        assert!(assessments[2].is_significant);
    }

    #[tokio::test]
    async fn out_of_range_index_dropped_and_scores_clamped() {
        let mut high = assessment(0, true, 9);
        high["relevance_score"] = serde_json::json!(99);
        let llm = MockLlm::new().on_evaluation(Ok(serde_json::json!({
            "assessments": [high, assessment(7, true, 9)],
        })));
        let evaluator = evaluator(llm);
        let results = vec![result("a")];

        let assessments = evaluator.evaluate("goal", &results).await.unwrap();
        assert_eq!(assessments.len(), 1);
        assert_eq!(assessments[0].relevance_score, 10);
    }

    #[tokio::test]
    async fn batch_cap_limits_evaluated_results() {
        let llm = MockLlm::new()
            .on_evaluation(Ok(serde_json::json!({ "assessments": [] })));
        let config = InvestigationConfig::builder().max_results_per_batch(2).build();
        let evaluator = FindingEvaluator::new(Arc::new(llm), config);
        let results: Vec<RawResult> = (0..5).map(|i| result(&format!("r{i}"))).collect();

        let assessments = evaluator.evaluate("goal", &results).await.unwrap();
        assert_eq!(assessments.len(), 2);
    }

    #[tokio::test]
    async fn llm_failure_fails_the_batch() {
        let llm = MockLlm::new()
            .on_evaluation(Err(AiError::Permanent("invalid model".into())));
        let evaluator = evaluator(llm);
        let results = vec![result("a")];

        assert!(evaluator.evaluate("goal", &results).await.is_err());
    }
}
