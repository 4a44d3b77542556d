use std::collections::HashMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::LlmProvider;
use inquest_common::{
    InvestigationConfig, NodeId, RejectionFeedback, SearchParams, SearchSpec,
};
use inquest_sources::EndpointCatalog;

use crate::ledger::RoundLedger;
use crate::llm::extract_with_retry;

pub const STRATEGY_SYSTEM: &str = "\
You are the search strategist for an OSINT investigation. \
Given the investigation goal, the endpoints available, and what previous \
rounds found or failed to find, propose the next batch of searches. \
Prefer endpoints that have not been tried; never repeat a query that \
already ran. Construct specific queries — named entities, dates, document \
types — not restatements of the goal. If the accumulated findings leave \
nothing worth searching for, propose zero searches.";

// --- LLM structured output types ---

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ProposedPlan {
    pub searches: Vec<ProposedSearch>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ProposedSearch {
    /// Must name a cataloged endpoint.
    pub endpoint: String,
    pub query: String,
    pub rationale: String,
    /// Extra endpoint-specific parameters beyond the query.
    pub parameters: Option<SearchParams>,
    /// Index into the open-questions list this search pursues, if any.
    pub motivated_by: Option<usize>,
    /// Only set when knowingly repeating an over-used endpoint because no
    /// alternative can satisfy the rationale.
    pub repeat_justification: Option<String>,
}

// --- Context and outcome ---

/// Read-only state the generator plans against.
pub struct StrategyContext<'a> {
    pub goal: &'a str,
    pub round: u32,
    pub catalog: &'a EndpointCatalog,
    pub ledger: &'a RoundLedger,
    pub feedback: Option<&'a RejectionFeedback>,
    /// Open EmergentQuestions, in graph insertion order.
    pub open_questions: &'a [(NodeId, String)],
    /// Search slots left in the session budget.
    pub budget_remaining: u32,
}

#[derive(Debug, Default)]
pub struct PlanOutcome {
    pub specs: Vec<SearchSpec>,
    pub dropped_unknown: u32,
    pub dropped_repeats: u32,
    pub used_fallback: bool,
}

pub struct StrategyGenerator {
    llm: Arc<dyn LlmProvider>,
    config: InvestigationConfig,
}

impl StrategyGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: InvestigationConfig) -> Self {
        Self { llm, config }
    }

    /// Propose the next round's searches. Never errors: an unusable LLM
    /// response degrades to a single generic search on the default
    /// endpoint, and an empty catalog yields an empty plan.
    pub async fn generate(&self, ctx: &StrategyContext<'_>) -> PlanOutcome {
        if ctx.catalog.is_empty() || ctx.budget_remaining == 0 {
            return PlanOutcome::default();
        }

        let user_prompt = self.build_prompt(ctx);

        let plan: ProposedPlan = match extract_with_retry(
            self.llm.as_ref(),
            STRATEGY_SYSTEM,
            &user_prompt,
            self.config.llm_timeout,
        )
        .await
        {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Strategy generation failed, falling back to generic search");
                return self.fallback(ctx);
            }
        };

        if plan.searches.is_empty() {
            info!(round = ctx.round, "Strategy proposed zero searches");
            return PlanOutcome::default();
        }

        self.filter(plan, ctx)
    }

    /// Enforce catalog membership, the per-round cap, the session search
    /// budget, and endpoint diversity.
    fn filter(&self, plan: ProposedPlan, ctx: &StrategyContext<'_>) -> PlanOutcome {
        let mut outcome = PlanOutcome::default();
        // Usage the accepted portion of this plan would add on top of the
        // session history.
        let mut pending: HashMap<String, u32> = HashMap::new();

        let cap = self
            .config
            .max_searches_per_round
            .min(ctx.budget_remaining as usize);

        for proposal in plan.searches {
            if outcome.specs.len() >= cap {
                break;
            }

            if !ctx.catalog.contains(&proposal.endpoint) {
                warn!(endpoint = proposal.endpoint.as_str(), "Proposed search names unknown endpoint, dropping");
                outcome.dropped_unknown += 1;
                continue;
            }

            let used = ctx.ledger.usage(&proposal.endpoint)
                + pending.get(proposal.endpoint.as_str()).copied().unwrap_or(0);

            if used >= self.config.max_endpoint_repeats {
                let justified = self.config.allow_diversity_exceptions
                    && proposal.repeat_justification.is_some();
                let alternative_exists = ctx.catalog.names().any(|name| {
                    name != proposal.endpoint
                        && ctx.ledger.usage(name) + pending.get(name).copied().unwrap_or(0)
                            < self.config.max_endpoint_repeats
                });

                if !justified && alternative_exists {
                    warn!(
                        endpoint = proposal.endpoint.as_str(),
                        used, "Endpoint over repeat limit with alternatives available, dropping"
                    );
                    outcome.dropped_repeats += 1;
                    continue;
                }
                if justified {
                    info!(
                        endpoint = proposal.endpoint.as_str(),
                        justification = proposal.repeat_justification.as_deref().unwrap_or(""),
                        "Accepting justified endpoint repeat"
                    );
                }
                // No alternative endpoint can satisfy the rationale — accept.
            }

            let motivated_by = proposal
                .motivated_by
                .and_then(|i| ctx.open_questions.get(i))
                .map(|(id, _)| *id);

            let mut parameters = proposal.parameters.unwrap_or_default();
            parameters = parameters.with("query", proposal.query.clone());

            *pending.entry(proposal.endpoint.clone()).or_insert(0) += 1;
            outcome.specs.push(SearchSpec {
                endpoint: proposal.endpoint,
                query: proposal.query,
                parameters,
                rationale: proposal.rationale,
                motivated_by,
            });
        }

        outcome
    }

    /// Last resort when the LLM cannot produce a parseable plan: one
    /// generic search for the goal itself on the default endpoint.
    fn fallback(&self, ctx: &StrategyContext<'_>) -> PlanOutcome {
        let endpoint = if ctx.catalog.contains(&self.config.default_endpoint) {
            self.config.default_endpoint.clone()
        } else {
            match ctx.catalog.names().next() {
                Some(name) => name.to_string(),
                None => return PlanOutcome::default(),
            }
        };

        PlanOutcome {
            specs: vec![SearchSpec {
                endpoint,
                query: ctx.goal.to_string(),
                parameters: SearchParams::new().with("query", ctx.goal),
                rationale: "fallback: direct search on the investigation goal".to_string(),
                motivated_by: None,
            }],
            used_fallback: true,
            ..PlanOutcome::default()
        }
    }

    fn build_prompt(&self, ctx: &StrategyContext<'_>) -> String {
        let mut prompt = format!(
            "Investigation goal: {}\n\nRound: {}\nSearch budget remaining: {}\nPropose at most {} searches.\n\n{}",
            ctx.goal,
            ctx.round,
            ctx.budget_remaining,
            self.config
                .max_searches_per_round
                .min(ctx.budget_remaining as usize),
            ctx.catalog.prompt_context(),
        );

        prompt.push_str("\nEndpoint usage so far (limit ");
        prompt.push_str(&self.config.max_endpoint_repeats.to_string());
        prompt.push_str(" each):\n");
        for name in ctx.catalog.names() {
            prompt.push_str(&format!("- {}: {}\n", name, ctx.ledger.usage(name)));
        }

        if !ctx.ledger.rounds().is_empty() {
            prompt.push_str("\nPrevious rounds:\n");
            for record in ctx.ledger.rounds() {
                prompt.push_str(&format!(
                    "- round {}: {} searches, {} findings, effectiveness {:.2}\n",
                    record.round,
                    record.searches_issued,
                    record.datapoints_created,
                    record.effectiveness,
                ));
            }
        }

        if let Some(feedback) = ctx.feedback {
            if feedback.evaluated > 0 {
                prompt.push_str(&format!(
                    "\nLast round the evaluator rejected {} of {} results ({:.0}%).\n",
                    feedback.rejected,
                    feedback.evaluated,
                    feedback.rejected_fraction() * 100.0,
                ));
                if !feedback.themes.is_empty() {
                    prompt.push_str("Common rejection reasons — construct queries that avoid these failure modes:\n");
                    for theme in feedback.themes.iter().take(5) {
                        prompt.push_str(&format!("- {theme}\n"));
                    }
                }
            }
        }

        if !ctx.open_questions.is_empty() {
            prompt.push_str(
                "\nOpen questions raised by earlier findings (reference by index in motivated_by):\n",
            );
            for (i, (_, content)) in ctx.open_questions.iter().enumerate() {
                prompt.push_str(&format!("{i}. {content}\n"));
            }
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;
    use inquest_sources::EndpointCatalog;

    fn context<'a>(
        catalog: &'a EndpointCatalog,
        ledger: &'a RoundLedger,
    ) -> StrategyContext<'a> {
        StrategyContext {
            goal: "map contractor presence at the facility",
            round: 1,
            catalog,
            ledger,
            feedback: None,
            open_questions: &[],
            budget_remaining: 20,
        }
    }

    fn proposal(endpoint: &str, query: &str) -> serde_json::Value {
        serde_json::json!({
            "endpoint": endpoint,
            "query": query,
            "rationale": "test",
            "parameters": null,
            "motivated_by": null,
            "repeat_justification": null,
        })
    }

    #[tokio::test]
    async fn unknown_endpoint_dropped_not_fatal() {
        let llm = MockLlm::new().on_strategy(Ok(serde_json::json!({
            "searches": [proposal("myspace", "a"), proposal("brave_search", "b")],
        })));
        let generator = StrategyGenerator::new(
            Arc::new(llm),
            InvestigationConfig::default(),
        );
        let catalog = EndpointCatalog::builtin();
        let ledger = RoundLedger::new();

        let outcome = generator.generate(&context(&catalog, &ledger)).await;
        assert_eq!(outcome.specs.len(), 1);
        assert_eq!(outcome.specs[0].endpoint, "brave_search");
        assert_eq!(outcome.dropped_unknown, 1);
    }

    #[tokio::test]
    async fn repeats_declined_while_alternative_exists() {
        // 10 proposals, 7 against one endpoint. With max_endpoint_repeats=3
        // and alternatives available, repeats 4+ must be declined.
        let mut searches = Vec::new();
        for i in 0..7 {
            searches.push(proposal("brave_search", &format!("q{i}")));
        }
        for i in 0..3 {
            searches.push(proposal("reddit", &format!("r{i}")));
        }

        let llm = MockLlm::new()
            .on_strategy(Ok(serde_json::json!({ "searches": searches })));
        let config = InvestigationConfig::builder()
            .max_endpoint_repeats(3)
            .max_searches_per_round(10)
            .build();
        let generator = StrategyGenerator::new(Arc::new(llm), config);
        let catalog = EndpointCatalog::builtin();
        let ledger = RoundLedger::new();

        let outcome = generator.generate(&context(&catalog, &ledger)).await;
        let brave_count = outcome
            .specs
            .iter()
            .filter(|s| s.endpoint == "brave_search")
            .count();
        assert_eq!(brave_count, 3);
        assert_eq!(outcome.dropped_repeats, 4);
        assert_eq!(outcome.specs.len(), 6);
    }

    #[tokio::test]
    async fn justified_repeat_accepted_only_with_flag() {
        let over_limit = serde_json::json!({
            "endpoint": "brave_search",
            "query": "q",
            "rationale": "only web search can confirm this",
            "parameters": null,
            "motivated_by": null,
            "repeat_justification": "corroboration requires independent web reporting",
        });

        let mut ledger = RoundLedger::new();
        for _ in 0..3 {
            ledger.note_search("brave_search");
        }
        let catalog = EndpointCatalog::builtin();

        // Flag off: declined.
        let llm = MockLlm::new()
            .on_strategy(Ok(serde_json::json!({ "searches": [over_limit.clone()] })));
        let generator =
            StrategyGenerator::new(Arc::new(llm), InvestigationConfig::default());
        let outcome = generator.generate(&context(&catalog, &ledger)).await;
        assert!(outcome.specs.is_empty());
        assert_eq!(outcome.dropped_repeats, 1);

        // Flag on: accepted.
        let llm = MockLlm::new()
            .on_strategy(Ok(serde_json::json!({ "searches": [over_limit] })));
        let config = InvestigationConfig::builder()
            .allow_diversity_exceptions(true)
            .build();
        let generator = StrategyGenerator::new(Arc::new(llm), config);
        let outcome = generator.generate(&context(&catalog, &ledger)).await;
        assert_eq!(outcome.specs.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_plan_falls_back_to_generic_search() {
        // Both the first attempt and the stricter retry return garbage.
        let llm = MockLlm::new()
            .on_strategy(Ok(serde_json::json!({ "nonsense": true })))
            .on_strategy(Ok(serde_json::json!({ "still": "wrong" })));
        let generator =
            StrategyGenerator::new(Arc::new(llm), InvestigationConfig::default());
        let catalog = EndpointCatalog::builtin();
        let ledger = RoundLedger::new();

        let outcome = generator.generate(&context(&catalog, &ledger)).await;
        assert!(outcome.used_fallback);
        assert_eq!(outcome.specs.len(), 1);
        assert_eq!(outcome.specs[0].endpoint, "brave_search");
        assert_eq!(outcome.specs[0].query, "map contractor presence at the facility");
    }

    #[tokio::test]
    async fn empty_plan_is_not_a_fallback() {
        let llm = MockLlm::new()
            .on_strategy(Ok(serde_json::json!({ "searches": [] })));
        let generator =
            StrategyGenerator::new(Arc::new(llm), InvestigationConfig::default());
        let catalog = EndpointCatalog::builtin();
        let ledger = RoundLedger::new();

        let outcome = generator.generate(&context(&catalog, &ledger)).await;
        assert!(outcome.specs.is_empty());
        assert!(!outcome.used_fallback);
    }
}
