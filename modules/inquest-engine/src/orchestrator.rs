//! The round loop. Each round moves through planning, execution,
//! evaluation, and a continue/stop decision; the graph and the round
//! ledger accumulate across rounds and stay readable after the session
//! ends, however it ends.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{stream, StreamExt};
use tracing::{info, warn};

use ai_client::util::truncate_to_char_boundary;
use ai_client::LlmProvider;
use inquest_common::{
    AttemptOutcome, EdgeType, InquestError, InvestigationConfig, NodeId, NodePayload, NodeType,
    RawResult, RejectionFeedback, SearchAttempt, SearchSpec,
};
use inquest_graph::{GraphExport, InvestigationGraph};
use inquest_sources::{SourceClient, SourceError, SourceRegistry};

use crate::backoff;
use crate::evaluator::FindingEvaluator;
use crate::ledger::{RoundLedger, RoundRecord};
use crate::policy::{self, Verdict, REASON_NO_STRATEGY};
use crate::strategy::{StrategyContext, StrategyGenerator};
use crate::synthesis::InsightSynthesizer;

/// Bytes of raw result text carried into a DataPoint's content.
const DATAPOINT_TEXT_CAP: usize = 400;

#[derive(Debug, Default, Clone)]
pub struct InvestigationStats {
    pub rounds: u32,
    pub searches_executed: u32,
    pub searches_failed: u32,
    pub results_fetched: u32,
    pub results_evaluated: u32,
    pub datapoints_created: u32,
    pub insights_created: u32,
    pub questions_created: u32,
    pub endpoints_disabled: u32,
    pub fallback_plans: u32,
}

impl fmt::Display for InvestigationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rounds, {} searches ({} failed), {} results fetched, {} evaluated, {} datapoints, {} insights, {} emergent questions",
            self.rounds,
            self.searches_executed,
            self.searches_failed,
            self.results_fetched,
            self.results_evaluated,
            self.datapoints_created,
            self.insights_created,
            self.questions_created,
        )
    }
}

/// One investigation session: owns the graph, the ledger, and the
/// per-session endpoint state. Not reusable across goals.
pub struct Orchestrator {
    goal: String,
    config: InvestigationConfig,
    registry: SourceRegistry,
    strategy: StrategyGenerator,
    evaluator: FindingEvaluator,
    synthesizer: InsightSynthesizer,
    graph: InvestigationGraph,
    ledger: RoundLedger,
    /// Endpoints that returned a permanent error, off limits for the rest
    /// of the session.
    disabled: HashSet<String>,
    feedback: Option<RejectionFeedback>,
    stats: InvestigationStats,
}

impl Orchestrator {
    pub fn new(
        goal: impl Into<String>,
        config: InvestigationConfig,
        llm: Arc<dyn LlmProvider>,
        registry: SourceRegistry,
    ) -> Self {
        let goal = goal.into();
        Self {
            graph: InvestigationGraph::new(goal.clone()),
            strategy: StrategyGenerator::new(llm.clone(), config.clone()),
            evaluator: FindingEvaluator::new(llm.clone(), config.clone()),
            synthesizer: InsightSynthesizer::new(llm, config.clone()),
            goal,
            config,
            registry,
            ledger: RoundLedger::new(),
            disabled: HashSet::new(),
            feedback: None,
            stats: InvestigationStats::default(),
        }
    }

    /// Run rounds until a stop condition fires. Returns the stop reason on
    /// a normal end; errors only on conditions that invalidate the session
    /// (no progress, a violated post-condition, a broken graph invariant).
    /// The graph and stats stay readable either way.
    pub async fn run(&mut self) -> Result<String, InquestError> {
        let start = Instant::now();
        info!(goal = self.goal.as_str(), "Starting investigation");
        let mut round: u32 = 0;

        loop {
            let verdict = policy::decide(
                self.ledger.total_searches(),
                self.ledger.total_datapoints(),
                start.elapsed(),
                &self.config,
            );
            if let Verdict::Stop(reason) = verdict {
                info!(reason, stats = %self.stats, "Investigation complete");
                return Ok(reason.to_string());
            }

            round += 1;
            self.stats.rounds = round;

            let planned = match self.plan_round(round).await? {
                Some(planned) => planned,
                None => {
                    info!(round, stats = %self.stats, "Investigation complete");
                    return Ok(REASON_NO_STRATEGY.to_string());
                }
            };

            let attempts = self.execute_round(planned).await;
            self.finish_round(round, attempts).await?;
        }
    }

    // --- Planning ---

    /// Generate and admit this round's searches, writing a Search node and
    /// its provenance edges for each. `None` means the strategist sees
    /// nothing left worth searching.
    async fn plan_round(
        &mut self,
        round: u32,
    ) -> Result<Option<Vec<(Arc<dyn SourceClient>, NodeId, SearchSpec)>>, InquestError> {
        let catalog = self.registry.catalog().without(&self.disabled);
        let open_questions = self.open_questions();
        let budget_remaining = self
            .config
            .max_searches
            .saturating_sub(self.ledger.total_searches());

        let outcome = self
            .strategy
            .generate(&StrategyContext {
                goal: &self.goal,
                round,
                catalog: &catalog,
                ledger: &self.ledger,
                feedback: self.feedback.as_ref(),
                open_questions: &open_questions,
                budget_remaining,
            })
            .await;

        if outcome.used_fallback {
            self.stats.fallback_plans += 1;
        }
        if outcome.specs.is_empty() {
            return Ok(None);
        }

        let mut planned = Vec::with_capacity(outcome.specs.len());
        for spec in outcome.specs {
            let Some(client) = self.registry.get(&spec.endpoint) else {
                warn!(endpoint = spec.endpoint.as_str(), "Accepted search has no registered client, dropping");
                continue;
            };

            let search_node = self
                .graph
                .create_node(
                    NodePayload::Search {
                        endpoint: spec.endpoint.clone(),
                        query: spec.query.clone(),
                        parameters: spec.parameters.clone(),
                        rationale: spec.rationale.clone(),
                    },
                    round,
                )
                .map_err(graph_err)?;
            self.graph
                .create_edge(self.graph.root(), search_node, EdgeType::Generates)
                .map_err(graph_err)?;
            if let Some(question) = spec.motivated_by {
                self.graph
                    .create_edge(question, search_node, EdgeType::LeadsTo)
                    .map_err(graph_err)?;
            }

            self.ledger.note_search(&spec.endpoint);
            planned.push((client, search_node, spec));
        }

        if planned.is_empty() {
            return Ok(None);
        }
        Ok(Some(planned))
    }

    /// EmergentQuestions no search has pursued yet, in insertion order.
    fn open_questions(&self) -> Vec<(NodeId, String)> {
        let pursued: HashSet<NodeId> = self
            .graph
            .edges()
            .iter()
            .filter(|e| e.edge_type == EdgeType::LeadsTo)
            .map(|e| e.source)
            .collect();

        self.graph
            .nodes_of_type(NodeType::EmergentQuestion)
            .filter(|n| !pursued.contains(&n.id))
            .map(|n| (n.id, n.payload.content().to_string()))
            .collect()
    }

    // --- Execution ---

    /// Fan the round's searches out with bounded concurrency. Every planned
    /// search comes back as an attempt; failures are recorded, never lost.
    async fn execute_round(
        &mut self,
        planned: Vec<(Arc<dyn SourceClient>, NodeId, SearchSpec)>,
    ) -> Vec<SearchAttempt> {
        let timeout = self.config.search_timeout;
        let attempts: Vec<SearchAttempt> = stream::iter(planned)
            .map(|(client, search_node, spec)| async move {
                execute_one(client, search_node, spec, timeout).await
            })
            .buffer_unordered(self.config.max_concurrent)
            .collect()
            .await;

        self.stats.searches_executed += attempts.len() as u32;
        attempts
    }

    // --- Evaluation and decision ---

    async fn finish_round(
        &mut self,
        round: u32,
        mut attempts: Vec<SearchAttempt>,
    ) -> Result<(), InquestError> {
        let mut evaluated: u32 = 0;
        let mut rejected: u32 = 0;
        let mut created: u32 = 0;
        let mut themes: Vec<String> = Vec::new();

        for attempt in &mut attempts {
            self.stats.results_fetched += attempt.results.len() as u32;

            if !attempt.outcome.is_success() {
                self.stats.searches_failed += 1;
                if let AttemptOutcome::PermanentFailure(reason) = &attempt.outcome {
                    warn!(
                        endpoint = attempt.endpoint.as_str(),
                        reason = reason.as_str(),
                        "Permanent source error, disabling endpoint for this session"
                    );
                    if self.disabled.insert(attempt.endpoint.clone()) {
                        self.stats.endpoints_disabled += 1;
                    }
                }
                continue;
            }
            if attempt.results.is_empty() {
                continue;
            }

            let assessments = match self.evaluator.evaluate(&self.goal, &attempt.results).await {
                Ok(assessments) => assessments,
                Err(e) => {
                    // Only this batch is lost; earlier batches stand.
                    warn!(
                        endpoint = attempt.endpoint.as_str(),
                        error = %e,
                        "Evaluation failed for this batch, skipping"
                    );
                    continue;
                }
            };

            evaluated += assessments.len() as u32;
            let significant = assessments.iter().filter(|a| a.is_significant).count() as u32;
            let mut created_here: u32 = 0;

            for assessment in &assessments {
                if let Some(question) = &assessment.emergent_question {
                    let question_node = self
                        .graph
                        .create_node(
                            NodePayload::EmergentQuestion {
                                content: question.clone(),
                            },
                            round,
                        )
                        .map_err(graph_err)?;
                    self.graph
                        .create_edge(attempt.search_node, question_node, EdgeType::Discovered)
                        .map_err(graph_err)?;
                    self.stats.questions_created += 1;
                }

                if !assessment.is_significant {
                    rejected += 1;
                    if !assessment.reasoning.is_empty() {
                        themes.push(assessment.reasoning.clone());
                    }
                    continue;
                }

                let result = &attempt.results[assessment.index];
                let datapoint = self
                    .graph
                    .create_node(
                        NodePayload::DataPoint {
                            content: datapoint_content(result),
                            source_url: result.url.clone(),
                            relevance_score: assessment.relevance_score,
                            specificity_score: assessment.specificity_score,
                            entities: assessment.extracted_entities.clone(),
                        },
                        round,
                    )
                    .map_err(graph_err)?;
                self.graph
                    .create_edge(attempt.search_node, datapoint, EdgeType::Produces)
                    .map_err(graph_err)?;
                created_here += 1;
            }

            if created_here != significant {
                return Err(InquestError::PostCondition(format!(
                    "round {round}: {created_here} DataPoints written for {significant} significant findings"
                )));
            }
            created += created_here;
            attempt.effectiveness = significant as f32 / assessments.len() as f32;
        }

        self.stats.results_evaluated += evaluated;
        self.stats.datapoints_created += created;
        self.feedback = Some(RejectionFeedback {
            evaluated: evaluated as usize,
            rejected: rejected as usize,
            themes,
        });

        if created > 0 {
            let synthesis = self
                .synthesizer
                .synthesize(&self.goal, &mut self.graph, round)
                .await;
            self.stats.insights_created += synthesis.insights_created;
            self.stats.questions_created += synthesis.questions_created;
        }

        self.graph.validate().map_err(graph_err)?;

        let effectiveness = if attempts.is_empty() {
            0.0
        } else {
            attempts.iter().map(|a| a.effectiveness).sum::<f32>() / attempts.len() as f32
        };
        info!(
            round,
            searches = attempts.len(),
            datapoints = created,
            evaluated,
            rejected,
            effectiveness,
            "Round complete"
        );
        self.ledger.record_round(RoundRecord {
            round,
            searches_issued: attempts.len() as u32,
            datapoints_created: created,
            results_evaluated: evaluated,
            results_rejected: rejected,
            effectiveness,
        });

        if self.ledger.consecutive_zero_rounds() >= self.config.no_progress_rounds {
            return Err(InquestError::NoProgress {
                rounds: self.ledger.consecutive_zero_rounds(),
            });
        }
        Ok(())
    }

    // --- Accessors ---

    pub fn graph(&self) -> &InvestigationGraph {
        &self.graph
    }

    pub fn ledger(&self) -> &RoundLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &InvestigationStats {
        &self.stats
    }

    pub fn export(&self) -> GraphExport {
        self.graph.export()
    }
}

fn graph_err(e: inquest_graph::GraphError) -> InquestError {
    InquestError::Graph(e.to_string())
}

fn datapoint_content(result: &RawResult) -> String {
    format!(
        "{}: {}",
        result.title,
        truncate_to_char_boundary(&result.text, DATAPOINT_TEXT_CAP)
    )
}

/// Run one search with bounded retries. Rate limits and transient errors
/// retry with backoff; a permanent error fails the attempt on the spot.
/// Always returns an attempt record, never an error.
async fn execute_one(
    client: Arc<dyn SourceClient>,
    search_node: NodeId,
    spec: SearchSpec,
    timeout: Duration,
) -> SearchAttempt {
    let mut attempt_no: u32 = 0;
    let mut results = Vec::new();

    let outcome = loop {
        match client.search(&spec.parameters, timeout).await {
            Ok(fetched) => {
                results = fetched;
                break AttemptOutcome::Succeeded;
            }
            Err(e) if e.is_retryable() && attempt_no + 1 < backoff::MAX_ATTEMPTS => {
                warn!(
                    endpoint = spec.endpoint.as_str(),
                    error = %e,
                    attempt = attempt_no + 1,
                    "Search failed, backing off"
                );
                backoff::sleep_before_retry(attempt_no).await;
                attempt_no += 1;
            }
            Err(SourceError::RateLimited(_)) => break AttemptOutcome::RateLimited,
            Err(SourceError::Transient(reason)) => {
                break AttemptOutcome::TransientFailure(reason)
            }
            Err(SourceError::Permanent(reason)) => {
                break AttemptOutcome::PermanentFailure(reason)
            }
        }
    };

    SearchAttempt {
        search_node,
        endpoint: spec.endpoint,
        query: spec.query,
        parameters: spec.parameters,
        outcome,
        results,
        effectiveness: 0.0,
    }
}
