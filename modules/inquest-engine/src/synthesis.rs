use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::LlmProvider;
use inquest_common::{EdgeType, InvestigationConfig, NodeId, NodePayload, NodeType};
use inquest_graph::InvestigationGraph;

use crate::llm::extract_with_retry;

pub const SYNTHESIS_SYSTEM: &str = "\
You are the synthesis stage of an OSINT investigation. From the evidence \
items listed, draw conclusions that at least one item directly supports. \
Cite supporting items by index; a conclusion with no citation will be \
discarded. Set confidence 0.0-1.0 by how strongly the cited evidence \
establishes the conclusion. If a conclusion opens a new line of inquiry, \
list it under open_questions. Do not restate evidence as a conclusion.";

/// Most recent DataPoints offered to the synthesizer per round.
const MAX_DATAPOINTS_IN_PROMPT: usize = 30;

// --- LLM structured output types ---

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SynthesisWire {
    pub insights: Vec<InsightWire>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InsightWire {
    pub content: String,
    /// 0.0-1.0.
    pub confidence: f32,
    /// Indices into the evidence list shown in the prompt.
    pub supported_by: Vec<usize>,
    pub open_questions: Vec<String>,
}

#[derive(Debug, Default)]
pub struct SynthesisOutcome {
    pub insights_created: u32,
    pub questions_created: u32,
}

pub struct InsightSynthesizer {
    llm: Arc<dyn LlmProvider>,
    config: InvestigationConfig,
}

impl InsightSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>, config: InvestigationConfig) -> Self {
        Self { llm, config }
    }

    /// Synthesize Insight and EmergentQuestion nodes from the accumulated
    /// DataPoints. Failures are absorbed — synthesis never fails a round.
    /// Every written Insight carries SUPPORTS edges from the DataPoints it
    /// cites; an insight citing nothing valid is dropped, never written.
    pub async fn synthesize(
        &self,
        goal: &str,
        graph: &mut InvestigationGraph,
        round: u32,
    ) -> SynthesisOutcome {
        let datapoints: Vec<(NodeId, String)> = graph
            .nodes_of_type(NodeType::DataPoint)
            .map(|n| (n.id, n.payload.content().to_string()))
            .collect();
        let recent: Vec<&(NodeId, String)> = datapoints
            .iter()
            .rev()
            .take(MAX_DATAPOINTS_IN_PROMPT)
            .collect();

        if recent.is_empty() {
            return SynthesisOutcome::default();
        }

        let mut prompt = format!("Investigation goal: {goal}\n\nEvidence items:\n");
        for (i, (_, content)) in recent.iter().enumerate() {
            prompt.push_str(&format!("{i}. {content}\n"));
        }

        let wire: SynthesisWire = match extract_with_retry(
            self.llm.as_ref(),
            SYNTHESIS_SYSTEM,
            &prompt,
            self.config.llm_timeout,
        )
        .await
        {
            Ok(wire) => wire,
            Err(e) => {
                warn!(error = %e, "Insight synthesis failed, skipping for this round");
                return SynthesisOutcome::default();
            }
        };

        let mut outcome = SynthesisOutcome::default();

        for insight in wire.insights {
            let supporters: Vec<NodeId> = insight
                .supported_by
                .iter()
                .filter_map(|&i| recent.get(i).map(|(id, _)| *id))
                .collect();
            if supporters.is_empty() {
                warn!(
                    content = insight.content.as_str(),
                    "Insight cites no existing DataPoint, dropping"
                );
                continue;
            }

            let insight_id = match graph.create_node(
                NodePayload::Insight {
                    content: insight.content,
                    confidence: insight.confidence.clamp(0.0, 1.0),
                },
                round,
            ) {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "Failed to create Insight node");
                    continue;
                }
            };
            for supporter in supporters {
                if let Err(e) = graph.create_edge(supporter, insight_id, EdgeType::Supports) {
                    warn!(error = %e, "Failed to create SUPPORTS edge");
                }
            }
            outcome.insights_created += 1;

            for question in insight.open_questions {
                match graph.create_node(NodePayload::EmergentQuestion { content: question }, round)
                {
                    Ok(question_id) => {
                        if let Err(e) =
                            graph.create_edge(insight_id, question_id, EdgeType::Spawns)
                        {
                            warn!(error = %e, "Failed to create SPAWNS edge");
                        }
                        outcome.questions_created += 1;
                    }
                    Err(e) => warn!(error = %e, "Failed to create EmergentQuestion node"),
                }
            }
        }

        if outcome.insights_created > 0 {
            info!(
                insights = outcome.insights_created,
                questions = outcome.questions_created,
                round,
                "Synthesis complete"
            );
        }
        outcome
    }
}
