use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Graph vocabulary ---

/// Opaque node identifier. Allocated by the graph, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    AnalyticQuestion,
    InvestigationQuestion,
    Search,
    DataPoint,
    Insight,
    EmergentQuestion,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeType::AnalyticQuestion => write!(f, "AnalyticQuestion"),
            NodeType::InvestigationQuestion => write!(f, "InvestigationQuestion"),
            NodeType::Search => write!(f, "Search"),
            NodeType::DataPoint => write!(f, "DataPoint"),
            NodeType::Insight => write!(f, "Insight"),
            NodeType::EmergentQuestion => write!(f, "EmergentQuestion"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Generates,
    LeadsTo,
    Produces,
    Supports,
    Spawns,
    Discovered,
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeType::Generates => write!(f, "GENERATES"),
            EdgeType::LeadsTo => write!(f, "LEADS_TO"),
            EdgeType::Produces => write!(f, "PRODUCES"),
            EdgeType::Supports => write!(f, "SUPPORTS"),
            EdgeType::Spawns => write!(f, "SPAWNS"),
            EdgeType::Discovered => write!(f, "DISCOVERED"),
        }
    }
}

/// Typed node payload — one variant per node type, each with a fixed field
/// set. Replaces the open key/value dict the loose representation invites:
/// code can never read a field a node type does not carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum NodePayload {
    AnalyticQuestion {
        content: String,
    },
    InvestigationQuestion {
        content: String,
    },
    Search {
        endpoint: String,
        query: String,
        parameters: SearchParams,
        rationale: String,
    },
    DataPoint {
        content: String,
        source_url: Option<String>,
        relevance_score: u8,
        specificity_score: u8,
        entities: Vec<String>,
    },
    Insight {
        content: String,
        confidence: f32,
    },
    EmergentQuestion {
        content: String,
    },
}

impl NodePayload {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodePayload::AnalyticQuestion { .. } => NodeType::AnalyticQuestion,
            NodePayload::InvestigationQuestion { .. } => NodeType::InvestigationQuestion,
            NodePayload::Search { .. } => NodeType::Search,
            NodePayload::DataPoint { .. } => NodeType::DataPoint,
            NodePayload::Insight { .. } => NodeType::Insight,
            NodePayload::EmergentQuestion { .. } => NodeType::EmergentQuestion,
        }
    }

    /// The descriptive string every node type carries in some form.
    pub fn content(&self) -> &str {
        match self {
            NodePayload::AnalyticQuestion { content }
            | NodePayload::InvestigationQuestion { content }
            | NodePayload::DataPoint { content, .. }
            | NodePayload::Insight { content, .. }
            | NodePayload::EmergentQuestion { content } => content,
            NodePayload::Search { query, .. } => query,
        }
    }
}

// --- Search types ---

/// Structured request parameters for one source query. Ordered so that
/// serialized attempts and prompt context render deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SearchParams(pub BTreeMap<String, String>);

impl SearchParams {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One raw record returned by a source client. Sources differ wildly in
/// shape; this is the minimal uniform surface the evaluator needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResult {
    pub title: String,
    pub text: String,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A search accepted into a round: where to look, what to ask, and why.
#[derive(Debug, Clone)]
pub struct SearchSpec {
    pub endpoint: String,
    pub query: String,
    pub parameters: SearchParams,
    pub rationale: String,
    /// Open EmergentQuestion that motivated this search, if any.
    pub motivated_by: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    RateLimited,
    TransientFailure(String),
    PermanentFailure(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Succeeded)
    }
}

/// Ephemeral record of one executed search. Not a graph node — the raw
/// results buffer lives only until evaluation completes.
#[derive(Debug, Clone)]
pub struct SearchAttempt {
    pub search_node: NodeId,
    pub endpoint: String,
    pub query: String,
    pub parameters: SearchParams,
    pub outcome: AttemptOutcome,
    pub results: Vec<RawResult>,
    /// Fraction of evaluated results marked significant. 0.0 until
    /// evaluation runs; stays 0.0 for failed or empty attempts.
    pub effectiveness: f32,
}

// --- Evaluation types ---

/// Per-result judgment from the finding evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResultAssessment {
    /// Zero-based index into the evaluated batch.
    pub index: usize,
    pub is_significant: bool,
    /// 0-10.
    pub relevance_score: u8,
    /// 0-10.
    pub specificity_score: u8,
    pub extracted_entities: Vec<String>,
    pub reasoning: String,
    /// A new question the result surfaces directly, worth its own node.
    pub emergent_question: Option<String>,
}

/// What the prior round's evaluation rejected, fed back into the next
/// round's strategy prompt so query construction adapts.
#[derive(Debug, Clone, Default)]
pub struct RejectionFeedback {
    pub evaluated: usize,
    pub rejected: usize,
    /// Reasoning snippets from non-significant assessments.
    pub themes: Vec<String>,
}

impl RejectionFeedback {
    pub fn rejected_fraction(&self) -> f32 {
        if self.evaluated == 0 {
            return 0.0;
        }
        self.rejected as f32 / self.evaluated as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_schema_is_a_uuid_string() {
        let schema = schemars::schema_for!(NodeId);
        assert_eq!(schema.schema.format.as_deref(), Some("uuid"));
    }

    #[test]
    fn payload_node_type_matches_variant() {
        let p = NodePayload::Search {
            endpoint: "brave_search".into(),
            query: "test".into(),
            parameters: SearchParams::new(),
            rationale: "why".into(),
        };
        assert_eq!(p.node_type(), NodeType::Search);
        assert_eq!(p.content(), "test");
    }

    #[test]
    fn edge_type_display_matches_wire_names() {
        assert_eq!(EdgeType::LeadsTo.to_string(), "LEADS_TO");
        assert_eq!(EdgeType::Produces.to_string(), "PRODUCES");
    }

    #[test]
    fn rejection_feedback_fraction() {
        let fb = RejectionFeedback {
            evaluated: 10,
            rejected: 4,
            themes: vec![],
        };
        assert!((fb.rejected_fraction() - 0.4).abs() < f32::EPSILON);
        assert_eq!(RejectionFeedback::default().rejected_fraction(), 0.0);
    }
}
