use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use inquest_common::{EdgeType, NodeId, NodePayload, NodeType};

use crate::export::{ExportedEdge, ExportedNode, GraphExport};

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("root AnalyticQuestion already exists")]
    DuplicateRoot,

    #[error("root node cannot receive incoming edges")]
    RootIncomingEdge,

    #[error("node {0} is not an Insight")]
    NotAnInsight(NodeId),

    #[error("graph invariant violated: {0}")]
    Invariant(String),
}

/// A node as stored: immutable payload plus creation metadata. The only
/// permitted mutation anywhere in the graph is Insight confidence
/// refinement, which goes through [`InvestigationGraph::refine_insight_confidence`].
#[derive(Debug, Clone)]
pub struct StoredNode {
    pub id: NodeId,
    pub payload: NodePayload,
    /// Round in which the node was created. Root is round 0.
    pub round: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub edge_type: EdgeType,
}

/// Append-only typed graph for one investigation session. Owned exclusively
/// by the session: single writer, no sharing across sessions, serialized at
/// session end via [`InvestigationGraph::export`].
pub struct InvestigationGraph {
    nodes: HashMap<NodeId, StoredNode>,
    /// Insertion order, so exports and summaries are deterministic.
    order: Vec<NodeId>,
    edges: Vec<Edge>,
    by_type: HashMap<NodeType, Vec<NodeId>>,
    /// Undirected adjacency for connectivity checks.
    adjacency: HashMap<NodeId, Vec<NodeId>>,
    root: NodeId,
}

impl InvestigationGraph {
    /// Create the graph with its root AnalyticQuestion. Happens exactly
    /// once, during session initialization, before any round runs.
    pub fn new(goal: impl Into<String>) -> Self {
        let root = NodeId::new();
        let payload = NodePayload::AnalyticQuestion {
            content: goal.into(),
        };
        let node = StoredNode {
            id: root,
            payload,
            round: 0,
            created_at: Utc::now(),
        };

        let mut nodes = HashMap::new();
        nodes.insert(root, node);
        let mut by_type = HashMap::new();
        by_type.insert(NodeType::AnalyticQuestion, vec![root]);

        Self {
            nodes,
            order: vec![root],
            edges: Vec::new(),
            by_type,
            adjacency: HashMap::new(),
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Insert a node, returning its fresh id. The payload's variant fixes
    /// the node type, so there is no invalid-type failure mode; the one
    /// rejected case is a second AnalyticQuestion.
    pub fn create_node(&mut self, payload: NodePayload, round: u32) -> Result<NodeId, GraphError> {
        if payload.node_type() == NodeType::AnalyticQuestion {
            return Err(GraphError::DuplicateRoot);
        }

        let id = NodeId::new();
        let node_type = payload.node_type();
        debug!(node_id = %id, node_type = %node_type, round, "Creating node");

        self.nodes.insert(
            id,
            StoredNode {
                id,
                payload,
                round,
                created_at: Utc::now(),
            },
        );
        self.order.push(id);
        self.by_type.entry(node_type).or_default().push(id);
        Ok(id)
    }

    /// Insert a directed edge. Both endpoints must already exist; the root
    /// never receives incoming edges.
    pub fn create_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: EdgeType,
    ) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&source) {
            return Err(GraphError::UnknownNode(source));
        }
        if !self.nodes.contains_key(&target) {
            return Err(GraphError::UnknownNode(target));
        }
        if target == self.root {
            return Err(GraphError::RootIncomingEdge);
        }

        debug!(%source, %target, edge_type = %edge_type, "Creating edge");
        self.edges.push(Edge {
            source,
            target,
            edge_type,
        });
        self.adjacency.entry(source).or_default().push(target);
        self.adjacency.entry(target).or_default().push(source);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&StoredNode> {
        self.nodes.get(&id)
    }

    /// Lazy filter over the node set, in insertion order.
    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &StoredNode> + '_ {
        self.by_type
            .get(&node_type)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.nodes.get(id))
    }

    pub fn count_of_type(&self, node_type: NodeType) -> usize {
        self.by_type.get(&node_type).map_or(0, Vec::len)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Incoming edges of a given type for a node.
    pub fn incoming(&self, target: NodeId, edge_type: EdgeType) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.target == target && e.edge_type == edge_type)
            .collect()
    }

    /// The one permitted in-place mutation: refine an Insight's confidence.
    pub fn refine_insight_confidence(
        &mut self,
        id: NodeId,
        confidence: f32,
    ) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        match &mut node.payload {
            NodePayload::Insight {
                confidence: current,
                ..
            } => {
                *current = confidence.clamp(0.0, 1.0);
                Ok(())
            }
            _ => Err(GraphError::NotAnInsight(id)),
        }
    }

    /// True when every node is reachable from the root treating edges as
    /// undirected — the single weakly-connected component invariant.
    pub fn is_connected(&self) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(self.root);
        queue.push_back(self.root);

        while let Some(id) = queue.pop_front() {
            for neighbor in self.adjacency.get(&id).into_iter().flatten() {
                if seen.insert(*neighbor) {
                    queue.push_back(*neighbor);
                }
            }
        }

        seen.len() == self.nodes.len()
    }

    /// Check the structural invariants that must hold after every completed
    /// round: connectivity, DataPoint causality (>= 1 incoming PRODUCES from
    /// a Search node), and Insight support (>= 1 incoming SUPPORTS from a
    /// DataPoint).
    pub fn validate(&self) -> Result<(), GraphError> {
        if !self.is_connected() {
            return Err(GraphError::Invariant(format!(
                "graph is not a single connected component ({} nodes, {} edges)",
                self.nodes.len(),
                self.edges.len()
            )));
        }

        for node in self.nodes_of_type(NodeType::DataPoint) {
            let produces = self.incoming(node.id, EdgeType::Produces);
            if produces.is_empty() {
                return Err(GraphError::Invariant(format!(
                    "DataPoint {} has no incoming PRODUCES edge",
                    node.id
                )));
            }
            for edge in &produces {
                let source_type = self.nodes.get(&edge.source).map(|n| n.payload.node_type());
                if source_type != Some(NodeType::Search) {
                    return Err(GraphError::Invariant(format!(
                        "DataPoint {} PRODUCES edge originates from non-Search node {}",
                        node.id, edge.source
                    )));
                }
            }
        }

        for node in self.nodes_of_type(NodeType::Insight) {
            let supports = self.incoming(node.id, EdgeType::Supports);
            if supports.is_empty() {
                return Err(GraphError::Invariant(format!(
                    "Insight {} has no incoming SUPPORTS edge",
                    node.id
                )));
            }
        }

        Ok(())
    }

    /// Full node/edge dump for visualization or persistence.
    pub fn export(&self) -> GraphExport {
        let nodes = self
            .order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| {
                // Serialize the payload, then lift the variant tag out of
                // the properties map — it already lives in `type`.
                let mut properties =
                    serde_json::to_value(&node.payload).unwrap_or(serde_json::Value::Null);
                if let serde_json::Value::Object(ref mut map) = properties {
                    map.remove("node_type");
                    map.insert(
                        "created_at".to_string(),
                        serde_json::json!(node.created_at),
                    );
                }
                ExportedNode {
                    id: node.id,
                    node_type: node.payload.node_type(),
                    properties,
                    wave: node.round,
                }
            })
            .collect();

        let edges = self
            .edges
            .iter()
            .map(|e| ExportedEdge {
                source: e.source,
                target: e.target,
                edge_type: e.edge_type,
            })
            .collect();

        GraphExport { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inquest_common::SearchParams;

    fn search_payload(query: &str) -> NodePayload {
        NodePayload::Search {
            endpoint: "brave_search".into(),
            query: query.into(),
            parameters: SearchParams::new().with("query", query),
            rationale: "test".into(),
        }
    }

    fn datapoint_payload(content: &str) -> NodePayload {
        NodePayload::DataPoint {
            content: content.into(),
            source_url: None,
            relevance_score: 7,
            specificity_score: 6,
            entities: vec![],
        }
    }

    #[test]
    fn root_created_once() {
        let mut graph = InvestigationGraph::new("who operates the facility");
        assert_eq!(graph.count_of_type(NodeType::AnalyticQuestion), 1);

        let err = graph
            .create_node(
                NodePayload::AnalyticQuestion {
                    content: "again".into(),
                },
                1,
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateRoot));
    }

    #[test]
    fn edge_to_unknown_node_fails() {
        let mut graph = InvestigationGraph::new("goal");
        let root = graph.root();
        let ghost = NodeId::new();
        let err = graph
            .create_edge(root, ghost, EdgeType::Generates)
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(id) if id == ghost));
    }

    #[test]
    fn root_rejects_incoming_edges() {
        let mut graph = InvestigationGraph::new("goal");
        let search = graph.create_node(search_payload("q"), 1).unwrap();
        let err = graph
            .create_edge(search, graph.root(), EdgeType::LeadsTo)
            .unwrap_err();
        assert!(matches!(err, GraphError::RootIncomingEdge));
    }

    #[test]
    fn connectivity_detects_orphans() {
        let mut graph = InvestigationGraph::new("goal");
        let search = graph.create_node(search_payload("q"), 1).unwrap();
        assert!(!graph.is_connected());

        graph
            .create_edge(graph.root(), search, EdgeType::Generates)
            .unwrap();
        assert!(graph.is_connected());
    }

    #[test]
    fn validate_requires_datapoint_causality() {
        let mut graph = InvestigationGraph::new("goal");
        let search = graph.create_node(search_payload("q"), 1).unwrap();
        graph
            .create_edge(graph.root(), search, EdgeType::Generates)
            .unwrap();

        let dp = graph.create_node(datapoint_payload("evidence"), 1).unwrap();
        // Connected but via the wrong edge type — still a violation.
        graph.create_edge(search, dp, EdgeType::LeadsTo).unwrap();
        assert!(matches!(graph.validate(), Err(GraphError::Invariant(_))));

        graph.create_edge(search, dp, EdgeType::Produces).unwrap();
        graph.validate().unwrap();
    }

    #[test]
    fn validate_requires_insight_support() {
        let mut graph = InvestigationGraph::new("goal");
        let search = graph.create_node(search_payload("q"), 1).unwrap();
        graph
            .create_edge(graph.root(), search, EdgeType::Generates)
            .unwrap();
        let dp = graph.create_node(datapoint_payload("evidence"), 1).unwrap();
        graph.create_edge(search, dp, EdgeType::Produces).unwrap();

        let insight = graph
            .create_node(
                NodePayload::Insight {
                    content: "conclusion".into(),
                    confidence: 0.6,
                },
                1,
            )
            .unwrap();
        graph.create_edge(dp, insight, EdgeType::LeadsTo).unwrap();
        assert!(matches!(graph.validate(), Err(GraphError::Invariant(_))));

        graph.create_edge(dp, insight, EdgeType::Supports).unwrap();
        graph.validate().unwrap();
    }

    #[test]
    fn refine_confidence_only_on_insights() {
        let mut graph = InvestigationGraph::new("goal");
        let search = graph.create_node(search_payload("q"), 1).unwrap();
        let insight = graph
            .create_node(
                NodePayload::Insight {
                    content: "c".into(),
                    confidence: 0.3,
                },
                1,
            )
            .unwrap();

        graph.refine_insight_confidence(insight, 0.9).unwrap();
        match &graph.node(insight).unwrap().payload {
            NodePayload::Insight { confidence, .. } => assert_eq!(*confidence, 0.9),
            _ => unreachable!(),
        }

        let err = graph.refine_insight_confidence(search, 0.5).unwrap_err();
        assert!(matches!(err, GraphError::NotAnInsight(_)));
    }

    #[test]
    fn export_round_trips_to_json() {
        let mut graph = InvestigationGraph::new("goal");
        let search = graph.create_node(search_payload("q"), 1).unwrap();
        graph
            .create_edge(graph.root(), search, EdgeType::Generates)
            .unwrap();

        let export = graph.export();
        assert_eq!(export.nodes.len(), 2);
        assert_eq!(export.edges.len(), 1);
        // Root first — insertion order is preserved.
        assert_eq!(export.nodes[0].node_type, NodeType::AnalyticQuestion);
        assert_eq!(export.nodes[0].wave, 0);

        let json = serde_json::to_string(&export).unwrap();
        let parsed: crate::GraphExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.nodes.len(), 2);
        // The variant tag lives in `type`, not duplicated in properties.
        assert!(parsed.nodes[1].properties.get("node_type").is_none());
        assert!(parsed.nodes[1].properties.get("query").is_some());
    }
}
