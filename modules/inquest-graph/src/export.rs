use serde::{Deserialize, Serialize};

use inquest_common::{EdgeType, NodeId, NodeType};

/// Serializable snapshot of the full graph, suitable for downstream
/// visualization. JSON-compatible; no binary layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportedNode>,
    pub edges: Vec<ExportedEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub properties: serde_json::Value,
    pub wave: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedEdge {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}
