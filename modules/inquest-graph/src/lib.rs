mod export;
mod graph;

pub use export::{ExportedEdge, ExportedNode, GraphExport};
pub use graph::{Edge, GraphError, InvestigationGraph, StoredNode};
