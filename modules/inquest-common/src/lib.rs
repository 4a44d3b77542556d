pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, InvestigationConfig};
pub use error::InquestError;
pub use types::{
    AttemptOutcome, EdgeType, NodeId, NodePayload, NodeType, RawResult, RejectionFeedback,
    ResultAssessment, SearchAttempt, SearchParams, SearchSpec,
};
