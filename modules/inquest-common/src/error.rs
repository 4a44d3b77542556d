use thiserror::Error;

/// Session-level errors. Component-local failures (a single search, a single
/// evaluation batch) are absorbed into the attempt ledger and never surface
/// here; only conditions that end or invalidate the session do.
#[derive(Error, Debug)]
pub enum InquestError {
    #[error("no progress: {rounds} consecutive rounds produced zero DataPoints")]
    NoProgress { rounds: u32 },

    #[error("post-condition violated: {0}")]
    PostCondition(String),

    #[error("graph error: {0}")]
    Graph(String),
}
