pub mod backoff;
pub mod evaluator;
pub mod ledger;
pub(crate) mod llm;
pub mod orchestrator;
pub mod policy;
pub mod strategy;
pub mod synthesis;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use orchestrator::{InvestigationStats, Orchestrator};
