mod brave;
mod catalog;
mod client;
mod error;

pub use brave::BraveSearcher;
pub use catalog::{EndpointCatalog, EndpointSpec};
pub use client::{SourceClient, SourceRegistry};
pub use error::SourceError;
