use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use inquest_common::{RawResult, SearchParams};

use crate::catalog::{EndpointCatalog, BUILTIN_ENDPOINTS};
use crate::error::Result;

/// Uniform contract every source implements: one query in, a finite ordered
/// sequence of source-native records out, or a typed error. Results are
/// returned in source-native order and the call is not restartable.
/// Clients are stateless idempotent readers — safe to call concurrently.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Catalog name this client serves.
    fn endpoint(&self) -> &str;

    async fn search(&self, params: &SearchParams, timeout: Duration) -> Result<Vec<RawResult>>;
}

/// Endpoint name → client. Built once at session start from whatever
/// credentials are configured; the catalog a session advertises to the
/// strategy generator is derived from what is actually registered here.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    clients: HashMap<String, Arc<dyn SourceClient>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, client: Arc<dyn SourceClient>) -> Self {
        self.clients.insert(client.endpoint().to_string(), client);
        self
    }

    pub fn get(&self, endpoint: &str) -> Option<Arc<dyn SourceClient>> {
        self.clients.get(endpoint).cloned()
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.clients.contains_key(endpoint)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Catalog restricted to registered endpoints, in builtin order.
    pub fn catalog(&self) -> EndpointCatalog {
        EndpointCatalog::new(
            BUILTIN_ENDPOINTS
                .iter()
                .filter(|spec| self.clients.contains_key(spec.name))
                .cloned()
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;

    struct FixedClient {
        endpoint: &'static str,
    }

    #[async_trait]
    impl SourceClient for FixedClient {
        fn endpoint(&self) -> &str {
            self.endpoint
        }

        async fn search(
            &self,
            _params: &SearchParams,
            _timeout: Duration,
        ) -> Result<Vec<RawResult>> {
            Err(SourceError::Transient("not wired".into()))
        }
    }

    #[test]
    fn registry_catalog_reflects_registrations() {
        let registry = SourceRegistry::new()
            .register(Arc::new(FixedClient {
                endpoint: "brave_search",
            }))
            .register(Arc::new(FixedClient { endpoint: "reddit" }));

        assert_eq!(registry.len(), 2);
        let catalog = registry.catalog();
        assert!(catalog.contains("brave_search"));
        assert!(catalog.contains("reddit"));
        assert!(!catalog.contains("dvids"));
    }
}
