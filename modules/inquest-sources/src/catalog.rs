/// Static description of one source-query capability. Pure data: used to
/// build the strategy generator's prompt context and to validate that a
/// proposed search names a known endpoint.
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Parameter names the endpoint accepts. `query` is universal.
    pub parameters: &'static [&'static str],
    /// Natural-language hint for the strategy prompt.
    pub best_for: &'static str,
}

/// The known endpoint universe. A session's registry typically exposes a
/// subset of this, depending on which credentials are configured.
#[derive(Debug, Clone, Default)]
pub struct EndpointCatalog {
    specs: Vec<EndpointSpec>,
}

pub const BUILTIN_ENDPOINTS: &[EndpointSpec] = &[
    EndpointSpec {
        name: "brave_search",
        description: "General web search across news, forums, and public sites",
        parameters: &["query", "freshness"],
        best_for: "broad discovery, verifying claims against independent reporting",
    },
    EndpointSpec {
        name: "dvids",
        description: "DVIDS military media database: unit news, imagery, press releases",
        parameters: &["query", "unit", "branch"],
        best_for: "military unit activity, deployments, official defense media",
    },
    EndpointSpec {
        name: "sam_gov",
        description: "SAM.gov federal contract opportunities and award notices",
        parameters: &["query", "naics", "agency"],
        best_for: "government contracts, vendors, procurement relationships",
    },
    EndpointSpec {
        name: "clearancejobs",
        description: "Cleared-professional job postings",
        parameters: &["query", "location", "clearance_level"],
        best_for: "inferring programs and facilities from hiring patterns",
    },
    EndpointSpec {
        name: "reddit",
        description: "Reddit post and comment search",
        parameters: &["query", "subreddit"],
        best_for: "first-person accounts, niche community chatter",
    },
    EndpointSpec {
        name: "twitter",
        description: "Twitter/X post search",
        parameters: &["query", "from_user"],
        best_for: "real-time observations, named-account activity",
    },
];

impl EndpointCatalog {
    pub fn new(specs: Vec<EndpointSpec>) -> Self {
        Self { specs }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_ENDPOINTS.to_vec())
    }

    /// Catalog minus the named endpoints.
    pub fn without(&self, excluded: &std::collections::HashSet<String>) -> Self {
        Self::new(
            self.specs
                .iter()
                .filter(|s| !excluded.contains(s.name))
                .cloned()
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&EndpointSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.iter().map(|s| s.name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Render the catalog for the strategy prompt.
    pub fn prompt_context(&self) -> String {
        let mut out = String::from("Available endpoints:\n");
        for spec in &self.specs {
            out.push_str(&format!(
                "- {} — {}. Parameters: {}. Best for: {}.\n",
                spec.name,
                spec.description,
                spec.parameters.join(", "),
                spec.best_for,
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_lookup() {
        let catalog = EndpointCatalog::builtin();
        assert!(catalog.contains("brave_search"));
        assert!(catalog.contains("sam_gov"));
        assert!(!catalog.contains("myspace"));
    }

    #[test]
    fn prompt_context_lists_every_endpoint() {
        let catalog = EndpointCatalog::builtin();
        let context = catalog.prompt_context();
        for name in catalog.names() {
            assert!(context.contains(name));
        }
    }
}
