use std::env;
use std::time::Duration;

use typed_builder::TypedBuilder;

/// Budgets and knobs for one investigation session. No process-wide
/// mutable state: everything a session needs is passed in here.
#[derive(Debug, Clone, TypedBuilder)]
pub struct InvestigationConfig {
    /// Total search calls across the session.
    #[builder(default = 25)]
    pub max_searches: u32,

    /// Wall-clock limit for the session.
    #[builder(default = Duration::from_secs(600))]
    pub max_duration: Duration,

    /// Stop once the satisfaction score reaches this value. Range 0-1.
    #[builder(default = 0.8)]
    pub satisfaction_threshold: f64,

    /// Searches the strategy generator may propose per round.
    #[builder(default = 4)]
    pub max_searches_per_round: usize,

    /// Times one endpoint may appear in the cumulative search history
    /// before further proposals against it are declined.
    #[builder(default = 3)]
    pub max_endpoint_repeats: u32,

    /// Allow the strategy generator to exceed max_endpoint_repeats when it
    /// explicitly justifies the repeat. Off by default.
    #[builder(default = false)]
    pub allow_diversity_exceptions: bool,

    /// Searches dispatched concurrently within one round.
    #[builder(default = 3)]
    pub max_concurrent: usize,

    /// Per-call timeout for source clients.
    #[builder(default = Duration::from_secs(20))]
    pub search_timeout: Duration,

    /// Per-call timeout for LLM completions.
    #[builder(default = Duration::from_secs(45))]
    pub llm_timeout: Duration,

    /// Raw results per search fed to the evaluator; the rest are dropped.
    #[builder(default = 20)]
    pub max_results_per_batch: usize,

    /// Endpoint used by the fallback strategy when the LLM cannot produce
    /// a parseable plan.
    #[builder(default = "brave_search".to_string())]
    pub default_endpoint: String,

    /// Consecutive zero-DataPoint rounds before the session aborts.
    #[builder(default = 3)]
    pub no_progress_rounds: u32,
}

impl Default for InvestigationConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Process configuration loaded from environment variables.
/// Credentials live here, never in request parameters.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub brave_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            brave_api_key: env::var("BRAVE_API_KEY").ok(),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = InvestigationConfig::default();
        assert_eq!(config.max_searches, 25);
        assert_eq!(config.max_endpoint_repeats, 3);
        assert!(!config.allow_diversity_exceptions);
        assert_eq!(config.no_progress_rounds, 3);
        assert!(config.satisfaction_threshold > 0.0 && config.satisfaction_threshold <= 1.0);
    }

    #[test]
    fn builder_overrides() {
        let config = InvestigationConfig::builder()
            .max_searches(2)
            .max_concurrent(1)
            .build();
        assert_eq!(config.max_searches, 2);
        assert_eq!(config.max_concurrent, 1);
        // Untouched fields keep defaults
        assert_eq!(config.max_searches_per_round, 4);
    }
}
