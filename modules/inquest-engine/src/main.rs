use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ai_client::Claude;
use inquest_common::{Config, InvestigationConfig};
use inquest_engine::Orchestrator;
use inquest_sources::{BraveSearcher, SourceRegistry};

#[derive(Parser)]
#[command(name = "inquest", about = "Round-based OSINT investigation runner")]
struct Cli {
    /// Analytic question driving the investigation.
    goal: String,

    #[arg(long, default_value_t = 25)]
    max_searches: u32,

    /// Wall-clock budget in minutes.
    #[arg(long, default_value_t = 10)]
    max_minutes: u64,

    #[arg(long, default_value_t = 0.8)]
    satisfaction_threshold: f64,

    /// Permit justified repeats past the endpoint diversity limit.
    #[arg(long)]
    allow_diversity_exceptions: bool,

    #[arg(long, default_value = "claude-sonnet-4-20250514")]
    model: String,

    /// Write the final graph as JSON to this path.
    #[arg(long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let env = Config::from_env();

    let config = InvestigationConfig::builder()
        .max_searches(cli.max_searches)
        .max_duration(Duration::from_secs(cli.max_minutes * 60))
        .satisfaction_threshold(cli.satisfaction_threshold)
        .allow_diversity_exceptions(cli.allow_diversity_exceptions)
        .build();

    let llm = Arc::new(Claude::new(env.anthropic_api_key, cli.model));

    let mut registry = SourceRegistry::new();
    match env.brave_api_key {
        Some(key) => {
            registry = registry.register(Arc::new(BraveSearcher::new(&key)));
        }
        None => warn!("BRAVE_API_KEY not set, web search endpoint unavailable"),
    }

    let mut orchestrator = Orchestrator::new(cli.goal, config, llm, registry);
    let outcome = orchestrator.run().await;

    match &outcome {
        Ok(reason) => info!(reason = reason.as_str(), stats = %orchestrator.stats(), "Finished"),
        Err(e) => error!(error = %e, stats = %orchestrator.stats(), "Investigation aborted"),
    }

    if let Some(path) = &cli.export {
        let json = serde_json::to_string_pretty(&orchestrator.export())?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "Graph exported");
    }

    outcome?;
    Ok(())
}
