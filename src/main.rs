use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use scout::capability::Capabilities;
use scout::config::ResearchConfig;
use scout::session::IterationController;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scout")]
#[command(version, about = "Iterative research orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a scout.toml configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a research session for a query
    Run {
        /// The research question
        query: String,

        /// Override the iteration ceiling
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override the cost ceiling in USD
        #[arg(long)]
        cost_limit: Option<f64>,

        /// Override the confidence threshold (0.0-1.0)
        #[arg(long)]
        confidence: Option<f64>,

        /// Write a JSON session snapshot into this directory
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
    /// Show the effective configuration
    Config,
}

fn load_config(cli: &Cli) -> Result<ResearchConfig> {
    match cli.config.as_deref() {
        Some(path) => ResearchConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(ResearchConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("scout=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scout=info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Config => {
            let config = load_config(&cli)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Run {
            query,
            max_iterations,
            cost_limit,
            confidence,
            snapshot_dir,
        } => {
            let mut config = load_config(&cli)?;
            if let Some(n) = max_iterations {
                config.max_iterations = *n;
            }
            if let Some(limit) = cost_limit {
                config.cost_limit_usd = *limit;
            }
            if let Some(threshold) = confidence {
                config.confidence_threshold = *threshold;
            }
            if let Some(dir) = snapshot_dir {
                config.snapshot_dir = Some(dir.clone());
            }

            // No live backends are wired up yet; the offline capability
            // set exercises the full loop with degraded defaults.
            let controller = IterationController::new(config, Capabilities::offline())
                .context("invalid configuration")?;
            let result = controller.run(query).await;

            println!();
            println!("{}", style("Research complete").green().bold());
            println!(
                "  {} {}",
                style("reason:").dim(),
                result.metadata.termination_reason
            );
            println!(
                "  {} {:.3}",
                style("confidence:").dim(),
                result.metadata.final_confidence
            );
            println!(
                "  {} {} ({} failed)",
                style("searches:").dim(),
                result.metadata.total_searches,
                result.metadata.failed_searches
            );
            println!(
                "  {} {} / ${:.2}",
                style("iterations:").dim(),
                result.metadata.total_iterations,
                result.metadata.total_cost_usd
            );
            println!();
            println!("{}", result.report);
        }
    }

    Ok(())
}
