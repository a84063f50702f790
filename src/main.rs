use anyhow::Result;
use clap::{Parser, Subcommand};
use modelsweep::config::ConfigLibrary;
use modelsweep::settings::Settings;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "modelsweep",
    about = "Parameter-sweep test campaigns for remote LLM inference services",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + in-process worker pool)
    Serve {
        /// Bind address (overrides settings)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Start a campaign from a saved sweep config and follow it
    Start {
        /// Config name in the config directory
        config: String,

        /// Return immediately instead of following the run
        #[arg(long)]
        detach: bool,
    },

    /// Request a stop for a running campaign
    Stop {
        id: Uuid,
    },

    /// Show one campaign's status
    Status {
        id: Uuid,
    },

    /// List recent campaigns
    List {
        /// Maximum rows
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Dump a campaign's case results as JSON
    Results {
        id: Uuid,
    },

    /// Analyze a finished campaign
    Analyze {
        id: Uuid,
    },

    /// Delete a campaign and its artifacts
    Delete {
        id: Uuid,
    },

    /// Remove campaigns older than N days
    Cleanup {
        #[arg(long, default_value = "30")]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load_or_default()?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.bind.clone());
            tracing::info!(%bind, "Starting modelsweep daemon");
            modelsweep::serve(&bind, &settings).await?;
        }
        Commands::Start { config, detach } => {
            let orchestrator = modelsweep::build_orchestrator(&settings)?;
            let library = ConfigLibrary::new(&settings.config_dir);
            let sweep = library.load(&config)?;

            let receipt = orchestrator.start(sweep).await?;
            println!("Campaign started: {}", receipt.execution_id);
            println!(
                "  cases: {}  estimate: {} min  mode: {}",
                receipt.total_cases,
                receipt.estimated_minutes,
                match receipt.workers {
                    Some(w) => format!("distributed ({} workers)", w),
                    None => "local".to_string(),
                }
            );

            if !detach {
                loop {
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                    let execution = orchestrator.status(receipt.execution_id).await?;
                    println!(
                        "  {} : {}/{} done, {} failed",
                        execution.status,
                        execution.completed_cases + execution.failed_cases,
                        execution.total_cases,
                        execution.failed_cases
                    );
                    if execution.status.is_terminal() {
                        break;
                    }
                }
            }
        }
        Commands::Stop { id } => {
            let orchestrator = modelsweep::build_orchestrator(&settings)?;
            if orchestrator.stop(id).await? {
                println!("Stop requested for {}", id);
            } else {
                println!("Nothing to stop for {}", id);
            }
        }
        Commands::Status { id } => {
            let orchestrator = modelsweep::build_orchestrator(&settings)?;
            let execution = orchestrator.status(id).await?;
            println!("{}", serde_json::to_string_pretty(&execution)?);
        }
        Commands::List { limit } => {
            let orchestrator = modelsweep::build_orchestrator(&settings)?;
            let executions = orchestrator.list(limit).await?;
            if executions.is_empty() {
                println!("No campaigns found.");
            } else {
                println!(
                    "{:<36} | {:<20} | {:<10} | Cases",
                    "Execution", "Config", "Status"
                );
                println!("{:-<36}-|-{:-<20}-|-{:-<10}-|-{:-<10}", "", "", "", "");
                for e in executions {
                    println!(
                        "{:<36} | {:<20} | {:<10} | {}/{} ({} failed)",
                        e.execution_id,
                        e.config_name,
                        e.status.to_string(),
                        e.completed_cases + e.failed_cases,
                        e.total_cases,
                        e.failed_cases
                    );
                }
            }
        }
        Commands::Results { id } => {
            let orchestrator = modelsweep::build_orchestrator(&settings)?;
            let results = orchestrator.results(id).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Analyze { id } => {
            let orchestrator = modelsweep::build_orchestrator(&settings)?;
            let analysis = orchestrator.analyze(id).await?;
            println!(
                "Campaign {}: {}/{} successful ({:.0}%)",
                id,
                analysis.successful_cases,
                analysis.total_cases,
                analysis.success_rate * 100.0
            );
            println!("\nBy model:");
            for (model, stats) in &analysis.by_model {
                println!(
                    "  {:<24} avg {:>6.1}s  min {:>6.1}s  max {:>6.1}s  ({} cases)",
                    model, stats.avg_secs, stats.min_secs, stats.max_secs, stats.count
                );
            }
            if !analysis.recommendations.is_empty() {
                println!("\nRecommendations:");
                for r in &analysis.recommendations {
                    println!(" - {}", r);
                }
            }
        }
        Commands::Delete { id } => {
            let orchestrator = modelsweep::build_orchestrator(&settings)?;
            if orchestrator.delete(id).await? {
                println!("Deleted {}", id);
            } else {
                println!("No campaign {}", id);
            }
        }
        Commands::Cleanup { days } => {
            let orchestrator = modelsweep::build_orchestrator(&settings)?;
            let removed = orchestrator.cleanup_older_than(days).await?;
            println!("Removed {} campaigns older than {} days", removed, days);
        }
    }

    Ok(())
}
