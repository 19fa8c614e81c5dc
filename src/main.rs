use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{debug, error};

use daydigest::config::DigestConfig;
use daydigest::dispatch::{ConsoleDispatcher, Dispatcher, WebhookDispatcher};
use daydigest::pipeline::state::RunStateStore;
use daydigest::pipeline::{RunCoordinator, RunPhase};
use daydigest::source::JsonFileSource;

/// Aggregate a day's transaction records into per-agent summary notifications
#[derive(Parser)]
#[command(name = "daydigest")]
#[command(about = "Daily transaction digest pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the pipeline for one day (resumes if a checkpoint exists)
    Run {
        /// Day to digest, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Path to the configuration file
        #[arg(short = 'c', long, default_value = "daydigest.yml")]
        config: PathBuf,
    },
    /// Show checkpoint progress for a run without executing it
    Status {
        /// Day to inspect, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Path to the configuration file
        #[arg(short = 'c', long, default_value = "daydigest.yml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("daydigest started with verbosity level: {}", cli.verbose);

    let result = match cli.command {
        Commands::Run { date, config } => run_digest(date, config).await,
        Commands::Status { date, config } => show_status(date, config).await,
    };

    if let Err(e) = result {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_digest(date: Option<NaiveDate>, config_path: PathBuf) -> Result<()> {
    let config = DigestConfig::load(&config_path)?;
    let as_of = date.unwrap_or_else(|| Local::now().date_naive());

    let source = Arc::new(JsonFileSource::new(&config.records_path));
    let dispatcher: Arc<dyn Dispatcher> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookDispatcher::new(url)),
        None => Arc::new(ConsoleDispatcher),
    };

    let coordinator = RunCoordinator::new(config, source, dispatcher);
    let outcome = coordinator.execute(as_of).await?;

    match outcome.phase {
        RunPhase::Idle => println!("No records for {as_of}; nothing to dispatch."),
        _ => {
            println!("Run {} complete for {}", outcome.run_id, as_of);
            println!("  records fetched:      {}", outcome.fetched);
            println!(
                "  facts extracted:      {} ({} reused from checkpoint)",
                outcome.extracted, outcome.reused_facts
            );
            println!("  extraction failures:  {}", outcome.extraction_failures);
            println!("  groups:               {}", outcome.groups);
            println!(
                "  dispatched:           {} ({} already dispatched)",
                outcome.dispatched, outcome.skipped_already_dispatched
            );
            println!("  dispatch failures:    {}", outcome.dispatch_failures);
        }
    }
    Ok(())
}

async fn show_status(date: Option<NaiveDate>, config_path: PathBuf) -> Result<()> {
    let config = DigestConfig::load(&config_path)?;
    let as_of = date.unwrap_or_else(|| Local::now().date_naive());

    let store = RunStateStore::new(&config.state_dir);
    match store.load(as_of).await? {
        None => println!("No run recorded for {as_of}."),
        Some(state) => {
            let suffix = if state.is_complete { " (complete)" } else { "" };
            println!("Run {} for {}{}", state.run_id, as_of, suffix);
            println!("  records captured:     {}", state.records.len());
            println!("  facts extracted:      {}", state.facts.len());
            println!("  extraction failures:  {}", state.failed_records.len());
            println!(
                "  groups dispatched:    {}",
                state.dispatched_group_keys.len()
            );
            println!("  checkpoint version:   {}", state.checkpoint_version);
        }
    }
    Ok(())
}
