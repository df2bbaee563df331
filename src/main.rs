use anyhow::Result;
use clap::Parser;
use console::style;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipforge::accounts::{self, ManagedAccount};
use clipforge::capabilities::CapabilityRegistry;
use clipforge::cli::{Cli, Commands};
use clipforge::config::Settings;
use clipforge::pipeline::Pipeline;
use clipforge::scheduler::{run_worker, Scheduler, UploadQueue};
use clipforge::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "clipforge=debug" } else { "clipforge=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;

    // Check for required external dependencies (non-fatal in Docker)
    let missing_deps = utils::check_dependencies(&settings.tools).await;
    if !missing_deps.is_empty() && !cli.quiet {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    match cli.command {
        Commands::Run => {
            let (accounts, pipeline) = start_pipeline(&settings)?;
            let pipeline = Arc::new(pipeline);

            let (queue, rx) = UploadQueue::channel();
            let worker = tokio::spawn(run_worker(Arc::clone(&pipeline), rx));

            let scheduler = Scheduler::new(accounts, queue, settings.app.scheduler_poll_seconds);
            scheduler.run().await;

            // The scheduler loop never returns on its own
            worker.await?;
        }
        Commands::Once { account } => {
            let (accounts, pipeline) = start_pipeline(&settings)?;

            let selected: Vec<Arc<ManagedAccount>> = match account {
                Some(name) => {
                    let found = accounts
                        .iter()
                        .find(|a| a.name == name)
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("No account named {:?} configured", name))?;
                    vec![found]
                }
                None => accounts,
            };

            for account in selected {
                let outcome = pipeline.run_account_cycle(&account).await;
                let styled = match outcome {
                    clipforge::CycleOutcome::Uploaded => style(outcome).green(),
                    clipforge::CycleOutcome::NoContentAvailable => style(outcome).yellow(),
                    clipforge::CycleOutcome::Failed => style(outcome).red(),
                };
                println!("{}: {}", account.name, styled);
            }
        }
        Commands::Accounts => {
            let accounts = accounts::load_accounts(&settings.paths.accounts_config)?;
            println!("Configured accounts:");
            for account in &accounts {
                let schedule = match &account.schedule {
                    Some(s) => format!("every {} day(s) at {}", s.every_days, s.times.join(", ")),
                    None => "no schedule".to_string(),
                };
                println!("  • {} - {}", account, schedule);
                if !account.sources.is_empty() {
                    println!("      sources: {}", account.sources.join(", "));
                }
                if !account.filters.is_empty() {
                    println!("      filters: {}", account.filters.join(", "));
                }
            }
        }
        Commands::Config { show } => {
            if show {
                settings.display();
            } else {
                settings.save()?;
                println!("Configuration written");
            }
        }
        Commands::Clean { all } => {
            let removed = utils::remove_files_from_folder(&settings.paths.tmp_dir)?;
            println!("Removed {} temporary files", removed);
            if all {
                if settings.paths.data_dir.is_dir() {
                    fs_err::remove_dir_all(&settings.paths.data_dir)?;
                    println!(
                        "Removed account data directory {}",
                        settings.paths.data_dir.display()
                    );
                } else {
                    println!("No account data directory to remove");
                }
            }
        }
    }

    Ok(())
}

/// Load accounts, build the default capability set and prepare per-account
/// directories. Shared by the daemon and one-shot modes.
fn start_pipeline(settings: &Settings) -> Result<(Vec<Arc<ManagedAccount>>, Pipeline)> {
    let accounts = accounts::load_accounts(&settings.paths.accounts_config)?;
    tracing::info!("Loaded {} managed accounts", accounts.len());

    let registry = CapabilityRegistry::with_defaults(settings);
    let pipeline = Pipeline::new(settings.clone(), registry);
    pipeline.prepare_accounts(&accounts)?;

    let accounts = accounts.into_iter().map(Arc::new).collect();
    Ok((accounts, pipeline))
}
