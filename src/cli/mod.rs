use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "clipforge",
    about = "ClipForge - Automated content pipeline from long-form video sources to social media accounts",
    version,
    long_about = "Downloads new videos from subscribed sources, cuts highlight clips, runs them through per-account filters and uploads the results on each account's schedule. Per-account state lives in a plain-JSON ledger on disk, so the process can be stopped and restarted at any point."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler daemon: poll account schedules and process cycles until stopped
    Run,

    /// Run one pipeline cycle per account immediately, then exit
    Once {
        /// Only process the account with this name
        #[arg(short, long, value_name = "NAME")]
        account: Option<String>,
    },

    /// List configured accounts and their schedules
    Accounts,

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Remove temporary download artifacts
    Clean {
        /// Also remove all per-account data (ledgers, queued content, caches)
        #[arg(long)]
        all: bool,
    },
}
