//! Clipforge - automated highlight pipeline for managed social accounts
//!
//! This library pulls source media (e.g. channel videos), extracts short highlight
//! clips, applies post-processing filters, queues the result per account and uploads
//! it on a schedule. Download, extraction, filtering and upload backends are swappable
//! capabilities behind narrow trait contracts.

pub mod accounts;
pub mod capabilities;
pub mod cli;
pub mod config;
pub mod content;
pub mod ledger;
pub mod pipeline;
pub mod scheduler;
pub mod sources;
pub mod utils;

pub use accounts::{AccountType, ManagedAccount};
pub use capabilities::CapabilityRegistry;
pub use cli::{Cli, Commands};
pub use config::Settings;
pub use content::{ContentToUpload, MediaFile, MediaType};
pub use ledger::Ledger;
pub use pipeline::{CycleOutcome, Pipeline};
pub use scheduler::UploadQueue;
pub use sources::{ContentType, Source, SourceType};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}
