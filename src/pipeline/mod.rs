//! Pipeline orchestrator: drives one managed account through one cycle.
//!
//! Per cycle the state machine is
//! `CHECK_QUEUE -> UPLOAD` when pending content exists, otherwise
//! `CHECK_QUEUE -> DOWNLOAD -> EXTRACT -> FILTER -> ENQUEUE -> UPLOAD`.
//! No state survives the cycle outside the ledger. Any unexpected fault is
//! caught at the cycle boundary: temporary files are cleaned up, the fault is
//! logged, and the cycle reports `Failed` - one account can never abort
//! another account's cycles.

use anyhow::Context;
use std::path::PathBuf;

use crate::accounts::ManagedAccount;
use crate::capabilities::CapabilityRegistry;
use crate::config::Settings;
use crate::content::ContentToUpload;
use crate::ledger::Ledger;
use crate::sources;
use crate::utils::remove_files_from_folder;
use crate::Result;

/// Terminal outcome of one account cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Uploaded,
    NoContentAvailable,
    Failed,
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleOutcome::Uploaded => write!(f, "UPLOADED"),
            CycleOutcome::NoContentAvailable => write!(f, "NO_CONTENT_AVAILABLE"),
            CycleOutcome::Failed => write!(f, "FAILED"),
        }
    }
}

/// Main pipeline driving download, extraction, filtering and upload per account
pub struct Pipeline {
    settings: Settings,
    ledger: Ledger,
    registry: CapabilityRegistry,
}

impl Pipeline {
    pub fn new(settings: Settings, registry: CapabilityRegistry) -> Self {
        let ledger = Ledger::new(settings.paths.data_dir.clone());
        Self { settings, ledger, registry }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Create per-account directory structures and clean up artifacts a
    /// previous crash may have left behind. Called once at startup.
    pub fn prepare_accounts(&self, accounts: &[ManagedAccount]) -> Result<()> {
        fs_err::create_dir_all(&self.settings.paths.tmp_dir)?;
        for account in accounts {
            self.ledger.ensure_account_layout(account)?;
            let orphans = self
                .ledger
                .recover_orphans(account)
                .with_context(|| format!("Orphan recovery failed for account {}", account.name))?;
            if orphans > 0 {
                tracing::warn!(
                    "Recovered {} orphaned content files for account={}",
                    orphans,
                    account.name
                );
            }
        }
        tracing::info!("Default directory structure is created");
        Ok(())
    }

    /// Run one full cycle for the account. Never propagates faults; the
    /// outcome is always one of the three terminal states.
    pub async fn run_account_cycle(&self, account: &ManagedAccount) -> CycleOutcome {
        tracing::info!("Handling account={}", account.name);

        let outcome = match self.run_cycle_inner(account).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!("Cycle failed for account={}: {:#}", account.name, err);
                self.cleanup_tmp();
                CycleOutcome::Failed
            }
        };

        tracing::info!("Cycle outcome for account={}: {}", account.name, outcome);
        outcome
    }

    async fn run_cycle_inner(&self, account: &ManagedAccount) -> Result<CycleOutcome> {
        // CHECK_QUEUE: pending content short-circuits straight to UPLOAD
        if self.ledger.has_content_to_upload(account) {
            tracing::info!(
                "Account={} has pending content - skipping download",
                account.name
            );
        } else {
            tracing::info!("There is no new content to upload in {} account", account.name);
            self.download_phase(account).await?;
        }

        self.upload_phase(account).await
    }

    /// DOWNLOAD through ENQUEUE for every subscribed source, in catalog order.
    async fn download_phase(&self, account: &ManagedAccount) -> Result<()> {
        let catalog = sources::load_catalog(&self.settings.paths.sources_config)?;
        let account_sources = sources::resolve_for_account(&catalog, account);

        for source in &account_sources {
            let result = self.process_source(account, source).await;
            // The tmp area is cleared after every source, success or not
            self.cleanup_tmp();
            result.with_context(|| {
                format!("Processing source {} for account {}", source.name, account.name)
            })?;
        }

        Ok(())
    }

    /// Download one source's next unseen item, extract highlights, filter
    /// them and enqueue the results into the ledger.
    async fn process_source(&self, account: &ManagedAccount, source: &sources::Source) -> Result<()> {
        tracing::info!("Start downloading process for source={}", source.name);

        let Some(definer) = self.registry.find_definer(source.source_type) else {
            tracing::info!(
                "No download definer for source_type={} - skipping source={}",
                source.source_type.as_str(),
                source.name
            );
            return Ok(());
        };

        let Some(request) = definer.define_next(source, account, &self.ledger).await? else {
            // A source with nothing new is not an error
            return Ok(());
        };

        let Some(downloader) = self.registry.find_downloader(request.source_type) else {
            tracing::info!(
                "No downloader for source_type={} - skipping source={}",
                request.source_type.as_str(),
                source.name
            );
            return Ok(());
        };

        let download_dir = self.settings.paths.tmp_dir.clone();
        let Some(raw) = downloader.download(&request, &download_dir).await? else {
            tracing::warn!("Downloader produced no content for {}", request.url);
            return Ok(());
        };

        // Seen-marking is at-least-once download avoidance, deliberately not
        // transactional with extraction: a crash before ENQUEUE loses this
        // item instead of re-downloading it next cycle.
        self.ledger.mark_source_downloaded(account, &request.url)?;

        let result = self.extract_and_enqueue(account, source, &raw).await;
        // Raw media is consumed by extraction whether it succeeded or not
        raw.remove_media();
        result
    }

    async fn extract_and_enqueue(
        &self,
        account: &ManagedAccount,
        source: &sources::Source,
        raw: &crate::content::DownloadedRawContent,
    ) -> Result<()> {
        let Some(extractor) = self.registry.find_extractor(source.content_type) else {
            tracing::info!(
                "No highlights extractor for content_type={} - skipping source={}",
                source.content_type.as_str(),
                source.name
            );
            return Ok(());
        };

        let max_highlights = source
            .max_num_of_highlights
            .unwrap_or(self.settings.app.default_max_highlights);
        let destination = self.highlights_dir();
        fs_err::create_dir_all(&destination)?;

        let candidates = extractor.extract(raw, &destination, max_highlights).await?;
        if candidates.is_empty() {
            tracing::info!("No highlights found in content from source={}", source.name);
            return Ok(());
        }

        let filtered = self.apply_filters(account, candidates).await?;

        // ENQUEUE: temporary files become permanent and cids are assigned here
        self.ledger
            .append_new_content(account, filtered)
            .context("Failed to enqueue new content")?;

        Ok(())
    }

    /// Apply the account's ordered filter chain. An unknown filter id falls
    /// back to a logged no-op, never dropping content silently.
    async fn apply_filters(
        &self,
        account: &ManagedAccount,
        mut items: Vec<ContentToUpload>,
    ) -> Result<Vec<ContentToUpload>> {
        for filter_id in &account.filters {
            match self.registry.find_filter(filter_id) {
                Some(filter) => {
                    items = filter.apply(account, items).await?;
                }
                None => {
                    tracing::warn!(
                        "No filter registered for id={} - passing content through unchanged",
                        filter_id
                    );
                }
            }
        }
        Ok(items)
    }

    /// UPLOAD: attempt the oldest pending artifact, at most once per cycle.
    async fn upload_phase(&self, account: &ManagedAccount) -> Result<CycleOutcome> {
        let Some(content) = self.ledger.pop_oldest_pending(account) else {
            tracing::warn!(
                "There is still no content to upload even after downloading account={}",
                account.name
            );
            return Ok(CycleOutcome::NoContentAvailable);
        };

        let Some(uploader) = self.registry.find_uploader(account.account_type) else {
            tracing::warn!(
                "No uploader for account_type={} - content stays queued for account={}",
                account.account_type.as_str(),
                account.name
            );
            return Ok(CycleOutcome::Failed);
        };

        if uploader.upload(account, &content).await? {
            self.ledger.commit_uploaded(account, &content)?;
            Ok(CycleOutcome::Uploaded)
        } else {
            // Entry stays in the ledger; the next scheduled cycle retries it
            tracing::warn!(
                "Upload of cid={} failed for account={} - will retry next cycle",
                content.cid,
                account.name
            );
            Ok(CycleOutcome::Failed)
        }
    }

    fn highlights_dir(&self) -> PathBuf {
        self.settings.paths.tmp_dir.join("highlights")
    }

    fn cleanup_tmp(&self) {
        match remove_files_from_folder(&self.settings.paths.tmp_dir) {
            Ok(removed) if removed > 0 => {
                tracing::debug!("Removed {} temporary files", removed);
            }
            Ok(_) => {}
            Err(err) => tracing::warn!("Failed to clean tmp dir: {}", err),
        }
        if let Err(err) = remove_files_from_folder(&self.highlights_dir()) {
            tracing::warn!("Failed to clean highlights dir: {}", err);
        }
    }
}
