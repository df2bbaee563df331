//! Persistent content ledger: durable, crash-consistent storage of what has
//! been downloaded and what is waiting to be uploaded, scoped per account.
//!
//! Two files per account, both plain JSON arrays:
//! - `contentToUploadConfig.json` - pending-upload entries sorted by callers on read
//! - `cache/downloadedContentCache.json` - seen source URLs, append-only
//!
//! Reads fail open to an empty list; writes go through a temp-file-then-rename
//! replace so a reader never observes a partially written ledger. `cid` and
//! media-id counters are derived by scanning current ledger contents for their
//! maxima, never stored separately, which keeps append replayable after a
//! crash mid-way.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::accounts::ManagedAccount;
use crate::config::{
    CACHE_DIR_NAME, CONTENT_DIR_NAME, CONTENT_TO_UPLOAD_CONFIG_FILENAME, CREDS_DIR_NAME,
    DOWNLOADED_CONTENT_CACHE_FILENAME,
};
use crate::content::ContentToUpload;
use crate::utils::{create_file_if_not_exists, read_json_or_default, remove_file_logged, write_json_atomic};

pub struct Ledger {
    data_dir: PathBuf,
}

impl Ledger {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn account_dir(&self, account: &ManagedAccount) -> PathBuf {
        account.dir_path(&self.data_dir)
    }

    fn upload_config_path(&self, account: &ManagedAccount) -> PathBuf {
        self.account_dir(account).join(CONTENT_TO_UPLOAD_CONFIG_FILENAME)
    }

    fn content_dir(&self, account: &ManagedAccount) -> PathBuf {
        self.account_dir(account).join(CONTENT_DIR_NAME)
    }

    /// Directory holding platform credential material for this account.
    pub fn creds_dir(&self, account: &ManagedAccount) -> PathBuf {
        self.account_dir(account).join(CREDS_DIR_NAME)
    }

    fn seen_cache_path(&self, account: &ManagedAccount) -> PathBuf {
        self.account_dir(account).join(CACHE_DIR_NAME).join(DOWNLOADED_CONTENT_CACHE_FILENAME)
    }

    /// Create the per-account directory structure and empty state files.
    /// Idempotent; called for every account at startup.
    pub fn ensure_account_layout(&self, account: &ManagedAccount) -> Result<()> {
        let dir = self.account_dir(account);
        fs_err::create_dir_all(dir.join(CREDS_DIR_NAME))?;
        fs_err::create_dir_all(dir.join(CONTENT_DIR_NAME))?;
        fs_err::create_dir_all(dir.join(CACHE_DIR_NAME))?;
        create_file_if_not_exists(&self.upload_config_path(account), "[]")?;
        create_file_if_not_exists(&self.seen_cache_path(account), "[]")?;
        Ok(())
    }

    fn read_entries(&self, account: &ManagedAccount) -> Vec<ContentToUpload> {
        read_json_or_default(&self.upload_config_path(account))
    }

    /// True iff the account's pending-upload ledger is non-empty.
    pub fn has_content_to_upload(&self, account: &ManagedAccount) -> bool {
        !self.read_entries(account).is_empty()
    }

    /// Return the pending entry with the smallest cid without removing it.
    ///
    /// Removal happens only after upload confirmation via [`commit_uploaded`],
    /// so an upload failure after this read cannot lose the item.
    ///
    /// [`commit_uploaded`]: Ledger::commit_uploaded
    pub fn pop_oldest_pending(&self, account: &ManagedAccount) -> Option<ContentToUpload> {
        self.read_entries(account).into_iter().min_by_key(|entry| entry.cid)
    }

    /// Delete an uploaded entry's media files and rewrite the ledger without
    /// the matching cid. Idempotent: tolerates the entry already being absent,
    /// and individual file-removal errors are logged, not fatal.
    pub fn commit_uploaded(&self, account: &ManagedAccount, content: &ContentToUpload) -> Result<()> {
        for media_file in &content.media_files {
            let removed = remove_file_logged(&media_file.path);
            tracing::info!(
                "Removing uploaded media file {} | removed={}",
                media_file.path.display(),
                removed
            );
        }

        let entries = self.read_entries(account);
        let remaining: Vec<ContentToUpload> =
            entries.into_iter().filter(|entry| entry.cid != content.cid).collect();

        write_json_atomic(&self.upload_config_path(account), &remaining)
            .with_context(|| format!("Failed to rewrite ledger for account {}", account.name))?;

        Ok(())
    }

    /// Allocate cids for newly produced content, move its media files from the
    /// temporary processing area into the account's permanent content
    /// directory, and rewrite the ledger to include the updated paths.
    ///
    /// Any file-move failure aborts before the ledger write, so the ledger is
    /// never left referencing files that were not moved. Returns the entries
    /// as persisted (with their assigned cids and final paths).
    pub fn append_new_content(
        &self,
        account: &ManagedAccount,
        new_items: Vec<ContentToUpload>,
    ) -> Result<Vec<ContentToUpload>> {
        if new_items.is_empty() {
            return Ok(Vec::new());
        }

        let mut entries = self.read_entries(account);
        let mut next_cid = entries.iter().map(|e| e.cid).max().unwrap_or(0) + 1;
        let mut next_media_id = max_media_id(&entries) + 1;

        let content_dir = self.content_dir(account);
        fs_err::create_dir_all(&content_dir)?;

        let mut appended = Vec::new();
        for mut item in new_items {
            item.cid = next_cid;
            next_cid += 1;

            for media_file in &mut item.media_files {
                let extension = media_file
                    .path
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_default();
                let permanent_path = content_dir.join(format!("mediaFile_{next_media_id}{extension}"));
                next_media_id += 1;

                move_file(&media_file.path, &permanent_path).with_context(|| {
                    format!(
                        "Failed to move {} into content dir of account {}",
                        media_file.path.display(),
                        account.name
                    )
                })?;
                media_file.path = permanent_path;
            }

            appended.push(item);
        }

        entries.extend(appended.iter().cloned());
        write_json_atomic(&self.upload_config_path(account), &entries)
            .with_context(|| format!("Failed to rewrite ledger for account {}", account.name))?;

        tracing::info!(
            "Appended {} new entries to ledger of account={}",
            appended.len(),
            account.name
        );
        Ok(appended)
    }

    /// Append a source URL to the account's seen cache. Append-only: once a
    /// URL is cached, that account never re-selects it for download.
    pub fn mark_source_downloaded(&self, account: &ManagedAccount, source_url: &str) -> Result<()> {
        let path = self.seen_cache_path(account);
        let mut seen: Vec<String> = read_json_or_default(&path);
        seen.push(source_url.to_string());

        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        write_json_atomic(&path, &seen)
            .with_context(|| format!("Failed to update seen cache for account {}", account.name))?;
        Ok(())
    }

    /// Membership check against the seen cache.
    pub fn is_source_downloaded(&self, account: &ManagedAccount, source_url: &str) -> bool {
        let seen: Vec<String> = read_json_or_default(&self.seen_cache_path(account));
        seen.iter().any(|url| url == source_url)
    }

    /// Delete content-directory files referenced by no ledger entry.
    ///
    /// A crash between a media-file move and the ledger rewrite leaves an
    /// orphaned file whose media id the scan-based allocator could otherwise
    /// reuse. Run once per account at startup.
    pub fn recover_orphans(&self, account: &ManagedAccount) -> Result<usize> {
        let content_dir = self.content_dir(account);
        if !content_dir.is_dir() {
            return Ok(0);
        }

        let referenced: HashSet<PathBuf> = self
            .read_entries(account)
            .iter()
            .flat_map(|entry| entry.media_files.iter().map(|m| m.path.clone()))
            .collect();

        let mut removed = 0;
        for entry in fs_err::read_dir(&content_dir)? {
            let path = entry?.path();
            if path.is_file() && !referenced.contains(&path) {
                tracing::warn!(
                    "Removing orphaned content file {} for account={}",
                    path.display(),
                    account.name
                );
                if remove_file_logged(&path) {
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

/// Largest media id referenced by any ledger entry, derived from the
/// `mediaFile_<id>` filename convention. 0 when none.
fn max_media_id(entries: &[ContentToUpload]) -> u64 {
    entries
        .iter()
        .flat_map(|entry| entry.media_files.iter())
        .filter_map(|media_file| parse_media_id(&media_file.path))
        .max()
        .unwrap_or(0)
}

/// Move a file, falling back to copy-then-remove when rename crosses a
/// filesystem boundary (tmp dir and data dir may be on different mounts).
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs_err::rename(from, to).is_ok() {
        return Ok(());
    }
    fs_err::copy(from, to)?;
    fs_err::remove_file(from)?;
    Ok(())
}

fn parse_media_id(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_string_lossy();
    stem.strip_prefix("mediaFile_")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::test_account;
    use crate::content::{MediaFile, MediaType};

    struct Fixture {
        _tmp: tempfile::TempDir,
        root: PathBuf,
        ledger: Ledger,
        account: ManagedAccount,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let ledger = Ledger::new(root.join("accounts_data"));
        let account = test_account("clips");
        ledger.ensure_account_layout(&account).unwrap();
        Fixture { _tmp: tmp, root, ledger, account }
    }

    fn staged_candidate(fx: &Fixture, name: &str, text: &str) -> ContentToUpload {
        let staging = fx.root.join("tmp");
        fs_err::create_dir_all(&staging).unwrap();
        let path = staging.join(name);
        fs_err::write(&path, "video-bytes").unwrap();
        ContentToUpload::candidate(vec![MediaFile::new(path, MediaType::Video)], text)
    }

    #[test]
    fn test_append_assigns_monotonic_cids() {
        let fx = fixture();

        let first = fx
            .ledger
            .append_new_content(&fx.account, vec![staged_candidate(&fx, "a.mp4", "")])
            .unwrap();
        assert_eq!(first[0].cid, 1);

        let second = fx
            .ledger
            .append_new_content(
                &fx.account,
                vec![staged_candidate(&fx, "b.mp4", ""), staged_candidate(&fx, "c.mp4", "")],
            )
            .unwrap();
        assert_eq!(second[0].cid, 2);
        assert_eq!(second[1].cid, 3);

        let cids: Vec<u64> = fx.ledger.read_entries(&fx.account).iter().map(|e| e.cid).collect();
        let mut unique = cids.clone();
        unique.dedup();
        assert_eq!(cids, unique);
    }

    #[test]
    fn test_cid_allocation_rescans_after_commit() {
        let fx = fixture();

        fx.ledger
            .append_new_content(&fx.account, vec![staged_candidate(&fx, "a.mp4", "")])
            .unwrap();
        let oldest = fx.ledger.pop_oldest_pending(&fx.account).unwrap();
        fx.ledger.commit_uploaded(&fx.account, &oldest).unwrap();

        // Ledger is empty again; the scan finds no existing cids
        let appended = fx
            .ledger
            .append_new_content(&fx.account, vec![staged_candidate(&fx, "b.mp4", "")])
            .unwrap();
        assert_eq!(appended[0].cid, 1); // scan of an empty ledger restarts at 1
    }

    #[test]
    fn test_append_moves_files_into_content_dir() {
        let fx = fixture();
        let candidate = staged_candidate(&fx, "raw_clip.mp4", "caption");
        let original_path = candidate.media_files[0].path.clone();

        let appended = fx.ledger.append_new_content(&fx.account, vec![candidate]).unwrap();

        assert!(!original_path.exists());
        let new_path = &appended[0].media_files[0].path;
        assert!(new_path.exists());
        assert_eq!(new_path.file_name().unwrap().to_string_lossy(), "mediaFile_1.mp4");
        assert!(new_path.starts_with(fx.ledger.content_dir(&fx.account)));
    }

    #[test]
    fn test_media_ids_derived_from_ledger_scan() {
        let fx = fixture();
        fx.ledger
            .append_new_content(&fx.account, vec![staged_candidate(&fx, "a.mp4", "")])
            .unwrap();
        let second = fx
            .ledger
            .append_new_content(&fx.account, vec![staged_candidate(&fx, "b.mp4", "")])
            .unwrap();
        assert_eq!(
            second[0].media_files[0].path.file_name().unwrap().to_string_lossy(),
            "mediaFile_2.mp4"
        );
    }

    #[test]
    fn test_pop_oldest_returns_min_cid_without_removal() {
        let fx = fixture();
        fx.ledger
            .append_new_content(
                &fx.account,
                vec![staged_candidate(&fx, "a.mp4", "first"), staged_candidate(&fx, "b.mp4", "second")],
            )
            .unwrap();

        let oldest = fx.ledger.pop_oldest_pending(&fx.account).unwrap();
        assert_eq!(oldest.cid, 1);
        assert_eq!(oldest.text, "first");

        // Not removed until commit
        assert_eq!(fx.ledger.read_entries(&fx.account).len(), 2);
    }

    #[test]
    fn test_commit_removes_entry_and_media() {
        let fx = fixture();
        fx.ledger
            .append_new_content(&fx.account, vec![staged_candidate(&fx, "a.mp4", "")])
            .unwrap();
        let oldest = fx.ledger.pop_oldest_pending(&fx.account).unwrap();

        fx.ledger.commit_uploaded(&fx.account, &oldest).unwrap();

        assert!(!fx.ledger.has_content_to_upload(&fx.account));
        assert!(!oldest.media_files[0].path.exists());
    }

    #[test]
    fn test_commit_is_idempotent() {
        let fx = fixture();
        fx.ledger
            .append_new_content(&fx.account, vec![staged_candidate(&fx, "a.mp4", "")])
            .unwrap();
        let oldest = fx.ledger.pop_oldest_pending(&fx.account).unwrap();

        fx.ledger.commit_uploaded(&fx.account, &oldest).unwrap();
        fx.ledger.commit_uploaded(&fx.account, &oldest).unwrap();

        assert!(!fx.ledger.has_content_to_upload(&fx.account));
    }

    #[test]
    fn test_seen_cache_membership() {
        let fx = fixture();
        assert!(!fx.ledger.is_source_downloaded(&fx.account, "url1"));

        fx.ledger.mark_source_downloaded(&fx.account, "url1").unwrap();
        assert!(fx.ledger.is_source_downloaded(&fx.account, "url1"));

        // Duplicate marks keep membership true
        fx.ledger.mark_source_downloaded(&fx.account, "url1").unwrap();
        assert!(fx.ledger.is_source_downloaded(&fx.account, "url1"));
        assert!(!fx.ledger.is_source_downloaded(&fx.account, "url2"));
    }

    #[test]
    fn test_corrupt_ledger_reads_as_empty() {
        let fx = fixture();
        fs_err::write(fx.ledger.upload_config_path(&fx.account), "{broken").unwrap();

        assert!(!fx.ledger.has_content_to_upload(&fx.account));
        assert!(fx.ledger.pop_oldest_pending(&fx.account).is_none());
    }

    #[test]
    fn test_recover_orphans_removes_unreferenced_files() {
        let fx = fixture();
        let kept = fx
            .ledger
            .append_new_content(&fx.account, vec![staged_candidate(&fx, "a.mp4", "")])
            .unwrap();

        // Simulate a crash between file move and ledger rewrite
        let orphan = fx.ledger.content_dir(&fx.account).join("mediaFile_9.mp4");
        fs_err::write(&orphan, "stranded").unwrap();

        let removed = fx.ledger.recover_orphans(&fx.account).unwrap();
        assert_eq!(removed, 1);
        assert!(!orphan.exists());
        assert!(kept[0].media_files[0].path.exists());
    }

    #[test]
    fn test_ledger_file_stays_valid_json_array() {
        let fx = fixture();
        fx.ledger
            .append_new_content(&fx.account, vec![staged_candidate(&fx, "a.mp4", "")])
            .unwrap();

        let raw = fs_err::read_to_string(fx.ledger.upload_config_path(&fx.account)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.is_array());
    }
}
