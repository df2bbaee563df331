use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

use super::ContentFilter;
use crate::accounts::ManagedAccount;
use crate::content::ContentToUpload;
use crate::Result;

/// Filter that passes candidates through unchanged. Registered under the
/// "noop" id so accounts can request it explicitly; the orchestrator handles
/// unknown filter ids itself by logging and leaving the list untouched.
pub struct PassthroughFilter;

impl PassthroughFilter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentFilter for PassthroughFilter {
    async fn apply(
        &self,
        _account: &ManagedAccount,
        items: Vec<ContentToUpload>,
    ) -> Result<Vec<ContentToUpload>> {
        Ok(items)
    }

    fn id(&self) -> &'static str {
        "noop"
    }
}

impl Default for PassthroughFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Sets each candidate's caption to the account's configured tag string.
///
/// Tags live in a JSON map keyed by account name. A missing map file or a
/// missing account entry is a warning; candidates pass through unchanged.
pub struct TagsFilter {
    tags_config: PathBuf,
}

impl TagsFilter {
    pub fn new(tags_config: PathBuf) -> Self {
        Self { tags_config }
    }
}

#[async_trait]
impl ContentFilter for TagsFilter {
    async fn apply(
        &self,
        account: &ManagedAccount,
        mut items: Vec<ContentToUpload>,
    ) -> Result<Vec<ContentToUpload>> {
        if !self.tags_config.exists() {
            tracing::warn!(
                "Tags config does not exist: {} - skipping tags filter",
                self.tags_config.display()
            );
            return Ok(items);
        }

        let tags_map: HashMap<String, String> =
            crate::utils::read_json_or_default(&self.tags_config);

        let Some(tags) = tags_map.get(&account.name) else {
            tracing::warn!("Tags for account={} are not found", account.name);
            return Ok(items);
        };

        tracing::info!("Filter: adding tags to candidates for account={}", account.name);
        for item in &mut items {
            item.text = tags.clone();
        }

        Ok(items)
    }

    fn id(&self) -> &'static str {
        "tags"
    }
}
