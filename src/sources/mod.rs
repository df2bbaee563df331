use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::accounts::ManagedAccount;

/// Origin kind of a content source, selects the download definer/downloader pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    YoutubeChannel,
    DirectUrl,
    Unspecified,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::YoutubeChannel => "YOUTUBE_CHANNEL",
            SourceType::DirectUrl => "DIRECT_URL",
            SourceType::Unspecified => "UNSPECIFIED",
        }
    }
}

/// Kind of content a source produces, selects the highlight extraction policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    Interview,
    Unspecified,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Interview => "INTERVIEW",
            ContentType::Unspecified => "UNSPECIFIED",
        }
    }
}

/// Identity of a content origin. Immutable once loaded; the catalog is
/// re-read from the authoritative config file on every resolution pass and
/// never cached in memory across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_source_type")]
    pub source_type: SourceType,
    #[serde(default = "default_content_type")]
    pub content_type: ContentType,
    #[serde(default)]
    pub max_num_of_highlights: Option<usize>,
}

fn default_source_type() -> SourceType {
    SourceType::Unspecified
}

fn default_content_type() -> ContentType {
    ContentType::Unspecified
}

impl Source {
    /// Warn about suspicious catalog entries. An incomplete source is still
    /// constructed; the capability lookup downstream will skip it gracefully.
    fn warn_if_suspicious(&self) {
        if self.name.is_empty() {
            tracing::warn!("Source name is empty: are you sure you have a correct sources config?");
        } else if self.description.is_empty() {
            tracing::warn!("Source description is empty: are you sure you have a correct sources config?");
        } else if self.url.is_empty() {
            tracing::warn!("Source url is empty: are you sure you have a correct sources config?");
        } else if self.source_type == SourceType::Unspecified {
            tracing::warn!("Source source_type is UNSPECIFIED: are you sure you have a correct sources config?");
        } else if self.content_type == ContentType::Unspecified {
            tracing::warn!("Source content_type is UNSPECIFIED: are you sure you have a correct sources config?");
        }
    }
}

/// Load the global source catalog from its JSON config file.
pub fn load_catalog(path: &Path) -> Result<Vec<Source>> {
    let content = fs_err::read_to_string(path)
        .with_context(|| format!("Failed to read sources config {}", path.display()))?;
    let sources: Vec<Source> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse sources config {}", path.display()))?;

    for source in &sources {
        source.warn_if_suspicious();
    }

    Ok(sources)
}

/// Resolve an account's subscribed source names against the catalog.
///
/// Pure filter, evaluated in catalog order so reprocessing behavior stays
/// reproducible across runs.
pub fn resolve_for_account(catalog: &[Source], account: &ManagedAccount) -> Vec<Source> {
    catalog
        .iter()
        .filter(|source| account.sources.iter().any(|name| name == &source.name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::test_account;

    fn named_source(name: &str) -> Source {
        Source {
            name: name.to_string(),
            description: format!("{name} description"),
            url: format!("https://example.com/{name}"),
            source_type: SourceType::YoutubeChannel,
            content_type: ContentType::Interview,
            max_num_of_highlights: Some(3),
        }
    }

    #[test]
    fn test_resolve_keeps_catalog_order() {
        let catalog = vec![named_source("b"), named_source("a"), named_source("c")];
        let mut account = test_account("acc");
        account.sources = vec!["c".to_string(), "a".to_string()];

        let resolved = resolve_for_account(&catalog, &account);
        let names: Vec<_> = resolved.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_resolve_unknown_names_are_dropped() {
        let catalog = vec![named_source("a")];
        let mut account = test_account("acc");
        account.sources = vec!["missing".to_string()];

        assert!(resolve_for_account(&catalog, &account).is_empty());
    }

    #[test]
    fn test_load_catalog_parses_enums() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        fs_err::write(
            &path,
            r#"[{"name": "chan", "description": "d", "url": "https://youtube.com/@chan",
                 "source_type": "YOUTUBE_CHANNEL", "content_type": "INTERVIEW",
                 "max_num_of_highlights": 2}]"#,
        )
        .unwrap();

        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].source_type, SourceType::YoutubeChannel);
        assert_eq!(catalog[0].max_num_of_highlights, Some(2));
    }
}
