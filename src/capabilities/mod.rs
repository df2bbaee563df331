use async_trait::async_trait;
use std::path::Path;

pub mod clips;
pub mod direct;
pub mod filters;
pub mod tiktok;
pub mod youtube;

use crate::accounts::{AccountType, ManagedAccount};
use crate::config::Settings;
use crate::content::{ContentToDownload, ContentToUpload, DownloadedRawContent};
use crate::ledger::Ledger;
use crate::sources::{ContentType, Source, SourceType};
use crate::Result;

/// Picks the next not-yet-seen item for a source.
///
/// `Ok(None)` means the source has nothing new, which is not an error.
#[async_trait]
pub trait DownloadDefiner: Send + Sync {
    async fn define_next(
        &self,
        source: &Source,
        account: &ManagedAccount,
        ledger: &Ledger,
    ) -> Result<Option<ContentToDownload>>;

    /// Check if this definer handles the given source type
    fn supports(&self, source_type: SourceType) -> bool;

    /// Get the name of this definer
    fn name(&self) -> &'static str;
}

/// Downloads a resolved request into the temporary processing area.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        request: &ContentToDownload,
        download_dir: &Path,
    ) -> Result<Option<DownloadedRawContent>>;

    /// Check if this downloader handles the given source type
    fn supports(&self, source_type: SourceType) -> bool;

    /// Get the name of this downloader
    fn name(&self) -> &'static str;
}

/// Turns raw downloaded content into zero or more upload candidates, keyed by
/// the source's content type. An empty result is not a failure.
#[async_trait]
pub trait HighlightsExtractor: Send + Sync {
    async fn extract(
        &self,
        raw: &DownloadedRawContent,
        destination: &Path,
        max_highlights: usize,
    ) -> Result<Vec<ContentToUpload>>;

    /// Check if this extractor handles the given content type
    fn supports(&self, content_type: ContentType) -> bool;

    /// Get the name of this extractor
    fn name(&self) -> &'static str;
}

/// Post-processes the full candidate list; may mutate captions or media in
/// place or pass through unchanged.
#[async_trait]
pub trait ContentFilter: Send + Sync {
    async fn apply(
        &self,
        account: &ManagedAccount,
        items: Vec<ContentToUpload>,
    ) -> Result<Vec<ContentToUpload>>;

    /// Identifier this filter is requested by in account configs
    fn id(&self) -> &'static str;
}

/// Uploads one artifact to its destination account. `Ok(false)` is a platform
/// rejection; the caller keeps the ledger entry for a retry next cycle.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, account: &ManagedAccount, content: &ContentToUpload) -> Result<bool>;

    /// Check if this uploader handles the given account type
    fn supports(&self, account_type: AccountType) -> bool;

    /// Get the name of this uploader
    fn name(&self) -> &'static str;
}

/// Registry mapping source/content/account discriminants to concrete
/// capability implementations at runtime.
///
/// A lookup miss is not an error: it signals the type is not (yet) supported
/// and the caller skips that unit of work with a log entry.
pub struct CapabilityRegistry {
    definers: Vec<Box<dyn DownloadDefiner>>,
    downloaders: Vec<Box<dyn Downloader>>,
    extractors: Vec<Box<dyn HighlightsExtractor>>,
    filters: Vec<Box<dyn ContentFilter>>,
    uploaders: Vec<Box<dyn Uploader>>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            definers: Vec::new(),
            downloaders: Vec::new(),
            extractors: Vec::new(),
            filters: Vec::new(),
            uploaders: Vec::new(),
        }
    }

    /// Create a registry with the default platform capabilities
    pub fn with_defaults(settings: &Settings) -> Self {
        let mut registry = Self::new();

        registry.register_definer(Box::new(youtube::YoutubeDownloadDefiner::new(
            settings.tools.yt_dlp_path.clone(),
            settings.app.video_search_depth,
        )));
        registry.register_downloader(Box::new(youtube::YoutubeDownloader::new(
            settings.tools.yt_dlp_path.clone(),
        )));
        registry.register_definer(Box::new(direct::DirectUrlDefiner::new()));
        registry.register_downloader(Box::new(direct::DirectUrlDownloader::new()));
        registry.register_extractor(Box::new(clips::InterviewClipExtractor::new(
            settings.tools.ffmpeg_path.clone(),
            settings.tools.ffprobe_path.clone(),
            settings.app.clip_seconds,
        )));
        registry.register_filter(Box::new(filters::PassthroughFilter::new()));
        registry.register_filter(Box::new(filters::TagsFilter::new(
            settings.paths.tags_config.clone(),
        )));
        registry.register_uploader(Box::new(tiktok::TiktokUploader::new(
            settings.tools.tiktok_uploader_cmd.clone(),
            settings.paths.data_dir.clone(),
        )));

        registry
    }

    pub fn register_definer(&mut self, definer: Box<dyn DownloadDefiner>) {
        self.definers.push(definer);
    }

    pub fn register_downloader(&mut self, downloader: Box<dyn Downloader>) {
        self.downloaders.push(downloader);
    }

    pub fn register_extractor(&mut self, extractor: Box<dyn HighlightsExtractor>) {
        self.extractors.push(extractor);
    }

    pub fn register_filter(&mut self, filter: Box<dyn ContentFilter>) {
        self.filters.push(filter);
    }

    pub fn register_uploader(&mut self, uploader: Box<dyn Uploader>) {
        self.uploaders.push(uploader);
    }

    pub fn find_definer(&self, source_type: SourceType) -> Option<&dyn DownloadDefiner> {
        self.definers
            .iter()
            .find(|definer| definer.supports(source_type))
            .map(|boxed| boxed.as_ref())
    }

    pub fn find_downloader(&self, source_type: SourceType) -> Option<&dyn Downloader> {
        self.downloaders
            .iter()
            .find(|downloader| downloader.supports(source_type))
            .map(|boxed| boxed.as_ref())
    }

    pub fn find_extractor(&self, content_type: ContentType) -> Option<&dyn HighlightsExtractor> {
        self.extractors
            .iter()
            .find(|extractor| extractor.supports(content_type))
            .map(|boxed| boxed.as_ref())
    }

    pub fn find_filter(&self, filter_id: &str) -> Option<&dyn ContentFilter> {
        self.filters
            .iter()
            .find(|filter| filter.id() == filter_id)
            .map(|boxed| boxed.as_ref())
    }

    pub fn find_uploader(&self, account_type: AccountType) -> Option<&dyn Uploader> {
        self.uploaders
            .iter()
            .find(|uploader| uploader.supports(account_type))
            .map(|boxed| boxed.as_ref())
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_lookups() {
        let settings = Settings::default();
        let registry = CapabilityRegistry::with_defaults(&settings);

        assert!(registry.find_definer(SourceType::YoutubeChannel).is_some());
        assert!(registry.find_downloader(SourceType::YoutubeChannel).is_some());
        assert!(registry.find_definer(SourceType::DirectUrl).is_some());
        assert!(registry.find_extractor(ContentType::Interview).is_some());
        assert!(registry.find_filter("noop").is_some());
        assert!(registry.find_filter("tags").is_some());
        assert!(registry.find_uploader(AccountType::Tiktok).is_some());
    }

    #[test]
    fn test_lookup_miss_is_none() {
        let settings = Settings::default();
        let registry = CapabilityRegistry::with_defaults(&settings);

        assert!(registry.find_definer(SourceType::Unspecified).is_none());
        assert!(registry.find_extractor(ContentType::Unspecified).is_none());
        assert!(registry.find_filter("nonexistent").is_none());
        assert!(registry.find_uploader(AccountType::Unspecified).is_none());
    }
}
