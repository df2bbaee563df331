use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;

use super::{DownloadDefiner, Downloader};
use crate::accounts::ManagedAccount;
use crate::content::{ContentToDownload, DownloadedRawContent, MediaFile, MediaType, RawContentKind};
use crate::ledger::Ledger;
use crate::sources::{Source, SourceType};
use crate::Result;

/// Definer for sources whose URL points directly at one media file.
/// The source URL itself is the item; it is selected once and then cached.
pub struct DirectUrlDefiner;

impl DirectUrlDefiner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DownloadDefiner for DirectUrlDefiner {
    async fn define_next(
        &self,
        source: &Source,
        account: &ManagedAccount,
        ledger: &Ledger,
    ) -> Result<Option<ContentToDownload>> {
        url::Url::parse(&source.url)
            .map_err(|_| anyhow::anyhow!("Invalid direct source URL: {}", source.url))?;

        if ledger.is_source_downloaded(account, &source.url) {
            tracing::info!(
                "Direct source={} already downloaded for account={}",
                source.name,
                account.name
            );
            return Ok(None);
        }

        Ok(Some(ContentToDownload {
            url: source.url.clone(),
            source_type: source.source_type,
            content_type: source.content_type,
        }))
    }

    fn supports(&self, source_type: SourceType) -> bool {
        source_type == SourceType::DirectUrl
    }

    fn name(&self) -> &'static str {
        "DirectUrlDefiner"
    }
}

impl Default for DirectUrlDefiner {
    fn default() -> Self {
        Self::new()
    }
}

/// Streams a direct media URL to disk with progress tracking.
pub struct DirectUrlDownloader;

impl DirectUrlDownloader {
    pub fn new() -> Self {
        Self
    }

    fn extension_from_url(url: &str) -> String {
        url::Url::parse(url)
            .ok()
            .and_then(|parsed| {
                parsed
                    .path_segments()
                    .and_then(|segments| segments.last().map(|s| s.to_string()))
            })
            .and_then(|last| {
                last.rsplit_once('.')
                    .map(|(_, ext)| ext.to_ascii_lowercase())
            })
            .filter(|ext| !ext.is_empty() && ext.len() <= 5)
            .unwrap_or_else(|| "mp4".to_string())
    }
}

#[async_trait]
impl Downloader for DirectUrlDownloader {
    async fn download(
        &self,
        request: &ContentToDownload,
        download_dir: &Path,
    ) -> Result<Option<DownloadedRawContent>> {
        let extension = Self::extension_from_url(&request.url);
        let output_path = download_dir.join(format!(
            "source_{}.{}",
            &uuid::Uuid::new_v4().to_string()[..8],
            extension
        ));

        tracing::info!("Downloading {} to {}", request.url, output_path.display());

        let response = reqwest::get(&request.url).await?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to download media: HTTP {}", response.status());
        }

        let total_size = response.content_length().unwrap_or(0);
        let progress = ProgressBar::new(total_size);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                .unwrap(),
        );
        progress.set_message("Downloading media...");

        let mut file = fs_err::File::create(&output_path)?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            progress.set_position(downloaded);
        }

        progress.finish_with_message("Download complete");

        let media_files = vec![MediaFile::new(output_path, MediaType::Video)];
        Ok(Some(DownloadedRawContent::new(media_files, RawContentKind::Video)))
    }

    fn supports(&self, source_type: SourceType) -> bool {
        source_type == SourceType::DirectUrl
    }

    fn name(&self) -> &'static str {
        "DirectUrlDownloader"
    }
}

impl Default for DirectUrlDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_url() {
        assert_eq!(
            DirectUrlDownloader::extension_from_url("https://cdn.example.com/v/clip.webm"),
            "webm"
        );
        assert_eq!(
            DirectUrlDownloader::extension_from_url("https://cdn.example.com/stream"),
            "mp4"
        );
        assert_eq!(
            DirectUrlDownloader::extension_from_url("https://cdn.example.com/a.MP4"),
            "mp4"
        );
    }
}
