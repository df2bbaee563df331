use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{DownloadDefiner, Downloader};
use crate::accounts::ManagedAccount;
use crate::content::{ContentToDownload, DownloadedRawContent, MediaFile, MediaType, RawContentKind};
use crate::ledger::Ledger;
use crate::sources::{Source, SourceType};
use crate::Result;

/// Picks the next not-yet-downloaded video of a YouTube channel using yt-dlp.
pub struct YoutubeDownloadDefiner {
    yt_dlp_path: String,
    search_depth: usize,
}

impl YoutubeDownloadDefiner {
    pub fn new(yt_dlp_path: String, search_depth: usize) -> Self {
        Self { yt_dlp_path, search_depth }
    }

    /// List the channel's latest video URLs, newest first.
    async fn latest_video_urls(&self, channel_url: &str) -> Result<Vec<String>> {
        tracing::debug!("Listing latest videos for channel: {}", channel_url);

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--flat-playlist",
                "--dump-json",
                "--playlist-end",
                &self.search_depth.to_string(),
                channel_url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp channel listing failed: {}", error);
        }

        // One JSON object per line; entries without a resolvable URL are skipped
        let stdout = String::from_utf8(output.stdout)?;
        let mut urls = Vec::new();
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            let info: Value = match serde_json::from_str(line) {
                Ok(info) => info,
                Err(err) => {
                    tracing::debug!("Skipping unparseable playlist line: {}", err);
                    continue;
                }
            };
            let url = info["webpage_url"]
                .as_str()
                .or_else(|| info["url"].as_str())
                .map(|s| s.to_string());
            if let Some(url) = url {
                urls.push(url);
            }
        }

        Ok(urls)
    }
}

#[async_trait]
impl DownloadDefiner for YoutubeDownloadDefiner {
    async fn define_next(
        &self,
        source: &Source,
        account: &ManagedAccount,
        ledger: &Ledger,
    ) -> Result<Option<ContentToDownload>> {
        let latest = self.latest_video_urls(&source.url).await?;

        let next_url = latest
            .into_iter()
            .find(|url| !ledger.is_source_downloaded(account, url));

        let Some(url) = next_url else {
            tracing::info!(
                "No new videos on source={} for account={}",
                source.name,
                account.name
            );
            return Ok(None);
        };

        tracing::info!("Defined content to download={} from source={}", url, source.name);
        Ok(Some(ContentToDownload {
            url,
            source_type: source.source_type,
            content_type: source.content_type,
        }))
    }

    fn supports(&self, source_type: SourceType) -> bool {
        source_type == SourceType::YoutubeChannel
    }

    fn name(&self) -> &'static str {
        "YoutubeDownloadDefiner"
    }
}

/// Downloads a single YouTube video as a merged mp4 using yt-dlp.
pub struct YoutubeDownloader {
    yt_dlp_path: String,
}

impl YoutubeDownloader {
    pub fn new(yt_dlp_path: String) -> Self {
        Self { yt_dlp_path }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> Result<bool> {
        let output = Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        Ok(matches!(output, Ok(out) if out.status.success()))
    }
}

#[async_trait]
impl Downloader for YoutubeDownloader {
    async fn download(
        &self,
        request: &ContentToDownload,
        download_dir: &Path,
    ) -> Result<Option<DownloadedRawContent>> {
        if !self.check_availability().await? {
            anyhow::bail!(
                "yt-dlp is not available. Please install it: https://github.com/yt-dlp/yt-dlp"
            );
        }

        let output_path =
            download_dir.join(format!("source_{}.mp4", &uuid::Uuid::new_v4().to_string()[..8]));

        tracing::info!("Downloading {} to {}", request.url, output_path.display());

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output",
                &output_path.to_string_lossy(),
                "--format",
                "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/b",
                "--merge-output-format",
                "mp4",
                "--no-playlist",
                "--newline",
                &request.url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp download failed: {}", error);
        }

        if !output_path.exists() {
            anyhow::bail!(
                "yt-dlp reported success but {} was not produced",
                output_path.display()
            );
        }

        let media_files = vec![MediaFile::new(output_path, MediaType::Video)];
        Ok(Some(DownloadedRawContent::new(media_files, RawContentKind::Video)))
    }

    fn supports(&self, source_type: SourceType) -> bool {
        source_type == SourceType::YoutubeChannel
    }

    fn name(&self) -> &'static str {
        "YoutubeDownloader"
    }
}
