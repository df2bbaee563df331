use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::HighlightsExtractor;
use crate::content::{ContentToUpload, DownloadedRawContent, MediaFile, MediaType};
use crate::sources::ContentType;
use crate::Result;

/// Cuts fixed-length highlight clips out of interview recordings with ffmpeg.
///
/// Clips are spaced evenly across the source so long interviews are sampled
/// throughout rather than only at the start. A transcription-and-scoring
/// extractor can replace this behind the same trait.
pub struct InterviewClipExtractor {
    ffmpeg_path: String,
    ffprobe_path: String,
    clip_seconds: u32,
}

impl InterviewClipExtractor {
    pub fn new(ffmpeg_path: String, ffprobe_path: String, clip_seconds: u32) -> Self {
        Self { ffmpeg_path, ffprobe_path, clip_seconds }
    }

    /// Measure source duration in seconds with ffprobe.
    async fn probe_duration(&self, video_path: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(video_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffprobe failed for {}: {}", video_path.display(), error);
        }

        let stdout = String::from_utf8(output.stdout)?;
        stdout
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow::anyhow!("ffprobe returned no duration for {}", video_path.display()))
    }

    async fn cut_clip(&self, source: &Path, start: f64, length: f64, output: &Path) -> Result<()> {
        let result = Command::new(&self.ffmpeg_path)
            .args(["-y", "-ss", &format!("{start:.2}"), "-t", &format!("{length:.2}"), "-i"])
            .arg(source)
            .args(["-c:v", "libx264", "-c:a", "aac"])
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !result.status.success() {
            let error = String::from_utf8_lossy(&result.stderr);
            anyhow::bail!("ffmpeg clip cut failed: {}", error);
        }

        Ok(())
    }

    /// Evenly spaced clip start offsets for a source of the given duration.
    fn clip_offsets(duration: f64, clip_seconds: f64, max_highlights: usize) -> Vec<f64> {
        if duration <= 0.0 || clip_seconds <= 0.0 || max_highlights == 0 {
            return Vec::new();
        }
        if duration <= clip_seconds {
            return vec![0.0];
        }

        let fitting = (duration / clip_seconds).floor() as usize;
        let count = fitting.min(max_highlights).max(1);
        let stride = (duration - clip_seconds) / count as f64;

        (0..count).map(|i| stride * i as f64).collect()
    }
}

#[async_trait]
impl HighlightsExtractor for InterviewClipExtractor {
    async fn extract(
        &self,
        raw: &DownloadedRawContent,
        destination: &Path,
        max_highlights: usize,
    ) -> Result<Vec<ContentToUpload>> {
        let Some(source_file) = raw.media_files.first() else {
            tracing::warn!("DownloadedRawContent has no media files to extract highlights from");
            return Ok(Vec::new());
        };

        if !source_file.path.exists() {
            anyhow::bail!("Source media file not found: {}", source_file.path.display());
        }

        fs_err::create_dir_all(destination)?;

        let duration = self.probe_duration(&source_file.path).await?;
        let clip_seconds = f64::from(self.clip_seconds);
        let offsets = Self::clip_offsets(duration, clip_seconds, max_highlights);

        tracing::info!(
            "Extracting {} highlights from {} ({}s source)",
            offsets.len(),
            source_file.path.display(),
            duration as u64
        );

        let mut candidates = Vec::new();
        for start in offsets {
            let length = clip_seconds.min(duration - start);
            let output_path = destination
                .join(format!("highlight_{}.mp4", &uuid::Uuid::new_v4().to_string()[..8]));

            self.cut_clip(&source_file.path, start, length, &output_path).await?;

            let media_file = MediaFile::new(output_path, MediaType::Video);
            candidates.push(ContentToUpload::candidate(vec![media_file], raw.text.clone()));
        }

        Ok(candidates)
    }

    fn supports(&self, content_type: ContentType) -> bool {
        content_type == ContentType::Interview
    }

    fn name(&self) -> &'static str {
        "InterviewClipExtractor"
    }
}
