use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::sources::{ContentType, SourceType};

/// Kind of a single media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Video,
    Audio,
    Image,
    Unspecified,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "VIDEO",
            MediaType::Audio => "AUDIO",
            MediaType::Image => "IMAGE",
            MediaType::Unspecified => "UNSPECIFIED",
        }
    }
}

/// A media file on disk. Owned by whichever content object references it,
/// there is no independent lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub mtype: MediaType,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>, mtype: MediaType) -> Self {
        Self { path: path.into(), mtype }
    }
}

/// A resolved download request produced by a download definer and consumed
/// immediately by a downloader. Never persisted.
#[derive(Debug, Clone)]
pub struct ContentToDownload {
    pub url: String,
    pub source_type: SourceType,
    pub content_type: ContentType,
}

/// Kind tag for raw downloaded content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawContentKind {
    Video,
    Unspecified,
}

/// Output of a successful download, owned exclusively by the pipeline run
/// that created it. Media files live in the temporary download area and must
/// be deleted once extraction has consumed them, whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct DownloadedRawContent {
    pub media_files: Vec<MediaFile>,
    pub kind: RawContentKind,
    pub text: String,
    pub extra: Option<serde_json::Value>,
}

impl DownloadedRawContent {
    pub fn new(media_files: Vec<MediaFile>, kind: RawContentKind) -> Self {
        Self { media_files, kind, text: String::new(), extra: None }
    }

    /// Best-effort removal of all referenced media files.
    pub fn remove_media(&self) {
        for media_file in &self.media_files {
            let removed = crate::utils::remove_file_logged(&media_file.path);
            tracing::debug!(
                "Removing raw media file {} | removed={}",
                media_file.path.display(),
                removed
            );
        }
    }
}

/// A unit of produced, upload-ready content.
///
/// `cid` is a monotonically increasing integer unique within an account. It is
/// both the sort key (oldest first) and the dequeue token. Candidates coming
/// out of an extractor carry `cid = 0`; the real value is assigned when the
/// ledger appends the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentToUpload {
    pub cid: u64,
    #[serde(rename = "mediaFiles")]
    pub media_files: Vec<MediaFile>,
    #[serde(default)]
    pub text: String,
}

impl ContentToUpload {
    pub fn candidate(media_files: Vec<MediaFile>, text: impl Into<String>) -> Self {
        Self { cid: 0, media_files, text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_to_upload_wire_format() {
        let content = ContentToUpload {
            cid: 3,
            media_files: vec![MediaFile::new("/data/mediaFile_1.mp4", MediaType::Video)],
            text: "caption".to_string(),
        };

        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["cid"], 3);
        assert_eq!(json["mediaFiles"][0]["path"], "/data/mediaFile_1.mp4");
        assert_eq!(json["mediaFiles"][0]["mtype"], "VIDEO");
        assert_eq!(json["text"], "caption");
    }

    #[test]
    fn test_content_to_upload_text_defaults_empty() {
        let parsed: ContentToUpload = serde_json::from_str(
            r#"{"cid": 1, "mediaFiles": [{"path": "a.mp4", "mtype": "VIDEO"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.text, "");
        assert_eq!(parsed.media_files[0].mtype, MediaType::Video);
    }
}
