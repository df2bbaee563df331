use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filename of the per-account pending-upload ledger
pub const CONTENT_TO_UPLOAD_CONFIG_FILENAME: &str = "contentToUploadConfig.json";
/// Per-account directory holding permanent media files referenced by the ledger
pub const CONTENT_DIR_NAME: &str = "contentToUpload";
/// Per-account directory holding platform credential material
pub const CREDS_DIR_NAME: &str = "creds";
/// Per-account directory holding the seen-source cache
pub const CACHE_DIR_NAME: &str = "cache";
/// Filename of the seen-source cache inside the cache directory
pub const DOWNLOADED_CONTENT_CACHE_FILENAME: &str = "downloadedContentCache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Filesystem layout
    pub paths: PathsConfig,

    /// External tools the default capabilities shell out to
    pub tools: ToolsConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root directory for per-account ledgers, credentials and content
    pub data_dir: PathBuf,

    /// Temporary area for in-flight downloads and extracted clips
    pub tmp_dir: PathBuf,

    /// Managed accounts catalog (JSON array)
    pub accounts_config: PathBuf,

    /// Source catalog (JSON array)
    pub sources_config: PathBuf,

    /// Per-account tag map used by the tags filter
    pub tags_config: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// yt-dlp binary used for YouTube listing and download
    pub yt_dlp_path: String,

    /// ffmpeg binary used for clip cutting
    pub ffmpeg_path: String,

    /// ffprobe binary used to measure source duration
    pub ffprobe_path: String,

    /// External uploader command invoked by the TikTok uploader
    pub tiktok_uploader_cmd: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Seconds between scheduler polls
    pub scheduler_poll_seconds: u64,

    /// Length of an extracted highlight clip in seconds
    pub clip_seconds: u32,

    /// Default highlight count when a source does not set its own limit
    pub default_max_highlights: usize,

    /// How many of a channel's latest items a definer inspects
    pub video_search_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                data_dir: PathBuf::from("./accounts_data"),
                tmp_dir: PathBuf::from("./tmp"),
                accounts_config: PathBuf::from("./configurations/accounts.json"),
                sources_config: PathBuf::from("./configurations/sources.json"),
                tags_config: PathBuf::from("./configurations/tags.json"),
            },
            tools: ToolsConfig {
                yt_dlp_path: "yt-dlp".to_string(),
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
                tiktok_uploader_cmd: "tiktok-uploader".to_string(),
            },
            app: AppConfig {
                scheduler_poll_seconds: 30,
                clip_seconds: 60,
                default_max_highlights: 5,
                video_search_depth: 10,
            },
        }
    }
}

impl Settings {
    /// Load settings from file or create the default one
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let settings: Settings = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            settings.validate()?;
            Ok(settings)
        } else {
            let settings = Self::default();
            settings.save()?;
            Ok(settings)
        }
    }

    /// Save settings to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("clipforge").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.paths.data_dir.as_os_str().is_empty() {
            anyhow::bail!("data_dir must be configured");
        }
        if self.paths.tmp_dir.as_os_str().is_empty() {
            anyhow::bail!("tmp_dir must be configured");
        }
        if self.app.clip_seconds == 0 {
            anyhow::bail!("clip_seconds must be greater than zero");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Data dir: {}", self.paths.data_dir.display());
        println!("  Tmp dir: {}", self.paths.tmp_dir.display());
        println!("  Accounts config: {}", self.paths.accounts_config.display());
        println!("  Sources config: {}", self.paths.sources_config.display());
        println!("  Clip length: {}s", self.app.clip_seconds);
        println!("  Scheduler poll: {}s", self.app.scheduler_poll_seconds);
    }

    #[cfg(test)]
    pub fn for_test_dir(root: &std::path::Path) -> Self {
        let mut settings = Self::default();
        settings.paths.data_dir = root.join("accounts_data");
        settings.paths.tmp_dir = root.join("tmp");
        settings.paths.accounts_config = root.join("accounts.json");
        settings.paths.sources_config = root.join("sources.json");
        settings.paths.tags_config = root.join("tags.json");
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_settings_yaml_roundtrip() {
        let settings = Settings::default();
        let yaml = serde_yaml::to_string(&settings).unwrap();
        let parsed: Settings = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.paths.data_dir, settings.paths.data_dir);
        assert_eq!(parsed.app.clip_seconds, settings.app.clip_seconds);
    }

    #[test]
    fn test_zero_clip_seconds_rejected() {
        let mut settings = Settings::default();
        settings.app.clip_seconds = 0;
        assert!(settings.validate().is_err());
    }
}
