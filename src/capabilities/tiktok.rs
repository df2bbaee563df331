use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::Uploader;
use crate::accounts::{AccountType, ManagedAccount};
use crate::config::CREDS_DIR_NAME;
use crate::content::{ContentToUpload, MediaType};
use crate::{PipelineError, Result};

/// Cookie file expected inside the account's creds directory
const TIKTOK_COOKIES_FILENAME: &str = "cookies.txt";

/// Uploads a single video to TikTok by shelling out to an external uploader
/// command. Browser automation itself stays outside the core; this capability
/// only owns validation, credential lookup and the invocation contract:
///
/// `<cmd> --video <path> --caption <text> --cookies <cookies.txt> [--proxy user:pass@host:port]`
pub struct TiktokUploader {
    command: String,
    data_dir: PathBuf,
}

impl TiktokUploader {
    pub fn new(command: String, data_dir: PathBuf) -> Self {
        Self { command, data_dir }
    }

    fn cookies_path(&self, account: &ManagedAccount) -> PathBuf {
        account
            .dir_path(&self.data_dir)
            .join(CREDS_DIR_NAME)
            .join(TIKTOK_COOKIES_FILENAME)
    }

    fn validate_media_files(&self, content: &ContentToUpload) -> bool {
        for media_file in &content.media_files {
            if !media_file.path.exists() {
                tracing::warn!("MediaFile {} does not exist", media_file.path.display());
                return false;
            }
        }
        true
    }

    fn proxy_arg(account: &ManagedAccount) -> Option<String> {
        let proxy = account.proxy.as_ref()?;
        if !proxy.is_complete() {
            tracing::warn!(
                "Proxy for account={} is incomplete - uploading without proxy",
                account.name
            );
            return None;
        }
        Some(format!(
            "{}:{}@{}:{}",
            proxy.user.as_deref().unwrap_or_default(),
            proxy.password.as_deref().unwrap_or_default(),
            proxy.host.as_deref().unwrap_or_default(),
            proxy.port.unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl Uploader for TiktokUploader {
    async fn upload(&self, account: &ManagedAccount, content: &ContentToUpload) -> Result<bool> {
        if !self.validate_media_files(content) {
            return Ok(false);
        }

        let Some(media_file) = content.media_files.first() else {
            tracing::error!("Requested to upload content to TikTok but no media files attached");
            return Ok(false);
        };
        if content.media_files.len() > 1 {
            tracing::warn!(
                "Multiple media files per TikTok upload are not supported yet - taking the first one"
            );
        }
        if media_file.mtype != MediaType::Video {
            tracing::error!("Media type {} is not supported for TikTok upload", media_file.mtype.as_str());
            return Ok(false);
        }

        let cookies = self.cookies_path(account);
        if !cookies.exists() {
            return Err(PipelineError::MissingCredentials(format!(
                "TikTok cookies file not found for account {}: {}",
                account.name,
                cookies.display()
            ))
            .into());
        }

        tracing::info!(
            "Uploading video {} to TikTok account={}",
            media_file.path.display(),
            account.name
        );

        let mut command = Command::new(&self.command);
        command
            .arg("--video")
            .arg(&media_file.path)
            .arg("--caption")
            .arg(&content.text)
            .arg("--cookies")
            .arg(&cookies);

        if let Some(proxy) = Self::proxy_arg(account) {
            command.arg("--proxy").arg(proxy);
        }

        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            tracing::warn!("TikTok uploader command failed: {}", error);
            return Ok(false);
        }

        tracing::info!("Video successfully uploaded to account={}", account.name);
        Ok(true)
    }

    fn supports(&self, account_type: AccountType) -> bool {
        account_type == AccountType::Tiktok
    }

    fn name(&self) -> &'static str {
        "TiktokUploader"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{test_account, Proxy};
    use crate::content::MediaFile;

    #[tokio::test]
    async fn test_upload_fails_closed_on_missing_media() {
        let uploader = TiktokUploader::new("true".to_string(), PathBuf::from("/tmp"));
        let content = ContentToUpload {
            cid: 1,
            media_files: vec![MediaFile::new("/nonexistent/clip.mp4", MediaType::Video)],
            text: String::new(),
        };
        let result = uploader.upload(&test_account("acc"), &content).await.unwrap();
        assert!(!result);
    }

    #[tokio::test]
    async fn test_upload_errors_on_missing_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        fs_err::write(&video, "bytes").unwrap();

        let uploader = TiktokUploader::new("true".to_string(), dir.path().to_path_buf());
        let content = ContentToUpload {
            cid: 1,
            media_files: vec![MediaFile::new(video, MediaType::Video)],
            text: String::new(),
        };

        let err = uploader.upload(&test_account("acc"), &content).await.unwrap_err();
        assert!(err.to_string().contains("cookies"));
    }

    #[test]
    fn test_proxy_arg_requires_complete_proxy() {
        let mut account = test_account("acc");
        account.proxy = Some(Proxy {
            user: Some("u".to_string()),
            password: Some("p".to_string()),
            host: Some("proxy.example.com".to_string()),
            port: Some(8080),
        });
        assert_eq!(
            TiktokUploader::proxy_arg(&account).unwrap(),
            "u:p@proxy.example.com:8080"
        );

        account.proxy.as_mut().unwrap().host = None;
        assert!(TiktokUploader::proxy_arg(&account).is_none());
    }
}
