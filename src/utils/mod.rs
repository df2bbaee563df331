use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Read a JSON file, failing open to the type's default on a missing or
/// corrupt file. Used for ledger and cache reads where stale-but-valid state
/// beats aborting the whole run.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match fs_err::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Failed to parse JSON in {}: {} - treating as empty", path.display(), err);
                T::default()
            }
        },
        Err(_) => T::default(),
    }
}

/// Write a value as pretty JSON atomically: serialize to a sibling temp file,
/// then rename over the destination. A reader never observes a partial write.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize JSON for {}", path.display()))?;

    let tmp_name = format!(
        ".{}.{}.tmp",
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        &uuid::Uuid::new_v4().to_string()[..8]
    );
    let tmp_path = path.with_file_name(tmp_name);

    fs_err::write(&tmp_path, content)
        .with_context(|| format!("Failed to write temp file {}", tmp_path.display()))?;
    fs_err::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}

/// Create a file with the given content only if it does not exist yet.
pub fn create_file_if_not_exists(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, content)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(())
}

/// Remove a file, logging rather than failing on error. Returns whether the
/// file was actually removed.
pub fn remove_file_logged(path: &Path) -> bool {
    match fs_err::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
        Err(err) => {
            tracing::warn!("Failed to remove {}: {}", path.display(), err);
            false
        }
    }
}

/// Remove all regular files directly inside a folder, skipping hidden files
/// and subdirectories. Used to clear the temporary download area between
/// pipeline runs.
pub fn remove_files_from_folder(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let hidden = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(false);
        if hidden || !path.is_file() {
            continue;
        }
        if remove_file_logged(&path) {
            removed += 1;
        }
    }

    Ok(removed)
}

/// Check if the current environment has the external tools the default
/// capabilities shell out to, using the configured commands.
pub async fn check_dependencies(tools: &crate::config::ToolsConfig) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_tool_available(&tools.yt_dlp_path, "--version").await {
        missing.push(format!(
            "{} - required for YouTube source downloads",
            tools.yt_dlp_path
        ));
    }

    if !check_tool_available(&tools.ffmpeg_path, "-version").await {
        missing.push(format!(
            "{} - required for highlight clip extraction",
            tools.ffmpeg_path
        ));
    }

    missing
}

async fn check_tool_available(command: &str, version_flag: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(version_flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        values: Vec<u64>,
    }

    #[test]
    fn test_read_json_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Sample = read_json_or_default(&dir.path().join("nope.json"));
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_read_json_or_default_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs_err::write(&path, "{not json").unwrap();
        let loaded: Sample = read_json_or_default(&path);
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_write_json_atomic_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        let sample = Sample { values: vec![1, 2, 3] };

        write_json_atomic(&path, &sample).unwrap();
        let loaded: Sample = read_json_or_default(&path);
        assert_eq!(loaded, sample);

        // No temp file left behind
        let leftovers: Vec<_> = fs_err::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_create_file_if_not_exists_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        create_file_if_not_exists(&path, "[]").unwrap();
        fs_err::write(&path, "[1]").unwrap();
        create_file_if_not_exists(&path, "[]").unwrap();

        assert_eq!(fs_err::read_to_string(&path).unwrap(), "[1]");
    }

    #[test]
    fn test_remove_files_from_folder_skips_dirs_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("a.mp4"), "x").unwrap();
        fs_err::write(dir.path().join(".hidden"), "x").unwrap();
        fs_err::create_dir(dir.path().join("sub")).unwrap();

        let removed = remove_files_from_folder(dir.path()).unwrap();
        assert_eq!(removed, 1);
        assert!(dir.path().join(".hidden").exists());
        assert!(dir.path().join("sub").exists());
    }

    #[tokio::test]
    async fn test_check_dependencies_uses_configured_commands() {
        let tools = crate::config::ToolsConfig {
            // `true` ignores its arguments and exits 0, standing in for an
            // available tool at a non-default path
            yt_dlp_path: "true".to_string(),
            ffmpeg_path: "clipforge-test-no-such-tool".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            tiktok_uploader_cmd: "tiktok-uploader".to_string(),
        };

        let missing = check_dependencies(&tools).await;
        assert_eq!(missing.len(), 1);
        assert!(missing[0].contains("clipforge-test-no-such-tool"));
    }
}
