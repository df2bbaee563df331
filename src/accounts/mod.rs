use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Destination platform of a managed account, selects the uploader capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Tiktok,
    Unspecified,
}

impl AccountType {
    /// Directory segment for this account type under the data root.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Tiktok => "tiktok",
            AccountType::Unspecified => "unspecified",
        }
    }
}

/// Platform login material. Opaque to the core; concrete uploaders decide
/// what they need from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub login: Option<String>,
    pub password: Option<String>,
}

/// Optional network egress descriptor for upload automation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proxy {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Proxy {
    /// A proxy with any missing field is unusable as a whole.
    pub fn is_complete(&self) -> bool {
        self.user.is_some() && self.password.is_some() && self.host.is_some() && self.port.is_some()
    }
}

/// Posting cadence: every N days at a set of times of day ("HH:MM").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub every_days: u32,
    #[serde(rename = "at_time")]
    pub times: Vec<String>,
}

/// A destination content can be uploaded to.
///
/// Constructed once at process start from configuration and immutable for the
/// process lifetime. Each account owns an isolated on-disk directory
/// (`<data_dir>/<account_type>/<name>/`) for its ledger, credentials and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedAccount {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "accountType")]
    pub account_type: AccountType,
    #[serde(default)]
    pub credentials: Option<AccountCredentials>,
    #[serde(default)]
    pub proxy: Option<Proxy>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
}

impl ManagedAccount {
    /// Account-private directory under the data root.
    pub fn dir_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.account_type.as_str()).join(&self.name)
    }
}

impl std::fmt::Display for ManagedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.account_type.as_str())
    }
}

/// Load and validate managed-account definitions from the accounts JSON file.
///
/// Entries that cannot be coerced to the schema are skipped with a warning.
/// A shortfall between raw and constructed entries is surfaced loudly at
/// startup; zero constructible accounts is a hard error.
pub fn load_accounts(path: &Path) -> Result<Vec<ManagedAccount>> {
    let content = fs_err::read_to_string(path)
        .with_context(|| format!("Failed to read accounts config {}", path.display()))?;
    let raw_entries: Vec<serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse accounts config {}", path.display()))?;

    let mut accounts = Vec::new();
    for entry in &raw_entries {
        match serde_json::from_value::<ManagedAccount>(entry.clone()) {
            Ok(account) if account.name.is_empty() => {
                tracing::warn!("Skipping account entry with empty name");
            }
            Ok(account) => accounts.push(account),
            Err(err) => {
                tracing::warn!("Skipping unparseable account entry: {}", err);
            }
        }
    }

    if accounts.len() != raw_entries.len() {
        tracing::error!(
            "Constructed {} of {} configured accounts - check the accounts config",
            accounts.len(),
            raw_entries.len()
        );
    }

    if accounts.is_empty() {
        anyhow::bail!("No constructible accounts in {}", path.display());
    }

    Ok(accounts)
}

#[cfg(test)]
pub fn test_account(name: &str) -> ManagedAccount {
    ManagedAccount {
        name: name.to_string(),
        description: String::new(),
        url: String::new(),
        account_type: AccountType::Tiktok,
        credentials: None,
        proxy: None,
        schedule: None,
        sources: Vec::new(),
        filters: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_ENTRY: &str = r#"{
        "name": "daily-clips",
        "description": "test account",
        "url": "https://tiktok.com/@daily-clips",
        "accountType": "TIKTOK",
        "credentials": {"login": "user", "password": "pass"},
        "schedule": {"every_days": 1, "at_time": ["10:00", "18:30"]},
        "sources": ["chan-a"],
        "filters": ["tags"]
    }"#;

    fn write_accounts(entries: &[&str]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        fs_err::write(&path, format!("[{}]", entries.join(","))).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_accounts_valid_entry() {
        let (_dir, path) = write_accounts(&[VALID_ENTRY]);
        let accounts = load_accounts(&path).unwrap();
        assert_eq!(accounts.len(), 1);

        let account = &accounts[0];
        assert_eq!(account.name, "daily-clips");
        assert_eq!(account.account_type, AccountType::Tiktok);
        assert_eq!(account.schedule.as_ref().unwrap().times, vec!["10:00", "18:30"]);
        assert_eq!(account.filters, vec!["tags"]);
    }

    #[test]
    fn test_load_accounts_skips_invalid_entry() {
        let bad = r#"{"name": "broken", "accountType": "MYSPACE"}"#;
        let (_dir, path) = write_accounts(&[VALID_ENTRY, bad]);
        let accounts = load_accounts(&path).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "daily-clips");
    }

    #[test]
    fn test_load_accounts_all_invalid_is_error() {
        let bad = r#"{"accountType": "MYSPACE"}"#;
        let (_dir, path) = write_accounts(&[bad]);
        assert!(load_accounts(&path).is_err());
    }

    #[test]
    fn test_dir_path_layout() {
        let account = test_account("clips");
        assert_eq!(
            account.dir_path(Path::new("/data")),
            PathBuf::from("/data/tiktok/clips")
        );
    }
}
