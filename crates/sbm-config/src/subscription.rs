//! Subscription metadata records and their file-backed store.
//!
//! A subscription owns the configuration document it generates: removing
//! the record also deletes the generated file and its backup.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::fsio;

/// Where a subscription's content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionOrigin {
    /// Fetched from a remote URL on refresh.
    Url(String),
    /// Pasted by the user; `manual_content` holds the payload.
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: String,
    pub name: String,
    pub origin: SubscriptionOrigin,
    #[serde(default)]
    pub manual_content: String,
    /// Skip node extraction and keep the fetched document verbatim
    /// (apart from the port overlay).
    #[serde(default)]
    pub use_original_config: bool,
    /// Generated configuration document.
    pub config_path: PathBuf,
    /// Backup written after each successful generation.
    pub backup_path: PathBuf,
    /// Refresh cadence in minutes; 0 disables scheduled refresh.
    #[serde(default)]
    pub refresh_interval_min: u32,
    #[serde(default)]
    pub usage: UsageCounters,
    /// Unix timestamp of plan expiry, when the provider reports one.
    #[serde(default)]
    pub expire_at: Option<u64>,
}

/// Quota counters parsed from the provider's `subscription-userinfo`
/// header: `upload=..; download=..; total=..; expire=..`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    #[serde(default)]
    pub upload: u64,
    #[serde(default)]
    pub download: u64,
    #[serde(default)]
    pub total: u64,
}

impl UsageCounters {
    /// Parse the header value; unknown fields are ignored. Returns the
    /// counters plus the optional expiry timestamp.
    pub fn parse_header(value: &str) -> (Self, Option<u64>) {
        let mut counters = Self::default();
        let mut expire = None;
        for part in value.split(';') {
            let Some((k, v)) = part.split_once('=') else {
                continue;
            };
            let Ok(n) = v.trim().parse::<u64>() else {
                continue;
            };
            match k.trim() {
                "upload" => counters.upload = n,
                "download" => counters.download = n,
                "total" => counters.total = n,
                "expire" => expire = Some(n),
                _ => {}
            }
        }
        (counters, expire)
    }
}

/// JSON-file store for subscription records.
#[derive(Debug)]
pub struct SubscriptionStore {
    path: PathBuf,
    items: Vec<SubscriptionInfo>,
}

impl SubscriptionStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let items = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| ConfigError::parse(format!("subscription store: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, items })
    }

    pub fn list(&self) -> &[SubscriptionInfo] {
        &self.items
    }

    pub fn find(&self, name: &str) -> Option<&SubscriptionInfo> {
        self.items.iter().find(|s| s.name == name || s.id == name)
    }

    /// Add a record; names must be unique.
    pub fn add(&mut self, info: SubscriptionInfo) -> Result<(), ConfigError> {
        if self.items.iter().any(|s| s.name == info.name) {
            return Err(ConfigError::invalid(format!(
                "subscription '{}' already exists",
                info.name
            )));
        }
        debug!(name = %info.name, "adding subscription");
        self.items.push(info);
        self.save()
    }

    /// Replace an existing record matched by id.
    pub fn update(&mut self, info: SubscriptionInfo) -> Result<(), ConfigError> {
        let slot = self
            .items
            .iter_mut()
            .find(|s| s.id == info.id)
            .ok_or_else(|| ConfigError::NotFound(info.name.clone()))?;
        *slot = info;
        self.save()
    }

    /// Remove the record and delete its generated config plus backup.
    pub fn remove(&mut self, name: &str) -> Result<(), ConfigError> {
        let idx = self
            .items
            .iter()
            .position(|s| s.name == name || s.id == name)
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))?;
        let info = self.items.remove(idx);
        self.save()?;
        for path in [&info.config_path, &info.backup_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "generated file cleanup failed"),
            }
        }
        Ok(())
    }

    /// Record the provider-reported quota after a refresh.
    pub fn record_usage(
        &mut self,
        name: &str,
        usage: UsageCounters,
        expire_at: Option<u64>,
    ) -> Result<(), ConfigError> {
        let slot = self
            .items
            .iter_mut()
            .find(|s| s.name == name || s.id == name)
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))?;
        slot.usage = usage;
        if expire_at.is_some() {
            slot.expire_at = expire_at;
        }
        self.save()
    }

    fn save(&self) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(&self.items)
            .map_err(|e| ConfigError::parse(e.to_string()))?;
        fsio::write_atomic(&self.path, text.as_bytes())?;
        Ok(())
    }
}

/// Generate a subscription id from its name plus a timestamp suffix.
pub fn new_subscription_id(name: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("{slug}-{nanos:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(dir: &Path, name: &str) -> SubscriptionInfo {
        let config_path = dir.join(format!("{name}.json"));
        SubscriptionInfo {
            id: new_subscription_id(name),
            name: name.into(),
            origin: SubscriptionOrigin::Manual,
            manual_content: String::new(),
            use_original_config: false,
            backup_path: fsio::backup_path(&config_path),
            config_path,
            refresh_interval_min: 0,
            usage: UsageCounters::default(),
            expire_at: None,
        }
    }

    #[test]
    fn userinfo_header_parses_counters_and_expiry() {
        let (usage, expire) =
            UsageCounters::parse_header("upload=123; download=456; total=789; expire=1700000000");
        assert_eq!(usage.upload, 123);
        assert_eq!(usage.download, 456);
        assert_eq!(usage.total, 789);
        assert_eq!(expire, Some(1_700_000_000));

        let (usage, expire) = UsageCounters::parse_header("download=1; bogus; foo=bar");
        assert_eq!(usage.download, 1);
        assert_eq!(expire, None);
    }

    #[test]
    fn remove_deletes_generated_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SubscriptionStore::open(dir.path().join("subs.json")).unwrap();
        let sub = info(dir.path(), "prov");
        fs::write(&sub.config_path, b"{}").unwrap();
        fs::write(&sub.backup_path, b"{}").unwrap();
        let config_path = sub.config_path.clone();
        let backup_path = sub.backup_path.clone();
        store.add(sub).unwrap();

        store.remove("prov").unwrap();
        assert!(!config_path.exists());
        assert!(!backup_path.exists());
        assert!(store.find("prov").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SubscriptionStore::open(dir.path().join("subs.json")).unwrap();
        store.add(info(dir.path(), "a")).unwrap();
        assert!(store.add(info(dir.path(), "a")).is_err());
    }
}
