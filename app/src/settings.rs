//! Application settings file and on-disk layout.
//!
//! Everything lives under `data_dir`: the active configuration document,
//! the rule-set store, the subscription registry and per-subscription
//! generated configs. A missing settings file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sbm_config::OverlaySettings;

#[derive(Debug, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub overlay: OverlaySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            overlay: OverlaySettings::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("sbm-data")
}

impl AppSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let settings = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("settings file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e).with_context(|| format!("settings file {}", path.display())),
        };
        Ok(settings)
    }

    /// Create the data directories if absent.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.subs_dir())
            .with_context(|| format!("creating {}", self.subs_dir().display()))?;
        Ok(())
    }

    pub fn active_config(&self) -> PathBuf {
        self.data_dir.join("active-config.json")
    }

    pub fn rule_sets(&self) -> PathBuf {
        self.data_dir.join("rule-sets.json")
    }

    pub fn subscriptions(&self) -> PathBuf {
        self.data_dir.join("subscriptions.json")
    }

    pub fn subs_dir(&self) -> PathBuf {
        self.data_dir.join("subs")
    }

    pub fn sub_config(&self, id: &str) -> PathBuf {
        self.subs_dir().join(format!("{id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = AppSettings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(s.data_dir, PathBuf::from("sbm-data"));
        assert_eq!(s.overlay.mixed_port, 2080);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "overlay": { "mixed_port": 7890 } }"#).unwrap();
        let s = AppSettings::load(&path).unwrap();
        assert_eq!(s.overlay.mixed_port, 7890);
        assert_eq!(s.overlay.api_port, 9090);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(AppSettings::load(&path).is_err());
    }
}
