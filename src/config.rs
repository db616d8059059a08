//! User settings persisted as JSON under the platform config directory.

use crate::history::{History, HistoryEntry};
use crate::recognition::{ApiCredentials, DEFAULT_ENDPOINT};
use crate::temp_files::{MAX_SWEEP_INTERVAL, MIN_SWEEP_INTERVAL};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

pub const APP_DIR: &str = "sniptex";
pub const SETTINGS_FILE: &str = "settings.json";
pub const ENV_APP_ID: &str = "SNIPTEX_APP_ID";
pub const ENV_APP_SECRET: &str = "SNIPTEX_APP_SECRET";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Settings I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No platform config directory available")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_id: String,
    pub app_secret: String,
    pub endpoint: String,
    pub capture_shortcut: String,
    pub sweep_interval_secs: u64,
    pub history: History,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            capture_shortcut: "Alt+C".to_string(),
            sweep_interval_secs: MAX_SWEEP_INTERVAL.as_secs(),
            history: History::default(),
        }
    }
}

impl AppConfig {
    pub fn credentials(&self) -> ApiCredentials {
        ApiCredentials {
            app_id: self.app_id.clone(),
            app_secret: self.app_secret.clone(),
            endpoint: self.endpoint.clone(),
        }
    }

    /// Sweep cadence, clamped to the allowed window.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
    }
}

/// `<config_dir>/sniptex/settings.json`
pub fn settings_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join(SETTINGS_FILE))
        .ok_or(ConfigError::NoConfigDir)
}

/// Reads credentials from a settings file, if it holds a complete pair.
pub fn load_credentials(path: &Path) -> Option<ApiCredentials> {
    let contents = fs::read_to_string(path).ok()?;
    let config: AppConfig = match serde_json::from_str(&contents) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("[CONFIG] Ignoring unreadable {}: {}", path.display(), e);
            return None;
        }
    };
    Some(config.credentials()).filter(ApiCredentials::is_complete)
}

/// Fills blank id/secret from `lookup` (the process environment in production).
pub fn apply_env_overrides(
    mut credentials: ApiCredentials,
    lookup: impl Fn(&str) -> Option<String>,
) -> ApiCredentials {
    if credentials.app_id.trim().is_empty() {
        if let Some(id) = lookup(ENV_APP_ID) {
            credentials.app_id = id;
        }
    }
    if credentials.app_secret.trim().is_empty() {
        if let Some(secret) = lookup(ENV_APP_SECRET) {
            credentials.app_secret = secret;
        }
    }
    credentials
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppConfig>,
}

impl SettingsStore {
    /// Loads the settings file, writing a default one if it does not exist.
    pub fn open(path: PathBuf) -> Result<Self, ConfigError> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            log::info!("[CONFIG] Creating default settings at {}", path.display());
            let data = AppConfig::default();
            write_config(&path, &data)?;
            data
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> AppConfig {
        self.read(|c| c.clone())
    }

    /// Stored credentials with blank fields filled from the environment.
    pub fn credentials(&self) -> ApiCredentials {
        let stored = self.read(AppConfig::credentials);
        apply_env_overrides(stored, |key| std::env::var(key).ok())
    }

    pub fn update_credentials(&self, credentials: ApiCredentials) -> Result<(), ConfigError> {
        self.update(|c| {
            c.app_id = credentials.app_id.trim().to_string();
            c.app_secret = credentials.app_secret.trim().to_string();
            c.endpoint = match credentials.endpoint.trim() {
                "" => DEFAULT_ENDPOINT.to_string(),
                e => e.to_string(),
            };
        })?;
        log::info!("[CONFIG] API credentials updated");
        Ok(())
    }

    pub fn capture_shortcut(&self) -> String {
        self.read(|c| c.capture_shortcut.clone())
    }

    pub fn sweep_interval(&self) -> Duration {
        self.read(AppConfig::sweep_interval)
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.read(|c| c.history.entries().to_vec())
    }

    /// Records a recognized formula; persists only when the list changed.
    pub fn record_history(&self, markup: &str) -> Result<bool, ConfigError> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        if !next.history.record(markup, Utc::now()) {
            return Ok(false);
        }
        write_config(&self.path, &next)?;
        log::info!("[HISTORY] {} entries", next.history.len());
        *guard = next;
        Ok(true)
    }

    pub fn clear_history(&self) -> Result<(), ConfigError> {
        self.update(|c| c.history.clear())
    }

    /// Re-reads the file, discarding in-memory state.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        let data: AppConfig = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }

    fn read<R>(&self, f: impl FnOnce(&AppConfig) -> R) -> R {
        f(&self.data.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Persists the changed config first; memory only changes once the
    /// write succeeded.
    fn update(&self, f: impl FnOnce(&mut AppConfig)) -> Result<(), ConfigError> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        f(&mut next);
        write_config(&self.path, &next)?;
        *guard = next;
        Ok(())
    }
}

fn write_config(path: &Path, data: &AppConfig) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let serialized = serde_json::to_string_pretty(data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, serialized).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::open(dir.path().join(APP_DIR).join(SETTINGS_FILE)).unwrap()
    }

    #[test]
    fn open_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.path().exists());

        let on_disk: AppConfig =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk, AppConfig::default());
        assert_eq!(on_disk.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(store.capture_shortcut(), "Alt+C");
    }

    #[test]
    fn credentials_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .update_credentials(ApiCredentials::new(" id ", " secret "))
            .unwrap();

        let loaded = load_credentials(store.path()).unwrap();
        assert_eq!(loaded.app_id, "id");
        assert_eq!(loaded.app_secret, "secret");
        assert_eq!(loaded.endpoint, DEFAULT_ENDPOINT);

        let reopened = SettingsStore::open(store.path().to_path_buf()).unwrap();
        assert_eq!(reopened.snapshot().app_id, "id");
    }

    #[test]
    fn load_credentials_rejects_incomplete_or_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_credentials(&dir.path().join("nope.json")).is_none());

        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{"app_id":"id","app_secret":"  "}"#).unwrap();
        assert!(load_credentials(&path).is_none());

        fs::write(&path, "not json").unwrap();
        assert!(load_credentials(&path).is_none());
    }

    #[test]
    fn env_fills_only_blank_fields() {
        let env = |key: &str| match key {
            ENV_APP_ID => Some("env-id".to_string()),
            ENV_APP_SECRET => Some("env-secret".to_string()),
            _ => None,
        };
        let filled = apply_env_overrides(ApiCredentials::new("", "file-secret"), env);
        assert_eq!(filled.app_id, "env-id");
        assert_eq!(filled.app_secret, "file-secret");

        let untouched = apply_env_overrides(ApiCredentials::new("", ""), |_| None);
        assert!(!untouched.is_complete());
    }

    #[test]
    fn history_persists_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.record_history("x^2").unwrap());
        assert!(!store.record_history("x^2").unwrap());
        assert!(store.record_history("y").unwrap());

        let reopened = SettingsStore::open(store.path().to_path_buf()).unwrap();
        let markups: Vec<_> = reopened.history().into_iter().map(|e| e.markup).collect();
        assert_eq!(markups, ["y", "x^2"]);

        reopened.clear_history().unwrap();
        store.reload().unwrap();
        assert!(store.history().is_empty());
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let app_dir = dir.path().join(APP_DIR);
        fs::remove_dir_all(&app_dir).unwrap();
        fs::write(&app_dir, b"not a directory").unwrap();

        assert!(store
            .update_credentials(ApiCredentials::new("id", "secret"))
            .is_err());
        assert_eq!(store.snapshot(), AppConfig::default());

        assert!(store.record_history("x^2").is_err());
        assert!(store.history().is_empty());
    }

    #[test]
    fn sweep_interval_is_clamped() {
        let mut config = AppConfig::default();
        assert_eq!(config.sweep_interval(), MAX_SWEEP_INTERVAL);
        config.sweep_interval_secs = 10;
        assert_eq!(config.sweep_interval(), MIN_SWEEP_INTERVAL);
        config.sweep_interval_secs = 86_400;
        assert_eq!(config.sweep_interval(), MAX_SWEEP_INTERVAL);
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ broken").unwrap();
        assert!(matches!(
            SettingsStore::open(path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
