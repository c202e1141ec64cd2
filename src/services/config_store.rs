// Configuration Storage Service
// Handles config file read/write and version backup

use crate::models::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

fn io_err(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError {
    let path = path.to_path_buf();
    move |source| ConfigError::Io { action, path, source }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub default_language: Language,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub https: Option<String>,
}

impl ProxyConfig {
    pub fn active_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.https.as_deref().filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Lightweight model for ordinary text scans.
    #[serde(default = "default_text_model")]
    pub text_model: String,
    /// Heavier model used when a deep scan is requested.
    #[serde(default = "default_deep_model")]
    pub deep_model: String,
    /// Image-capable model; does not accept a response schema.
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Blend local rule-based signals into text verdicts.
    #[serde(default = "default_true")]
    pub heuristics: bool,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            text_model: default_text_model(),
            deep_model: default_deep_model(),
            image_model: default_image_model(),
            timeout_secs: default_timeout_secs(),
            heuristics: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySettings {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_base_url() -> String { GEMINI_DEFAULT_URL.to_string() }
fn default_text_model() -> String { "gemini-3-flash-preview".to_string() }
fn default_deep_model() -> String { "gemini-3-pro-preview".to_string() }
fn default_image_model() -> String { "gemini-2.5-flash-image".to_string() }
fn default_timeout_secs() -> u64 { 60 }
fn default_true() -> bool { true }
fn default_history_capacity() -> usize { 100 }
fn default_preview_chars() -> usize { 200 }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("scamshield"))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Location of the persisted scan history.
    pub fn history_file(&self) -> PathBuf {
        self.config_dir.join("history.json")
    }

    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir).map_err(io_err("create", &self.config_dir))
    }

    /// Load configuration from file; a missing file yields defaults.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content =
            fs::read_to_string(&self.config_file).map_err(io_err("read", &self.config_file))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content).map_err(io_err("write", &self.config_file))
    }

    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir).map_err(io_err("create", &backup_dir))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file).map_err(io_err("back up", &self.config_file))?;

        self.cleanup_old_backups(&backup_dir, 10)
    }

    /// Remove old backups, keeping only the most recent `keep`
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(io_err("read", backup_dir))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Names embed the timestamp, so lexical order is chronological
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, ConfigError> {
        let config = self.load()?;
        Ok(config
            .api_keys
            .get(provider)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty()))
    }

    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    pub fn delete_api_key(&self, provider: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.classifier.text_model, "gemini-3-flash-preview");
        assert_eq!(config.classifier.image_model, "gemini-2.5-flash-image");
        assert_eq!(config.history.capacity, 100);
        assert_eq!(config.default_language, Language::En);
        assert!(config.classifier.heuristics);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"classifier": {"deepModel": "custom-pro"}, "defaultLanguage": "es"}"#)
                .unwrap();
        assert_eq!(parsed.classifier.deep_model, "custom-pro");
        assert_eq!(parsed.classifier.text_model, "gemini-3-flash-preview");
        assert_eq!(parsed.classifier.timeout_secs, 60);
        assert_eq!(parsed.default_language, Language::Es);
        assert_eq!(parsed.history.preview_chars, 200);
    }

    #[test]
    fn test_save_load_and_backups() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("scamshield"));

        assert!(store.get_api_key("gemini").unwrap().is_none());
        store.set_api_key("gemini", " key-123 ").unwrap();
        assert_eq!(store.get_api_key("gemini").unwrap().as_deref(), Some("key-123"));

        // Second save backs up the first file
        store.delete_api_key("gemini").unwrap();
        assert!(store.get_api_key("gemini").unwrap().is_none());
        assert!(store.config_dir().join("backups").exists());
    }

    #[test]
    fn test_set_api_key_keeps_other_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("scamshield"));

        let mut config = AppConfig::default();
        config.classifier.deep_model = "custom-pro".to_string();
        config.default_language = Language::Fr;
        store.save(&config).unwrap();

        store.set_api_key("gemini", "key-456").unwrap();
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.classifier.deep_model, "custom-pro");
        assert_eq!(reloaded.default_language, Language::Fr);
        assert_eq!(store.get_api_key("gemini").unwrap().as_deref(), Some("key-456"));
        assert!(store.config_file().exists());
    }

    #[test]
    fn test_proxy_active_url() {
        let proxy = ProxyConfig { enabled: false, https: Some("http://proxy:8080".to_string()) };
        assert!(proxy.active_url().is_none());
        let proxy = ProxyConfig { enabled: true, ..proxy };
        assert_eq!(proxy.active_url(), Some("http://proxy:8080"));
    }
}
