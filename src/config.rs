use std::{fs, path::PathBuf, sync::Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_MERCHANT_NAME: &str = "Institute Events";
const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config mutex poisoned")]
    Poisoned,
    #[error("unknown config key: {0}")]
    UnknownKey(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub upload_base_url: Option<String>,
    pub payment_key: Option<String>,
    pub merchant_name: String,
    pub currency: String,
    pub site_base_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            upload_base_url: None,
            payment_key: None,
            merchant_name: DEFAULT_MERCHANT_NAME.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            site_base_url: None,
        }
    }
}

impl AppConfig {
    /// Prefix that relative event images are rebased onto.
    pub fn upload_base(&self) -> String {
        self.upload_base_url
            .clone()
            .unwrap_or_else(|| utils::join_url(&self.api_base_url, "uploads"))
    }

    /// Applies `API_BASE_URL`, `UPLOAD_BASE_URL`, `PAYMENT_KEY` and `SITE_BASE_URL`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(value) = non_empty("API_BASE_URL") {
            self.api_base_url = value;
        }
        if let Some(value) = non_empty("UPLOAD_BASE_URL") {
            self.upload_base_url = Some(value);
        }
        if let Some(value) = non_empty("PAYMENT_KEY") {
            self.payment_key = Some(value);
        }
        if let Some(value) = non_empty("SITE_BASE_URL") {
            self.site_base_url = Some(value);
        }
        self
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let optional = |value: &str| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };
        match key {
            "api_base_url" => self.api_base_url = value.trim().to_string(),
            "upload_base_url" => self.upload_base_url = optional(value),
            "payment_key" => self.payment_key = optional(value),
            "merchant_name" => self.merchant_name = value.trim().to_string(),
            "currency" => self.currency = value.trim().to_uppercase(),
            "site_base_url" => self.site_base_url = optional(value),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: Mutex<AppConfig>,
}

impl ConfigStore {
    pub fn load() -> Self {
        Self::load_from(utils::config_path())
    }

    pub fn load_from(path: PathBuf) -> Self {
        let data = match read_config(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("ignoring unreadable config {}: {err}", path.display());
                AppConfig::default()
            }
        };
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn read(&self) -> AppConfig {
        match self.data.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update<F>(&self, transform: F) -> Result<AppConfig, ConfigError>
    where
        F: FnOnce(&mut AppConfig) -> Result<(), ConfigError>,
    {
        let mut guard = self.data.lock().map_err(|_| ConfigError::Poisoned)?;
        let mut next = guard.clone();
        transform(&mut next)?;
        write_config(&self.path, &next)?;
        *guard = next;
        Ok(guard.clone())
    }
}

fn read_config(path: &PathBuf) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_config(path: &PathBuf, config: &AppConfig) -> Result<(), ConfigError> {
    utils::ensure_parent(path)?;
    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("event-checkout-test-{}-{name}", std::process::id()))
            .join("config.json")
    }

    #[test]
    fn upload_base_defaults_to_api_uploads() {
        let config = AppConfig {
            api_base_url: "https://api.test/api/".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.upload_base(), "https://api.test/api/uploads");
    }

    #[test]
    fn env_overrides_skip_blank_values() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("API_BASE_URL", "https://prod.test"), ("PAYMENT_KEY", "  ")]);
        let config = AppConfig::default()
            .with_overrides(|name| vars.get(name).map(|value| value.to_string()));
        assert_eq!(config.api_base_url, "https://prod.test");
        assert_eq!(config.payment_key, None);
    }

    #[test]
    fn set_rejects_unknown_keys() {
        let mut config = AppConfig::default();
        config.set("currency", "usd").expect("known key");
        assert_eq!(config.currency, "USD");
        assert!(matches!(
            config.set("colour", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn update_persists_and_reloads() {
        let path = scratch_path("persist");
        let store = ConfigStore::load_from(path.clone());
        store
            .update(|config| config.set("payment_key", "rzp_test_123"))
            .expect("update config");

        let reloaded = ConfigStore::load_from(path.clone());
        assert_eq!(reloaded.read().payment_key.as_deref(), Some("rzp_test_123"));
        let _ = fs::remove_dir_all(path.parent().expect("scratch dir"));
    }

    #[test]
    fn failed_update_leaves_config_untouched() {
        let path = scratch_path("failed");
        let store = ConfigStore::load_from(path.clone());
        let before = store.read();
        assert!(store.update(|config| config.set("nope", "x")).is_err());
        assert_eq!(store.read(), before);
        assert!(!path.exists());
    }
}
