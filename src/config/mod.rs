pub mod cli;
pub mod toml_config;

use crate::config::toml_config::TomlConfig;
use crate::core::client::{DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS};
use crate::utils::error::{FdcError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

pub use cli::LocalStorage;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;
/// 快取存活時間上限：十年
pub const MAX_CACHE_TTL_SECS: u64 = 10 * 365 * 86_400;
pub const DEFAULT_CACHE_DIR: &str = "./.fdc-cache";

/// 用戶端與快取設定；優先順序：CLI 參數 > 環境變數 > TOML > 預設值
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: u64,
    pub cache_dir: String,
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .field("cache_enabled", &self.cache_enabled)
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .field("cache_dir", &self.cache_dir)
            .field("database_url", &self.database_url)
            .finish()
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            cache_enabled: true,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECS,
            cache_dir: DEFAULT_CACHE_DIR.to_string(),
            database_url: None,
        }
    }
}

impl ClientSettings {
    /// 預設值加上 `FDC_*` 環境變數
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_env()?;
        Ok(settings)
    }

    /// 預設值、TOML 檔（若有）再加上環境變數
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(path) = config_path {
            let toml = TomlConfig::from_file(path)?;
            toml.validate()?;
            settings.apply_toml(&toml);
        }
        settings.apply_env()?;
        Ok(settings)
    }

    pub fn apply_toml(&mut self, config: &TomlConfig) {
        if let Some(api) = &config.api {
            if let Some(key) = &api.key {
                self.api_key = Some(key.clone());
            }
            if let Some(base_url) = &api.base_url {
                self.base_url = base_url.clone();
            }
            if let Some(timeout) = api.timeout_seconds {
                self.timeout_seconds = timeout;
            }
            if let Some(retries) = api.max_retries {
                self.max_retries = retries;
            }
        }

        if let Some(cache) = &config.cache {
            if let Some(enabled) = cache.enabled {
                self.cache_enabled = enabled;
            }
            if let Some(ttl) = cache.ttl_seconds {
                self.cache_ttl_seconds = ttl;
            }
            if let Some(dir) = &cache.dir {
                self.cache_dir = dir.clone();
            }
            if let Some(url) = &cache.database_url {
                self.database_url = Some(url.clone());
            }
        }
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(key) = env_string("FDC_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(base_url) = env_string("FDC_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(timeout) = env_parse("FDC_TIMEOUT")? {
            self.timeout_seconds = timeout;
        }
        if let Some(retries) = env_parse("FDC_MAX_RETRIES")? {
            self.max_retries = retries;
        }
        if let Some(raw) = env_string("FDC_CACHE_ENABLED") {
            self.cache_enabled = parse_bool("FDC_CACHE_ENABLED", &raw)?;
        }
        if let Some(ttl) = env_parse("FDC_CACHE_TIMEOUT")? {
            self.cache_ttl_seconds = ttl;
        }
        if let Some(dir) = env_string("FDC_CACHE_DIR") {
            self.cache_dir = dir;
        }
        if let Some(url) = env_string("FDC_DATABASE_URL") {
            self.database_url = Some(url);
        }
        Ok(())
    }

    /// CLI 參數覆寫
    pub fn with_overrides(mut self, api_key: Option<String>, base_url: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(base_url) = base_url {
            self.base_url = base_url;
        }
        self
    }
}

impl Validate for ClientSettings {
    fn validate(&self) -> Result<()> {
        validate_url("base_url", &self.base_url)?;
        validate_positive_number("timeout_seconds", self.timeout_seconds as usize, 1)?;
        if let Some(key) = &self.api_key {
            validate_non_empty_string("api_key", key)?;
        }
        validate_range("cache_ttl_seconds", self.cache_ttl_seconds, 1, MAX_CACHE_TTL_SECS)?;
        if self.cache_enabled {
            validate_path("cache_dir", &self.cache_dir)?;
        }
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: T::Err| FdcError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn parse_bool(field: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FdcError::InvalidConfigValueError {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "Expected true or false".to_string(),
        }),
    }
}

/// 兩個 CLI 共用的連線參數
#[cfg(feature = "cli")]
#[derive(Debug, Clone, clap::Args)]
pub struct ConnectionArgs {
    /// FoodData Central API key
    #[arg(long, env = "FDC_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Override the API base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

#[cfg(feature = "cli")]
impl ConnectionArgs {
    pub fn settings(&self) -> Result<ClientSettings> {
        let settings = ClientSettings::load(self.config.as_deref())?
            .with_overrides(self.api_key.clone(), self.base_url.clone());
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VARS: [&str; 8] = [
        "FDC_API_KEY",
        "FDC_BASE_URL",
        "FDC_TIMEOUT",
        "FDC_MAX_RETRIES",
        "FDC_CACHE_ENABLED",
        "FDC_CACHE_TIMEOUT",
        "FDC_CACHE_DIR",
        "FDC_DATABASE_URL",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let settings = ClientSettings::from_env().unwrap();
        assert_eq!(settings, ClientSettings::default());
        assert_eq!(settings.base_url, "https://api.nal.usda.gov/fdc/v1/");
        assert_eq!(settings.cache_ttl_seconds, 86_400);
        assert!(settings.api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_env_overrides_toml() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            b"[api]\nkey = \"toml-key\"\ntimeout_seconds = 5\n[cache]\nenabled = false\n",
        )
        .unwrap();

        std::env::set_var("FDC_API_KEY", "env-key");
        std::env::set_var("FDC_MAX_RETRIES", "7");
        let settings = ClientSettings::load(Some(file.path())).unwrap();
        clear_env();

        assert_eq!(settings.api_key.as_deref(), Some("env-key"));
        assert_eq!(settings.timeout_seconds, 5);
        assert_eq!(settings.max_retries, 7);
        assert!(!settings.cache_enabled);
    }

    #[test]
    #[serial]
    fn test_invalid_env_values() {
        clear_env();
        std::env::set_var("FDC_TIMEOUT", "soon");
        assert!(matches!(
            ClientSettings::from_env(),
            Err(FdcError::InvalidConfigValueError { ref field, .. }) if field == "FDC_TIMEOUT"
        ));
        clear_env();

        std::env::set_var("FDC_CACHE_ENABLED", "maybe");
        assert!(ClientSettings::from_env().is_err());
        std::env::set_var("FDC_CACHE_ENABLED", "0");
        assert!(!ClientSettings::from_env().unwrap().cache_enabled);
        clear_env();
    }

    #[test]
    fn test_cli_overrides_and_validation() {
        let settings = ClientSettings::default()
            .with_overrides(Some("cli-key".to_string()), Some("http://localhost".to_string()));
        assert_eq!(settings.api_key.as_deref(), Some("cli-key"));
        assert!(settings.validate().is_ok());

        let kept = settings.clone().with_overrides(Some("  ".to_string()), None);
        assert_eq!(kept.api_key.as_deref(), Some("cli-key"));

        let bad = ClientSettings {
            timeout_seconds: 0,
            ..ClientSettings::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_oversized_cache_timeout_is_rejected() {
        clear_env();
        std::env::set_var("FDC_CACHE_TIMEOUT", "100000000000");
        let settings = ClientSettings::from_env().unwrap();
        clear_env();

        assert_eq!(settings.cache_ttl_seconds, 100_000_000_000);
        assert!(matches!(
            settings.validate(),
            Err(FdcError::InvalidConfigValueError { ref field, .. }) if field == "cache_ttl_seconds"
        ));

        let ceiling = ClientSettings {
            cache_ttl_seconds: MAX_CACHE_TTL_SECS,
            ..ClientSettings::default()
        };
        assert!(ceiling.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let settings = ClientSettings::default().with_overrides(Some("secret".to_string()), None);
        assert!(!format!("{:?}", settings).contains("secret"));
    }
}
