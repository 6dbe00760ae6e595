use crate::utils::error::{FdcError, Result};
use crate::config::MAX_CACHE_TTL_SECS;
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `fdc.toml` 設定檔；所有欄位皆為選填，未設定者沿用環境變數或預設值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub api: Option<ApiSection>,
    pub cache: Option<CacheSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSection {
    pub key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    pub enabled: Option<bool>,
    pub ttl_seconds: Option<u64>,
    pub dir: Option<String>,
    pub database_url: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(FdcError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| FdcError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${FDC_API_KEY})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| FdcError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if let Some(api) = &self.api {
            if let Some(base_url) = &api.base_url {
                validate_url("api.base_url", base_url)?;
            }
            if let Some(timeout) = api.timeout_seconds {
                validate_positive_number("api.timeout_seconds", timeout as usize, 1)?;
            }
        }

        if let Some(cache) = &self.cache {
            if let Some(dir) = &cache.dir {
                validate_path("cache.dir", dir)?;
            }
            if let Some(ttl) = cache.ttl_seconds {
                validate_range("cache.ttl_seconds", ttl, 1, MAX_CACHE_TTL_SECS)?;
            }
        }

        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
