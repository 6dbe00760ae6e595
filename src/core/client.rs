use crate::config::ClientSettings;
use crate::domain::api::{ApiFood, ApiSearchResult, FoodsRequest, ListRequest};
use crate::domain::model::{Food, SearchResult};
use crate::domain::ports::FoodSource;
use crate::domain::query::{FoodOptions, ListQuery, SearchQuery};
use crate::utils::error::{FdcError, Result};
use crate::utils::validation::{validate_url, Validate};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.nal.usda.gov/fdc/v1/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// `POST foods` 單次最多 20 個 FDC ID
pub const MAX_FOODS_PER_REQUEST: usize = 20;

const API_KEY_HEADER: &str = "X-Api-Key";

/// API 金鑰的傳遞方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    QueryParam,
    Header,
}

/// 指數退避重試策略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次重試前的等待時間；`Retry-After` 優先
    pub fn delay_for(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        let delay = match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => self
                .backoff_base
                .saturating_mul(2u32.saturating_pow(attempt)),
        };
        delay.min(self.max_backoff)
    }
}

pub struct FdcClientBuilder {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    auth_mode: AuthMode,
    user_agent: String,
}

impl Default for FdcClientBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            auth_mode: AuthMode::default(),
            user_agent: format!("usda-fdc/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FdcClientBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn backoff_base(mut self, backoff_base: Duration) -> Self {
        self.retry.backoff_base = backoff_base;
        self
    }

    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.retry.max_backoff = max_backoff;
        self
    }

    pub fn auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<FdcClient> {
        let api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| FdcError::MissingConfigError {
                field: "api_key".to_string(),
            })?;

        let base_url = normalize_base_url(&self.base_url)?;

        let http = Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .build()?;

        Ok(FdcClient {
            http,
            api_key,
            base_url,
            auth_mode: self.auth_mode,
            retry: self.retry,
        })
    }
}

/// FoodData Central REST API 用戶端
#[derive(Clone)]
pub struct FdcClient {
    http: Client,
    api_key: String,
    base_url: Url,
    auth_mode: AuthMode,
    retry: RetryPolicy,
}

impl fmt::Debug for FdcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FdcClient")
            .field("base_url", &self.base_url.as_str())
            .field("auth_mode", &self.auth_mode)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl FdcClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    pub fn builder() -> FdcClientBuilder {
        FdcClientBuilder::default()
    }

    /// 從 `FDC_*` 環境變數建立
    pub fn from_env() -> Result<Self> {
        let settings = ClientSettings::from_env()?;
        Self::from_settings(&settings)
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        settings.validate()?;
        let mut builder = Self::builder()
            .base_url(settings.base_url.clone())
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .max_retries(settings.max_retries);
        if let Some(key) = &settings.api_key {
            builder = builder.api_key(key.clone());
        }
        builder.build()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let url = self.base_url.join(path).map_err(|e| FdcError::ConfigError {
            message: format!("Invalid request path '{}': {}", path, e),
        })?;

        let mut attempt = 0;
        loop {
            match self.send_once(&method, &url, params, body.as_ref()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let retry_after = match &e {
                        FdcError::RateLimitError { retry_after, .. } => *retry_after,
                        _ => None,
                    };
                    let delay = self.retry.delay_for(attempt, retry_after);
                    attempt += 1;
                    warn!(
                        "⏳ {} {} failed ({}), retry {}/{} in {:?}",
                        method,
                        url.path(),
                        e,
                        attempt,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: &Method,
        url: &Url,
        params: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let mut request = self.http.request(method.clone(), url.clone()).query(params);
        request = match self.auth_mode {
            AuthMode::QueryParam => request.query(&[("api_key", self.api_key.as_str())]),
            AuthMode::Header => request.header(API_KEY_HEADER, &self.api_key),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("🌐 {} {}", method, url.path());
        let response = request.send().await?;
        let status = response.status();
        debug!("API response status: {}", status);

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(FdcError::from_status(
                status.as_u16(),
                error_message(&text, status),
                retry_after,
            ));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl FoodSource for FdcClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        query.validate()?;
        let raw: ApiSearchResult = self
            .request_json(Method::GET, "foods/search", &query.to_params(), None)
            .await?;
        let result = SearchResult::from(raw);
        debug!(
            "🔎 '{}' page {}/{}: {} hits",
            query.query, result.current_page, result.total_pages, result.total_hits
        );
        Ok(result)
    }

    async fn get_food(&self, fdc_id: u32, options: &FoodOptions) -> Result<Food> {
        validate_fdc_id(fdc_id)?;
        let mut params = vec![("format", options.format.as_str().to_string())];
        if let Some(nutrients) = options.nutrients_param() {
            params.push(("nutrients", nutrients));
        }
        let raw: ApiFood = self
            .request_json(Method::GET, &format!("food/{}", fdc_id), &params, None)
            .await?;
        Ok(raw.into())
    }

    async fn get_foods(&self, fdc_ids: &[u32], options: &FoodOptions) -> Result<Vec<Food>> {
        for id in fdc_ids {
            validate_fdc_id(*id)?;
        }

        let mut foods = Vec::with_capacity(fdc_ids.len());
        for chunk in fdc_ids.chunks(MAX_FOODS_PER_REQUEST) {
            let body = FoodsRequest {
                fdc_ids: chunk,
                format: Some(options.format.as_str()),
                nutrients: (!options.nutrients.is_empty()).then_some(options.nutrients.as_slice()),
            };
            let raw: Vec<ApiFood> = self
                .request_json(Method::POST, "foods", &[], Some(serde_json::to_value(&body)?))
                .await?;
            debug!("📦 fetched {} of {} requested foods", raw.len(), chunk.len());
            foods.extend(raw.into_iter().map(Food::from));
        }
        Ok(foods)
    }

    async fn list_foods(&self, query: &ListQuery) -> Result<Vec<Food>> {
        query.validate()?;
        let body = ListRequest {
            data_type: (!query.data_types.is_empty()).then_some(query.data_types.as_slice()),
            page_size: query.page_size,
            page_number: query.page_number,
            sort_by: query.sort_by.as_deref(),
            sort_order: query.sort_order.map(|o| o.as_str()),
        };
        let raw: Vec<ApiFood> = self
            .request_json(Method::POST, "foods/list", &[], Some(serde_json::to_value(&body)?))
            .await?;
        Ok(raw.into_iter().map(Food::from).collect())
    }
}

fn validate_fdc_id(fdc_id: u32) -> Result<()> {
    if fdc_id == 0 {
        return Err(FdcError::validation("FDC ID must be a positive integer"));
    }
    Ok(())
}

fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    validate_url("base_url", trimmed)?;
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    Url::parse(&with_slash).map_err(|e| FdcError::InvalidConfigValueError {
        field: "base_url".to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

/// 從錯誤回應取出訊息：`error.message`、`error`、`message`，其次原文，最後是狀態碼說明
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let found = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("error").and_then(|v| v.as_str()))
            .or_else(|| value.get("message").and_then(|v| v.as_str()));
        if let Some(message) = found {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key() {
        let err = FdcClient::builder().build().unwrap_err();
        assert!(matches!(err, FdcError::MissingConfigError { ref field } if field == "api_key"));
        assert!(FdcClient::new("   ").is_err());
    }

    #[test]
    fn test_base_url_normalized() {
        let client = FdcClient::builder()
            .api_key("key")
            .base_url("http://localhost:8080/fdc/v1")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/fdc/v1/");

        let client = FdcClient::new("key").unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);

        assert!(FdcClient::builder()
            .api_key("key")
            .base_url("ftp://example.com")
            .build()
            .is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3, None), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10, None), Duration::from_secs(60));
        assert_eq!(policy.delay_for(0, Some(5)), Duration::from_secs(5));
        assert_eq!(policy.delay_for(0, Some(600)), Duration::from_secs(60));
    }

    #[test]
    fn test_error_message_extraction() {
        let status = StatusCode::FORBIDDEN;
        assert_eq!(
            error_message(r#"{"error":{"code":"API_KEY_INVALID","message":"bad key"}}"#, status),
            "bad key"
        );
        assert_eq!(error_message(r#"{"error":"nope"}"#, status), "nope");
        assert_eq!(error_message(r#"{"message":"hi"}"#, status), "hi");
        assert_eq!(error_message("plain text", status), "plain text");
        assert_eq!(error_message("", StatusCode::NOT_FOUND), "Not Found");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = FdcClient::new("super-secret").unwrap();
        assert!(!format!("{:?}", client).contains("super-secret"));
    }
}
