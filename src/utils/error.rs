use thiserror::Error;

#[derive(Error, Debug)]
pub enum FdcError {
    #[error("API error{}: {message}", status_suffix(.status))]
    ApiError {
        status: Option<u16>,
        message: String,
    },

    #[error("Authentication failed ({status}): {message}")]
    AuthError { status: u16, message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Resource not found: {message}")]
    NotFoundError { message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV output error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Template rendering error: {0}")]
    TemplateError(#[from] askama::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unit conversion error: {message}")]
    UnitConversionError { message: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },
}

pub type Result<T> = std::result::Result<T, FdcError>;

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Api,
    Network,
    Data,
    Configuration,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FdcError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn unit(message: impl Into<String>) -> Self {
        Self::UnitConversionError {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::DatabaseError {
            message: message.into(),
        }
    }

    /// 依 HTTP 狀態碼建立對應的 API 錯誤
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<u64>) -> Self {
        let message = message.into();
        match status {
            400 => Self::ValidationError { message },
            401 | 403 => Self::AuthError { status, message },
            404 => Self::NotFoundError { message },
            429 => Self::RateLimitError {
                message,
                retry_after,
            },
            _ => Self::ApiError {
                status: Some(status),
                message,
            },
        }
    }

    /// 所有 API 類錯誤都屬於通用 API 錯誤
    pub fn is_api_error(&self) -> bool {
        matches!(
            self,
            Self::ApiError { .. }
                | Self::AuthError { .. }
                | Self::RateLimitError { .. }
                | Self::ValidationError { .. }
                | Self::NotFoundError { .. }
        )
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => *status,
            Self::AuthError { status, .. } => Some(*status),
            Self::RateLimitError { .. } => Some(429),
            Self::ValidationError { .. } => Some(400),
            Self::NotFoundError { .. } => Some(404),
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// 可重試的暫時性錯誤：429、5xx、逾時與連線失敗
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitError { .. } => true,
            Self::ApiError {
                status: Some(status),
                ..
            } => *status >= 500,
            Self::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError { .. }
            | Self::AuthError { .. }
            | Self::RateLimitError { .. }
            | Self::NotFoundError { .. } => ErrorCategory::Api,
            Self::HttpError(_) => ErrorCategory::Network,
            Self::ValidationError { .. }
            | Self::SerializationError(_)
            | Self::CsvError(_)
            | Self::TemplateError(_)
            | Self::UnitConversionError { .. } => ErrorCategory::Data,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::DatabaseError { .. } => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFoundError { .. } => ErrorSeverity::Low,
            Self::RateLimitError { .. } | Self::HttpError(_) => ErrorSeverity::Medium,
            Self::ApiError { status, .. } if status.is_some_and(|s| s >= 500) => {
                ErrorSeverity::Medium
            }
            Self::IoError(_) | Self::DatabaseError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::AuthError { .. } | Self::MissingConfigError { .. } => {
                "Check the API key (--api-key or FDC_API_KEY); keys are issued at https://fdc.nal.usda.gov/api-key-signup"
            }
            Self::RateLimitError { .. } => "Wait a while before retrying or lower the request volume",
            Self::NotFoundError { .. } => "Verify the FDC ID, e.g. with the search command",
            Self::ValidationError { .. } => "Check the command arguments and try again",
            Self::ApiError { .. } | Self::HttpError(_) => {
                "The API may be temporarily unavailable; retry later or check the base URL"
            }
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration file or environment variables"
            }
            Self::UnitConversionError { .. } => "Use a supported unit such as g, kg, oz, lb, ml, cup or tbsp",
            Self::IoError(_) | Self::DatabaseError { .. } => {
                "Check that the cache location exists and is writable"
            }
            Self::SerializationError(_) | Self::CsvError(_) | Self::TemplateError(_) => {
                "The response could not be processed; run with --verbose for details"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::AuthError { .. } => "The API rejected the API key".to_string(),
            Self::MissingConfigError { field } if field == "api_key" => {
                "No API key provided. Use --api-key or set FDC_API_KEY".to_string()
            }
            Self::RateLimitError { .. } => "Too many requests were sent to the API".to_string(),
            Self::NotFoundError { message } => format!("Not found: {}", message),
            other => other.to_string(),
        }
    }

    /// CLI 結束碼：一般錯誤 1、可重試 2、系統錯誤 3
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            FdcError::from_status(401, "bad key", None),
            FdcError::AuthError { status: 401, .. }
        ));
        assert!(matches!(
            FdcError::from_status(403, "forbidden", None),
            FdcError::AuthError { status: 403, .. }
        ));
        assert!(matches!(
            FdcError::from_status(429, "slow down", Some(3)),
            FdcError::RateLimitError {
                retry_after: Some(3),
                ..
            }
        ));
        assert!(matches!(
            FdcError::from_status(404, "missing", None),
            FdcError::NotFoundError { .. }
        ));
        assert!(matches!(
            FdcError::from_status(400, "bad", None),
            FdcError::ValidationError { .. }
        ));
        assert!(matches!(
            FdcError::from_status(502, "gateway", None),
            FdcError::ApiError {
                status: Some(502),
                ..
            }
        ));
    }

    #[test]
    fn test_api_errors_share_generic_kind() {
        for status in [400, 401, 404, 429, 500] {
            let err = FdcError::from_status(status, "x", None);
            assert!(err.is_api_error());
            assert_eq!(err.status_code(), Some(status));
        }
        assert!(!FdcError::unit("cubits").is_api_error());
    }

    #[test]
    fn test_transient_classification() {
        assert!(FdcError::from_status(429, "x", None).is_transient());
        assert!(FdcError::from_status(503, "x", None).is_transient());
        assert!(!FdcError::from_status(404, "x", None).is_transient());
        assert!(!FdcError::from_status(401, "x", None).is_transient());
        assert!(!FdcError::validation("x").is_transient());
    }

    #[test]
    fn test_display_keeps_message() {
        let err = FdcError::from_status(500, "API Error", None);
        assert_eq!(err.to_string(), "API error (500): API Error");
        let err = FdcError::ApiError {
            status: None,
            message: "API Error".to_string(),
        };
        assert_eq!(err.to_string(), "API error: API Error");
    }

    #[test]
    fn test_exit_codes_follow_severity() {
        let missing_key = FdcError::MissingConfigError {
            field: "api_key".to_string(),
        };
        assert_eq!(missing_key.exit_code(), 1);
        assert!(missing_key.user_friendly_message().contains("FDC_API_KEY"));
        assert_eq!(FdcError::from_status(404, "x", None).exit_code(), 1);
        assert_eq!(FdcError::from_status(429, "x", None).exit_code(), 2);
        assert_eq!(FdcError::database("locked").exit_code(), 3);
    }
}
