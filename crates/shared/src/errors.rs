use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// アプリケーション全体で使用される包括的なエラー型
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    // ドメインエラー
    #[error("Domain error: {0}")]
    Domain(#[from] domain::DomainError),

    // シリアライズエラー
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // 認証・認可エラー
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Invalid JWT token: {0}")]
    InvalidJwt(String),

    #[error("Token expired")]
    TokenExpired,

    // リソースエラー
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // サーバー・通信エラー
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response ({status}): {message}")]
    UnexpectedStatus { status: u16, message: String },

    // 変更はサーバーに反映済みで、その後の再取得だけが失敗した
    #[error("Change applied, but reloading the list failed: {0}")]
    RefetchFailed(String),

    // クライアント内部エラー
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Session storage error: {0}")]
    Session(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// エラーの分類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 入力や認証の問題（4xx相当）
    Client,
    /// サーバー側の問題（5xx相当）
    Server,
    /// 一時的なエラー（リトライ可能）
    Transient,
    /// クライアント内部の永続的なエラー
    Permanent,
}

/// エラーの重要度
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// リトライ戦略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryStrategy {
    /// 最大試行回数
    pub max_attempts: u32,
    /// 初期遅延時間
    pub initial_delay: Duration,
    /// 最大遅延時間
    pub max_delay: Duration,
    /// バックオフ倍率
    pub backoff_multiplier: f64,
    /// ジッター追加フラグ
    pub add_jitter: bool,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

/// エラーメタデータ
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub retryable: bool,
    pub context: HashMap<String, String>,
}

impl ErrorMetadata {
    fn new(
        code: &'static str,
        category: ErrorCategory,
        severity: ErrorSeverity,
        retryable: bool,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            retryable,
            context: HashMap::new(),
        }
    }
}

impl AppError {
    /// HTTPステータスとサーバーのエラーメッセージから変換
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => AppError::Validation(message),
            401 if message.to_lowercase().contains("expired") => AppError::TokenExpired,
            401 => AppError::Authentication(message),
            403 => AppError::Authorization(message),
            404 => AppError::NotFound(message),
            409 => AppError::AlreadyExists(message),
            422 => AppError::InvalidJwt(message),
            429 => AppError::RateLimitExceeded,
            503 => AppError::ServiceUnavailable(message),
            504 => AppError::Timeout(message),
            500..=599 => AppError::Internal(message),
            _ => AppError::UnexpectedStatus { status, message },
        }
    }

    /// エラーメタデータを取得
    pub fn metadata(&self) -> ErrorMetadata {
        use ErrorCategory::*;
        use ErrorSeverity::*;

        match self {
            AppError::Domain(_) => ErrorMetadata::new("DOMAIN_ERROR", Client, Info, false),
            AppError::Validation(_) => ErrorMetadata::new("VALIDATION_ERROR", Client, Info, false),
            AppError::NotAuthenticated => {
                ErrorMetadata::new("NOT_AUTHENTICATED", Client, Warning, false)
            }
            AppError::Authentication(_) => {
                ErrorMetadata::new("AUTHENTICATION_ERROR", Client, Warning, false)
            }
            AppError::Authorization(_) => {
                ErrorMetadata::new("AUTHORIZATION_ERROR", Client, Warning, false)
            }
            AppError::InvalidJwt(_) => ErrorMetadata::new("INVALID_JWT", Client, Warning, false),
            AppError::TokenExpired => ErrorMetadata::new("TOKEN_EXPIRED", Client, Warning, false),
            AppError::NotFound(_) => ErrorMetadata::new("NOT_FOUND", Client, Info, false),
            AppError::AlreadyExists(_) => ErrorMetadata::new("ALREADY_EXISTS", Client, Info, false),
            AppError::ServiceUnavailable(_) => {
                ErrorMetadata::new("SERVICE_UNAVAILABLE", Transient, Error, true)
            }
            AppError::RateLimitExceeded => {
                ErrorMetadata::new("RATE_LIMIT_EXCEEDED", Transient, Warning, true)
            }
            AppError::Timeout(_) => ErrorMetadata::new("TIMEOUT", Transient, Error, true),
            AppError::Network(_) => ErrorMetadata::new("NETWORK_ERROR", Transient, Error, true),
            AppError::Internal(_) => ErrorMetadata::new("INTERNAL_ERROR", Server, Critical, false),
            AppError::UnexpectedStatus { status, .. } => {
                let mut metadata = ErrorMetadata::new("UNEXPECTED_STATUS", Server, Error, false);
                metadata
                    .context
                    .insert("status".to_string(), status.to_string());
                metadata
            }
            AppError::RefetchFailed(_) => {
                ErrorMetadata::new("REFETCH_FAILED", Transient, Warning, true)
            }
            AppError::Serialization(_) | AppError::Deserialization(_) => {
                ErrorMetadata::new("SERIALIZATION_ERROR", Permanent, Error, false)
            }
            AppError::Configuration(_) => {
                ErrorMetadata::new("CONFIGURATION_ERROR", Permanent, Critical, false)
            }
            AppError::Session(_) => ErrorMetadata::new("SESSION_ERROR", Permanent, Error, false),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.metadata().retryable
    }

    /// ユーザー向けメッセージを取得
    pub fn user_message(&self) -> String {
        match self {
            AppError::Domain(e) => e.to_string(),
            AppError::Validation(msg) => format!("Invalid input: {msg}"),
            AppError::NotAuthenticated => "You are not logged in. Run `todo login` first.".to_string(),
            AppError::TokenExpired => "Your session has expired. Please log in again.".to_string(),
            AppError::Authentication(msg) => format!("Authentication failed: {msg}"),
            AppError::InvalidJwt(_) => "Your session token is invalid. Please log in again.".to_string(),
            AppError::Authorization(_) => "You are not allowed to do that.".to_string(),
            AppError::NotFound(_) => "The requested resource was not found.".to_string(),
            AppError::AlreadyExists(msg) => msg.clone(),
            AppError::RateLimitExceeded => "Too many requests. Please wait and try again.".to_string(),
            AppError::ServiceUnavailable(_) | AppError::Network(_) => {
                "The todo server is unreachable right now.".to_string()
            }
            AppError::Timeout(_) => "The request timed out.".to_string(),
            AppError::RefetchFailed(_) => {
                "The change was saved, but the list could not be reloaded. Show the list again to see it."
                    .to_string()
            }
            _ => "An unexpected error occurred.".to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Deserialization(e.to_string())
    }
}
