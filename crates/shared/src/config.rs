use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;
use crate::tracing::LogFormat;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// REST API のベースURL（末尾の `/api` まで含む）
    pub api_base_url: String,
    /// トークンとユーザー情報の保存先
    pub session_file: PathBuf,
    pub request_timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub log_format: LogFormat,
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            session_file: default_session_file(None),
            request_timeout: Duration::from_secs(10),
            retry_max_attempts: 3,
            retry_initial_delay_ms: 100,
            log_format: LogFormat::Pretty,
            environment: "dev".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー検索関数から設定を読み込む
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config {
            session_file: default_session_file(lookup("HOME").as_deref()),
            ..Config::default()
        };

        let api_base_url = lookup("TODO_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(AppError::Configuration(format!(
                "TODO_API_URL must be an http(s) URL: {api_base_url}"
            )));
        }

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => defaults.log_format,
        };

        Ok(Config {
            api_base_url,
            session_file: lookup("TODO_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_file),
            request_timeout: Duration::from_secs(parse_number(
                &lookup,
                "TODO_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            retry_max_attempts: parse_number(
                &lookup,
                "TODO_RETRY_MAX_ATTEMPTS",
                defaults.retry_max_attempts,
            )?,
            retry_initial_delay_ms: parse_number(
                &lookup,
                "TODO_RETRY_INITIAL_DELAY_MS",
                defaults.retry_initial_delay_ms,
            )?,
            log_format,
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
        })
    }

    /// ベースURLにパスを連結
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}

fn default_session_file(home: Option<&str>) -> PathBuf {
    match home {
        Some(home) => PathBuf::from(home).join(".todo-client").join("session.json"),
        None => PathBuf::from(".todo-client").join("session.json"),
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("{key} must be a number: {raw}"))),
        None => Ok(default),
    }
}
