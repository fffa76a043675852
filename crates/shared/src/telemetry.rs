use std::time::Duration;
use tracing::{error, info, warn};

/// HTTP リクエスト/レスポンスをトレース
pub fn trace_http_request(method: &str, path: &str, status_code: u16, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;

    if status_code >= 400 {
        warn!(
            method = method,
            path = path,
            status_code = status_code,
            elapsed_ms = elapsed_ms,
            "HTTP request failed"
        );
    } else {
        info!(
            method = method,
            path = path,
            status_code = status_code,
            elapsed_ms = elapsed_ms,
            "HTTP request completed"
        );
    }
}

/// 通信自体が失敗した（レスポンスがない）リクエストをトレース
pub fn trace_transport_failure(method: &str, path: &str, elapsed: Duration, error: &dyn std::error::Error) {
    warn!(
        method = method,
        path = path,
        elapsed_ms = elapsed.as_millis() as u64,
        error = %error,
        "HTTP request did not complete"
    );
}

/// 操作の失敗を診断ログに記録
pub fn record_error(error: &dyn std::error::Error, operation: &str) {
    error!(
        error = %error,
        operation = operation,
        "Operation failed"
    );
}
