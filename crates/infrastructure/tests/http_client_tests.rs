//! `HttpTodoApi` を固定レスポンスを返すローカルサーバーに対して検証する

use std::sync::{Arc, Mutex};
use std::time::Duration;

use domain::{ItemId, ListId, User, UserId};
use infrastructure::{
    HttpTodoApi, ItemInput, LoginRequest, MemorySessionStore, SessionStore, TodoApi,
};
use shared::{AppError, Config, RetryExecutor, RetryStrategy, Session};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// サーバーが受け取ったリクエスト
#[derive(Debug, Clone)]
struct Recorded {
    request_line: String,
    headers: String,
    body: String,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<String> {
        let prefix = format!("{}:", name.to_lowercase());
        self.headers.lines().find_map(|line| {
            line.to_lowercase()
                .starts_with(&prefix)
                .then(|| line[prefix.len()..].trim().to_string())
        })
    }
}

struct CannedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl CannedServer {
    /// 受け付けた接続ごとに順番にレスポンスを返す
    async fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                if let Some(request) = read_request(&mut stream).await {
                    recorded.lock().unwrap().push(request);
                }
                let response = format!(
                    "HTTP/1.1 {status} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    reason(status),
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{addr}/api"),
            requests,
        }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let lower = line.to_lowercase();
            lower
                .strip_prefix("content-length:")
                .and_then(|v| v.trim().parse::<usize>().ok())
        })
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    let (request_line, headers) = head.split_once("\r\n").unwrap_or((&head, ""));
    Some(Recorded {
        request_line: request_line.to_string(),
        headers: headers.to_string(),
        body: String::from_utf8_lossy(&buffer[header_end..]).to_string(),
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        401 => "Unauthorized",
        403 => "Forbidden",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

fn session() -> Session {
    Session::new(
        "opaque-test-token",
        User {
            id: UserId::new(1),
            username: "taro".to_string(),
            email: "taro@example.com".to_string(),
            created_at: None,
            last_login: None,
        },
    )
}

fn fast_retry(max_attempts: u32) -> RetryExecutor {
    RetryExecutor::new(RetryStrategy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 1.0,
        add_jitter: false,
    })
}

fn api_for(base_url: &str, signed_in: bool) -> HttpTodoApi {
    let store = Arc::new(MemorySessionStore::new());
    if signed_in {
        store.save(&session()).unwrap();
    }
    let config = Config {
        api_base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
        ..Config::default()
    };
    HttpTodoApi::new(config, store)
        .unwrap()
        .with_retry(fast_retry(3))
}

#[tokio::test]
async fn test_get_lists_sends_bearer_token() {
    // Arrange
    let server = CannedServer::start(vec![(
        200,
        r#"[{"id": 1, "title": "買い物", "description": "", "created_at": "2024-05-01T09:30:00.123456", "updated_at": "2024-05-01T09:30:00.123456", "items": [{"id": 10, "title": "牛乳", "description": null, "completed": false, "list_id": 1, "parent_id": null, "created_at": "2024-05-01T09:31:00", "updated_at": "2024-05-01T09:31:00", "children": []}]}]"#,
    )])
    .await;
    let api = api_for(&server.base_url, true);

    // Act
    let lists = api.get_lists().await.unwrap();

    // Assert
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].id, ListId::new(1));
    assert_eq!(lists[0].items[0].id, ItemId::new(10));

    let requests = server.requests();
    assert_eq!(requests[0].request_line, "GET /api/todos/lists HTTP/1.1");
    assert_eq!(
        requests[0].header("authorization").as_deref(),
        Some("Bearer opaque-test-token")
    );
}

#[tokio::test]
async fn test_no_session_sends_nothing() {
    let server = CannedServer::start(vec![(200, "[]")]).await;
    let api = api_for(&server.base_url, false);

    let result = api.get_list(ListId::new(1)).await;

    assert_eq!(result, Err(AppError::NotAuthenticated));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_forbidden_error_body_is_mapped() {
    let server = CannedServer::start(vec![(403, r#"{"error": "Unauthorized access"}"#)]).await;
    let api = api_for(&server.base_url, true);

    let result = api.get_list(ListId::new(2)).await;

    assert_eq!(
        result,
        Err(AppError::Authorization("Unauthorized access".to_string()))
    );
}

#[tokio::test]
async fn test_expired_token_message_from_jwt_layer() {
    let server = CannedServer::start(vec![(401, r#"{"msg": "Token has expired"}"#)]).await;
    let api = api_for(&server.base_url, true);

    let result = api.current_user().await;

    assert_eq!(result, Err(AppError::TokenExpired));
}

#[tokio::test]
async fn test_delete_accepts_empty_no_content() {
    let server = CannedServer::start(vec![(204, "")]).await;
    let api = api_for(&server.base_url, true);

    api.delete_item(ItemId::new(5)).await.unwrap();

    assert_eq!(
        server.requests()[0].request_line,
        "DELETE /api/todos/items/5 HTTP/1.1"
    );
}

#[tokio::test]
async fn test_reads_are_retried() {
    // Arrange: 1回目はメンテナンス中
    let server = CannedServer::start(vec![
        (503, r#"{"error": "maintenance"}"#),
        (200, r#"[{"id": 3, "title": "a", "completed": true, "list_id": 1, "parent_id": null}]"#),
    ])
    .await;
    let api = api_for(&server.base_url, true);

    // Act
    let items = api.get_list_items(ListId::new(1)).await.unwrap();

    // Assert
    assert_eq!(items.len(), 1);
    assert!(items[0].completed);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_mutations_are_sent_once() {
    let server = CannedServer::start(vec![
        (503, r#"{"error": "maintenance"}"#),
        (201, r#"{"id": 1, "title": "x"}"#),
    ])
    .await;
    let api = api_for(&server.base_url, true);

    let result = api
        .create_item(
            ListId::new(1),
            &ItemInput {
                title: "x".to_string(),
                description: None,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_login_posts_credentials_without_token() {
    let server = CannedServer::start(vec![(
        200,
        r#"{"message": "Login successful", "access_token": "abc", "user": {"id": 4, "username": "taro", "email": "taro@example.com", "created_at": "2024-05-01T09:30:00", "last_login": null}}"#,
    )])
    .await;
    let api = api_for(&server.base_url, false);

    let response = api
        .login(&LoginRequest {
            username: "taro".to_string(),
            password: "password1".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(response.access_token, "abc");
    assert_eq!(response.user.id, UserId::new(4));

    let request = &server.requests()[0];
    assert_eq!(request.request_line, "POST /api/auth/login HTTP/1.1");
    assert_eq!(request.header("authorization"), None);
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "username": "taro", "password": "password1" })
    );
}

#[tokio::test]
async fn test_move_posts_target_list() {
    let server =
        CannedServer::start(vec![(200, r#"{"message": "Item moved successfully"}"#)]).await;
    let api = api_for(&server.base_url, true);

    api.move_item(ItemId::new(7), ListId::new(3)).await.unwrap();

    let request = &server.requests()[0];
    assert_eq!(request.request_line, "POST /api/todos/items/7/move HTTP/1.1");
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body, serde_json::json!({ "list_id": 3 }));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Arrange: ポートを確保してすぐ解放する
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = api_for(&format!("http://{addr}/api"), true).with_retry(RetryExecutor::no_retry());

    // Act
    let result = api.get_lists().await;

    // Assert
    assert!(matches!(result, Err(AppError::Network(_))));
}
