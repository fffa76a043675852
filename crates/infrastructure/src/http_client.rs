//! reqwest による `TodoApi` 実装

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use domain::{Item, ItemId, ListId, TodoList, User};
use reqwest::{header, Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared::{trace_http_request, trace_transport_failure, AppError, Config, RetryExecutor};
use tracing::debug;

use crate::api::{
    AuthResponse, AvailabilityResponse, EmailCheck, ErrorBody, ItemInput, ItemPatch, ListInput,
    LoginRequest, MoveRequest, RegisterRequest, TodoApi, UsernameCheck,
};
use crate::session_store::SessionStore;

/// 認証ヘッダーを付けるかどうか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Bearer,
    Anonymous,
}

/// 外部REST APIのHTTPクライアント
pub struct HttpTodoApi {
    client: Client,
    config: Config,
    sessions: Arc<dyn SessionStore>,
    retry: RetryExecutor,
}

impl HttpTodoApi {
    pub fn new(config: Config, sessions: Arc<dyn SessionStore>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {e}")))?;
        let retry = RetryExecutor::from_config(&config);

        Ok(Self {
            client,
            config,
            sessions,
            retry,
        })
    }

    /// 読み取りのリトライ方針を差し替える
    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn bearer(&self) -> Result<String, AppError> {
        let session = self.sessions.load()?.ok_or(AppError::NotAuthenticated)?;
        session.ensure_fresh()?;
        Ok(session.bearer())
    }

    /// リクエストを1回送り、成功時はレスポンスボディを返す
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        auth: Auth,
    ) -> Result<String, AppError> {
        let mut request = self
            .client
            .request(method.clone(), self.config.endpoint(path))
            .header(header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        if auth == Auth::Bearer {
            request = request.header(header::AUTHORIZATION, self.bearer()?);
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                trace_transport_failure(method.as_str(), path, started.elapsed(), &e);
                return Err(transport_error(e));
            }
        };

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        trace_http_request(method.as_str(), path, status.as_u16(), started.elapsed());

        if status.is_success() {
            Ok(text)
        } else {
            Err(AppError::from_status(
                status.as_u16(),
                ErrorBody::message_from(&text),
            ))
        }
    }

    /// GET はリトライ付き
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let text = self
            .retry
            .execute(|| self.execute(Method::GET, path, None, Auth::Bearer))
            .await?;
        decode(&text)
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: &B, auth: Auth) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|e| AppError::Serialization(e.to_string()))?;
        let text = self.execute(method, path, Some(&body), auth).await?;
        decode(&text)
    }

    /// ボディを読まない変更系リクエスト（204 を含む）
    async fn send_discarding(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(), AppError> {
        let text = self.execute(method, path, body, Auth::Bearer).await?;
        debug!(path, bytes = text.len(), "Response body ignored");
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, AppError> {
    Ok(serde_json::from_str(text)?)
}

fn transport_error(error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::Timeout(error.to_string())
    } else {
        AppError::Network(error.to_string())
    }
}

#[async_trait]
impl TodoApi for HttpTodoApi {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AppError> {
        self.send(Method::POST, "/auth/register", request, Auth::Anonymous)
            .await
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AppError> {
        self.send(Method::POST, "/auth/login", request, Auth::Anonymous)
            .await
    }

    async fn logout(&self) -> Result<(), AppError> {
        self.send_discarding(Method::POST, "/auth/logout", None).await
    }

    async fn current_user(&self) -> Result<User, AppError> {
        self.get("/auth/me").await
    }

    async fn username_available(&self, username: &str) -> Result<bool, AppError> {
        let response: AvailabilityResponse = self
            .send(
                Method::POST,
                "/auth/validate-username",
                &UsernameCheck { username },
                Auth::Anonymous,
            )
            .await?;
        Ok(response.available)
    }

    async fn email_available(&self, email: &str) -> Result<bool, AppError> {
        let response: AvailabilityResponse = self
            .send(
                Method::POST,
                "/auth/validate-email",
                &EmailCheck { email },
                Auth::Anonymous,
            )
            .await?;
        Ok(response.available)
    }

    async fn get_lists(&self) -> Result<Vec<TodoList>, AppError> {
        self.get("/todos/lists").await
    }

    async fn get_list(&self, list_id: ListId) -> Result<TodoList, AppError> {
        self.get(&format!("/todos/lists/{list_id}")).await
    }

    async fn create_list(&self, input: &ListInput) -> Result<TodoList, AppError> {
        self.send(Method::POST, "/todos/lists", input, Auth::Bearer)
            .await
    }

    async fn update_list(&self, list_id: ListId, input: &ListInput) -> Result<TodoList, AppError> {
        self.send(
            Method::PUT,
            &format!("/todos/lists/{list_id}"),
            input,
            Auth::Bearer,
        )
        .await
    }

    async fn delete_list(&self, list_id: ListId) -> Result<(), AppError> {
        self.send_discarding(Method::DELETE, &format!("/todos/lists/{list_id}"), None)
            .await
    }

    async fn get_list_items(&self, list_id: ListId) -> Result<Vec<Item>, AppError> {
        self.get(&format!("/todos/lists/{list_id}/items")).await
    }

    async fn create_item(&self, list_id: ListId, input: &ItemInput) -> Result<Item, AppError> {
        self.send(
            Method::POST,
            &format!("/todos/lists/{list_id}/items"),
            input,
            Auth::Bearer,
        )
        .await
    }

    async fn create_subitem(&self, parent_id: ItemId, input: &ItemInput) -> Result<Item, AppError> {
        self.send(
            Method::POST,
            &format!("/todos/items/{parent_id}/subitems"),
            input,
            Auth::Bearer,
        )
        .await
    }

    async fn update_item(&self, item_id: ItemId, patch: &ItemPatch) -> Result<Item, AppError> {
        self.send(
            Method::PATCH,
            &format!("/todos/items/{item_id}"),
            patch,
            Auth::Bearer,
        )
        .await
    }

    async fn delete_item(&self, item_id: ItemId) -> Result<(), AppError> {
        self.send_discarding(Method::DELETE, &format!("/todos/items/{item_id}"), None)
            .await
    }

    async fn move_item(&self, item_id: ItemId, target: ListId) -> Result<(), AppError> {
        let body = serde_json::to_value(MoveRequest { list_id: target })
            .map_err(|e| AppError::Serialization(e.to_string()))?;
        self.send_discarding(
            Method::POST,
            &format!("/todos/items/{item_id}/move"),
            Some(&body),
        )
        .await
    }
}
