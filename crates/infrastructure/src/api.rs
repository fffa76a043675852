//! リモートAPIとの境界
//!
//! サーバーは外部の協調者として扱い、このトレイトの背後に隠す。

use async_trait::async_trait;
use domain::{Item, ItemId, ListId, TodoList, User};
use serde::{Deserialize, Serialize};
use shared::AppError;

// ========================
// リクエスト/レスポンス
// ========================

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// 登録・ログインのレスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub access_token: String,
    pub user: User,
}

/// リストの作成・更新
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListInput {
    pub title: String,
    pub description: Option<String>,
}

/// アイテム・サブアイテムの作成
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemInput {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// アイテムの部分更新（PATCH）
/// 指定したフィールドだけ送る
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl ItemPatch {
    pub fn completion(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveRequest {
    pub list_id: ListId,
}

/// 利用可能チェックのリクエスト
#[derive(Debug, Clone, Serialize)]
pub struct UsernameCheck<'a> {
    pub username: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailCheck<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// サーバーのエラーボディ
/// アプリケーションは `error`、JWT層は `msg` を返す
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl ErrorBody {
    /// レスポンスボディからエラーメッセージを取り出す
    pub fn message_from(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => match (parsed.error.or(parsed.msg), parsed.details) {
                (Some(message), Some(details)) => format!("{message} ({details})"),
                (Some(message), None) => message,
                (None, _) => body.trim().to_string(),
            },
            Err(_) => body.trim().to_string(),
        }
    }
}

// ========================
// API トレイト
// ========================

/// ToDo REST API
///
/// 認証が必要な操作は、実装側が保存済みセッションのトークンを付与する。
#[async_trait]
pub trait TodoApi: Send + Sync {
    // 認証
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AppError>;
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AppError>;
    async fn logout(&self) -> Result<(), AppError>;
    async fn current_user(&self) -> Result<User, AppError>;
    async fn username_available(&self, username: &str) -> Result<bool, AppError>;
    async fn email_available(&self, email: &str) -> Result<bool, AppError>;

    // リスト
    async fn get_lists(&self) -> Result<Vec<TodoList>, AppError>;
    async fn get_list(&self, list_id: ListId) -> Result<TodoList, AppError>;
    async fn create_list(&self, input: &ListInput) -> Result<TodoList, AppError>;
    async fn update_list(&self, list_id: ListId, input: &ListInput) -> Result<TodoList, AppError>;
    async fn delete_list(&self, list_id: ListId) -> Result<(), AppError>;

    // アイテム
    async fn get_list_items(&self, list_id: ListId) -> Result<Vec<Item>, AppError>;
    async fn create_item(&self, list_id: ListId, input: &ItemInput) -> Result<Item, AppError>;
    async fn create_subitem(&self, parent_id: ItemId, input: &ItemInput) -> Result<Item, AppError>;
    async fn update_item(&self, item_id: ItemId, patch: &ItemPatch) -> Result<Item, AppError>;
    async fn delete_item(&self, item_id: ItemId) -> Result<(), AppError>;
    async fn move_item(&self, item_id: ItemId, target: ListId) -> Result<(), AppError>;
}
