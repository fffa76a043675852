use thiserror::Error;

use crate::todo::{ItemId, ListId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // アカウント関連のエラー
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    // ToDo関連のエラー
    #[error("Invalid title: {0}")]
    InvalidTitle(String),

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Only top-level items can be moved (item {0} has a parent)")]
    NotTopLevel(ItemId),

    #[error("Item is already in list {0}")]
    SameList(ListId),
}
