use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;

/// ToDoアイテムID（サーバー採番の整数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(i64);

impl ItemId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| DomainError::InvalidId(format!("Invalid item id: {s}")))
    }
}

/// ToDoリストID（サーバー採番の整数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(i64);

impl ListId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ListId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| DomainError::InvalidId(format!("Invalid list id: {s}")))
    }
}

/// ToDoアイテム
///
/// 子アイテムは保持しない。同じリスト内で `parent_id` が自分のIDを指すアイテムから導出する。
/// サーバーが返すネストした `children` フィールドは読み捨てる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    #[serde(default)]
    pub list_id: Option<ListId>,
    #[serde(default, with = "crate::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Item {
    /// 最小限のフィールドでアイテムを作成
    pub fn new(id: ItemId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            completed: false,
            parent_id: None,
            list_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_parent(mut self, parent_id: ItemId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn in_list(mut self, list_id: ListId) -> Self {
        self.list_id = Some(list_id);
        self
    }

    /// トップレベル（親なし）かどうか
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// 別リストへの移動が可能かチェック
    /// サーバーはトップレベルのアイテムしか移動を受け付けない
    pub fn ensure_movable(&self, current: ListId, target: ListId) -> Result<(), DomainError> {
        if !self.is_root() {
            return Err(DomainError::NotTopLevel(self.id));
        }
        if current == target {
            return Err(DomainError::SameList(target));
        }
        Ok(())
    }
}

/// ToDoリスト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoList {
    pub id: ListId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "crate::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    /// リストに属する全アイテム（ネストしたものも含むフラットな並び）
    #[serde(default)]
    pub items: Vec<Item>,
}

impl TodoList {
    pub fn new(id: ListId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            created_at: None,
            updated_at: None,
            items: Vec::new(),
        }
    }

    pub fn find_item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// 完了済みアイテム数と全アイテム数
    pub fn progress(&self) -> (usize, usize) {
        let done = self.items.iter().filter(|item| item.completed).count();
        (done, self.items.len())
    }
}
