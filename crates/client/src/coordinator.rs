//! 1つのリストに対する変更操作と、ローカル状態との整合
//!
//! 各操作はリモートAPIを呼び、成功したらローカルを部分更新するか全件を再取得する。
//! 失敗時はローカル状態に触れず、診断ログに記録して呼び出し元へ返す。

use std::sync::Arc;

use domain::validation::normalize_title;
use domain::{
    build_forest, detached_items, find_node, flatten_visible, DomainError, ExpansionState, Item,
    ItemId, ListId, TodoList, TreeNode, VisibleRow,
};
use infrastructure::{ItemInput, ItemPatch, TodoApi};
use serde::Serialize;
use shared::AppError;
use tracing::{debug, error, info, warn};

/// 移動先の候補
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveTarget {
    pub id: ListId,
    pub title: String,
}

/// 表示中のリストのローカル状態
#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    /// リストのメタデータと全アイテム（フラット）
    pub list: TodoList,
    pub expansion: ExpansionState,
    /// 自分以外のリスト
    pub move_targets: Vec<MoveTarget>,
}

impl ListView {
    fn from_fetch(list: TodoList, all_lists: &[TodoList], previous: Option<&ExpansionState>) -> Self {
        let mut expansion = previous.cloned().unwrap_or_default();
        expansion.reseed(&list.items);

        let move_targets = all_lists
            .iter()
            .filter(|other| other.id != list.id)
            .map(|other| MoveTarget {
                id: other.id,
                title: other.title.clone(),
            })
            .collect();

        Self {
            list,
            expansion,
            move_targets,
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.list.items
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.list.find_item(id)
    }

    fn require(&self, id: ItemId) -> Result<&Item, DomainError> {
        self.item(id).ok_or(DomainError::ItemNotFound(id))
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.list.items.iter_mut().find(|item| item.id == id)
    }
}

/// 1つのリストの変更を調整する
pub struct MutationCoordinator<A: TodoApi + ?Sized> {
    api: Arc<A>,
    view: ListView,
}

impl<A: TodoApi + ?Sized> MutationCoordinator<A> {
    /// リストと移動先候補を取得して開く
    pub async fn open(api: Arc<A>, list_id: ListId) -> Result<Self, AppError> {
        match fetch_view(api.as_ref(), list_id, None).await {
            Ok(view) => Ok(Self { api, view }),
            Err(e) => {
                error!(operation = "open", list_id = %list_id, error = %e, "Failed to load list");
                Err(e)
            }
        }
    }

    pub fn view(&self) -> &ListView {
        &self.view
    }

    pub fn list_id(&self) -> ListId {
        self.view.list.id
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.view.expansion
    }

    pub fn forest(&self) -> Vec<TreeNode> {
        build_forest(self.view.items())
    }

    /// 表示行を作る
    pub fn visible_rows<'a>(&self, forest: &'a [TreeNode]) -> Vec<VisibleRow<'a>> {
        flatten_visible(forest, &self.view.expansion)
    }

    /// 全件再取得（展開状態は残っているIDについて引き継ぐ）
    pub async fn refresh(&mut self) -> Result<(), AppError> {
        let result = self.reload().await;
        self.report("refresh", result)
    }

    /// トップレベルのアイテムを作成し、返ってきたレコードを末尾に追加
    pub async fn create_item(
        &mut self,
        title: &str,
        description: Option<&str>,
    ) -> Result<ItemId, AppError> {
        let result = self.try_create_item(title, description).await;
        self.report("create_item", result)
    }

    /// サブアイテムを作成して全件再取得
    pub async fn create_subitem(
        &mut self,
        parent_id: ItemId,
        title: &str,
        description: Option<&str>,
    ) -> Result<ItemId, AppError> {
        let result = self.try_create_subitem(parent_id, title, description).await;
        self.report("create_subitem", result)
    }

    /// 削除後、ローカルから取り除き子の親を外す
    pub async fn delete_item(&mut self, item_id: ItemId) -> Result<(), AppError> {
        let result = self.try_delete_item(item_id).await;
        self.report("delete_item", result)
    }

    /// 完了状態を反転し、子孫にも同じ値を反映する
    /// 反転後の状態を返す
    pub async fn toggle_completion(&mut self, item_id: ItemId) -> Result<bool, AppError> {
        let result = self.try_toggle_completion(item_id).await;
        self.report("toggle_completion", result)
    }

    /// タイトル・説明の更新
    pub async fn update_item(
        &mut self,
        item_id: ItemId,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), AppError> {
        let result = self.try_update_item(item_id, title, description).await;
        self.report("update_item", result)
    }

    /// 別のリストへ移動して全件再取得
    pub async fn move_item(&mut self, item_id: ItemId, target: ListId) -> Result<(), AppError> {
        let result = self.try_move_item(item_id, target).await;
        self.report("move_item", result)
    }

    /// 展開/折りたたみを1件だけ反転（ローカルのみ）
    pub fn toggle_expanded(&mut self, item_id: ItemId) -> Result<bool, AppError> {
        let result = self
            .view
            .require(item_id)
            .map(|_| ())
            .map_err(AppError::from);
        self.report("toggle_expanded", result)?;
        Ok(self.view.expansion.toggle(item_id))
    }

    pub fn expand_all(&mut self) {
        self.view.expansion.expand_all();
    }

    pub fn collapse_all(&mut self) {
        self.view.expansion.collapse_all();
    }

    fn report<T>(&self, operation: &'static str, result: Result<T, AppError>) -> Result<T, AppError> {
        match &result {
            Err(AppError::RefetchFailed(reason)) => warn!(
                operation,
                list_id = %self.view.list.id,
                reason = %reason,
                "Mutation applied on server, local view is stale"
            ),
            Err(e) => error!(
                operation,
                list_id = %self.view.list.id,
                code = e.metadata().code,
                error = %e,
                "List mutation failed"
            ),
            Ok(_) => {}
        }
        result
    }

    async fn reload(&mut self) -> Result<(), AppError> {
        let view = fetch_view(self.api.as_ref(), self.view.list.id, Some(&self.view.expansion)).await?;
        self.view = view;
        Ok(())
    }

    /// 変更が成功した後の再取得
    /// 失敗しても変更自体は取り消されないので `RefetchFailed` として返す
    async fn reload_after_mutation(&mut self) -> Result<(), AppError> {
        self.reload()
            .await
            .map_err(|e| AppError::RefetchFailed(e.to_string()))
    }

    async fn try_create_item(
        &mut self,
        title: &str,
        description: Option<&str>,
    ) -> Result<ItemId, AppError> {
        let input = item_input(title, description)?;
        let mut item = self.api.create_item(self.view.list.id, &input).await?;
        item.list_id.get_or_insert(self.view.list.id);

        let id = item.id;
        self.view.expansion.observe(id);
        self.view.list.items.push(item);
        info!(item_id = %id, "Item created");
        Ok(id)
    }

    async fn try_create_subitem(
        &mut self,
        parent_id: ItemId,
        title: &str,
        description: Option<&str>,
    ) -> Result<ItemId, AppError> {
        self.view.require(parent_id)?;
        let input = item_input(title, description)?;

        let item = self.api.create_subitem(parent_id, &input).await?;
        self.reload_after_mutation().await?;
        info!(item_id = %item.id, parent_id = %parent_id, "Sub-item created");
        Ok(item.id)
    }

    async fn try_delete_item(&mut self, item_id: ItemId) -> Result<(), AppError> {
        self.view.require(item_id)?;
        self.api.delete_item(item_id).await?;

        let items = &mut self.view.list.items;
        items.retain(|item| item.id != item_id);
        for child in items.iter_mut().filter(|item| item.parent_id == Some(item_id)) {
            child.parent_id = None;
        }
        self.view.expansion.forget(item_id);
        info!(item_id = %item_id, "Item deleted");
        Ok(())
    }

    async fn try_toggle_completion(&mut self, item_id: ItemId) -> Result<bool, AppError> {
        let completed = !self.view.require(item_id)?.completed;
        let updated = self
            .api
            .update_item(item_id, &ItemPatch::completion(completed))
            .await?;

        let descendants = find_node(&self.forest(), item_id)
            .map(TreeNode::descendant_ids)
            .unwrap_or_default();
        for id in descendants {
            if let Some(item) = self.view.item_mut(id) {
                item.completed = completed;
            }
        }
        if let Some(item) = self.view.item_mut(item_id) {
            apply_record(item, updated);
            item.completed = completed;
        }
        debug!(item_id = %item_id, completed, "Completion toggled");
        Ok(completed)
    }

    async fn try_update_item(
        &mut self,
        item_id: ItemId,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), AppError> {
        self.view.require(item_id)?;
        let patch = ItemPatch {
            title: title.map(normalize_title).transpose()?,
            description: description.map(str::to_string),
            completed: None,
        };
        if patch.is_empty() {
            return Err(DomainError::Validation("nothing to update".to_string()).into());
        }

        let updated = self.api.update_item(item_id, &patch).await?;
        if let Some(item) = self.view.item_mut(item_id) {
            apply_record(item, updated);
        }
        Ok(())
    }

    async fn try_move_item(&mut self, item_id: ItemId, target: ListId) -> Result<(), AppError> {
        self.view
            .require(item_id)?
            .ensure_movable(self.view.list.id, target)?;
        if !self.view.move_targets.iter().any(|t| t.id == target) {
            warn!(target_list = %target, "Move target is not among the known lists");
        }

        self.api.move_item(item_id, target).await?;
        self.reload_after_mutation().await?;
        info!(item_id = %item_id, target_list = %target, "Item moved");
        Ok(())
    }
}

async fn fetch_view<A: TodoApi + ?Sized>(
    api: &A,
    list_id: ListId,
    previous: Option<&ExpansionState>,
) -> Result<ListView, AppError> {
    let list = api.get_list(list_id).await?;
    let all_lists = api.get_lists().await?;

    let detached: Vec<ItemId> = detached_items(&list.items).iter().map(|i| i.id).collect();
    if !detached.is_empty() {
        warn!(
            list_id = %list_id,
            detached = ?detached,
            "Items unreachable from any root (cyclic or missing parent)"
        );
    }

    Ok(ListView::from_fetch(list, &all_lists, previous))
}

fn item_input(title: &str, description: Option<&str>) -> Result<ItemInput, AppError> {
    Ok(ItemInput {
        title: normalize_title(title)?,
        description: description.map(str::to_string),
    })
}

/// サーバーが返したレコードで置き換える（欠けている所属情報は保持）
fn apply_record(item: &mut Item, mut record: Item) {
    if record.list_id.is_none() {
        record.list_id = item.list_id;
    }
    *item = record;
}
