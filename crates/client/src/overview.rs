use std::sync::Arc;

use domain::validation::normalize_title;
use domain::{ListId, TodoList};
use infrastructure::{ListInput, TodoApi};
use shared::{record_error, AppError};
use tracing::info;

/// ログインユーザーのリスト一覧
pub struct ListsOverview<A: TodoApi + ?Sized> {
    api: Arc<A>,
    lists: Vec<TodoList>,
}

impl<A: TodoApi + ?Sized> ListsOverview<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            lists: Vec::new(),
        }
    }

    pub fn lists(&self) -> &[TodoList] {
        &self.lists
    }

    pub fn get(&self, list_id: ListId) -> Option<&TodoList> {
        self.lists.iter().find(|list| list.id == list_id)
    }

    pub async fn fetch(&mut self) -> Result<&[TodoList], AppError> {
        let lists = self.api.get_lists().await.map_err(|e| failed(e, "fetch_lists"))?;
        self.lists = lists;
        Ok(&self.lists)
    }

    pub async fn create(
        &mut self,
        title: &str,
        description: Option<&str>,
    ) -> Result<TodoList, AppError> {
        let input = list_input(title, description).map_err(|e| failed(e, "create_list"))?;
        let list = self
            .api
            .create_list(&input)
            .await
            .map_err(|e| failed(e, "create_list"))?;

        info!(list_id = %list.id, "List created");
        self.lists.push(list.clone());
        Ok(list)
    }

    /// タイトルと説明を置き換える（PUT）
    pub async fn update(
        &mut self,
        list_id: ListId,
        title: &str,
        description: Option<&str>,
    ) -> Result<TodoList, AppError> {
        let input = list_input(title, description).map_err(|e| failed(e, "update_list"))?;
        let list = self
            .api
            .update_list(list_id, &input)
            .await
            .map_err(|e| failed(e, "update_list"))?;

        match self.lists.iter_mut().find(|l| l.id == list_id) {
            Some(existing) => *existing = list.clone(),
            None => self.lists.push(list.clone()),
        }
        Ok(list)
    }

    pub async fn delete(&mut self, list_id: ListId) -> Result<(), AppError> {
        self.api
            .delete_list(list_id)
            .await
            .map_err(|e| failed(e, "delete_list"))?;

        self.lists.retain(|list| list.id != list_id);
        info!(list_id = %list_id, "List deleted");
        Ok(())
    }
}

fn list_input(title: &str, description: Option<&str>) -> Result<ListInput, AppError> {
    Ok(ListInput {
        title: normalize_title(title)?,
        description: description.map(str::to_string),
    })
}

fn failed(error: AppError, operation: &str) -> AppError {
    record_error(&error, operation);
    error
}
