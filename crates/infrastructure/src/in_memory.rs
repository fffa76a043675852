//! サーバーの振る舞いを再現するインメモリ実装（開発/テスト用）

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use domain::validation::{validate_email, validate_password, validate_username};
use domain::{Item, ItemId, ListId, TodoList, User, UserId};
use shared::{AppError, Session};

use crate::api::{
    AuthResponse, ItemInput, ItemPatch, ListInput, LoginRequest, RegisterRequest, TodoApi,
};
use crate::session_store::SessionStore;

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: String,
}

#[derive(Debug, Clone)]
struct StoredList {
    owner: UserId,
    list: TodoList,
}

#[derive(Debug, Default)]
struct State {
    accounts: Vec<Account>,
    tokens: HashMap<String, UserId>,
    revoked: HashSet<String>,
    lists: Vec<StoredList>,
    // 全リストのアイテム（作成順）
    items: Vec<Item>,
    next_user: i64,
    next_list: i64,
    next_item: i64,
    next_token: u64,
    // 次の呼び出しで返すエラー
    failures: VecDeque<AppError>,
    // 指定した操作が次に呼ばれたときに返すエラー
    targeted_failures: Vec<(&'static str, AppError)>,
    // 呼び出し履歴（テスト観測用）
    calls: Vec<&'static str>,
}

impl State {
    fn issue_token(&mut self, user_id: UserId) -> String {
        self.next_token += 1;
        let token = format!("memory-token-{}-{}", user_id.value(), self.next_token);
        self.tokens.insert(token.clone(), user_id);
        token
    }

    fn user(&self, id: UserId) -> Option<&User> {
        self.accounts
            .iter()
            .map(|account| &account.user)
            .find(|user| user.id == id)
    }

    fn items_of(&self, list_id: ListId) -> Vec<Item> {
        self.items
            .iter()
            .filter(|item| item.list_id == Some(list_id))
            .cloned()
            .collect()
    }

    fn with_items(&self, stored: &StoredList) -> TodoList {
        TodoList {
            items: self.items_of(stored.list.id),
            ..stored.list.clone()
        }
    }

    /// 所有者チェック付きでリストを取得（なければ404、他人のものなら403）
    fn owned_list(&self, owner: UserId, list_id: ListId) -> Result<&StoredList, AppError> {
        let stored = self
            .lists
            .iter()
            .find(|stored| stored.list.id == list_id)
            .ok_or_else(|| AppError::NotFound(format!("list {list_id}")))?;
        if stored.owner != owner {
            return Err(AppError::Authorization("Unauthorized access".to_string()));
        }
        Ok(stored)
    }

    fn owned_item_index(&self, owner: UserId, item_id: ItemId) -> Result<usize, AppError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| AppError::NotFound(format!("item {item_id}")))?;
        let list_id = self.items[index]
            .list_id
            .ok_or_else(|| AppError::Internal(format!("item {item_id} has no list")))?;
        self.owned_list(owner, list_id)?;
        Ok(index)
    }

    fn set_completed_cascading(&mut self, root: ItemId, completed: bool) {
        let mut pending = vec![root];
        let mut seen = HashSet::new();
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            for item in self.items.iter_mut() {
                if item.id == id {
                    item.completed = completed;
                } else if item.parent_id == Some(id) {
                    pending.push(item.id);
                }
            }
        }
    }

    fn insert_item(
        &mut self,
        list_id: ListId,
        parent_id: Option<ItemId>,
        input: &ItemInput,
        default_description: Option<String>,
    ) -> Item {
        self.next_item += 1;
        let now = Utc::now();
        let item = Item {
            id: ItemId::new(self.next_item),
            title: input.title.clone(),
            description: input.description.clone().or(default_description),
            completed: false,
            parent_id,
            list_id: Some(list_id),
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.items.push(item.clone());
        item
    }
}

/// `TodoApi` のインメモリ実装
///
/// 所有者チェック、完了状態の子孫への伝播、削除時の子の親解除、
/// トップレベルのみの移動など、サーバーと同じ規則で振る舞う。
/// 認証はセッションストアに保存されたトークンで判定する。
pub struct InMemoryTodoApi {
    state: Mutex<State>,
    sessions: Arc<dyn SessionStore>,
}

impl InMemoryTodoApi {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            sessions,
        }
    }

    /// ユーザーを登録し、そのセッションを返す（保存はしない）
    pub fn add_user(&self, username: &str, email: &str, password: &str) -> Result<Session, AppError> {
        let mut state = self.lock()?;
        let response = register_in(&mut state, username, email, password)?;
        Ok(Session::new(response.access_token, response.user))
    }

    /// 次の呼び出しを指定したエラーで失敗させる
    pub fn fail_next(&self, error: AppError) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.push_back(error);
        }
    }

    /// 指定した操作が次に呼ばれたときだけ失敗させる
    pub fn fail_on(&self, operation: &'static str, error: AppError) {
        if let Ok(mut state) = self.state.lock() {
            state.targeted_failures.push((operation, error));
        }
    }

    /// これまでに呼ばれた操作名
    pub fn calls(&self) -> Vec<&'static str> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|call| **call == operation).count()
    }

    /// リスト所有者の判定を通さずに全アイテムを覗く
    pub fn stored_items(&self, list_id: ListId) -> Vec<Item> {
        self.state
            .lock()
            .map(|state| state.items_of(list_id))
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("in-memory state poisoned".to_string()))
    }

    /// 呼び出しを記録し、注入されたエラーがあればそれを返す
    fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, State>, AppError> {
        let mut state = self.lock()?;
        state.calls.push(operation);
        if let Some(pos) = state
            .targeted_failures
            .iter()
            .position(|(target, _)| *target == operation)
        {
            let (_, error) = state.targeted_failures.remove(pos);
            return Err(error);
        }
        match state.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }

    fn current_token(&self) -> Result<String, AppError> {
        let session = self.sessions.load()?.ok_or(AppError::NotAuthenticated)?;
        Ok(session.token)
    }

    fn authenticate(&self, state: &State) -> Result<UserId, AppError> {
        let token = self.current_token()?;
        if state.revoked.contains(&token) {
            return Err(AppError::from_status(401, "Token has been revoked"));
        }
        state
            .tokens
            .get(&token)
            .copied()
            .ok_or_else(|| AppError::InvalidJwt("Not enough segments".to_string()))
    }
}

fn register_in(
    state: &mut State,
    username: &str,
    email: &str,
    password: &str,
) -> Result<AuthResponse, AppError> {
    validate_username(username)?;
    validate_email(email)?;
    validate_password(password)?;

    if state.accounts.iter().any(|a| a.user.username == username) {
        return Err(AppError::AlreadyExists("Username already taken".to_string()));
    }
    if state.accounts.iter().any(|a| a.user.email == email) {
        return Err(AppError::AlreadyExists("Email already registered".to_string()));
    }

    state.next_user += 1;
    let user = User {
        id: UserId::new(state.next_user),
        username: username.to_string(),
        email: email.to_string(),
        created_at: Some(Utc::now()),
        last_login: None,
    };
    state.accounts.push(Account {
        user: user.clone(),
        password: password.to_string(),
    });
    let access_token = state.issue_token(user.id);

    Ok(AuthResponse {
        message: Some("User registered successfully".to_string()),
        access_token,
        user,
    })
}

#[async_trait]
impl TodoApi for InMemoryTodoApi {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AppError> {
        let mut state = self.enter("register")?;
        register_in(&mut state, &request.username, &request.email, &request.password)
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AppError> {
        let mut state = self.enter("login")?;
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.user.username == request.username && a.password == request.password)
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;
        account.user.last_login = Some(Utc::now());
        let user = account.user.clone();
        let access_token = state.issue_token(user.id);

        Ok(AuthResponse {
            message: Some("Login successful".to_string()),
            access_token,
            user,
        })
    }

    async fn logout(&self) -> Result<(), AppError> {
        let mut state = self.enter("logout")?;
        self.authenticate(&state)?;
        let token = self.current_token()?;
        state.revoked.insert(token);
        Ok(())
    }

    async fn current_user(&self) -> Result<User, AppError> {
        let state = self.enter("current_user")?;
        let user_id = self.authenticate(&state)?;
        state
            .user(user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn username_available(&self, username: &str) -> Result<bool, AppError> {
        let state = self.enter("username_available")?;
        if username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        Ok(!state.accounts.iter().any(|a| a.user.username == username))
    }

    async fn email_available(&self, email: &str) -> Result<bool, AppError> {
        let state = self.enter("email_available")?;
        if email.is_empty() {
            return Err(AppError::Validation("Email is required".to_string()));
        }
        Ok(!state.accounts.iter().any(|a| a.user.email == email))
    }

    async fn get_lists(&self) -> Result<Vec<TodoList>, AppError> {
        let state = self.enter("get_lists")?;
        let owner = self.authenticate(&state)?;
        Ok(state
            .lists
            .iter()
            .filter(|stored| stored.owner == owner)
            .map(|stored| state.with_items(stored))
            .collect())
    }

    async fn get_list(&self, list_id: ListId) -> Result<TodoList, AppError> {
        let state = self.enter("get_list")?;
        let owner = self.authenticate(&state)?;
        let stored = state.owned_list(owner, list_id)?;
        Ok(state.with_items(stored))
    }

    async fn create_list(&self, input: &ListInput) -> Result<TodoList, AppError> {
        let mut state = self.enter("create_list")?;
        let owner = self.authenticate(&state)?;

        state.next_list += 1;
        let now = Utc::now();
        let list = TodoList {
            id: ListId::new(state.next_list),
            title: input.title.clone(),
            description: Some(input.description.clone().unwrap_or_default()),
            created_at: Some(now),
            updated_at: Some(now),
            items: Vec::new(),
        };
        state.lists.push(StoredList {
            owner,
            list: list.clone(),
        });
        Ok(list)
    }

    async fn update_list(&self, list_id: ListId, input: &ListInput) -> Result<TodoList, AppError> {
        let mut state = self.enter("update_list")?;
        let owner = self.authenticate(&state)?;
        state.owned_list(owner, list_id)?;

        let stored = state
            .lists
            .iter_mut()
            .find(|stored| stored.list.id == list_id)
            .ok_or_else(|| AppError::NotFound(format!("list {list_id}")))?;
        stored.list.title = input.title.clone();
        stored.list.description = input.description.clone();
        stored.list.updated_at = Some(Utc::now());
        let stored = stored.clone();

        Ok(state.with_items(&stored))
    }

    async fn delete_list(&self, list_id: ListId) -> Result<(), AppError> {
        let mut state = self.enter("delete_list")?;
        let owner = self.authenticate(&state)?;
        state.owned_list(owner, list_id)?;

        state.lists.retain(|stored| stored.list.id != list_id);
        state.items.retain(|item| item.list_id != Some(list_id));
        Ok(())
    }

    async fn get_list_items(&self, list_id: ListId) -> Result<Vec<Item>, AppError> {
        let state = self.enter("get_list_items")?;
        let owner = self.authenticate(&state)?;
        state.owned_list(owner, list_id)?;
        Ok(state.items_of(list_id))
    }

    async fn create_item(&self, list_id: ListId, input: &ItemInput) -> Result<Item, AppError> {
        let mut state = self.enter("create_item")?;
        let owner = self.authenticate(&state)?;
        state.owned_list(owner, list_id)?;
        Ok(state.insert_item(list_id, None, input, None))
    }

    async fn create_subitem(&self, parent_id: ItemId, input: &ItemInput) -> Result<Item, AppError> {
        let mut state = self.enter("create_subitem")?;
        let owner = self.authenticate(&state)?;
        let index = state.owned_item_index(owner, parent_id)?;
        let list_id = state.items[index]
            .list_id
            .ok_or_else(|| AppError::Internal(format!("item {parent_id} has no list")))?;
        Ok(state.insert_item(list_id, Some(parent_id), input, Some(String::new())))
    }

    async fn update_item(&self, item_id: ItemId, patch: &ItemPatch) -> Result<Item, AppError> {
        let mut state = self.enter("update_item")?;
        let owner = self.authenticate(&state)?;
        let index = state.owned_item_index(owner, item_id)?;

        if let Some(completed) = patch.completed {
            state.set_completed_cascading(item_id, completed);
        }
        let item = &mut state.items[index];
        if let Some(title) = &patch.title {
            item.title = title.clone();
        }
        if let Some(description) = &patch.description {
            item.description = Some(description.clone());
        }
        item.updated_at = Some(Utc::now());
        Ok(item.clone())
    }

    async fn delete_item(&self, item_id: ItemId) -> Result<(), AppError> {
        let mut state = self.enter("delete_item")?;
        let owner = self.authenticate(&state)?;
        let index = state.owned_item_index(owner, item_id)?;

        state.items.remove(index);
        for child in state.items.iter_mut().filter(|i| i.parent_id == Some(item_id)) {
            child.parent_id = None;
        }
        Ok(())
    }

    /// 子孫は元のリストに残る（サーバーと同じ）
    async fn move_item(&self, item_id: ItemId, target: ListId) -> Result<(), AppError> {
        let mut state = self.enter("move_item")?;
        let owner = self.authenticate(&state)?;
        let index = state.owned_item_index(owner, item_id)?;

        match state.lists.iter().find(|stored| stored.list.id == target) {
            Some(stored) if stored.owner == owner => {}
            _ => {
                return Err(AppError::Authorization(
                    "Invalid list ID or unauthorized access".to_string(),
                ))
            }
        }
        if !state.items[index].is_root() {
            return Err(AppError::Validation(
                "Only top-level tasks can be moved".to_string(),
            ));
        }

        let item = &mut state.items[index];
        item.list_id = Some(target);
        item.updated_at = Some(Utc::now());
        Ok(())
    }
}
