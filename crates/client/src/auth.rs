use std::sync::Arc;

use domain::validation::{validate_email, validate_password, validate_username};
use domain::User;
use infrastructure::{AuthResponse, LoginRequest, RegisterRequest, SessionStore, TodoApi};
use shared::{record_error, AppError, Session};
use tracing::{info, warn};

/// アカウント操作とセッションの永続化
pub struct AuthService<A: TodoApi + ?Sized> {
    api: Arc<A>,
    sessions: Arc<dyn SessionStore>,
}

impl<A: TodoApi + ?Sized> AuthService<A> {
    pub fn new(api: Arc<A>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { api, sessions }
    }

    /// 入力を検証してから登録し、そのままログイン状態にする
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let request = validated_registration(username, email, password)
            .map_err(|e| failed(e, "register"))?;
        let response = self
            .api
            .register(&request)
            .await
            .map_err(|e| failed(e, "register"))?;
        self.persist(response)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User, AppError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(failed(
                AppError::Validation("Missing username or password".to_string()),
                "login",
            ));
        }

        let response = self
            .api
            .login(&LoginRequest {
                username: username.trim().to_string(),
                password: password.to_string(),
            })
            .await
            .map_err(|e| failed(e, "login"))?;
        self.persist(response)
    }

    /// サーバーへの通知は失敗しても続行し、ローカルのセッションは必ず消す
    pub async fn logout(&self) -> Result<(), AppError> {
        if self.sessions.load()?.is_none() {
            return Ok(());
        }
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Server-side logout failed, clearing local session anyway");
        }
        self.sessions.clear()?;
        info!("Logged out");
        Ok(())
    }

    pub fn session(&self) -> Result<Option<Session>, AppError> {
        self.sessions.load()
    }

    /// 保存済みのユーザー（期限切れでも返す）
    pub fn current_user(&self) -> Result<Option<User>, AppError> {
        Ok(self.sessions.load()?.map(|session| session.user))
    }

    /// 有効なセッションがあるか
    pub fn is_signed_in(&self) -> Result<bool, AppError> {
        Ok(match self.sessions.load()? {
            Some(session) => session.ensure_fresh().is_ok(),
            None => false,
        })
    }

    /// サーバーからプロフィールを取り直し、保存内容を更新
    pub async fn refresh_profile(&self) -> Result<User, AppError> {
        let mut session = self.sessions.load()?.ok_or(AppError::NotAuthenticated)?;
        let user = self
            .api
            .current_user()
            .await
            .map_err(|e| failed(e, "refresh_profile"))?;
        session.user = user.clone();
        self.sessions.save(&session)?;
        Ok(user)
    }

    pub async fn username_available(&self, username: &str) -> Result<bool, AppError> {
        self.api
            .username_available(username.trim())
            .await
            .map_err(|e| failed(e, "username_available"))
    }

    pub async fn email_available(&self, email: &str) -> Result<bool, AppError> {
        self.api
            .email_available(email.trim())
            .await
            .map_err(|e| failed(e, "email_available"))
    }

    fn persist(&self, response: AuthResponse) -> Result<User, AppError> {
        let session = Session::new(response.access_token, response.user);
        self.sessions.save(&session)?;
        info!(username = %session.user.username, "Signed in");
        Ok(session.user)
    }
}

fn validated_registration(
    username: &str,
    email: &str,
    password: &str,
) -> Result<RegisterRequest, AppError> {
    let username = username.trim();
    let email = email.trim();
    validate_username(username)?;
    validate_email(email)?;
    validate_password(password)?;

    Ok(RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    })
}

fn failed(error: AppError, operation: &str) -> AppError {
    record_error(&error, operation);
    error
}
