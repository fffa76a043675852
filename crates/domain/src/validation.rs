//! 入力バリデーション
//!
//! サーバー側でも同じ検証が行われるが、明らかに不正な入力は送信前に弾く。

use crate::errors::DomainError;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 80;
pub const EMAIL_MAX_LEN: usize = 120;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const TITLE_MAX_LEN: usize = 100;

/// ユーザー名を検証
pub fn validate_username(username: &str) -> Result<(), DomainError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(DomainError::InvalidUsername(format!(
            "must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"
        )));
    }
    if let Some(c) = username
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(DomainError::InvalidUsername(format!(
            "character {c:?} is not allowed"
        )));
    }
    Ok(())
}

/// メールアドレスを検証
pub fn validate_email(email: &str) -> Result<(), DomainError> {
    if email.is_empty() || email.len() > EMAIL_MAX_LEN {
        return Err(DomainError::InvalidEmail(email.to_string()));
    }
    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(DomainError::InvalidEmail(email.to_string())),
    };
    let domain_ok = domain
        .split('.')
        .all(|label| !label.is_empty())
        && domain.contains('.');
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(DomainError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

/// パスワードを検証
pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(DomainError::InvalidPassword(format!(
            "must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    if !password.chars().any(|c| c.is_alphabetic()) || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err(DomainError::InvalidPassword(
            "must contain a letter and a digit".to_string(),
        ));
    }
    Ok(())
}

/// タイトルを検証し、前後の空白を除いた値を返す
pub fn normalize_title(title: &str) -> Result<String, DomainError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidTitle("title cannot be empty".to_string()));
    }
    if trimmed.chars().count() > TITLE_MAX_LEN {
        return Err(DomainError::InvalidTitle(format!(
            "title must be at most {TITLE_MAX_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}
