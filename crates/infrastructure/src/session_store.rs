use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use shared::{AppError, Session};
use tracing::debug;

/// ログインセッションの保存先
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>, AppError>;
    fn save(&self, session: &Session) -> Result<(), AppError>;
    fn clear(&self) -> Result<(), AppError>;
}

/// JSONファイルに保存するセッションストア
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, AppError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Session(format!("{}: {e}", self.path.display()))),
        };

        serde_json::from_str(&contents).map(Some).map_err(|e| {
            AppError::Session(format!("corrupt session file {}: {e}", self.path.display()))
        })
    }

    /// 一時ファイルに書いてから置き換える
    fn save(&self, session: &Session) -> Result<(), AppError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::Session(format!("{}: {e}", dir.display())))?;

        let json = serde_json::to_vec_pretty(session)
            .map_err(|e| AppError::Serialization(e.to_string()))?;

        let mut file = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| AppError::Session(format!("{}: {e}", dir.display())))?;
        file.write_all(&json)
            .map_err(|e| AppError::Session(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(file.path(), fs::Permissions::from_mode(0o600))
                .map_err(|e| AppError::Session(e.to_string()))?;
        }

        file.persist(&self.path)
            .map_err(|e| AppError::Session(format!("{}: {e}", self.path.display())))?;

        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), AppError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Session(format!("{}: {e}", self.path.display()))),
        }
    }
}

/// メモリ上のセッションストア
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, Option<Session>>, AppError> {
        self.session
            .lock()
            .map_err(|_| AppError::Internal("session lock poisoned".to_string()))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, AppError> {
        Ok(self.guard()?.clone())
    }

    fn save(&self, session: &Session) -> Result<(), AppError> {
        *self.guard()? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AppError> {
        *self.guard()? = None;
        Ok(())
    }
}
