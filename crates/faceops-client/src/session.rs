//! Operator session: hydrated from persisted storage at construction,
//! explicitly established on login and invalidated on logout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What survives between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Persistence backend for [`Session`].
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredCredentials>, SessionError>;
    fn save(&self, creds: &StoredCredentials) -> Result<(), SessionError>;
    /// Remove persisted credentials. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), SessionError>;
}

/// JSON file store, readable only by the owner on Unix.
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

    fn io_err(&self, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<StoredCredentials>, SessionError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        match serde_json::from_str(&text) {
            Ok(creds) => Ok(Some(creds)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    fn save(&self, creds: &StoredCredentials) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            crate::config::ensure_dir(parent).map_err(|e| self.io_err(e))?;
        }
        let body = serde_json::to_vec_pretty(creds)?;
        std::fs::write(&self.path, body).map_err(|e| self.io_err(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| self.io_err(e))?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }
}

/// Process-local store for tests and one-shot tooling.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<StoredCredentials>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(creds: StoredCredentials) -> Self {
        Self {
            inner: Mutex::new(Some(creds)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<StoredCredentials>, SessionError> {
        Ok(self.inner.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn save(&self, creds: &StoredCredentials) -> Result<(), SessionError> {
        *self.inner.lock().unwrap_or_else(|p| p.into_inner()) = Some(creds.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.inner.lock().unwrap_or_else(|p| p.into_inner()) = None;
        Ok(())
    }
}

/// Authentication state of the console.
///
/// A stored, non-empty token means authenticated; the token itself is only
/// validated by the backend when it is used.
pub struct Session {
    store: Box<dyn SessionStore>,
    token: Option<String>,
    username: Option<String>,
}

impl Session {
    /// Build a session from whatever `store` currently holds.
    pub fn hydrate(store: impl SessionStore + 'static) -> Result<Self, SessionError> {
        let creds = store.load()?.filter(|c| !c.access_token.is_empty());
        let (token, username) = match creds {
            Some(c) => (Some(c.access_token), c.username),
            None => (None, None),
        };
        tracing::debug!(authenticated = token.is_some(), "session hydrated");
        Ok(Self {
            store: Box::new(store),
            token,
            username,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Persist a freshly issued token, then adopt it.
    pub fn establish(&mut self, token: String, username: String) -> Result<(), SessionError> {
        self.store.save(&StoredCredentials {
            access_token: token.clone(),
            username: Some(username.clone()),
        })?;
        self.token = Some(token);
        self.username = Some(username);
        Ok(())
    }

    /// Forget the session everywhere. Safe to call when already logged out.
    pub fn invalidate(&mut self) -> Result<(), SessionError> {
        self.store.clear()?;
        self.token = None;
        self.username = None;
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("username", &self.username)
            .finish()
    }
}
