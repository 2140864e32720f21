//! Admin session state.
//!
//! The bearer token lives in a small persisted key/value store under the
//! key `"token"`, the same key the browser front end used in local storage.
//! [`Session`] owns the store and caches the current token; it is the only
//! writer. The token is set at login and cleared at logout or when the
//! backend answers `401` to a document listing or a stats request.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::SessionError;

/// Storage key holding the bearer token.
pub const TOKEN_KEY: &str = "token";

/// Persistent backing store for the session token.
pub trait TokenStore: Send + Sync + Debug {
    fn load(&self) -> Result<Option<String>, SessionError>;
    fn save(&self, token: &str) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

// ============ File store ============

/// JSON object on disk, standing in for browser local storage.
///
/// Keys other than `"token"` are preserved when the token is written or
/// removed.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<serde_json::Map<String, serde_json::Value>, SessionError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Default::default()),
            Err(source) => {
                return Err(SessionError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(Default::default());
        }
        serde_json::from_str(&raw).map_err(|source| SessionError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_map(
        &self,
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), SessionError> {
        let io_err = |source| SessionError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let body = serde_json::to_string_pretty(map).map_err(|source| SessionError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, body).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)) {
                tracing::warn!("failed to chmod 0600 {}: {e}", self.path.display());
            }
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, SessionError> {
        let map = self.read_map()?;
        Ok(map
            .get(TOKEN_KEY)
            .and_then(|v| v.as_str())
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string))
    }

    fn save(&self, token: &str) -> Result<(), SessionError> {
        let mut map = self.read_map()?;
        map.insert(TOKEN_KEY.to_string(), serde_json::Value::String(token.to_string()));
        self.write_map(&map)
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut map = self.read_map()?;
        if map.remove(TOKEN_KEY).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

// ============ Memory store ============

/// In-memory store for tests. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    token: Arc<RwLock<Option<String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, SessionError> {
        let guard = self.token.read().map_err(|_| SessionError::Poisoned)?;
        Ok(guard.clone())
    }

    fn save(&self, token: &str) -> Result<(), SessionError> {
        let mut guard = self.token.write().map_err(|_| SessionError::Poisoned)?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut guard = self.token.write().map_err(|_| SessionError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}

// ============ Session ============

/// Explicit session object owned by the admin controller.
#[derive(Debug)]
pub struct Session {
    store: Box<dyn TokenStore>,
    token: Option<String>,
}

impl Session {
    /// Open a session, reading any token already persisted in `store`.
    pub fn open(store: Box<dyn TokenStore>) -> Result<Self, SessionError> {
        let token = store.load()?;
        Ok(Self { store, token })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn sign_in(&mut self, token: impl Into<String>) -> Result<(), SessionError> {
        let token = token.into();
        self.store.save(&token)?;
        self.token = Some(token);
        Ok(())
    }

    /// Drop the token. The in-memory copy is always cleared, even if the
    /// backing store cannot be updated.
    pub fn sign_out(&mut self) -> Result<(), SessionError> {
        self.token = None;
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save("abc").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn memory_store_clones_share_state() {
        let store = MemoryTokenStore::with_token("t1");
        let observer = store.clone();
        let mut session = Session::open(Box::new(store)).unwrap();
        assert_eq!(session.token(), Some("t1"));
        session.sign_out().unwrap();
        assert_eq!(observer.load().unwrap(), None);
    }

    #[test]
    fn file_store_missing_file_means_no_token() {
        let tmp = TempDir::new().unwrap();
        let store = FileTokenStore::new(tmp.path().join("nested/storage.json"));
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn file_store_persists_and_preserves_other_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("storage.json");
        fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let store = FileTokenStore::new(&path);
        store.save("jwt-123").unwrap();

        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.load().unwrap().as_deref(), Some("jwt-123"));

        reopened.clear().unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"theme": "dark"}));
    }

    #[test]
    fn file_store_reports_corruption() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("storage.json");
        fs::write(&path, "not json").unwrap();
        let err = FileTokenStore::new(&path).load().unwrap_err();
        assert!(matches!(err, SessionError::Corrupt { .. }));
    }
}
