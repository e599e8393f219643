//! services/web/src/adapters/session_store.rs
//!
//! Session persistence. `FileSessionStore` keeps the signed-in session in a JSON
//! document under the same keys the browser build used (`authToken`, `user`,
//! `userType`); the provider signup handoff is process-local, like
//! `sessionStorage`. `MemorySessionStore` keeps everything in memory.

use async_trait::async_trait;
use marketplace_core::domain::{PendingSignup, Session, User, UserRole};
use marketplace_core::ports::{PortError, PortResult, SessionStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::warn;

/// On-disk layout of the persisted session.
#[derive(Serialize, Deserialize, Default)]
struct StoredKeys {
    #[serde(rename = "authToken", default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<User>,
    #[serde(rename = "userType", default, skip_serializing_if = "Option::is_none")]
    user_type: Option<UserRole>,
}

impl StoredKeys {
    fn into_session(self) -> Option<Session> {
        let token = self.auth_token.filter(|t| !t.trim().is_empty())?;
        let user = self.user?;
        let user_type = self.user_type.unwrap_or(user.role);
        Some(Session {
            token,
            user,
            user_type,
        })
    }
}

//=========================================================================================
// File-backed store
//=========================================================================================

pub struct FileSessionStore {
    path: PathBuf,
    pending_signup: Mutex<Option<PendingSignup>>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pending_signup: Mutex::new(None),
        }
    }

    async fn read_keys(&self) -> PortResult<StoredKeys> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoredKeys::default()),
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };
        match serde_json::from_str(&raw) {
            Ok(keys) => Ok(keys),
            Err(e) => {
                // A corrupt file is treated as signed out rather than fatal.
                warn!("Ignoring unreadable session file {:?}: {}", self.path, e);
                Ok(StoredKeys::default())
            }
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> PortResult<Option<Session>> {
        Ok(self.read_keys().await?.into_session())
    }

    async fn save(&self, session: &Session) -> PortResult<()> {
        let keys = StoredKeys {
            auth_token: Some(session.token.clone()),
            user: Some(session.user.clone()),
            user_type: Some(session.user_type),
        };
        let json = serde_json::to_string_pretty(&keys)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn clear(&self) -> PortResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }

    async fn load_pending_signup(&self) -> PortResult<Option<PendingSignup>> {
        Ok(self.pending_signup.lock().await.clone())
    }

    async fn save_pending_signup(&self, pending: &PendingSignup) -> PortResult<()> {
        *self.pending_signup.lock().await = Some(pending.clone());
        Ok(())
    }

    async fn clear_pending_signup(&self) -> PortResult<()> {
        *self.pending_signup.lock().await = None;
        Ok(())
    }
}

//=========================================================================================
// In-memory store
//=========================================================================================

#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
    pending_signup: Mutex<Option<PendingSignup>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> PortResult<Option<Session>> {
        Ok(self.session.lock().await.clone())
    }

    async fn save(&self, session: &Session) -> PortResult<()> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> PortResult<()> {
        *self.session.lock().await = None;
        Ok(())
    }

    async fn load_pending_signup(&self) -> PortResult<Option<PendingSignup>> {
        Ok(self.pending_signup.lock().await.clone())
    }

    async fn save_pending_signup(&self, pending: &PendingSignup) -> PortResult<()> {
        *self.pending_signup.lock().await = Some(pending.clone());
        Ok(())
    }

    async fn clear_pending_signup(&self) -> PortResult<()> {
        *self.pending_signup.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            "tok",
            User {
                id: "u1".into(),
                name: "Ada".into(),
                email: "ada@example.com".into(),
                role: UserRole::Provider,
            },
        )
    }

    #[tokio::test]
    async fn file_store_round_trips_under_browser_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let store = FileSessionStore::new(&path);

        assert!(store.load().await.unwrap().is_none());
        store.save(&session()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["authToken"], "tok");
        assert_eq!(raw["userType"], "provider");

        assert_eq!(store.load().await.unwrap(), Some(session()));
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn empty_token_on_disk_means_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(
            &path,
            r#"{"authToken":"","user":{"id":"u1","name":"A","email":"a@b.c","role":"customer"}}"#,
        )
        .unwrap();
        let store = FileSessionStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileSessionStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pending_signup_is_not_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = FileSessionStore::new(&path);
        let pending = PendingSignup {
            name: "Bo".into(),
            email: "bo@example.com".into(),
            phone: None,
            zip_codes: vec!["10001".into()],
            services: vec!["plumbing".into()],
        };
        store.save_pending_signup(&pending).await.unwrap();
        assert!(!path.exists());
        assert_eq!(store.load_pending_signup().await.unwrap(), Some(pending));
        store.clear_pending_signup().await.unwrap();
        assert!(store.load_pending_signup().await.unwrap().is_none());
    }
}
