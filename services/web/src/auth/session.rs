//! services/web/src/auth/session.rs
//!
//! Owns the signed-in session: persisting it, answering "who is signed in",
//! and tearing it down on logout or account deletion.

use marketplace_core::domain::{PendingSignup, Session};
use marketplace_core::ports::{AuthService, LoginOutcome, PortError, PortResult, SessionStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    auth: Arc<dyn AuthService>,
    current: Arc<RwLock<Option<Session>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, auth: Arc<dyn AuthService>) -> Self {
        Self {
            store,
            auth,
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Loads any persisted session into memory. Call once at startup.
    pub async fn restore(&self) -> PortResult<Option<Session>> {
        let session = self.store.load().await?;
        if let Some(s) = &session {
            info!("Restored session for user {}", s.user.id);
        }
        *self.current.write().await = session.clone();
        Ok(session)
    }

    /// Re-reads the signed-in user from the backend and stores it.
    ///
    /// A refused token signs the user out locally and yields `None`. Other
    /// failures leave the session untouched and are returned.
    pub async fn refresh_user(&self) -> PortResult<Option<Session>> {
        let Some(token) = self.token().await else {
            return Ok(None);
        };
        match self.auth.current_user(&token).await {
            Ok(user) => {
                let session = Session::new(token, user);
                self.sign_in(session.clone()).await?;
                Ok(Some(session))
            }
            Err(PortError::Unauthorized(reason)) => {
                warn!("Stored session was refused ({:?}); signing out locally.", reason);
                self.clear_local().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|s| s.is_authenticated())
            .map(|s| s.token.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token().await.is_some()
    }

    /// Stores a freshly issued session.
    pub async fn sign_in(&self, session: Session) -> PortResult<()> {
        self.store.save(&session).await?;
        info!("Signed in user {} as {:?}", session.user.id, session.user_type);
        *self.current.write().await = Some(session);
        Ok(())
    }

    /// Email/password login. When the backend demands an OTP nothing is stored
    /// and the caller continues with the verification flow.
    pub async fn login(&self, email: &str, password: &str) -> PortResult<LoginOutcome> {
        let outcome = self.auth.login(email, password).await?;
        if let LoginOutcome::SignedIn(session) = &outcome {
            self.sign_in(session.clone()).await?;
        }
        Ok(outcome)
    }

    /// Clears the local session. The backend is told first, but a failure
    /// there does not keep the user signed in locally.
    pub async fn sign_out(&self) -> PortResult<()> {
        if let Some(token) = self.token().await {
            if let Err(e) = self.auth.logout(&token).await {
                warn!("Backend logout failed, clearing local session anyway: {}", e);
            }
        }
        self.clear_local().await
    }

    /// Deletes the account on the backend, then clears the local session.
    pub async fn delete_account(&self) -> PortResult<()> {
        if let Some(token) = self.token().await {
            self.auth.delete_account(&token).await?;
        }
        self.clear_local().await
    }

    async fn clear_local(&self) -> PortResult<()> {
        self.store.clear().await?;
        self.store.clear_pending_signup().await?;
        *self.current.write().await = None;
        Ok(())
    }

    pub async fn set_pending_signup(&self, pending: &PendingSignup) -> PortResult<()> {
        self.store.save_pending_signup(pending).await
    }

    /// Returns the signup handoff and removes it, so it is consumed once.
    pub async fn take_pending_signup(&self) -> PortResult<Option<PendingSignup>> {
        let pending = self.store.load_pending_signup().await?;
        if pending.is_some() {
            self.store.clear_pending_signup().await?;
        }
        Ok(pending)
    }
}
