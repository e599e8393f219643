//! crates/marketplace_core/src/ports.rs
//!
//! Defines the service contracts (traits) the client core depends on.
//! Concrete HTTP, file and platform implementations live in the `web` service,
//! which keeps the state machines in this crate free of I/O.

use async_trait::async_trait;

use crate::domain::{GeoPoint, PendingSignup, PushPermission, SearchResults, Session, User};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The message shown when the backend gives no usable reason for a failure.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Shown for a refused token when the backend gave no reason.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The payload is the backend's reason, when it gave one.
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The backend refused the request; the payload is the human-readable reason.
    #[error("{0}")]
    Rejected(String),
    /// The credentials or token were refused, with the backend's reason if any.
    #[error("Unauthorized")]
    Unauthorized(Option<String>),
    #[error("Network error: {0}")]
    Network(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// The text to put in front of the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            PortError::Rejected(message) | PortError::NotFound(message)
                if !message.trim().is_empty() =>
            {
                message.clone()
            }
            PortError::Unauthorized(Some(message)) if !message.trim().is_empty() => {
                message.clone()
            }
            PortError::Unauthorized(_) => SESSION_EXPIRED_MESSAGE.to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// What a login attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    SignedIn(Session),
    /// The account must confirm a one-time code sent to this address first.
    OtpRequired { email: String },
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> PortResult<LoginOutcome>;

    async fn verify_otp(&self, email: &str, code: &str) -> PortResult<Session>;

    async fn resend_otp(&self, email: &str) -> PortResult<()>;

    async fn logout(&self, token: &str) -> PortResult<()>;

    async fn delete_account(&self, token: &str) -> PortResult<()>;

    async fn current_user(&self, token: &str) -> PortResult<User>;
}

#[async_trait]
pub trait SearchService: Send + Sync {
    /// Looks up providers and bundles offering `service` around `zip_code`.
    async fn search(&self, zip_code: &str, service: &str) -> PortResult<SearchResults>;
}

/// Persistent key/value storage for the signed-in session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> PortResult<Option<Session>>;

    async fn save(&self, session: &Session) -> PortResult<()>;

    async fn clear(&self) -> PortResult<()>;

    async fn load_pending_signup(&self) -> PortResult<Option<PendingSignup>>;

    async fn save_pending_signup(&self, pending: &PendingSignup) -> PortResult<()>;

    async fn clear_pending_signup(&self) -> PortResult<()>;
}

/// The platform side of push notifications: permission and device token.
#[async_trait]
pub trait PushTokenSource: Send + Sync {
    async fn request_permission(&self) -> PortResult<PushPermission>;

    async fn device_token(&self) -> PortResult<String>;
}

/// The backend side of push notifications: remembering which device to target.
#[async_trait]
pub trait DeviceTokenRegistry: Send + Sync {
    async fn register_device_token(&self, auth_token: &str, device_token: &str) -> PortResult<()>;
}

#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// Resolves a 5-digit US zip code. `Ok(None)` means the provider has no match.
    async fn lookup(&self, zip_code: &str) -> PortResult<Option<GeoPoint>>;
}
