//! services/web/src/notifications.rs
//!
//! The push notification channel: registers this device for pushes once per
//! session and forwards foreground pushes into the shared notification list.

use chrono::{DateTime, Utc};
use marketplace_core::domain::{Notification, PushPermission};
use marketplace_core::init::{InitGuard, InitState};
use marketplace_core::notifications::NotificationList;
use marketplace_core::ports::{DeviceTokenRegistry, PortError, PortResult, PushTokenSource};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A push as delivered while the app is in the foreground.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    #[serde(default, alias = "messageId")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

impl PushPayload {
    fn into_notification(self) -> Notification {
        Notification {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: self.title.unwrap_or_else(|| "New notification".to_string()),
            body: self.body.unwrap_or_default(),
            link: self.link,
            created_at: self.sent_at.unwrap_or_else(Utc::now),
            is_read: false,
        }
    }
}

type ForegroundHandler = Box<dyn Fn(&Notification) + Send + Sync>;

pub struct NotificationChannel {
    tokens: Arc<dyn PushTokenSource>,
    registry: Arc<dyn DeviceTokenRegistry>,
    list: Arc<Mutex<NotificationList>>,
    guard: Mutex<InitGuard>,
    handlers: Mutex<Vec<ForegroundHandler>>,
}

impl NotificationChannel {
    pub fn new(
        tokens: Arc<dyn PushTokenSource>,
        registry: Arc<dyn DeviceTokenRegistry>,
        list: Arc<Mutex<NotificationList>>,
    ) -> Self {
        Self {
            tokens,
            registry,
            list,
            guard: Mutex::new(InitGuard::new()),
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn list(&self) -> Arc<Mutex<NotificationList>> {
        self.list.clone()
    }

    pub async fn init_state(&self) -> InitState {
        self.guard.lock().await.state().clone()
    }

    /// Requests permission, fetches the device token and registers it.
    ///
    /// Idempotent: while an attempt is running or after one succeeded this
    /// returns `Ok(false)` without doing anything. A failed attempt may be
    /// retried by calling again.
    pub async fn initialize(&self, auth_token: &str) -> PortResult<bool> {
        if !self.guard.lock().await.try_begin() {
            debug!("Notification channel already initialized or initializing.");
            return Ok(false);
        }

        let result = self.register(auth_token).await;
        let mut guard = self.guard.lock().await;
        match result {
            Ok(()) => {
                guard.succeed();
                info!("Push notifications registered.");
                Ok(true)
            }
            Err(e) => {
                guard.fail(e.to_string());
                warn!("Push registration attempt {} failed: {}", guard.attempts(), e);
                Err(e)
            }
        }
    }

    async fn register(&self, auth_token: &str) -> PortResult<()> {
        match self.tokens.request_permission().await? {
            PushPermission::Granted => {}
            other => {
                return Err(PortError::Rejected(format!(
                    "Notification permission not granted ({:?})",
                    other
                )))
            }
        }
        let device_token = self.tokens.device_token().await?;
        self.registry
            .register_device_token(auth_token, &device_token)
            .await
    }

    /// Retries `initialize` every `interval` until it succeeds, `max_attempts`
    /// attempts have failed, or `cancel` fires.
    pub async fn initialize_with_retry(
        &self,
        auth_token: &str,
        max_attempts: u32,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> bool {
        for attempt in 1..=max_attempts {
            match self.initialize(auth_token).await {
                Ok(_) => return self.guard.lock().await.is_ready(),
                Err(e) => debug!("Push registration retry {}/{}: {}", attempt, max_attempts, e),
            }
            if attempt == max_attempts {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        warn!("Giving up on push registration after {} attempts.", max_attempts);
        false
    }

    /// Registers a callback run for every foreground push after it is listed.
    pub async fn on_foreground_message<F>(&self, handler: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.handlers.lock().await.push(Box::new(handler));
    }

    /// Entry point for a push received while in the foreground.
    /// Returns `false` when a notification with the same id was already listed.
    pub async fn deliver_foreground(&self, payload: PushPayload) -> bool {
        let notification = payload.into_notification();
        let added = self.list.lock().await.add_notification(notification.clone());
        if !added {
            debug!("Duplicate push {} ignored.", notification.id);
            return false;
        }
        for handler in self.handlers.lock().await.iter() {
            handler(&notification);
        }
        true
    }

    /// Forgets the registration, e.g. on sign-out.
    pub async fn reset(&self) {
        self.guard.lock().await.reset();
        self.list.lock().await.clear();
    }
}

//=========================================================================================
// Configured token source
//=========================================================================================

/// A token source for headless clients whose device token comes from configuration.
pub struct ConfiguredTokenSource {
    token: Option<String>,
}

impl ConfiguredTokenSource {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait::async_trait]
impl PushTokenSource for ConfiguredTokenSource {
    async fn request_permission(&self) -> PortResult<PushPermission> {
        Ok(if self.token.is_some() {
            PushPermission::Granted
        } else {
            PushPermission::Denied
        })
    }

    async fn device_token(&self) -> PortResult<String> {
        self.token
            .clone()
            .ok_or_else(|| PortError::Unexpected("no push device token configured".to_string()))
    }
}
