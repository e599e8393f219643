//! services/web/src/realtime/client.rs
//!
//! The realtime connection manager. It owns one WebSocket per signed-in
//! session, emits typed requests, and applies inbound events to local state.
//!
//! The socket itself lives in a spawned driver task. Outbound requests reach
//! it through an unbounded channel; inbound frames are parsed and applied by
//! the driver directly.

use crate::config::Config;
use crate::realtime::protocol::{ClientMessage, ConversationTarget, ServerEvent};
use crate::realtime::state::ChatState;
use crate::realtime::RealtimeError;
use futures::{SinkExt, StreamExt};
use marketplace_core::domain::{ChatMessage, ConversationRef};
use marketplace_core::notifications::NotificationList;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the event fan-out; slow subscribers skip events past this.
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    pub url: String,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl From<&Config> for RealtimeSettings {
    fn from(config: &Config) -> Self {
        Self {
            url: config.socket_url.clone(),
            reconnect_attempts: config.socket_reconnect_attempts,
            reconnect_delay: config.socket_reconnect_delay,
        }
    }
}

//=========================================================================================
// Shared state (driver and handle)
//=========================================================================================

#[derive(Clone)]
struct Shared {
    state: Arc<Mutex<ChatState>>,
    notifications: Arc<Mutex<NotificationList>>,
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<ServerEvent>,
}

impl Shared {
    /// Parses and applies one text frame. Nothing here fails the connection.
    async fn handle_frame(&self, text: &str) {
        let event = match ServerEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping unreadable socket frame: {}", e);
                return;
            }
        };

        match &event {
            ServerEvent::Unknown { kind } => {
                warn!("Ignoring socket message of unknown type '{}'", kind);
                return;
            }
            ServerEvent::Error { message } => error!("Socket error from server: {}", message),
            ServerEvent::Welcome(w) => info!("Socket welcomed user {:?}", w.user_id),
            ServerEvent::Notification(n) => {
                self.notifications.lock().await.add_notification(n.clone());
            }
            _ => {}
        }

        self.state.lock().await.apply(&event);
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

struct Driver {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

//=========================================================================================
// The Client
//=========================================================================================

pub struct RealtimeClient {
    settings: RealtimeSettings,
    shared: Shared,
    outbound: Mutex<Option<mpsc::UnboundedSender<ClientMessage>>>,
    driver: Mutex<Option<Driver>>,
}

impl RealtimeClient {
    pub fn new(settings: RealtimeSettings, notifications: Arc<Mutex<NotificationList>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            settings,
            shared: Shared {
                state: Arc::new(Mutex::new(ChatState::new())),
                notifications,
                connected: Arc::new(AtomicBool::new(false)),
                events,
            },
            outbound: Mutex::new(None),
            driver: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Every event applied to local state, in arrival order.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.shared.events.subscribe()
    }

    /// A copy of the current chat state.
    pub async fn snapshot(&self) -> ChatState {
        self.shared.state.lock().await.clone()
    }

    pub async fn messages(&self, conversation_key: &str) -> Vec<ChatMessage> {
        self.shared.state.lock().await.messages(conversation_key).to_vec()
    }

    /// Opens the socket and authenticates it with `token`.
    ///
    /// Without a token this is a no-op. A failed connection is logged and
    /// leaves the client disconnected. Returns whether a connection is up.
    pub async fn connect(&self, token: Option<&str>) -> bool {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            debug!("No auth token; skipping realtime connection.");
            return false;
        };

        let mut driver = self.driver.lock().await;
        if driver.is_some() && self.is_connected() {
            return true;
        }
        if let Some(stale) = driver.take() {
            stale.cancel.cancel();
            stale.handle.abort();
        }

        let ws = match open(&self.settings.url, token).await {
            Ok(ws) => ws,
            Err(e) => {
                error!("Realtime connection to {} failed: {}", self.settings.url, e);
                return false;
            }
        };
        info!("Realtime connection established to {}", self.settings.url);
        self.shared.connected.store(true, Ordering::SeqCst);

        let (tx, rx) = mpsc::unbounded_channel();
        *self.outbound.lock().await = Some(tx);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_driver(
            ws,
            rx,
            self.shared.clone(),
            self.settings.clone(),
            token.to_string(),
            cancel.clone(),
        ));
        *driver = Some(Driver { cancel, handle });
        true
    }

    /// Closes the socket and stops reconnecting.
    pub async fn disconnect(&self) {
        *self.outbound.lock().await = None;
        if let Some(driver) = self.driver.lock().await.take() {
            driver.cancel.cancel();
            if let Err(e) = driver.handle.await {
                warn!("Realtime driver ended abnormally: {}", e);
            }
        }
        self.shared.connected.store(false, Ordering::SeqCst);
        info!("Realtime connection closed.");
    }

    async fn emit(&self, message: ClientMessage) -> Result<(), RealtimeError> {
        if !self.is_connected() {
            return Err(RealtimeError::NotConnected);
        }
        let outbound = self.outbound.lock().await;
        let sender = outbound.as_ref().ok_or(RealtimeError::NotConnected)?;
        sender
            .send(message)
            .map_err(|_| RealtimeError::DriverStopped)
    }

    /// Activates the conversation locally, then asks to join it. Activation
    /// happens first so the server's `joined_conversation` reply always
    /// lands on top of it.
    pub async fn join_conversation(&self, conversation: &ConversationRef) -> Result<(), RealtimeError> {
        let key = conversation.key();
        let previous = {
            let mut state = self.shared.state.lock().await;
            let previous = state.active().map(str::to_string);
            state.activate(key.clone());
            previous
        };
        let sent = self
            .emit(ClientMessage::JoinConversation(ConversationTarget::from(conversation)))
            .await;
        if sent.is_err() {
            self.shared.state.lock().await.cancel_activation(&key, previous);
        }
        sent
    }

    /// Requests the thread's history; it is appended when the reply arrives.
    pub async fn get_conversation(&self, conversation: &ConversationRef) -> Result<(), RealtimeError> {
        self.emit(ClientMessage::GetConversation(ConversationTarget::from(conversation)))
            .await
    }

    /// Fire and forget; the server's echo, if any, lands in the message list.
    pub async fn send_message(
        &self,
        conversation: &ConversationRef,
        content: &str,
    ) -> Result<(), RealtimeError> {
        self.emit(ClientMessage::SendMessage {
            target: ConversationTarget::from(conversation),
            content: content.to_string(),
        })
        .await
    }

    pub async fn send_quick_chat(
        &self,
        conversation: &ConversationRef,
        quick_chat_id: &str,
    ) -> Result<(), RealtimeError> {
        self.emit(ClientMessage::SendQuickChat {
            target: ConversationTarget::from(conversation),
            quick_chat_id: quick_chat_id.to_string(),
        })
        .await
    }
}

//=========================================================================================
// Driver
//=========================================================================================

async fn open(url: &str, token: &str) -> Result<WsStream, RealtimeError> {
    let mut request = url.into_client_request()?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| RealtimeError::Request(e.to_string()))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);
    let (ws, _response) = connect_async(request).await?;
    Ok(ws)
}

/// Pumps one socket until it drops, then reconnects within the attempt budget.
async fn run_driver(
    mut ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
    shared: Shared,
    settings: RealtimeSettings,
    token: String,
    cancel: CancellationToken,
) {
    loop {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = ws.close(None).await;
                    shared.connected.store(false, Ordering::SeqCst);
                    return;
                }
                Some(message) = outbound.recv() => {
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            error!("Failed to encode socket request: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = ws.send(Message::text(json)).await {
                        // Not retried; the request is lost with the connection.
                        error!("Failed to send socket request: {}", e);
                        break;
                    }
                }
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => shared.handle_frame(text.as_str()).await,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Realtime server closed the connection.");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Realtime connection error: {}", e);
                        break;
                    }
                },
            }
        }

        shared.connected.store(false, Ordering::SeqCst);
        match reconnect(&settings, &token, &cancel).await {
            Some(fresh) => {
                ws = fresh;
                shared.connected.store(true, Ordering::SeqCst);
            }
            None => return,
        }
    }
}

async fn reconnect(
    settings: &RealtimeSettings,
    token: &str,
    cancel: &CancellationToken,
) -> Option<WsStream> {
    for attempt in 1..=settings.reconnect_attempts {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(settings.reconnect_delay) => {}
        }
        match open(&settings.url, token).await {
            Ok(ws) => {
                info!("Realtime reconnected on attempt {}", attempt);
                return Some(ws);
            }
            Err(e) => warn!(
                "Realtime reconnect attempt {}/{} failed: {}",
                attempt, settings.reconnect_attempts, e
            ),
        }
    }
    error!(
        "Giving up on realtime connection after {} attempts.",
        settings.reconnect_attempts
    );
    None
}
