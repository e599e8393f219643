pub mod client;
pub mod protocol;
pub mod state;

pub use client::{RealtimeClient, RealtimeSettings};
pub use protocol::{ClientMessage, ProtocolError, ServerEvent};
pub use state::ChatState;

/// Errors raised by the realtime client.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("Not connected to the realtime server")]
    NotConnected,

    #[error("The connection driver has stopped")]
    DriverStopped,

    #[error("Invalid socket request: {0}")]
    Request(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
