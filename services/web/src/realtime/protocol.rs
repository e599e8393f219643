//! services/web/src/realtime/protocol.rs
//!
//! Defines the socket message protocol between the client and the marketplace
//! backend. Every frame in both directions is a `{ "type": ..., "data": ... }`
//! envelope; the enums below give each `type` its own typed payload.

use marketplace_core::domain::{ChatMessage, ConversationRef, ConversationSubject, Notification, QuickChat};
use serde::{Deserialize, Serialize};
use tracing::debug;

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Addressing shared by every conversation-scoped request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTarget {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bundle_id: Option<String>,
    pub customer_id: String,
}

impl From<&ConversationRef> for ConversationTarget {
    fn from(conversation: &ConversationRef) -> Self {
        let (request_id, bundle_id) = match &conversation.subject {
            ConversationSubject::Request(id) => (Some(id.clone()), None),
            ConversationSubject::Bundle(id) => (None, Some(id.clone())),
        };
        Self {
            request_id,
            bundle_id,
            customer_id: conversation.customer_id.clone(),
        }
    }
}

/// The requests a client can emit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinConversation(ConversationTarget),

    GetConversation(ConversationTarget),

    SendMessage {
        #[serde(flatten)]
        target: ConversationTarget,
        content: String,
    },

    /// Sends one of the predefined canned messages.
    SendQuickChat {
        #[serde(flatten)]
        target: ConversationTarget,
        #[serde(rename = "quickChatId")]
        quick_chat_id: String,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// The raw envelope, before the payload is interpreted.
#[derive(Deserialize, Debug)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationHistory {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinedConversation {
    pub conversation_id: String,
    #[serde(default)]
    pub quick_chats: Vec<QuickChat>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoneyRequest {
    #[serde(alias = "_id")]
    pub id: String,
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    /// The chat entry announcing the request, when the backend sends one.
    #[serde(default)]
    pub message: Option<ChatMessage>,
}

/// Every server event the client understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Welcome(Welcome),
    ConversationHistory(ConversationHistory),
    NewMessage(ChatMessage),
    /// Echo of a message this client sent.
    MessageSent(ChatMessage),
    JoinedConversation(JoinedConversation),
    MoneyRequestCreated(MoneyRequest),
    QuickChats(Vec<QuickChat>),
    Notification(Notification),
    Error { message: String },
    /// A `type` this client does not know. Logged and otherwise ignored.
    Unknown { kind: String },
}

/// Why an inbound frame could not be turned into a `ServerEvent`.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Frame is not a valid envelope: {0}")]
    Envelope(serde_json::Error),
    #[error("Payload of '{kind}' is malformed: {source}")]
    Payload {
        kind: String,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default, alias = "error")]
    message: Option<String>,
}

#[derive(Deserialize)]
struct QuickChatsPayload {
    #[serde(default, alias = "quickChats")]
    items: Vec<QuickChat>,
}

fn payload<T: serde::de::DeserializeOwned>(kind: &str, data: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::Payload {
        kind: kind.to_string(),
        source,
    })
}

impl ServerEvent {
    /// Parses one text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(ProtocolError::Envelope)?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let Envelope { kind, data } = envelope;
        debug!("Inbound envelope of type '{}'", kind);
        let event = match kind.as_str() {
            "welcome" => ServerEvent::Welcome(payload(&kind, data)?),
            "conversation_history" => ServerEvent::ConversationHistory(payload(&kind, data)?),
            "new_message" => ServerEvent::NewMessage(payload(&kind, data)?),
            "message_sent" => ServerEvent::MessageSent(payload(&kind, data)?),
            "joined_conversation" => ServerEvent::JoinedConversation(payload(&kind, data)?),
            "money_request_created" => ServerEvent::MoneyRequestCreated(payload(&kind, data)?),
            "quick_chats" => {
                let items = if data.is_array() {
                    payload::<Vec<QuickChat>>(&kind, data)?
                } else {
                    payload::<QuickChatsPayload>(&kind, data)?.items
                };
                ServerEvent::QuickChats(items)
            }
            "notification" => ServerEvent::Notification(payload(&kind, data)?),
            "error" => {
                let message = match data {
                    serde_json::Value::String(s) => s,
                    other => payload::<ErrorPayload>(&kind, other)?
                        .message
                        .unwrap_or_else(|| "Unknown socket error".to_string()),
                };
                ServerEvent::Error { message }
            }
            other => ServerEvent::Unknown {
                kind: other.to_string(),
            },
        };
        Ok(event)
    }
}
