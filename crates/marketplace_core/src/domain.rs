//! crates/marketplace_core/src/domain.rs
//!
//! Defines the core data structures shared by the marketplace client.
//! Field names serialize in camelCase because they mirror the backend's JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role a signed-in account plays on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Provider,
    Admin,
}

impl UserRole {
    /// Where a freshly authenticated user of this role lands.
    pub fn home_path(self) -> &'static str {
        match self {
            UserRole::Customer => "/customer/dashboard",
            UserRole::Provider => "/provider/dashboard",
            UserRole::Admin => "/admin",
        }
    }
}

/// A user - used throughout the client once signed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

/// An authenticated session: an opaque bearer token plus the user it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: User,
    pub user_type: UserRole,
}

impl Session {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        let user_type = user.role;
        Self {
            token: token.into(),
            user,
            user_type,
        }
    }

    /// Token presence implies an authenticated session.
    pub fn is_authenticated(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

/// Handoff data for the multi-step provider signup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSignup {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub zip_codes: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

//=========================================================================================
// Conversations
//=========================================================================================

/// What a chat thread hangs off: a single service request or a bundle offer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationSubject {
    Request(String),
    Bundle(String),
}

/// Identifies a chat thread. Not owned by the client, only passed to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationRef {
    pub subject: ConversationSubject,
    pub customer_id: String,
}

impl ConversationRef {
    pub fn for_request(request_id: impl Into<String>, customer_id: impl Into<String>) -> Self {
        Self {
            subject: ConversationSubject::Request(request_id.into()),
            customer_id: customer_id.into(),
        }
    }

    pub fn for_bundle(bundle_id: impl Into<String>, customer_id: impl Into<String>) -> Self {
        Self {
            subject: ConversationSubject::Bundle(bundle_id.into()),
            customer_id: customer_id.into(),
        }
    }

    /// A stable local key used to file messages per thread.
    pub fn key(&self) -> String {
        match &self.subject {
            ConversationSubject::Request(id) => format!("request:{}:{}", id, self.customer_id),
            ConversationSubject::Bundle(id) => format!("bundle:{}:{}", id, self.customer_id),
        }
    }
}

/// A single chat message as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(alias = "_id")]
    pub id: String,
    pub sender_id: String,
    pub sender_role: UserRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// A canned message a provider can send with one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickChat {
    #[serde(alias = "_id")]
    pub id: String,
    pub text: String,
}

//=========================================================================================
// Notifications
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

/// Outcome of asking the platform for permission to show notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPermission {
    Granted,
    Denied,
    Default,
}

//=========================================================================================
// Geocoding
//=========================================================================================

/// A normalized geocoding result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
}

//=========================================================================================
// Search
//=========================================================================================

/// A provider offering a service near a zip code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub rating: Option<f32>,
}

/// A group-booking offer where several customers share one provider visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSummary {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    pub service: String,
    pub zip_code: String,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub current_participants: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResults {
    pub providers: Vec<ProviderSummary>,
    pub bundles: Vec<BundleSummary>,
}
