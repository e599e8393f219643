//! services/web/src/realtime/state.rs
//!
//! Local chat state, updated from inbound server events.

use crate::realtime::protocol::{MoneyRequest, ServerEvent};
use marketplace_core::conversation::MessageLog;
use marketplace_core::domain::{ChatMessage, QuickChat};
use std::collections::HashMap;

/// Key used for messages that arrive before any conversation is active.
const UNSCOPED: &str = "";

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    conversations: HashMap<String, MessageLog>,
    active: Option<String>,
    /// Local `request:..`/`bundle:..` key awaiting the server's conversation id.
    pending_local: Option<String>,
    quick_chats: Vec<QuickChat>,
    money_requests: Vec<MoneyRequest>,
    welcomed_as: Option<String>,
    last_error: Option<String>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the local `key` as the conversation new messages default to,
    /// until the server answers the join with its own id.
    pub fn activate(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.active = Some(key.clone());
        self.pending_local = Some(key);
    }

    /// Undoes an `activate` for a join request that was never sent.
    pub fn cancel_activation(&mut self, key: &str, previous: Option<String>) {
        if self.pending_local.as_deref() == Some(key) {
            self.pending_local = None;
            self.active = previous;
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn messages(&self, key: &str) -> &[ChatMessage] {
        self.conversations
            .get(key)
            .map(MessageLog::messages)
            .unwrap_or(&[])
    }

    pub fn active_messages(&self) -> &[ChatMessage] {
        self.messages(self.active.as_deref().unwrap_or(UNSCOPED))
    }

    pub fn quick_chats(&self) -> &[QuickChat] {
        &self.quick_chats
    }

    pub fn money_requests(&self) -> &[MoneyRequest] {
        &self.money_requests
    }

    pub fn welcomed_as(&self) -> Option<&str> {
        self.welcomed_as.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn log_for(&mut self, conversation_id: Option<&str>) -> &mut MessageLog {
        let key = conversation_id
            .or(self.active.as_deref())
            .unwrap_or(UNSCOPED)
            .to_string();
        self.conversations.entry(key).or_default()
    }

    fn append(&mut self, message: &ChatMessage) -> bool {
        let conversation_id = message.conversation_id.clone();
        self.log_for(conversation_id.as_deref()).append(message.clone())
    }

    /// Applies one inbound event. Returns `true` when local state changed.
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::Welcome(welcome) => {
                self.welcomed_as = welcome.user_id.clone();
                true
            }
            ServerEvent::JoinedConversation(joined) => {
                // Messages filed under the locally computed key move to the
                // server's conversation id. Logs keyed by server ids stay put.
                if let Some(local) = self.pending_local.take() {
                    if local != joined.conversation_id {
                        if let Some(log) = self.conversations.remove(&local) {
                            self.conversations
                                .entry(joined.conversation_id.clone())
                                .or_default()
                                .extend(log.messages().iter().cloned());
                        }
                    }
                }
                self.active = Some(joined.conversation_id.clone());
                self.conversations
                    .entry(joined.conversation_id.clone())
                    .or_default();
                if !joined.quick_chats.is_empty() {
                    self.quick_chats = joined.quick_chats.clone();
                }
                self.last_error = None;
                true
            }
            ServerEvent::ConversationHistory(history) => {
                let conversation_id = history.conversation_id.clone();
                let log = self.log_for(conversation_id.as_deref());
                log.extend(history.messages.iter().cloned()) > 0
            }
            ServerEvent::NewMessage(message) | ServerEvent::MessageSent(message) => {
                self.append(message)
            }
            ServerEvent::MoneyRequestCreated(request) => {
                if self.money_requests.iter().any(|r| r.id == request.id) {
                    return false;
                }
                if let Some(message) = &request.message {
                    self.append(message);
                }
                self.money_requests.push(request.clone());
                true
            }
            ServerEvent::QuickChats(items) => {
                self.quick_chats = items.clone();
                true
            }
            ServerEvent::Error { message } => {
                self.last_error = Some(message.clone());
                true
            }
            ServerEvent::Notification(_) | ServerEvent::Unknown { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::protocol::JoinedConversation;
    use chrono::Utc;
    use marketplace_core::domain::UserRole;

    fn message(id: &str, conversation_id: Option<&str>) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            sender_id: "p1".to_string(),
            sender_role: UserRole::Provider,
            content: format!("message {}", id),
            timestamp: Utc::now(),
            conversation_id: conversation_id.map(str::to_string),
            meta: None,
        }
    }

    fn joined(id: &str) -> ServerEvent {
        ServerEvent::JoinedConversation(JoinedConversation {
            conversation_id: id.to_string(),
            quick_chats: vec![],
        })
    }

    #[test]
    fn same_new_message_twice_yields_one_entry() {
        let mut state = ChatState::new();
        state.apply(&joined("conv-1"));
        assert!(state.apply(&ServerEvent::NewMessage(message("m1", None))));
        assert!(!state.apply(&ServerEvent::NewMessage(message("m1", None))));
        assert_eq!(state.messages("conv-1").len(), 1);
    }

    #[test]
    fn server_echo_of_own_message_is_deduplicated_against_new_message() {
        let mut state = ChatState::new();
        state.apply(&joined("conv-1"));
        state.apply(&ServerEvent::MessageSent(message("m1", Some("conv-1"))));
        state.apply(&ServerEvent::NewMessage(message("m1", Some("conv-1"))));
        assert_eq!(state.active_messages().len(), 1);
    }

    #[test]
    fn history_appends_in_arrival_order() {
        let mut state = ChatState::new();
        state.apply(&joined("conv-1"));
        state.apply(&ServerEvent::NewMessage(message("m3", None)));
        state.apply(&ServerEvent::ConversationHistory(
            crate::realtime::protocol::ConversationHistory {
                conversation_id: Some("conv-1".into()),
                messages: vec![message("m1", None), message("m2", None), message("m3", None)],
            },
        ));
        let ids: Vec<_> = state.messages("conv-1").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m3", "m1", "m2"]);
    }

    #[test]
    fn messages_under_local_key_move_to_server_conversation() {
        let mut state = ChatState::new();
        state.activate("request:r1:c1");
        state.apply(&ServerEvent::NewMessage(message("m1", None)));
        state.apply(&joined("conv-9"));
        assert!(state.messages("request:r1:c1").is_empty());
        assert_eq!(state.messages("conv-9").len(), 1);
        assert_eq!(state.active(), Some("conv-9"));
    }

    #[test]
    fn second_join_leaves_the_first_conversation_alone() {
        let mut state = ChatState::new();
        state.activate("request:r1:c1");
        state.apply(&joined("conv-1"));
        state.apply(&ServerEvent::NewMessage(message("m1", Some("conv-1"))));
        state.apply(&ServerEvent::NewMessage(message("m2", Some("conv-1"))));

        state.activate("request:r2:c1");
        state.apply(&joined("conv-2"));
        assert_eq!(state.messages("conv-1").len(), 2);
        assert!(state.messages("conv-2").is_empty());
        assert_eq!(state.active(), Some("conv-2"));
    }

    #[test]
    fn join_reply_without_local_key_moves_nothing() {
        let mut state = ChatState::new();
        state.apply(&joined("conv-1"));
        state.apply(&ServerEvent::NewMessage(message("m1", None)));
        state.apply(&joined("conv-2"));
        assert_eq!(state.messages("conv-1").len(), 1);
        assert!(state.messages("conv-2").is_empty());
    }

    #[test]
    fn cancelled_activation_restores_the_previous_conversation() {
        let mut state = ChatState::new();
        state.apply(&joined("conv-1"));
        state.activate("request:r2:c1");
        state.cancel_activation("request:r2:c1", Some("conv-1".into()));
        assert_eq!(state.active(), Some("conv-1"));
        state.apply(&joined("conv-3"));
        assert_eq!(state.active(), Some("conv-3"));
    }

    #[test]
    fn money_request_appends_its_announcement_once() {
        let mut state = ChatState::new();
        state.apply(&joined("conv-1"));
        let request = MoneyRequest {
            id: "mr1".into(),
            amount: 40.0,
            description: Some("Extra materials".into()),
            message: Some(message("m5", None)),
        };
        assert!(state.apply(&ServerEvent::MoneyRequestCreated(request.clone())));
        assert!(!state.apply(&ServerEvent::MoneyRequestCreated(request)));
        assert_eq!(state.money_requests().len(), 1);
        assert_eq!(state.active_messages().len(), 1);
    }

    #[test]
    fn unknown_events_change_nothing() {
        let mut state = ChatState::new();
        assert!(!state.apply(&ServerEvent::Unknown { kind: "typing".into() }));
        assert!(state.active_messages().is_empty());
    }

    #[test]
    fn errors_are_recorded_and_cleared_on_join() {
        let mut state = ChatState::new();
        state.apply(&ServerEvent::Error { message: "Not a participant".into() });
        assert_eq!(state.last_error(), Some("Not a participant"));
        state.apply(&joined("conv-1"));
        assert!(state.last_error().is_none());
    }
}
