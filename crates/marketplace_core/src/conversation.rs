//! crates/marketplace_core/src/conversation.rs
//!
//! The in-memory message list of one chat thread.

use std::collections::HashSet;

use crate::domain::ChatMessage;

/// Messages of a single conversation in arrival order.
///
/// Message ids are unique within the log: appending a message whose id is
/// already present is a no-op. Nothing else is enforced, in particular the
/// log does not reorder by timestamp.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
    seen: HashSet<String>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` unless its id is already in the log.
    /// Returns `true` when the message was inserted.
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Appends a batch (e.g. a history reply) and returns how many were new.
    pub fn extend<I>(&mut self, messages: I) -> usize
    where
        I: IntoIterator<Item = ChatMessage>,
    {
        messages
            .into_iter()
            .map(|m| self.append(m))
            .filter(|inserted| *inserted)
            .count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;
    use chrono::{TimeZone, Utc};

    fn message(id: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            sender_id: "u1".to_string(),
            sender_role: UserRole::Customer,
            content: content.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            conversation_id: None,
            meta: None,
        }
    }

    #[test]
    fn duplicate_ids_are_kept_once() {
        let mut log = MessageLog::new();
        assert!(log.append(message("m1", "hello")));
        assert!(!log.append(message("m1", "hello again")));
        assert_eq!(log.len(), 1);
        assert_eq!(log.messages()[0].content, "hello");
    }

    #[test]
    fn history_batches_skip_known_messages_and_keep_arrival_order() {
        let mut log = MessageLog::new();
        log.append(message("m2", "second"));
        let inserted = log.extend(vec![message("m1", "first"), message("m2", "dup"), message("m3", "third")]);
        assert_eq!(inserted, 2);
        let ids: Vec<_> = log.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m2", "m1", "m3"]);
    }

    #[test]
    fn clear_forgets_seen_ids() {
        let mut log = MessageLog::new();
        log.append(message("m1", "hello"));
        log.clear();
        assert!(log.is_empty());
        assert!(log.append(message("m1", "hello")));
    }
}
