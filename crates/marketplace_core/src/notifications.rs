//! crates/marketplace_core/src/notifications.rs
//!
//! The in-memory notification list, most recent first.

use crate::domain::Notification;

#[derive(Debug, Clone, Default)]
pub struct NotificationList {
    items: Vec<Notification>,
}

impl NotificationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `notification` at the front of the list.
    /// No-op when an item with the same id already exists.
    pub fn add_notification(&mut self, notification: Notification) -> bool {
        if self.items.iter().any(|n| n.id == notification.id) {
            return false;
        }
        self.items.insert(0, notification);
        true
    }

    /// Returns `false` when no item carries `id`.
    pub fn mark_as_read(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.is_read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_as_read(&mut self) {
        for n in &mut self.items {
            n.is_read = true;
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Notification> {
        let pos = self.items.iter().position(|n| n.id == id)?;
        Some(self.items.remove(pos))
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn notification(id: &str, title: &str) -> Notification {
        Notification {
            id: id.to_string(),
            title: title.to_string(),
            body: "body".to_string(),
            link: None,
            created_at: Utc::now(),
            is_read: false,
        }
    }

    #[test]
    fn newest_notification_comes_first() {
        let mut list = NotificationList::new();
        list.add_notification(notification("n1", "first"));
        list.add_notification(notification("n2", "second"));
        assert_eq!(list.items()[0].id, "n2");
        assert_eq!(list.items()[1].id, "n1");
    }

    #[test]
    fn adding_a_known_id_is_a_no_op() {
        let mut list = NotificationList::new();
        assert!(list.add_notification(notification("n1", "original")));
        assert!(!list.add_notification(notification("n1", "replacement")));
        assert_eq!(list.len(), 1);
        assert_eq!(list.items()[0].title, "original");
    }

    #[test]
    fn mark_all_as_read_touches_every_item() {
        let mut list = NotificationList::new();
        list.add_notification(notification("n1", "a"));
        list.add_notification(notification("n2", "b"));
        list.add_notification(notification("n3", "c"));
        assert!(list.mark_as_read("n2"));
        assert_eq!(list.unread_count(), 2);

        list.mark_all_as_read();
        assert!(list.items().iter().all(|n| n.is_read));
        assert_eq!(list.unread_count(), 0);
    }

    #[test]
    fn marking_an_unknown_id_reports_false() {
        let mut list = NotificationList::new();
        assert!(!list.mark_as_read("missing"));
        assert!(list.remove("missing").is_none());
    }
}
