use std::collections::HashSet;

use crate::models::Message;

/// Marker for a message appended ahead of confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ProvisionalEntry {
    message_id: String,
}

impl ProvisionalEntry {
    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

/// Ordered transcript of the active conversation.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    provisional: HashSet<String>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a message that is visible immediately but may still be rolled back.
    pub fn append_provisional(&mut self, message: Message) -> ProvisionalEntry {
        let message_id = message.id.clone();
        self.provisional.insert(message_id.clone());
        self.messages.push(message);
        ProvisionalEntry { message_id }
    }

    pub fn confirm(&mut self, entry: &ProvisionalEntry) -> bool {
        self.provisional.remove(&entry.message_id)
    }

    pub fn rollback(&mut self, entry: &ProvisionalEntry) -> Option<Message> {
        if !self.provisional.remove(&entry.message_id) {
            return None;
        }
        let index = self
            .messages
            .iter()
            .position(|m| m.id == entry.message_id)?;
        Some(self.messages.remove(index))
    }

    pub fn is_provisional(&self, message_id: &str) -> bool {
        self.provisional.contains(message_id)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.provisional.clear();
    }

    /// Swap in another transcript, returning the one that was loaded.
    pub fn replace(&mut self, messages: Vec<Message>) -> Vec<Message> {
        self.provisional.clear();
        std::mem::replace(&mut self.messages, messages)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_append_keeps_order() {
        let mut log = MessageLog::new();
        log.append(Message::user("one".to_string(), Vec::new()));
        log.append(Message::assistant("two".to_string()));
        log.append(Message::user("three".to_string(), Vec::new()));

        let contents: Vec<&str> = log.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(log.messages()[1].role, Role::Assistant);
    }

    #[test]
    fn test_provisional_confirm() {
        let mut log = MessageLog::new();
        let entry = log.append_provisional(Message::user("hi".to_string(), Vec::new()));
        assert_eq!(log.len(), 1);
        assert!(log.is_provisional(entry.message_id()));

        assert!(log.confirm(&entry));
        assert!(!log.is_provisional(entry.message_id()));
        assert!(!log.confirm(&entry));
        assert_eq!(log.rollback(&entry), None);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_provisional_rollback() {
        let mut log = MessageLog::new();
        log.append(Message::assistant("earlier".to_string()));
        let entry = log.append_provisional(Message::user("oops".to_string(), Vec::new()));

        let removed = log.rollback(&entry).unwrap();
        assert_eq!(removed.content, "oops");
        assert_eq!(log.len(), 1);
        assert_eq!(log.messages()[0].content, "earlier");
    }

    #[test]
    fn test_clear_forgets_provisional_entries() {
        let mut log = MessageLog::new();
        let entry = log.append_provisional(Message::user("hi".to_string(), Vec::new()));
        log.clear();
        assert!(log.is_empty());
        assert!(!log.confirm(&entry));
        assert_eq!(log.rollback(&entry), None);
    }

    #[test]
    fn test_replace() {
        let mut log = MessageLog::new();
        log.append(Message::user("a".to_string(), Vec::new()));
        let old = log.replace(vec![Message::assistant("b".to_string())]);
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].content, "a");
        assert_eq!(log.messages()[0].content, "b");
    }
}
