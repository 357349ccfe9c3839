use uuid::Uuid;

use crate::config::{DEFAULT_TITLE, TITLE_MAX_CHARS};
use crate::models::Conversation;

/// Conversations, most recent first, plus the current selection.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    current: Option<String>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a "New Chat" at the front and make it current.
    pub fn create_new(&mut self) -> String {
        let conversation = Conversation::new(Uuid::new_v4().to_string(), DEFAULT_TITLE.to_string());
        let id = conversation.id.clone();
        self.insert_front(conversation);
        id
    }

    /// Put a conversation at the front and make it current.
    pub fn insert_front(&mut self, conversation: Conversation) {
        self.current = Some(conversation.id.clone());
        self.conversations.insert(0, conversation);
    }

    /// Put a conversation at the front without changing the current one.
    pub fn push_front(&mut self, conversation: Conversation) {
        self.conversations.insert(0, conversation);
    }

    pub fn select(&mut self, id: &str) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.current = Some(id.to_string());
        true
    }

    pub fn delete(&mut self, id: &str) -> Option<Conversation> {
        let index = self.conversations.iter().position(|c| c.id == id)?;
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        Some(self.conversations.remove(index))
    }

    /// Retitle in place. Blank titles and unchanged titles are ignored.
    pub fn rename(&mut self, id: &str, new_title: &str) -> bool {
        let title = truncate_title(new_title);
        if title.is_empty() {
            return false;
        }
        match self.conversations.iter_mut().find(|c| c.id == id) {
            Some(conversation) if conversation.title != title => {
                conversation.title = title;
                true
            }
            _ => false,
        }
    }

    pub fn clear_current(&mut self) -> Option<String> {
        self.current.take()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&Conversation> {
        let id = self.current.as_deref()?;
        self.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn list(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

/// First `TITLE_MAX_CHARS` characters of the trimmed text.
pub fn truncate_title(text: &str) -> String {
    text.trim().chars().take(TITLE_MAX_CHARS).collect()
}

/// Title for a conversation whose first exchange carried `content` and `file_count` files.
pub fn derive_title(content: &str, file_count: usize) -> String {
    let title = truncate_title(content);
    if title.is_empty() {
        format!("Chat with {} file(s)", file_count)
    } else {
        title
    }
}
