use std::collections::HashMap;
use std::sync::Arc;

use super::attachments::{AttachmentError, AttachmentManager, SelectedFile};
use super::conversation::ConversationStore;
use super::message_log::MessageLog;
use super::preview::PreviewRegistry;
use crate::models::{Conversation, Message};

/// Everything one user session owns: conversations, the active transcript,
/// staged attachments and the send gate.
///
/// Front-ends receive this value explicitly and call its operations; the
/// send protocol itself lives in [`crate::services::chat`].
pub struct Session {
    pub(crate) store: ConversationStore,
    pub(crate) log: MessageLog,
    pub(crate) attachments: AttachmentManager,
    pub(crate) loading: bool,
    archive: HashMap<String, Vec<Message>>,
    sidebar_open: bool,
}

impl Session {
    pub fn init(registry: Arc<PreviewRegistry>) -> Self {
        tracing::debug!("Session started");
        Self {
            store: ConversationStore::new(),
            log: MessageLog::new(),
            attachments: AttachmentManager::new(registry),
            loading: false,
            archive: HashMap::new(),
            sidebar_open: true,
        }
    }

    /// Release every preview the session still owns. Safe to call more than once.
    pub fn teardown(&mut self) -> usize {
        let released = self.attachments.release_all();
        tracing::debug!("Session torn down, released {} preview(s)", released);
        released
    }

    // --- Read access ---

    pub fn conversations(&self) -> &[Conversation] {
        self.store.list()
    }

    pub fn current_conversation(&self) -> Option<&Conversation> {
        self.store.current()
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn attachments(&self) -> &AttachmentManager {
        &self.attachments
    }

    pub fn preview_registry(&self) -> &Arc<PreviewRegistry> {
        self.attachments.registry()
    }

    // --- Conversation operations ---

    pub fn create_new(&mut self) -> String {
        self.archive_current();
        self.log.clear();
        let id = self.store.create_new();
        tracing::info!("Created conversation {}", id);
        id
    }

    /// Make `id` current and load its transcript. Unknown ids are ignored.
    pub fn select(&mut self, id: &str) -> bool {
        if !self.store.contains(id) {
            tracing::debug!("Ignoring select of unknown conversation {}", id);
            return false;
        }
        if self.store.current_id() == Some(id) {
            return true;
        }
        self.archive_current();
        self.store.select(id);
        let restored = self.archive.remove(id).unwrap_or_default();
        self.log.replace(restored);
        true
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let was_current = self.store.current_id() == Some(id);
        if self.store.delete(id).is_none() {
            return false;
        }
        self.archive.remove(id);
        if was_current {
            self.log.clear();
        }
        tracing::info!("Deleted conversation {}", id);
        true
    }

    pub fn rename(&mut self, id: &str, new_title: &str) -> bool {
        self.store.rename(id, new_title)
    }

    /// Return to the neutral state without deleting anything.
    pub fn clear_current(&mut self) {
        self.archive_current();
        self.store.clear_current();
        self.log.clear();
    }

    pub fn toggle_sidebar(&mut self) -> bool {
        self.sidebar_open = !self.sidebar_open;
        self.sidebar_open
    }

    // --- Attachment operations ---

    pub fn stage(&mut self, file: SelectedFile) -> Result<String, AttachmentError> {
        self.attachments.stage(file)
    }

    pub fn unstage(&mut self, id: &str) -> bool {
        self.attachments.unstage(id)
    }

    /// Make an existing or server-assigned conversation current while keeping
    /// the transcript that is already on screen. Only valid while no
    /// conversation is current. An existing conversation keeps its earlier
    /// history ahead of the on-screen messages.
    pub(crate) fn adopt_conversation(&mut self, conversation: Conversation) -> bool {
        if self.store.contains(&conversation.id) {
            let mut history = self.archive.remove(&conversation.id).unwrap_or_default();
            history.extend(self.log.replace(Vec::new()));
            self.log.replace(history);
            self.store.select(&conversation.id);
            false
        } else {
            self.store.insert_front(conversation);
            true
        }
    }

    /// File messages under a conversation without changing what is on
    /// screen, creating the conversation if the store does not know it.
    /// Returns whether it was created.
    pub(crate) fn record_exchange(
        &mut self,
        conversation: Conversation,
        messages: Vec<Message>,
    ) -> bool {
        let id = conversation.id.clone();
        if self.store.current_id() == Some(id.as_str()) {
            for message in messages {
                self.log.append(message);
            }
            return false;
        }

        let inserted = !self.store.contains(&id);
        if inserted {
            self.store.push_front(conversation);
        }
        self.archive.entry(id).or_default().extend(messages);
        inserted
    }

    fn archive_current(&mut self) {
        if let Some(id) = self.store.current_id().map(str::to_string) {
            let messages = self.log.replace(Vec::new());
            self.archive.insert(id, messages);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TITLE;

    fn session() -> Session {
        Session::init(PreviewRegistry::new())
    }

    #[test]
    fn test_create_new_twice() {
        let mut s = session();
        let first = s.create_new();
        s.log.append(Message::user("hello".to_string(), Vec::new()));
        let second = s.create_new();

        assert_ne!(first, second);
        assert_eq!(s.conversations()[0].id, second);
        assert_eq!(s.conversations()[1].id, first);
        assert_eq!(s.current_conversation().unwrap().id, second);
        assert!(s.messages().is_empty());
    }

    #[test]
    fn test_select_restores_transcripts() {
        let mut s = session();
        let a = s.create_new();
        s.log.append(Message::user("in a".to_string(), Vec::new()));
        let b = s.create_new();
        s.log.append(Message::user("in b".to_string(), Vec::new()));

        assert!(s.select(&a));
        assert_eq!(s.messages().len(), 1);
        assert_eq!(s.messages()[0].content, "in a");

        assert!(s.select(&b));
        assert_eq!(s.messages()[0].content, "in b");

        assert!(s.select(&b));
        assert_eq!(s.messages().len(), 1);
    }

    #[test]
    fn test_unknown_ids_do_not_change_state() {
        let mut s = session();
        let a = s.create_new();
        s.log.append(Message::user("keep".to_string(), Vec::new()));
        let before_convs = s.conversations().to_vec();
        let before_msgs = s.messages().to_vec();

        assert!(!s.select("missing"));
        assert!(!s.delete("missing"));
        assert!(!s.rename(&a, ""));
        assert!(!s.rename(&a, DEFAULT_TITLE));
        assert!(!s.unstage("missing"));

        assert_eq!(s.conversations(), before_convs.as_slice());
        assert_eq!(s.messages(), before_msgs.as_slice());
        assert_eq!(s.current_conversation().unwrap().id, a);
    }

    #[test]
    fn test_delete_current_clears_log() {
        let mut s = session();
        let a = s.create_new();
        let b = s.create_new();
        s.log.append(Message::user("bye".to_string(), Vec::new()));

        assert!(s.delete(&b));
        assert!(s.current_conversation().is_none());
        assert!(s.messages().is_empty());
        assert_eq!(s.conversations().len(), 1);
        assert_eq!(s.conversations()[0].id, a);
    }

    #[test]
    fn test_delete_other_keeps_log() {
        let mut s = session();
        let a = s.create_new();
        let b = s.create_new();
        s.log.append(Message::user("stay".to_string(), Vec::new()));

        assert!(s.delete(&a));
        assert_eq!(s.current_conversation().unwrap().id, b);
        assert_eq!(s.messages().len(), 1);
    }

    #[test]
    fn test_clear_current_keeps_conversation() {
        let mut s = session();
        let a = s.create_new();
        s.log.append(Message::user("x".to_string(), Vec::new()));

        s.clear_current();
        assert!(s.current_conversation().is_none());
        assert!(s.messages().is_empty());
        assert_eq!(s.conversations().len(), 1);

        s.select(&a);
        assert_eq!(s.messages().len(), 1);
    }

    #[test]
    fn test_toggle_sidebar() {
        let mut s = session();
        assert!(s.sidebar_open());
        assert!(!s.toggle_sidebar());
        assert!(s.toggle_sidebar());
    }

    #[test]
    fn test_teardown_releases_staged_previews() {
        let registry = PreviewRegistry::new();
        let mut s = Session::init(registry.clone());
        s.stage(SelectedFile::new("a.png", "image/png", vec![1u8; 5])).unwrap();
        s.stage(SelectedFile::new("b.txt", "text/plain", vec![1u8; 5])).unwrap();
        assert_eq!(registry.live_count(), 1);

        assert_eq!(s.teardown(), 1);
        assert_eq!(s.teardown(), 0);
        assert_eq!(registry.live_count(), 0);
        drop(s);
        assert_eq!(registry.stats().released, 1);
    }

    #[test]
    fn test_drop_releases_staged_previews() {
        let registry = PreviewRegistry::new();
        {
            let mut s = Session::init(registry.clone());
            s.stage(SelectedFile::new("a.png", "image/png", vec![1u8; 5])).unwrap();
        }
        assert_eq!(registry.live_count(), 0);
    }
}
