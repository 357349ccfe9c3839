pub mod attachment;
pub mod conversation;
pub mod message;

pub use attachment::AttachmentSummary;
pub use conversation::Conversation;
pub use message::{Message, Role};
