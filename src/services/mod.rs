pub mod attachments;
pub mod chat;
pub mod conversation;
pub mod export;
pub mod message_log;
pub mod preview;
pub mod session;

pub use attachments::SelectedFile;
pub use chat::SendOutcome;
pub use preview::PreviewRegistry;
pub use session::Session;
