pub mod remote;
pub mod traits;
pub mod types;

pub use remote::HttpAssistant;
pub use traits::AssistantService;
pub use types::{AssistantReply, OutboundFile, OutboundMessage, TransportError};
