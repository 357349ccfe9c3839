use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Clone)]
pub struct OutboundFile {
    pub name: String,
    pub media_type: String,
    pub data: Bytes,
}

impl std::fmt::Debug for OutboundFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("data", &format!("[{} bytes]", self.data.len()))
            .finish()
    }
}

/// One chat submission: the fields of the multipart form, in wire order.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub message: String,
    /// Empty when the client has no current conversation.
    pub conversation_id: String,
    pub files: Vec<OutboundFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantReply {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub environment: Option<String>,
}
