use async_trait::async_trait;

use super::types::{AssistantReply, HealthStatus, OutboundMessage, TransportError};

/// The remote assistant as seen by the dispatch protocol.
///
/// Implementations issue the request exactly once. Retrying, if wanted, is
/// the transport's own business and never visible to the caller.
#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn send_message(&self, request: OutboundMessage)
        -> Result<AssistantReply, TransportError>;

    async fn health(&self) -> Result<HealthStatus, TransportError>;
}
