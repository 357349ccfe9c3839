use serde::Deserialize;

// --- Response types ---

#[derive(Debug, Deserialize)]
pub struct ChatMessageResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub environment: Option<String>,
}

// --- Error types ---

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
