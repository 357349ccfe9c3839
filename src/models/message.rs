use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attachment::AttachmentSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<AttachmentSummary>,
    #[serde(default)]
    pub error: bool,
}

impl Message {
    pub fn user(content: String, files: Vec<AttachmentSummary>) -> Self {
        Self::build(Role::User, content, files, false)
    }

    pub fn assistant(content: String) -> Self {
        Self::build(Role::Assistant, content, Vec::new(), false)
    }

    pub fn assistant_error(content: String) -> Self {
        Self::build(Role::Assistant, content, Vec::new(), true)
    }

    fn build(role: Role, content: String, files: Vec<AttachmentSummary>, error: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            files,
            error,
        }
    }
}
