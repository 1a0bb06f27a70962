use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub tenant_identity: String,
    pub session_id: String,
    /// Seconds since the Unix epoch.
    pub last_interaction: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: i64,
    pub conversation_key: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub source: String,
    pub file_type: String,
    pub file_size: Option<i64>,
    pub created_at: String,
}

/// A retrievable fragment of an ingested document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DocumentChunk {
    pub text: String,
    pub source: String,
}
