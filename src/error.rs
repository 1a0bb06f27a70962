use crate::llm::LlmError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("External service error: {0}")]
    ExternalService(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<LlmError> for RagError {
    fn from(err: LlmError) -> Self {
        RagError::ExternalService(err.to_string())
    }
}

impl Serialize for RagError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
