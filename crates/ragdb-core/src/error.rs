use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    IndexExists(String),

    #[error("Document {document} not found in index {index}")]
    DocumentNotFound { index: String, document: String },

    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    #[error("{stage} timed out after {after_ms}ms")]
    Timeout { stage: String, after_ms: u64 },

    #[error("Query cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Failures that only affect one index of a multi-index query.
    pub fn is_per_index(&self) -> bool {
        matches!(self, Error::IndexNotFound(_) | Error::Timeout { .. } | Error::Storage(_))
    }

    /// Message that can be shown to an end user as-is.
    pub fn display_message(&self) -> String {
        match self {
            Error::Io(_) | Error::Serde(_) | Error::Storage(_) => "Internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
