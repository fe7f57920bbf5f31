use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RagError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("no non-empty documents were loaded")]
    NoDocumentsFound,

    #[error("failed to fetch {locator}: {reason}")]
    Fetch { locator: String, reason: String },

    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// Vectors from a different model, metric or dimensionality than the store was built with.
    #[error("embedding mismatch: {0}")]
    EmbeddingMismatch(String),

    #[error("prompt template error: {0}")]
    Template(String),

    #[error("prompt exceeds the model context window: {0}")]
    ContextTooLarge(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("service timed out: {0}")]
    ServiceTimeout(String),

    #[error("service returned an error: {0}")]
    Service(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl RagError {
    pub fn fetch(locator: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
