use crate::semantic::EmbeddingError;

/// Per-query failures. Caught at the session boundary and shown to the user.
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error("query is empty")]
    InvalidQuery,

    #[error("semantic search model is not loaded yet")]
    ModelNotReady,

    #[error("semantic search is unavailable: {0}")]
    ModelInit(String),

    #[error("failed to compute query embedding: {0}")]
    EmbeddingCompute(String),
}

impl SearchError {
    /// Message for display, with a hint where the user has a fallback.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidQuery => "Please enter a search query.".to_string(),
            Self::ModelNotReady => {
                "Semantic search is still loading. Try again shortly or use keyword search."
                    .to_string()
            }
            Self::ModelInit(_) => format!("{self}. Keyword search is still available."),
            Self::EmbeddingCompute(_) => format!("{self}. Please try again."),
        }
    }
}

impl From<EmbeddingError> for SearchError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::InvalidQuery => Self::InvalidQuery,
            EmbeddingError::NotReady => Self::ModelNotReady,
            EmbeddingError::Unavailable(reason) => Self::ModelInit(reason),
            EmbeddingError::EmbeddingFailed(message) => Self::EmbeddingCompute(message),
            EmbeddingError::InitFailed(_)
            | EmbeddingError::InitTimeout(_)
            | EmbeddingError::InvalidModel(_)
            | EmbeddingError::DimensionMismatch { .. } => Self::ModelInit(err.to_string()),
        }
    }
}
