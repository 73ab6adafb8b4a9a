//! Embedding model boundary and the fastembed wrapper.
//!
//! Provides a high-level interface for generating embeddings:
//! - `Embedder` trait so search never depends on a concrete model
//! - Model download into a configurable cache directory on first use
//! - Dimension probing at load time

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Text in, fixed-length vector out.
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// Length of every vector this model produces
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Model initialization timed out after {0} seconds")]
    InitTimeout(u64),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),

    #[error("Model produces {got}-dimensional vectors but the corpus uses {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Query is empty")]
    InvalidQuery,

    #[error("Embedding model is not loaded yet")]
    NotReady,

    #[error("Embedding model is unavailable: {0}")]
    Unavailable(String),
}

/// fastembed `TextEmbedding` behind a lock; its `embed()` takes `&mut self`.
pub struct FastEmbedModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl FastEmbedModel {
    /// Load a model by name, downloading it into `cache_dir/models` if needed.
    ///
    /// This blocks for the whole download; callers bound it with a timeout.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let model_enum = Self::parse_model_name(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("cannot create {}: {e}", models_dir.display()))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(false);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let dimensions = Self::probe_dimensions(&mut model)?;
        log::info!("model '{model_name}' loaded ({dimensions} dimensions)");

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    /// Parse model name string to fastembed enum.
    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        match name.to_lowercase().as_str() {
            "paraphrase-multilingual-minilm-l12-v2" | "paraphrasemlminilml12v2" => {
                Ok(fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2)
            }
            "paraphrase-multilingual-minilm-l12-v2-q" | "paraphrasemlminilml12v2q" => {
                Ok(fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2Q)
            }
            "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" | "bgesmallenv15" => {
                Ok(fastembed::EmbeddingModel::BGESmallENV15)
            }
            "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            _ => Err(EmbeddingError::InvalidModel(format!(
                "Unknown model: {}. Supported models: paraphrase-multilingual-MiniLM-L12-v2, all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                name
            ))),
        }
    }

    /// Embed a throwaway string; fastembed does not expose the output size up front.
    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
        match model.embed(vec!["probe"], None) {
            Ok(vectors) => vectors
                .first()
                .map(Vec::len)
                .filter(|len| *len > 0)
                .ok_or_else(|| EmbeddingError::InitFailed("model produced no vector".to_string())),
            Err(e) => Err(EmbeddingError::InitFailed(format!("dimension probe failed: {e}"))),
        }
    }
}

impl Embedder for FastEmbedModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?
            .pop()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed(format!("no vector for '{text}'")))
    }
}
