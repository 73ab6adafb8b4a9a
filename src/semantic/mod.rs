//! Semantic search infrastructure for verse embeddings.
//!
//! Query embeddings are generated locally with fastembed-rs and compared
//! against the precomputed corpus embeddings by cosine similarity.
//!
//! # Architecture
//!
//! - `embeddings`: The `Embedder` model boundary and its fastembed implementation
//! - `provider`: Readiness state and the per-process query embedding cache
//! - `similarity`: Cosine scoring and top-K selection over the verse index

mod embeddings;
mod provider;
mod similarity;

pub use embeddings::{Embedder, EmbeddingError, FastEmbedModel};
pub use provider::{EmbeddingProvider, ProviderStatus};
pub use similarity::{top_k, SearchHit};

/// Default embedding model, the one the corpus embeddings are built with
pub const DEFAULT_MODEL: &str = "paraphrase-multilingual-minilm-l12-v2";

/// Number of verses returned by a semantic search
pub const DEFAULT_TOP_K: usize = 20;
