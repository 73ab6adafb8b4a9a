//! Query embedding provider.
//!
//! Owns the loaded model and its readiness, and caches query embeddings:
//! - Model loading runs on a background thread bounded by a timeout
//! - Readiness is a polled `ProviderStatus`, no callbacks
//! - A failed load is permanent for the process; keyword search is unaffected
//! - Query vectors are cached by exact text for the process lifetime

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::embeddings::{Embedder, EmbeddingError};

/// Observable provider state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProviderStatus {
    Uninitialized,
    Loading {
        started_at: DateTime<Utc>,
    },
    Ready {
        model: String,
        dimensions: usize,
        ready_at: DateTime<Utc>,
    },
    Unavailable {
        reason: String,
    },
}

enum ProviderState {
    Uninitialized,
    Loading(DateTime<Utc>),
    Ready(Arc<dyn Embedder>, DateTime<Utc>),
    Unavailable(String),
}

pub struct EmbeddingProvider {
    state: RwLock<ProviderState>,
    /// Exact query text -> normalized embedding
    cache: Mutex<HashMap<String, Vec<f32>>>,
    /// Corpus dimensionality the model has to match
    expected_dimensions: Option<usize>,
    normalize: bool,
}

impl EmbeddingProvider {
    pub fn new(expected_dimensions: Option<usize>, normalize: bool) -> Self {
        Self {
            state: RwLock::new(ProviderState::Uninitialized),
            cache: Mutex::new(HashMap::new()),
            expected_dimensions,
            normalize,
        }
    }

    pub fn status(&self) -> ProviderStatus {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            ProviderState::Uninitialized => ProviderStatus::Uninitialized,
            ProviderState::Loading(started_at) => ProviderStatus::Loading {
                started_at: *started_at,
            },
            ProviderState::Ready(model, ready_at) => ProviderStatus::Ready {
                model: model.name().to_string(),
                dimensions: model.dimensions(),
                ready_at: *ready_at,
            },
            ProviderState::Unavailable(reason) => ProviderStatus::Unavailable {
                reason: reason.clone(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            *self.state.read().unwrap_or_else(PoisonError::into_inner),
            ProviderState::Ready(..)
        )
    }

    /// Number of cached query embeddings.
    pub fn cached_queries(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Mark semantic search unavailable without loading anything.
    /// Has no effect once loading has started.
    pub fn disable(&self, reason: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, ProviderState::Uninitialized) {
            *state = ProviderState::Unavailable(reason.to_string());
        }
    }

    /// Load the model, blocking until it is ready, failed, or `timeout` passes.
    ///
    /// Only the first call loads; later calls report the outcome of the first.
    /// On timeout the loader thread is left to finish in the background and
    /// its result is discarded.
    pub fn initialize<F>(&self, loader: F, timeout: Duration) -> Result<(), EmbeddingError>
    where
        F: FnOnce() -> Result<Box<dyn Embedder>, EmbeddingError> + Send + 'static,
    {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            match &*state {
                ProviderState::Uninitialized => *state = ProviderState::Loading(Utc::now()),
                ProviderState::Loading(_) => {
                    return Err(EmbeddingError::InitFailed(
                        "model is already being loaded".to_string(),
                    ))
                }
                ProviderState::Ready(..) => return Ok(()),
                ProviderState::Unavailable(reason) => {
                    return Err(EmbeddingError::Unavailable(reason.clone()))
                }
            }
        }

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            // the receiver is gone after a timeout
            let _ = tx.send(loader());
        });

        let loaded = match rx.recv_timeout(timeout) {
            Ok(result) => result.and_then(|model| self.check_model(model)),
            Err(RecvTimeoutError::Timeout) => Err(EmbeddingError::InitTimeout(timeout.as_secs())),
            Err(RecvTimeoutError::Disconnected) => Err(EmbeddingError::InitFailed(
                "model loader exited without a result".to_string(),
            )),
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match loaded {
            Ok(model) => {
                log::info!("semantic search ready ({})", model.name());
                *state = ProviderState::Ready(model, Utc::now());
                Ok(())
            }
            Err(err) => {
                log::error!("semantic search disabled: {err}");
                *state = ProviderState::Unavailable(err.to_string());
                Err(err)
            }
        }
    }

    /// Same as `initialize()` but on a background thread; poll `status()` for progress.
    pub fn spawn_initialize<F>(
        self: &Arc<Self>,
        loader: F,
        timeout: Duration,
    ) -> JoinHandle<Result<(), EmbeddingError>>
    where
        F: FnOnce() -> Result<Box<dyn Embedder>, EmbeddingError> + Send + 'static,
    {
        let provider = Arc::clone(self);
        std::thread::spawn(move || provider.initialize(loader, timeout))
    }

    fn check_model(&self, model: Box<dyn Embedder>) -> Result<Arc<dyn Embedder>, EmbeddingError> {
        match self.expected_dimensions {
            Some(expected) if expected != model.dimensions() => {
                Err(EmbeddingError::DimensionMismatch {
                    expected,
                    got: model.dimensions(),
                })
            }
            _ => Ok(Arc::from(model)),
        }
    }

    fn ready_model(&self) -> Result<Arc<dyn Embedder>, EmbeddingError> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            ProviderState::Ready(model, _) => Ok(Arc::clone(model)),
            ProviderState::Uninitialized | ProviderState::Loading(_) => {
                Err(EmbeddingError::NotReady)
            }
            ProviderState::Unavailable(reason) => Err(EmbeddingError::Unavailable(reason.clone())),
        }
    }

    /// Embed a query.
    ///
    /// The cache is keyed by the exact text, so `"mercy"` and `"mercy "`
    /// are separate entries. A cache hit never touches the model.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidQuery);
        }

        let model = self.ready_model()?;

        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(text)
        {
            log::debug!("query embedding cache hit");
            return Ok(hit.clone());
        }

        let mut vector = model.embed(text)?;
        if vector.len() != model.dimensions() {
            return Err(EmbeddingError::EmbeddingFailed(format!(
                "model returned {} dimensions, expected {}",
                vector.len(),
                model.dimensions()
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(EmbeddingError::EmbeddingFailed(
                "model returned non-finite values".to_string(),
            ));
        }
        if self.normalize {
            l2_normalize(&mut vector);
        }

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(text.to_string(), vector.clone());

        Ok(vector)
    }
}

/// Scale to unit length in place. Zero vectors are left as they are.
fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}
