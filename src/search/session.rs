//! Search session: the single owner of corpus, provider and query state.
//!
//! A displayed query moves `Idle -> Searching -> {Results | NoResults | Failed} -> Idle`.
//! Every displayed query takes a ticket; one that finishes after a newer one
//! has started is reported as `Superseded` and leaves the displayed phase alone.
//!
//! Requests that own their answer (one per HTTP client) go through
//! `run_detached()` instead: no ticket, never superseded, phase untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use super::errors::SearchError;
use super::keyword::keyword_matches;
use super::{SearchMode, DEFAULT_KEYWORD_LIMIT};
use crate::corpus::{flatten, ChapterDetail, ChapterSummary, Corpus, VerseIndex};
use crate::semantic::{top_k, EmbeddingProvider, SearchHit, DEFAULT_TOP_K};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub keyword_limit: usize,
    pub semantic_top_k: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            keyword_limit: DEFAULT_KEYWORD_LIMIT,
            semantic_top_k: DEFAULT_TOP_K,
        }
    }
}

/// Displayed lifecycle state of the most recent query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SearchPhase {
    Idle,
    Searching { query: String, mode: SearchMode },
    Results { count: usize },
    NoResults,
    Failed { message: String },
}

#[derive(Debug)]
pub enum SearchOutcome {
    Results(Vec<SearchHit>),
    NoResults,
    Failed(SearchError),
    /// A newer query started before this one finished; discard it.
    Superseded,
}

impl SearchOutcome {
    fn from_hits(hits: Vec<SearchHit>) -> Self {
        if hits.is_empty() {
            Self::NoResults
        } else {
            Self::Results(hits)
        }
    }

    #[cfg(test)]
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            Self::Results(hits) => hits,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    query: String,
    mode: SearchMode,
}

pub struct SearchSession {
    index: VerseIndex,
    provider: Arc<EmbeddingProvider>,
    limits: SearchLimits,
    generation: AtomicU64,
    phase: Mutex<SearchPhase>,
}

impl SearchSession {
    pub fn new(corpus: &Corpus, provider: Arc<EmbeddingProvider>, limits: SearchLimits) -> Self {
        let index = flatten(corpus);
        if index.is_empty() {
            log::warn!("corpus has no verses; every search will come back empty");
        } else {
            log::debug!("indexed {} verses", index.len());
        }

        Self {
            index,
            provider,
            limits,
            generation: AtomicU64::new(0),
            phase: Mutex::new(SearchPhase::Idle),
        }
    }

    pub fn index(&self) -> &VerseIndex {
        &self.index
    }

    pub fn provider(&self) -> &Arc<EmbeddingProvider> {
        &self.provider
    }

    pub fn chapters(&self) -> Vec<ChapterSummary> {
        self.index.chapters().cloned().collect()
    }

    pub fn chapter(&self, index: usize) -> Option<ChapterDetail> {
        self.index.chapter(index)
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return to `Idle` once the presentation has consumed the last outcome.
    pub fn reset(&self) {
        self.set_phase(SearchPhase::Idle);
    }

    fn set_phase(&self, phase: SearchPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Start a query. Any ticket issued earlier becomes stale.
    pub fn begin(&self, query: &str, mode: SearchMode) -> SearchTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_phase(SearchPhase::Searching {
            query: query.to_string(),
            mode,
        });

        SearchTicket {
            generation,
            query: query.to_string(),
            mode,
        }
    }

    pub fn is_current(&self, ticket: &SearchTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Run a query started with `begin()`.
    pub fn run(&self, ticket: &SearchTicket) -> SearchOutcome {
        let outcome = match self.execute(&ticket.query, ticket.mode, Some(ticket)) {
            Ok(None) => SearchOutcome::Superseded,
            Ok(Some(hits)) => SearchOutcome::from_hits(hits),
            Err(err) => SearchOutcome::Failed(err),
        };

        if !self.is_current(ticket) {
            log::debug!("discarding stale results for '{}'", ticket.query);
            return SearchOutcome::Superseded;
        }

        let phase = match &outcome {
            SearchOutcome::Results(hits) => SearchPhase::Results { count: hits.len() },
            SearchOutcome::NoResults => SearchPhase::NoResults,
            SearchOutcome::Failed(err) => {
                log::warn!("{:?} search for '{}' failed: {err}", ticket.mode, ticket.query);
                SearchPhase::Failed {
                    message: err.user_message(),
                }
            }
            SearchOutcome::Superseded => return SearchOutcome::Superseded,
        };
        self.set_phase(phase);

        outcome
    }

    /// `begin()` and `run()` in one step.
    pub fn search(&self, query: &str, mode: SearchMode) -> SearchOutcome {
        let ticket = self.begin(query, mode);
        self.run(&ticket)
    }

    /// Run a query outside the displayed lifecycle.
    ///
    /// Concurrent detached queries never supersede each other or a displayed
    /// one; the outcome is never `Superseded`.
    pub fn run_detached(&self, query: &str, mode: SearchMode) -> SearchOutcome {
        match self.execute(query, mode, None) {
            Ok(hits) => SearchOutcome::from_hits(hits.unwrap_or_default()),
            Err(err) => {
                log::warn!("{mode:?} search for '{query}' failed: {err}");
                SearchOutcome::Failed(err)
            }
        }
    }

    /// `Ok(None)` when `ticket` went stale before scoring.
    fn execute(
        &self,
        query: &str,
        mode: SearchMode,
        ticket: Option<&SearchTicket>,
    ) -> Result<Option<Vec<SearchHit>>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery);
        }

        match mode {
            SearchMode::Keyword => Ok(Some(keyword_matches(
                &self.index,
                query,
                self.limits.keyword_limit,
            ))),
            SearchMode::Semantic => {
                let query_vector = self.provider.embed(query)?;

                if ticket.is_some_and(|ticket| !self.is_current(ticket)) {
                    return Ok(None);
                }

                Ok(Some(top_k(
                    &query_vector,
                    &self.index,
                    self.limits.semantic_top_k,
                )))
            }
        }
    }
}
