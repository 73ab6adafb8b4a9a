//! Verse corpus loading and the flattened verse index.
//!
//! # Architecture
//!
//! - `types`: Chapters, verses and the flattened `VerseIndex` that search runs over
//! - `loader`: Reads the corpus JSON from disk or over HTTP and validates embeddings
//! - `source`: Resolves a configured corpus location to a file path or URL

mod loader;
mod source;
mod types;

pub use loader::{CorpusError, CorpusLoader};
pub use source::CorpusSource;
pub use types::{
    flatten, Chapter, ChapterDetail, ChapterSummary, ChapterVerse, Corpus, CorpusStats, Verse,
    VerseIndex,
};
