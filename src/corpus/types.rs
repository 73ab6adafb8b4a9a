use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;

/// A verse as stored inside its chapter.
///
/// Position inside `Chapter::verses` is the verse number, so nothing here
/// can disagree with corpus order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterVerse {
    pub source_text: String,
    pub translation_text: String,
    /// Validated at load time: `Some` only for a finite vector of the corpus dimensionality.
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub name: String,
    pub transliteration: String,
    pub translation: Option<String>,
    /// Classification tag, e.g. "meccan" / "medinan"
    pub classification: Option<String>,
    pub verses: Vec<ChapterVerse>,
}

impl Chapter {
    pub fn verse_count(&self) -> usize {
        self.verses.len()
    }
}

/// The full ordered corpus. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    chapters: Vec<Chapter>,
    dimensions: Option<usize>,
}

impl Corpus {
    pub fn new(chapters: Vec<Chapter>, dimensions: Option<usize>) -> Self {
        Self {
            chapters,
            dimensions,
        }
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Embedding dimensionality, `None` when no verse carries a valid embedding.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn total_verses(&self) -> usize {
        self.chapters.iter().map(Chapter::verse_count).sum()
    }
}

/// A single addressable verse tagged with its chapter context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verse {
    /// 1-based chapter position in corpus order
    pub chapter_index: usize,
    pub chapter_name: String,
    pub chapter_transliteration: String,
    /// 1-based position within the chapter
    pub verse_number: usize,
    pub source_text: String,
    pub translation_text: String,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl Verse {
    /// Display reference, e.g. `2:255`.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.chapter_index, self.verse_number)
    }
}

/// Chapter metadata as shown in a chapter list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterSummary {
    pub index: usize,
    pub name: String,
    pub transliteration: String,
    pub translation: Option<String>,
    pub classification: Option<String>,
    pub verse_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterDetail {
    #[serde(flatten)]
    pub summary: ChapterSummary,
    pub verses: Vec<Arc<Verse>>,
}

/// Embedding coverage of a loaded corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStats {
    pub chapters: usize,
    pub verses: usize,
    pub verses_with_embeddings: usize,
    pub dimensions: Option<usize>,
    pub coverage_percent: f64,
}

/// Flattened, search-ready view of a corpus.
///
/// Verses are concatenated chapter by chapter in corpus order; each
/// chapter owns a contiguous range of positions.
#[derive(Debug, Clone, Default)]
pub struct VerseIndex {
    verses: Vec<Arc<Verse>>,
    chapters: Vec<(ChapterSummary, Range<usize>)>,
    dimensions: Option<usize>,
}

impl VerseIndex {
    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }

    pub fn verses(&self) -> &[Arc<Verse>] {
        &self.verses
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn chapters(&self) -> impl Iterator<Item = &ChapterSummary> {
        self.chapters.iter().map(|(summary, _)| summary)
    }

    /// Chapter detail by 1-based index.
    pub fn chapter(&self, index: usize) -> Option<ChapterDetail> {
        let (summary, range) = self.chapters.get(index.checked_sub(1)?)?;
        Some(ChapterDetail {
            summary: summary.clone(),
            verses: self.verses[range.clone()].to_vec(),
        })
    }

    pub fn stats(&self) -> CorpusStats {
        let verses_with_embeddings = self
            .verses
            .iter()
            .filter(|verse| verse.embedding.is_some())
            .count();

        let coverage_percent = if self.verses.is_empty() {
            0.0
        } else {
            verses_with_embeddings as f64 * 100.0 / self.verses.len() as f64
        };

        CorpusStats {
            chapters: self.chapters.len(),
            verses: self.verses.len(),
            verses_with_embeddings,
            dimensions: self.dimensions,
            coverage_percent,
        }
    }
}

/// Build the flattened index. Pure: the same corpus always yields the same index.
pub fn flatten(corpus: &Corpus) -> VerseIndex {
    let mut verses = Vec::with_capacity(corpus.total_verses());
    let mut chapters = Vec::with_capacity(corpus.chapters().len());

    for (chapter_pos, chapter) in corpus.chapters().iter().enumerate() {
        let chapter_index = chapter_pos + 1;
        let start = verses.len();

        verses.extend(chapter.verses.iter().enumerate().map(|(verse_pos, verse)| {
            Arc::new(Verse {
                chapter_index,
                chapter_name: chapter.name.clone(),
                chapter_transliteration: chapter.transliteration.clone(),
                verse_number: verse_pos + 1,
                source_text: verse.source_text.clone(),
                translation_text: verse.translation_text.clone(),
                embedding: verse.embedding.clone(),
            })
        }));

        let summary = ChapterSummary {
            index: chapter_index,
            name: chapter.name.clone(),
            transliteration: chapter.transliteration.clone(),
            translation: chapter.translation.clone(),
            classification: chapter.classification.clone(),
            verse_count: chapter.verse_count(),
        };
        chapters.push((summary, start..verses.len()));
    }

    VerseIndex {
        verses,
        chapters,
        dimensions: corpus.dimensions(),
    }
}
