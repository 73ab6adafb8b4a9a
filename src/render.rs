//! Presentation of chapters, search results and errors.
//!
//! The search core only hands out plain data; a `Presenter` decides how it
//! looks. `TextPresenter` is for terminals, `JsonPresenter` for scripts.

use std::io::{self, Write};

use serde_json::json;

use crate::corpus::{ChapterDetail, ChapterSummary, CorpusStats};
use crate::semantic::SearchHit;

pub trait Presenter {
    fn render_chapter_list(&mut self, chapters: &[ChapterSummary]) -> io::Result<()>;
    fn render_chapter_detail(&mut self, chapter: &ChapterDetail) -> io::Result<()>;
    /// `show_scores` is set for semantic results, where the score carries meaning.
    fn render_search_results(&mut self, hits: &[SearchHit], show_scores: bool) -> io::Result<()>;
    fn render_stats(&mut self, stats: &CorpusStats) -> io::Result<()>;
    fn render_error(&mut self, message: &str) -> io::Result<()>;
}

pub struct TextPresenter<W: Write> {
    out: W,
}

impl<W: Write> TextPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for TextPresenter<W> {
    fn render_chapter_list(&mut self, chapters: &[ChapterSummary]) -> io::Result<()> {
        for chapter in chapters {
            write!(
                self.out,
                "{:>3}. {} ({})",
                chapter.index, chapter.transliteration, chapter.name
            )?;
            if let Some(translation) = &chapter.translation {
                write!(self.out, " - {translation}")?;
            }
            write!(self.out, " [{} verses", chapter.verse_count)?;
            if let Some(classification) = &chapter.classification {
                write!(self.out, ", {classification}")?;
            }
            writeln!(self.out, "]")?;
        }
        Ok(())
    }

    fn render_chapter_detail(&mut self, chapter: &ChapterDetail) -> io::Result<()> {
        let summary = &chapter.summary;
        writeln!(
            self.out,
            "{}. {} ({})",
            summary.index, summary.transliteration, summary.name
        )?;
        if let Some(translation) = &summary.translation {
            writeln!(self.out, "{translation}")?;
        }
        writeln!(self.out)?;

        for verse in &chapter.verses {
            writeln!(self.out, "[{}] {}", verse.verse_number, verse.source_text)?;
            writeln!(self.out, "    {}", verse.translation_text)?;
        }
        Ok(())
    }

    fn render_search_results(&mut self, hits: &[SearchHit], show_scores: bool) -> io::Result<()> {
        if hits.is_empty() {
            return writeln!(self.out, "No results found.");
        }

        for hit in hits {
            let verse = &hit.verse;
            write!(
                self.out,
                "{} {}",
                verse.reference(),
                verse.chapter_transliteration
            )?;
            if show_scores {
                write!(self.out, " (relevance {:.1}%)", hit.score * 100.0)?;
            }
            writeln!(self.out)?;
            writeln!(self.out, "    {}", verse.source_text)?;
            writeln!(self.out, "    {}", verse.translation_text)?;
        }
        Ok(())
    }

    fn render_stats(&mut self, stats: &CorpusStats) -> io::Result<()> {
        writeln!(self.out, "Chapters: {}", stats.chapters)?;
        writeln!(self.out, "Total verses: {}", stats.verses)?;
        writeln!(
            self.out,
            "Verses with embeddings: {}",
            stats.verses_with_embeddings
        )?;
        writeln!(self.out, "Coverage: {:.1}%", stats.coverage_percent)?;
        match stats.dimensions {
            Some(d) => writeln!(self.out, "Embedding dimension: {d}"),
            None => writeln!(self.out, "Embedding dimension: none"),
        }
    }

    fn render_error(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "Error: {message}")
    }
}

pub struct JsonPresenter<W: Write> {
    out: W,
}

impl<W: Write> JsonPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, value: &impl serde::Serialize) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, value)?;
        writeln!(self.out)
    }
}

impl<W: Write> Presenter for JsonPresenter<W> {
    fn render_chapter_list(&mut self, chapters: &[ChapterSummary]) -> io::Result<()> {
        self.emit(&chapters)
    }

    fn render_chapter_detail(&mut self, chapter: &ChapterDetail) -> io::Result<()> {
        self.emit(chapter)
    }

    fn render_search_results(&mut self, hits: &[SearchHit], _show_scores: bool) -> io::Result<()> {
        self.emit(&hits)
    }

    fn render_stats(&mut self, stats: &CorpusStats) -> io::Result<()> {
        self.emit(stats)
    }

    fn render_error(&mut self, message: &str) -> io::Result<()> {
        self.emit(&json!({ "error": message }))
    }
}
