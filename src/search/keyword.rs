use std::sync::Arc;

use crate::corpus::VerseIndex;
use crate::semantic::SearchHit;

/// Case-insensitive substring match against verse translations.
///
/// Matches keep corpus order and are capped at `limit`. The query is
/// trimmed; an empty query matches nothing.
pub fn keyword_matches(index: &VerseIndex, query: &str, limit: usize) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    index
        .verses()
        .iter()
        .filter(|verse| verse.translation_text.to_lowercase().contains(&needle))
        .take(limit)
        .map(|verse| SearchHit {
            verse: Arc::clone(verse),
            score: 1.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{flatten, Chapter, ChapterVerse, Corpus};

    fn index_of(translations: &[&str]) -> VerseIndex {
        let verses = translations
            .iter()
            .map(|t| ChapterVerse {
                source_text: String::new(),
                translation_text: t.to_string(),
                embedding: None,
            })
            .collect();
        flatten(&Corpus::new(
            vec![Chapter {
                name: "c".to_string(),
                transliteration: "c".to_string(),
                translation: None,
                classification: None,
                verses,
            }],
            None,
        ))
    }

    #[test]
    fn test_case_insensitive() {
        let index = index_of(&["The Most Mercy-giving", "unrelated"]);
        assert_eq!(keyword_matches(&index, "mercy", 50).len(), 1);
        assert_eq!(keyword_matches(&index, "MERCY", 50).len(), 1);
        assert_eq!(keyword_matches(&index, "Mercy", 50).len(), 1);
    }

    #[test]
    fn test_preserves_corpus_order() {
        let index = index_of(&["light b", "dark", "Light a", "light c"]);
        let hits = keyword_matches(&index, "light", 50);
        let numbers: Vec<usize> = hits.iter().map(|h| h.verse.verse_number).collect();
        assert_eq!(numbers, vec![1, 3, 4]);
        assert!(hits.iter().all(|h| h.score == 1.0));
    }

    #[test]
    fn test_caps_matches() {
        let translations: Vec<String> = (0..80).map(|i| format!("verse {i} of light")).collect();
        let refs: Vec<&str> = translations.iter().map(String::as_str).collect();
        let index = index_of(&refs);

        let hits = keyword_matches(&index, "light", 50);
        assert_eq!(hits.len(), 50);
        assert_eq!(hits[49].verse.verse_number, 50);
    }

    #[test]
    fn test_trims_query() {
        let index = index_of(&["the light"]);
        assert_eq!(keyword_matches(&index, "  light  ", 50).len(), 1);
    }

    #[test]
    fn test_no_matches() {
        let index = index_of(&["the light"]);
        assert!(keyword_matches(&index, "darkness", 50).is_empty());
        assert!(keyword_matches(&index, "   ", 50).is_empty());
    }
}
