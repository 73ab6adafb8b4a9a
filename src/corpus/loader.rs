//! Corpus loading.
//!
//! The corpus is one JSON document: an ordered list of chapters, each with
//! an ordered list of verses carrying a precomputed embedding. Embeddings
//! are validated here once so the search path never re-checks their shape:
//! - not an array, empty, non-numeric or non-finite values: dropped
//! - a length different from the first valid embedding: dropped
//! - a length different from the pinned dimensionality: load fails

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::source::CorpusSource;
use super::types::{Chapter, ChapterVerse, Corpus};

/// Default timeout for fetching a remote corpus
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur while loading the corpus.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("failed to read corpus at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch corpus from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching corpus from {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("corpus is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("corpus embeddings have {got} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid corpus source '{0}'")]
    InvalidSource(String),
}

#[derive(Deserialize)]
struct RawCorpus {
    #[serde(alias = "chapters")]
    surahs: Vec<RawChapter>,
    #[serde(default)]
    total_verses: Option<usize>,
}

#[derive(Deserialize)]
struct RawChapter {
    #[serde(default)]
    id: Option<u64>,
    name: String,
    transliteration: String,
    #[serde(default)]
    translation: Option<String>,
    #[serde(default, rename = "type")]
    classification: Option<String>,
    #[serde(default)]
    total_verses: Option<usize>,
    verses: Vec<RawVerse>,
}

#[derive(Deserialize)]
struct RawVerse {
    #[serde(default)]
    id: Option<u64>,
    text: String,
    translation: String,
    #[serde(default)]
    embedding: Option<Value>,
}

/// Loads and validates a corpus.
#[derive(Debug, Clone)]
pub struct CorpusLoader {
    expected_dimensions: Option<usize>,
    fetch_timeout: Duration,
}

impl Default for CorpusLoader {
    fn default() -> Self {
        Self {
            expected_dimensions: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl CorpusLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the embedding dimensionality; a corpus with any other
    /// dimensionality fails to load.
    pub fn with_expected_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.expected_dimensions = dimensions;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Read the corpus from `source` and validate it. No retries.
    pub fn load(&self, source: &CorpusSource) -> Result<Corpus, CorpusError> {
        log::info!("loading corpus from {source}");

        let bytes = match source {
            CorpusSource::File(path) => std::fs::read(path).map_err(|source| CorpusError::Io {
                path: path.clone(),
                source,
            })?,
            CorpusSource::Remote(url) => self.fetch(url.as_str())?,
        };

        let corpus = self.parse(&bytes)?;
        log::info!(
            "loaded {} chapters, {} verses",
            corpus.chapters().len(),
            corpus.total_verses()
        );

        Ok(corpus)
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, CorpusError> {
        let map_err = |source: reqwest::Error| {
            if source.is_timeout() {
                CorpusError::Timeout {
                    url: url.to_string(),
                    timeout: self.fetch_timeout,
                }
            } else {
                CorpusError::Fetch {
                    url: url.to_string(),
                    source,
                }
            }
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.fetch_timeout)
            .build()
            .map_err(map_err)?;

        let response = client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(map_err)?;

        response.bytes().map(|b| b.to_vec()).map_err(map_err)
    }

    /// Parse and validate corpus JSON.
    pub fn parse(&self, bytes: &[u8]) -> Result<Corpus, CorpusError> {
        let raw: RawCorpus = serde_json::from_slice(bytes)?;

        let mut dimensions: Option<usize> = None;
        let mut dropped = 0usize;
        let mut chapters = Vec::with_capacity(raw.surahs.len());

        for (chapter_pos, raw_chapter) in raw.surahs.into_iter().enumerate() {
            let chapter_index = chapter_pos + 1;

            if let Some(id) = raw_chapter.id {
                if id != chapter_index as u64 {
                    log::warn!(
                        "chapter '{}' has id {id} but sits at position {chapter_index}; using position",
                        raw_chapter.name
                    );
                }
            }
            if let Some(declared) = raw_chapter.total_verses {
                if declared != raw_chapter.verses.len() {
                    log::warn!(
                        "chapter {chapter_index} declares {declared} verses but contains {}",
                        raw_chapter.verses.len()
                    );
                }
            }

            let mut verses = Vec::with_capacity(raw_chapter.verses.len());
            for (verse_pos, raw_verse) in raw_chapter.verses.into_iter().enumerate() {
                let verse_number = verse_pos + 1;
                if let Some(id) = raw_verse.id {
                    if id != verse_number as u64 {
                        log::warn!(
                            "verse {chapter_index}:{verse_number} has id {id}; using position"
                        );
                    }
                }

                let embedding = match raw_verse.embedding.as_ref().and_then(parse_embedding) {
                    Some(vector) => match dimensions {
                        None => {
                            self.check_dimensions(vector.len())?;
                            dimensions = Some(vector.len());
                            Some(vector)
                        }
                        Some(d) if d == vector.len() => Some(vector),
                        Some(d) => {
                            log::warn!(
                                "verse {chapter_index}:{verse_number} embedding has {} dimensions, expected {d}; ignoring",
                                vector.len()
                            );
                            None
                        }
                    },
                    None => None,
                };

                if embedding.is_none() {
                    dropped += 1;
                }

                verses.push(ChapterVerse {
                    source_text: raw_verse.text,
                    translation_text: raw_verse.translation,
                    embedding,
                });
            }

            chapters.push(Chapter {
                name: raw_chapter.name,
                transliteration: raw_chapter.transliteration,
                translation: raw_chapter.translation,
                classification: raw_chapter.classification,
                verses,
            });
        }

        let corpus = Corpus::new(chapters, dimensions);

        if let Some(declared) = raw.total_verses {
            if declared != corpus.total_verses() {
                log::warn!(
                    "corpus declares {declared} verses but contains {}",
                    corpus.total_verses()
                );
            }
        }
        if dropped > 0 {
            log::warn!("{dropped} verses have no usable embedding and are excluded from semantic search");
        }

        Ok(corpus)
    }

    fn check_dimensions(&self, got: usize) -> Result<(), CorpusError> {
        match self.expected_dimensions {
            Some(expected) if expected != got => {
                Err(CorpusError::DimensionMismatch { expected, got })
            }
            _ => Ok(()),
        }
    }
}

/// Convert a raw JSON embedding into a vector, `None` if it is not a
/// non-empty array of finite numbers.
fn parse_embedding(value: &Value) -> Option<Vec<f32>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }

    items
        .iter()
        .map(|item| {
            let x = item.as_f64()? as f32;
            x.is_finite().then_some(x)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Answer one HTTP request on a local port with `status` and `body`.
    fn serve_once(status: &'static str, body: Vec<u8>) -> url::Url {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
        });

        url::Url::parse(&format!("http://{addr}/corpus.json")).unwrap()
    }

    fn corpus_json(verses: Value) -> Vec<u8> {
        json!({
            "total_surahs": 1,
            "total_verses": 2,
            "surahs": [{
                "id": 1,
                "name": "الفاتحة",
                "transliteration": "Al-Fatihah",
                "translation": "The Opener",
                "type": "meccan",
                "total_verses": 2,
                "verses": verses,
            }]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_parse_valid_corpus() {
        let bytes = corpus_json(json!([
            {"id": 1, "text": "a", "translation": "In the name", "embedding": [1.0, 0.0]},
            {"id": 2, "text": "b", "translation": "All praise", "embedding": [0.0, 1.0]},
        ]));

        let corpus = CorpusLoader::new().parse(&bytes).unwrap();
        assert_eq!(corpus.chapters().len(), 1);
        assert_eq!(corpus.total_verses(), 2);
        assert_eq!(corpus.dimensions(), Some(2));

        let chapter = &corpus.chapters()[0];
        assert_eq!(chapter.transliteration, "Al-Fatihah");
        assert_eq!(chapter.classification.as_deref(), Some("meccan"));
        assert_eq!(chapter.verses[1].translation_text, "All praise");
        assert_eq!(chapter.verses[1].embedding, Some(vec![0.0, 1.0]));
    }

    #[test]
    fn test_chapters_alias_accepted() {
        let bytes = json!({
            "chapters": [{"name": "n", "transliteration": "t", "verses": []}]
        })
        .to_string();

        let corpus = CorpusLoader::new().parse(bytes.as_bytes()).unwrap();
        assert_eq!(corpus.chapters().len(), 1);
        assert_eq!(corpus.dimensions(), None);
    }

    #[test]
    fn test_malformed_embeddings_tolerated() {
        let bytes = corpus_json(json!([
            {"text": "a", "translation": "null", "embedding": null},
            {"text": "b", "translation": "missing"},
            {"text": "c", "translation": "string", "embedding": "nope"},
            {"text": "d", "translation": "mixed", "embedding": [1.0, "x"]},
            {"text": "e", "translation": "empty", "embedding": []},
            {"text": "f", "translation": "good", "embedding": [0.5, 0.5, 0.5]},
            {"text": "g", "translation": "short", "embedding": [0.5, 0.5]},
        ]));

        let corpus = CorpusLoader::new().parse(&bytes).unwrap();
        let embeddings: Vec<bool> = corpus.chapters()[0]
            .verses
            .iter()
            .map(|v| v.embedding.is_some())
            .collect();

        assert_eq!(embeddings, vec![false, false, false, false, false, true, false]);
        assert_eq!(corpus.dimensions(), Some(3));
        assert_eq!(corpus.total_verses(), 7);
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let bytes = json!({
            "surahs": [{"name": "n", "verses": []}]
        })
        .to_string();

        let result = CorpusLoader::new().parse(bytes.as_bytes());
        assert!(matches!(result, Err(CorpusError::Malformed(_))));
    }

    #[test]
    fn test_missing_verse_translation_is_malformed() {
        let bytes = corpus_json(json!([{"text": "a"}]));
        let result = CorpusLoader::new().parse(&bytes);
        assert!(matches!(result, Err(CorpusError::Malformed(_))));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let result = CorpusLoader::new().parse(b"{not json");
        assert!(matches!(result, Err(CorpusError::Malformed(_))));
    }

    #[test]
    fn test_pinned_dimension_mismatch_fails() {
        let bytes = corpus_json(json!([
            {"text": "a", "translation": "x", "embedding": [1.0, 0.0]},
        ]));

        let result = CorpusLoader::new()
            .with_expected_dimensions(Some(384))
            .parse(&bytes);
        assert!(matches!(
            result,
            Err(CorpusError::DimensionMismatch {
                expected: 384,
                got: 2
            })
        ));
    }

    #[test]
    fn test_pinned_dimension_match_loads() {
        let bytes = corpus_json(json!([
            {"text": "a", "translation": "x", "embedding": [1.0, 0.0]},
        ]));

        let corpus = CorpusLoader::new()
            .with_expected_dimensions(Some(2))
            .parse(&bytes)
            .unwrap();
        assert_eq!(corpus.dimensions(), Some(2));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&corpus_json(json!([
            {"text": "a", "translation": "x", "embedding": [1.0]},
        ])))
        .unwrap();

        let source = CorpusSource::File(file.path().to_path_buf());
        let corpus = CorpusLoader::new().load(&source).unwrap();
        assert_eq!(corpus.total_verses(), 1);
    }

    #[test]
    fn test_load_from_url() {
        let url = serve_once(
            "200 OK",
            corpus_json(json!([
                {"text": "a", "translation": "x", "embedding": [1.0, 0.0]},
                {"text": "b", "translation": "y", "embedding": [0.0, 1.0]},
            ])),
        );

        let corpus = CorpusLoader::new().load(&CorpusSource::Remote(url)).unwrap();
        assert_eq!(corpus.total_verses(), 2);
        assert_eq!(corpus.dimensions(), Some(2));
    }

    #[test]
    fn test_http_error_status_is_fetch_error() {
        let url = serve_once("404 Not Found", b"{}".to_vec());

        let result = CorpusLoader::new().load(&CorpusSource::Remote(url));
        assert!(matches!(result, Err(CorpusError::Fetch { .. })));
    }

    #[test]
    fn test_unresponsive_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            // accept and hold the connection without answering
            let _held = listener.accept();
            std::thread::sleep(Duration::from_secs(3));
        });

        let url = url::Url::parse(&format!("http://{addr}/corpus.json")).unwrap();
        let result = CorpusLoader::new()
            .with_fetch_timeout(Duration::from_millis(100))
            .load(&CorpusSource::Remote(url));

        match result {
            Err(err @ CorpusError::Timeout { .. }) => assert!(err.to_string().contains("100ms")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CorpusSource::File(dir.path().join("missing.json"));
        let result = CorpusLoader::new().load(&source);
        assert!(matches!(result, Err(CorpusError::Io { .. })));
    }
}
