use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use crate::corpus::{Corpus, CorpusLoader, CorpusSource};
use crate::semantic::{Embedder, EmbeddingError, EmbeddingProvider};

/// Embedder returning fixed vectors per query text and counting model calls.
pub struct StubEmbedder {
    pub vectors: HashMap<String, Vec<f32>>,
    pub dimensions: usize,
    pub calls: Arc<AtomicUsize>,
}

impl Embedder for StubEmbedder {
    fn name(&self) -> &str {
        "stub"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed(format!("no vector for '{text}'")))
    }
}

/// Write `value` to a temp file and load it the way the binary does.
pub fn load_corpus(value: &Value) -> Corpus {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(value.to_string().as_bytes()).unwrap();

    CorpusLoader::new()
        .load(&CorpusSource::File(file.path().to_path_buf()))
        .unwrap()
}

/// Two chapters, three verses; only 2:1 mentions "light".
pub fn two_chapter_corpus() -> Value {
    json!({
        "total_surahs": 2,
        "total_verses": 3,
        "surahs": [
            {
                "id": 1, "name": "الأول", "transliteration": "Al-Awwal",
                "translation": "The First", "type": "meccan", "total_verses": 2,
                "verses": [
                    {"id": 1, "text": "a", "translation": "In the name of God, the Merciful", "embedding": [1.0, 0.0]},
                    {"id": 2, "text": "b", "translation": "Praise be to the Lord of the worlds", "embedding": [0.0, 1.0]}
                ]
            },
            {
                "id": 2, "name": "الثاني", "transliteration": "Ath-Thani",
                "translation": "The Second", "type": "medinan", "total_verses": 1,
                "verses": [
                    {"id": 1, "text": "c", "translation": "God is the Light of the heavens", "embedding": [-1.0, 0.0]}
                ]
            }
        ]
    })
}

pub fn ready_provider(
    corpus: &Corpus,
    vectors: &[(&str, Vec<f32>)],
) -> (Arc<EmbeddingProvider>, Arc<AtomicUsize>) {
    let dimensions = corpus.dimensions().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(EmbeddingProvider::new(Some(dimensions), true));

    let stub = StubEmbedder {
        vectors: vectors
            .iter()
            .map(|(text, vector)| (text.to_string(), vector.clone()))
            .collect(),
        dimensions,
        calls: calls.clone(),
    };
    provider
        .initialize(
            move || Ok(Box::new(stub) as Box<dyn Embedder>),
            Duration::from_secs(5),
        )
        .unwrap();

    (provider, calls)
}

/// Embedder that blocks inside `embed()` until the test releases it.
pub struct GatedEmbedder {
    vector: Vec<f32>,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl Embedder for GatedEmbedder {
    fn name(&self) -> &str {
        "gated"
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let _ = self.entered.lock().unwrap().send(());
        self.release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| EmbeddingError::EmbeddingFailed("never released".to_string()))?;
        Ok(self.vector.clone())
    }
}

/// Test side of a `GatedEmbedder`.
pub struct Gate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl Gate {
    /// Block until a query is inside the model.
    pub fn wait_entered(&self) {
        self.entered.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    pub fn open(&self) {
        self.release.send(()).unwrap();
    }
}

/// Ready provider whose model answers every query with `vector`, one query
/// per `Gate::open()`.
pub fn gated_provider(corpus: &Corpus, vector: Vec<f32>) -> (Arc<EmbeddingProvider>, Gate) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let embedder = GatedEmbedder {
        vector,
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };

    let provider = Arc::new(EmbeddingProvider::new(corpus.dimensions(), true));
    provider
        .initialize(
            move || Ok(Box::new(embedder) as Box<dyn Embedder>),
            Duration::from_secs(5),
        )
        .unwrap();

    (
        provider,
        Gate {
            entered: entered_rx,
            release: release_tx,
        },
    )
}
