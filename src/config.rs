use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::search::{SearchLimits, DEFAULT_KEYWORD_LIMIT};
use crate::semantic::{DEFAULT_MODEL, DEFAULT_TOP_K};

const CONFIG_FILE: &str = "config.yaml";

/// Default corpus file, resolved against the base directory
const DEFAULT_CORPUS: &str = "quran_with_embeddings.json";
/// Default corpus fetch timeout in seconds
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
/// Default model load timeout in seconds (includes first-time download)
const DEFAULT_MODEL_LOAD_TIMEOUT_SECS: u64 = 300;
const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("couldn't determine home directory")]
    NoHomeDir,
}

/// Configuration for semantic search functionality
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Enable or disable semantic search
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Model name for query embeddings; must match the corpus embeddings
    #[serde(default = "default_model")]
    pub model: String,

    /// L2-normalize query vectors
    #[serde(default = "default_true")]
    pub normalize: bool,

    /// Timeout for model download and load in seconds
    #[serde(default = "default_model_load_timeout_secs")]
    pub model_load_timeout_secs: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: DEFAULT_MODEL.to_string(),
            normalize: true,
            model_load_timeout_secs: DEFAULT_MODEL_LOAD_TIMEOUT_SECS,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_model_load_timeout_secs() -> u64 {
    DEFAULT_MODEL_LOAD_TIMEOUT_SECS
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Corpus file path or http(s) URL
    #[serde(default = "default_corpus")]
    pub corpus: String,

    /// Pin the corpus embedding dimensionality
    #[serde(default)]
    pub embedding_dimensions: Option<usize>,

    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: usize,

    #[serde(default = "default_semantic_top_k")]
    pub semantic_top_k: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub corpus_fetch_timeout_secs: u64,

    /// HTTP API bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus: default_corpus(),
            embedding_dimensions: None,
            keyword_limit: DEFAULT_KEYWORD_LIMIT,
            semantic_top_k: DEFAULT_TOP_K,
            corpus_fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            bind: default_bind(),
            semantic: SemanticConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_corpus() -> String {
    DEFAULT_CORPUS.to_string()
}

fn default_keyword_limit() -> usize {
    DEFAULT_KEYWORD_LIMIT
}

fn default_semantic_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// `$VS_BASE_PATH`, or `~/.local/share/vs`.
pub fn default_base_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var("VS_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = homedir::my_home()
        .ok()
        .flatten()
        .ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".local/share/vs"))
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.keyword_limit == 0 {
            return Err(ConfigError::Invalid(
                "keyword_limit must be greater than 0".to_string(),
            ));
        }
        if self.semantic_top_k == 0 {
            return Err(ConfigError::Invalid(
                "semantic_top_k must be greater than 0".to_string(),
            ));
        }
        if self.corpus_fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "corpus_fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.semantic.model_load_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "semantic.model_load_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.embedding_dimensions == Some(0) {
            return Err(ConfigError::Invalid(
                "embedding_dimensions must be greater than 0".to_string(),
            ));
        }
        if self.corpus.trim().is_empty() {
            return Err(ConfigError::Invalid("corpus must not be empty".to_string()));
        }
        Ok(())
    }

    /// Load `config.yaml` from `base_path`, writing defaults if it doesn't exist.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: base_path.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(base_path).map_err(io_err)?;

        let config_path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !config_path.exists() {
            let defaults = serde_yml::to_string(&Self::default())?;
            std::fs::write(&config_path, defaults).map_err(io_err)?;
        }

        let config_str = std::fs::read_to_string(&config_path).map_err(io_err)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;
        config.base_path = base_path.to_path_buf();
        config.validate()?;

        Ok(config)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            keyword_limit: self.keyword_limit,
            semantic_top_k: self.semantic_top_k,
        }
    }

    pub fn corpus_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.corpus_fetch_timeout_secs)
    }

    pub fn model_load_timeout(&self) -> Duration {
        Duration::from_secs(self.semantic.model_load_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(dir.path()).unwrap();

        assert!(dir.path().join(CONFIG_FILE).exists());
        assert_eq!(config.keyword_limit, 50);
        assert_eq!(config.semantic_top_k, 20);
        assert!(config.semantic.enabled);
        assert_eq!(config.semantic.model, DEFAULT_MODEL);
        assert_eq!(config.base_path(), dir.path());
    }

    #[test]
    fn test_partial_config_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "corpus: https://example.com/quran.json\nsemantic:\n  enabled: false\n",
        )
        .unwrap();

        let config = Config::load_with(dir.path()).unwrap();
        assert_eq!(config.corpus, "https://example.com/quran.json");
        assert!(!config.semantic.enabled);
        assert!(config.semantic.normalize);
        assert_eq!(config.keyword_limit, 50);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "semantic_top_k: 0\n").unwrap();

        let result = Config::load_with(dir.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "keyword_limit: [not a number\n").unwrap();

        let result = Config::load_with(dir.path());
        assert!(matches!(result, Err(ConfigError::Malformed(_))));
    }

    #[test]
    fn test_pinned_dimensions_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "keyword_limit: 10\nembedding_dimensions: 384\n",
        )
        .unwrap();

        let config = Config::load_with(dir.path()).unwrap();
        assert_eq!(config.embedding_dimensions, Some(384));
        assert_eq!(config.limits().keyword_limit, 10);
        assert_eq!(config.limits().semantic_top_k, 20);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "embedding_dimensions: 0\n").unwrap();

        let result = Config::load_with(dir.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
