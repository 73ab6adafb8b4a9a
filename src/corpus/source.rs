use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use super::CorpusError;

/// Where the corpus JSON lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusSource {
    File(PathBuf),
    Remote(Url),
}

impl CorpusSource {
    /// Resolve a configured corpus location.
    ///
    /// `http(s)://` becomes a remote source, `file://` and plain paths become
    /// files. Relative paths resolve against `base_dir`.
    pub fn parse(raw: &str, base_dir: &Path) -> Result<Self, CorpusError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CorpusError::InvalidSource(raw.to_string()));
        }

        if let Ok(url) = Url::parse(raw) {
            match url.scheme() {
                "http" | "https" => return Ok(Self::Remote(url)),
                "file" => {
                    return url
                        .to_file_path()
                        .map(Self::File)
                        .map_err(|_| CorpusError::InvalidSource(raw.to_string()));
                }
                // single-letter schemes are windows drive letters
                scheme if scheme.len() > 1 => {
                    return Err(CorpusError::InvalidSource(raw.to_string()))
                }
                _ => {}
            }
        }

        let path = PathBuf::from(raw);
        if path.is_absolute() {
            Ok(Self::File(path))
        } else {
            Ok(Self::File(base_dir.join(path)))
        }
    }
}

impl fmt::Display for CorpusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}
