//! Corpus loading
//!
//! Reads the quote corpus from a JSON file on disk and normalizes it into
//! a [`Corpus`]. Loading happens once at startup; a corpus that cannot be
//! read or parsed is fatal for the process.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::corpus::Corpus;
use crate::schema::normalize_corpus;
use crate::RagError;

/// Loads a corpus file from disk
pub struct CorpusLoader {
    path: PathBuf,
}

impl CorpusLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read, parse, and normalize the corpus file
    pub fn load(&self) -> Result<Corpus, RagError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            RagError::Corpus(format!("Cannot read {}: {}", self.path.display(), e))
        })?;

        let parsed: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            RagError::Corpus(format!("Invalid JSON in {}: {}", self.path.display(), e))
        })?;

        let quotes = normalize_corpus(&parsed)?;
        info!(path = %self.path.display(), count = quotes.len(), "Corpus loaded");
        Ok(Corpus::new(quotes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_corpus(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_array_corpus() {
        let file = write_corpus(r#"[{"id": "1", "text": "Une pensée."}]"#);
        let corpus = CorpusLoader::new(file.path()).load().unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.get("1").unwrap().display_text, "Une pensée.");
    }

    #[test]
    fn test_load_wrapped_corpus() {
        let file = write_corpus(r#"{"quotes": [{"uri": "kg:1", "text": "Autre pensée."}]}"#);
        let corpus = CorpusLoader::new(file.path()).load().unwrap();
        assert_eq!(corpus.len(), 1);
        assert!(corpus.get("kg:1").is_some());
    }

    #[test]
    fn test_missing_file_is_corpus_error() {
        let result = CorpusLoader::new("/nonexistent/citations.json").load();
        assert!(matches!(result, Err(RagError::Corpus(_))));
    }

    #[test]
    fn test_malformed_json_is_corpus_error() {
        let file = write_corpus("{not json");
        let result = CorpusLoader::new(file.path()).load();
        assert!(matches!(result, Err(RagError::Corpus(_))));
    }

    #[test]
    fn test_invalid_record_position_reported() {
        let file = write_corpus(r#"[{"id": "1", "text": "ok"}, "pas un objet"]"#);
        let result = CorpusLoader::new(file.path()).load();
        assert!(matches!(
            result,
            Err(RagError::InvalidRecord { position: 1, .. })
        ));
    }
}
