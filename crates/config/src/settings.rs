//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{embedding, enrichment, retrieval};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Corpus file configuration
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Retrieval and reranking configuration
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    /// ONNX model paths (unused unless built with the `onnx` feature)
    #[serde(default)]
    pub models: ModelPaths,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS origin checking; when false all origins are allowed
    #[serde(default)]
    pub cors_enabled: bool,

    /// Allowed CORS origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    5001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_enabled: false,
            cors_origins: Vec::new(),
        }
    }
}

/// Corpus file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Path to the JSON corpus file
    #[serde(default = "default_corpus_path")]
    pub path: String,
}

fn default_corpus_path() -> String {
    "citations.json".to_string()
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
        }
    }
}

/// How a raw index distance becomes a similarity score.
///
/// The transform must match the index's distance metric: `Reciprocal`
/// assumes squared L2 distances, `Complement` assumes cosine distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTransform {
    /// similarity = 1 / (1 + distance), bounded in (0, 1]
    #[default]
    Reciprocal,
    /// similarity = 1 - distance
    Complement,
}

/// Retrieval and reranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Default number of final results
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Candidate pool width for pure vector retrieval
    #[serde(default = "default_vector_width")]
    pub vector_width: usize,

    /// Candidate pool width when reranking is enabled
    #[serde(default = "default_rerank_width")]
    pub rerank_width: usize,

    /// Enable cross-encoder reranking
    #[serde(default)]
    pub reranking_enabled: bool,

    /// Distance to similarity transform for non-reranked scores
    #[serde(default)]
    pub score_transform: ScoreTransform,

    /// Embedding dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Maximum context characters kept in enriched text
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

fn default_top_k() -> usize {
    retrieval::DEFAULT_TOP_K
}

fn default_vector_width() -> usize {
    retrieval::VECTOR_RETRIEVAL_WIDTH
}

fn default_rerank_width() -> usize {
    retrieval::RERANK_RETRIEVAL_WIDTH
}

fn default_embedding_dim() -> usize {
    embedding::DEFAULT_DIM
}

fn default_max_context_chars() -> usize {
    enrichment::MAX_CONTEXT_CHARS
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            vector_width: default_vector_width(),
            rerank_width: default_rerank_width(),
            reranking_enabled: false,
            score_transform: ScoreTransform::default(),
            embedding_dim: default_embedding_dim(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

/// ONNX model paths
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelPaths {
    /// Sentence embedding model
    #[serde(default)]
    pub embedder: String,
    /// Tokenizer for the embedding model
    #[serde(default)]
    pub embedder_tokenizer: String,
    /// Cross-encoder reranker model
    #[serde(default)]
    pub reranker: String,
    /// Tokenizer for the reranker model
    #[serde(default)]
    pub reranker_tokenizer: String,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.retrieval;

        if r.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if r.vector_width == 0 || r.rerank_width == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.vector_width / retrieval.rerank_width".to_string(),
                message: "Candidate pool widths must be at least 1".to_string(),
            });
        }

        if r.embedding_dim == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.embedding_dim".to_string(),
                message: "Embedding dimension must be positive".to_string(),
            });
        }

        if self.corpus.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "corpus.path".to_string(),
                message: "Corpus path must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority: env vars > config/{env} > config/default > built-in defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("QUOTE_RAG")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
