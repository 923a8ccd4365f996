//! Semantic quote retrieval
//!
//! Features:
//! - Schema-tolerant corpus normalization (three quote dialects)
//! - Enriched-text construction for embedding
//! - Dense vector search over an in-memory index
//! - Optional cross-encoder reranking
//! - Exclusion-aware candidate budgeting

pub mod corpus;
pub mod embeddings;
pub mod enrichment;
pub mod index;
pub mod loader;
pub mod reranker;
pub mod retriever;
pub mod schema;

pub use corpus::Corpus;
pub use embeddings::{Embedder, EmbeddingConfig, HashingEmbedder};
pub use enrichment::{build_enriched_text, build_enriched_text_with};
pub use index::{DistanceMetric, IndexHit, VectorIndex, VectorIndexConfig};
pub use loader::CorpusLoader;
pub use reranker::{CrossEncoderReranker, LexicalScorer, RerankResult, RerankerConfig};
pub use retriever::{Retriever, RetrieverConfig, ScoredResult, SearchQuery};
pub use schema::{normalize_corpus, AttrValue, NormalizedQuote, QuoteSchema};

use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid corpus record at position {position}: {reason}")]
    InvalidRecord { position: usize, reason: String },

    #[error("Query is empty")]
    EmptyQuery,

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Index error: {0}")]
    Index(String),
}
