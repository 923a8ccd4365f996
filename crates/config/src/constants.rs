//! Centralized constants
//!
//! Single source of truth for tuning values shared between the settings
//! defaults and the retrieval crate.

/// Retrieval pipeline constants
pub mod retrieval {
    /// Final result count when the request does not specify `top_k`
    pub const DEFAULT_TOP_K: usize = 5;

    /// Candidate pool width for pure vector retrieval.
    /// Exclusion filtering happens after the index query, so the effective
    /// over-fetch is this width plus the number of excluded ids.
    pub const VECTOR_RETRIEVAL_WIDTH: usize = 10;

    /// Candidate pool width when cross-encoder reranking is enabled.
    /// A broader pool gives the reranker more to work with.
    pub const RERANK_RETRIEVAL_WIDTH: usize = 30;

    /// Decimal places kept on scores in API responses
    pub const SCORE_DECIMALS: u32 = 4;
}

/// Enrichment constants
pub mod enrichment {
    /// Maximum characters of the context field kept in enriched text.
    /// Longer contexts are cut here and marked with an ellipsis so one
    /// field cannot swamp the quote body's own semantic signal.
    pub const MAX_CONTEXT_CHARS: usize = 600;

    /// Placeholder author used for anonymous web submissions; carries no
    /// semantic signal and is skipped during enrichment.
    pub const ANONYMOUS_AUTHOR: &str = "internaute";
}

/// Embedding constants
pub mod embedding {
    /// Embedding dimension (paraphrase-multilingual-mpnet-base-v2)
    pub const DEFAULT_DIM: usize = 768;

    /// Maximum tokenized sequence length
    pub const DEFAULT_MAX_SEQ_LEN: usize = 512;

    /// Batch size for bulk corpus embedding
    pub const DEFAULT_BATCH_SIZE: usize = 32;
}
