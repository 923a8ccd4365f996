//! Cross-encoder reranking
//!
//! Second-stage scoring of retrieved candidates against the raw query. The
//! real model is an ONNX cross-encoder behind the `onnx` feature; without
//! it, a lexical scorer gives deterministic relevance scores so the rerank
//! path is exercised in tests. Rerank scores replace the vector-stage
//! scores outright rather than being blended with them.

#[cfg(feature = "onnx")]
use ndarray::Array2;
#[cfg(feature = "onnx")]
use ort::{session::builder::GraphOptimizationLevel, session::Session, value::Tensor};
#[cfg(feature = "onnx")]
use tokenizers::Tokenizer;

use std::collections::HashSet;
use std::path::Path;

use quote_rag_config::constants::embedding;

use crate::RagError;

/// Reranker configuration
#[derive(Debug, Clone)]
pub struct RerankerConfig {
    /// Maximum tokenized length of a query/document pair
    pub max_seq_len: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            max_seq_len: embedding::DEFAULT_MAX_SEQ_LEN,
        }
    }
}

/// One reranked candidate
#[derive(Debug, Clone)]
pub struct RerankResult {
    pub id: String,
    /// Relevance in [0, 1], higher is better
    pub score: f32,
}

/// Cross-encoder scoring query/document pairs jointly
pub struct CrossEncoderReranker {
    #[cfg(feature = "onnx")]
    session: Session,
    #[cfg(feature = "onnx")]
    tokenizer: Tokenizer,
    #[cfg(not(feature = "onnx"))]
    fallback: LexicalScorer,
    #[cfg(feature = "onnx")]
    config: RerankerConfig,
}

impl CrossEncoderReranker {
    /// Create a reranker from an ONNX cross-encoder and its tokenizer
    #[cfg(feature = "onnx")]
    pub fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        config: RerankerConfig,
    ) -> Result<Self, RagError> {
        let session = Session::builder()
            .map_err(|e| RagError::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| RagError::Model(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| RagError::Model(e.to_string()))?;

        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| RagError::Model(e.to_string()))?;

        Ok(Self {
            session,
            tokenizer,
            config,
        })
    }

    /// Create a reranker (lexical fallback when ONNX is disabled)
    #[cfg(not(feature = "onnx"))]
    pub fn new(
        _model_path: impl AsRef<Path>,
        _tokenizer_path: impl AsRef<Path>,
        _config: RerankerConfig,
    ) -> Result<Self, RagError> {
        Ok(Self {
            fallback: LexicalScorer::new(),
        })
    }

    /// Score each `(id, document)` candidate against the query and return
    /// them sorted by descending relevance.
    pub fn rerank(
        &self,
        query: &str,
        candidates: &[(String, String)],
    ) -> Result<Vec<RerankResult>, RagError> {
        let mut results = Vec::with_capacity(candidates.len());
        for (id, document) in candidates {
            results.push(RerankResult {
                id: id.clone(),
                score: self.score_pair(query, document)?,
            });
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }

    #[cfg(feature = "onnx")]
    fn score_pair(&self, query: &str, document: &str) -> Result<f32, RagError> {
        let encoding = self
            .tokenizer
            .encode((query, document), true)
            .map_err(|e| RagError::Model(e.to_string()))?;

        let seq_len = encoding.get_ids().len().min(self.config.max_seq_len);
        let mut input_ids = vec![0i64; seq_len];
        let mut attention_mask = vec![0i64; seq_len];
        let mut token_type_ids = vec![0i64; seq_len];
        for j in 0..seq_len {
            input_ids[j] = encoding.get_ids()[j] as i64;
            attention_mask[j] = encoding.get_attention_mask()[j] as i64;
            token_type_ids[j] = encoding.get_type_ids()[j] as i64;
        }

        let to_tensor = |data: Vec<i64>| {
            Array2::from_shape_vec((1, seq_len), data)
                .map_err(|e| RagError::Model(e.to_string()))
                .and_then(|a| Tensor::from_array(a).map_err(|e| RagError::Model(e.to_string())))
        };

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => to_tensor(input_ids)?,
                "attention_mask" => to_tensor(attention_mask)?,
                "token_type_ids" => to_tensor(token_type_ids)?,
            ])
            .map_err(|e| RagError::Model(e.to_string()))?;

        let (_, logits) = outputs
            .get("logits")
            .ok_or_else(|| RagError::Model("Missing logits output".to_string()))?
            .try_extract_tensor::<f32>()
            .map_err(|e| RagError::Model(e.to_string()))?;

        let logit = logits
            .first()
            .copied()
            .ok_or_else(|| RagError::Model("Empty logits output".to_string()))?;

        // Sigmoid maps the raw logit into [0, 1]
        Ok(1.0 / (1.0 + (-logit).exp()))
    }

    #[cfg(not(feature = "onnx"))]
    fn score_pair(&self, query: &str, document: &str) -> Result<f32, RagError> {
        Ok(self.fallback.score(query, document))
    }
}

/// French function words carrying no retrieval signal
const STOPWORDS: &[&str] = &[
    "a", "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "et", "il",
    "ils", "je", "la", "le", "les", "leur", "lui", "ma", "mais", "me", "même", "mes", "moi",
    "mon", "ne", "nos", "notre", "nous", "on", "ou", "où", "par", "pas", "pour", "qu", "que",
    "qui", "sa", "se", "ses", "son", "sur", "ta", "te", "tes", "toi", "ton", "tu", "un", "une",
    "vos", "votre", "vous",
];

/// Content-word overlap scorer (no model required)
///
/// Scores a pair by the fraction of the query's content words present in
/// the document, stopwords stripped on both sides. Unlike the token-hash
/// embedder this ignores function words entirely, so it genuinely reorders
/// candidates rather than reproducing the vector ranking.
pub struct LexicalScorer {
    stopwords: HashSet<&'static str>,
}

impl Default for LexicalScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalScorer {
    pub fn new() -> Self {
        Self {
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    pub fn score(&self, query: &str, document: &str) -> f32 {
        let query_tokens = self.content_tokens(query);
        if query_tokens.is_empty() {
            return 0.0;
        }
        let doc_tokens: HashSet<String> = self.content_tokens(document).into_iter().collect();

        let matched = query_tokens
            .iter()
            .filter(|t| doc_tokens.contains(*t))
            .count();
        matched as f32 / query_tokens.len() as f32
    }

    fn content_tokens(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty() && !self.stopwords.contains(t))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_score_in_unit_range() {
        let scorer = LexicalScorer::new();
        let score = scorer.score("le courage face à la peur", "La peur se surmonte.");
        assert!((0.0..=1.0).contains(&score));
        assert!(score > 0.0);
    }

    #[test]
    fn test_stopwords_carry_no_signal() {
        let scorer = LexicalScorer::new();
        // Shares only function words with the query
        let noise = scorer.score("le courage de vivre", "la dans et les pour");
        assert_eq!(noise, 0.0);
    }

    #[test]
    fn test_full_match_scores_one() {
        let scorer = LexicalScorer::new();
        let score = scorer.score("courage peur", "Le courage naît de la peur.");
        assert!((score - 1.0).abs() < 0.001);
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_rerank_sorted_descending() {
        let reranker =
            CrossEncoderReranker::new("unused", "unused", RerankerConfig::default()).unwrap();
        let candidates = vec![
            ("weak".to_string(), "Une pensée sans rapport.".to_string()),
            ("strong".to_string(), "Le courage face à la peur.".to_string()),
            ("partial".to_string(), "La peur paralyse.".to_string()),
        ];

        let results = reranker.rerank("courage peur", &candidates).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["strong", "partial", "weak"]);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}
