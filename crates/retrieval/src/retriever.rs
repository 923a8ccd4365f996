//! Retrieval orchestration
//!
//! Owns the full query path: embed the query, over-fetch from the vector
//! index to absorb exclusions, filter, turn distances into similarity
//! scores, optionally rerank, and truncate to the requested count. The
//! index is built once at startup from the corpus's enriched texts.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use quote_rag_config::constants::{enrichment, retrieval};
use quote_rag_config::ScoreTransform;
use tracing::{debug, info};

use crate::corpus::Corpus;
use crate::embeddings::Embedder;
use crate::enrichment::build_enriched_text_with;
use crate::index::{DistanceMetric, VectorIndex, VectorIndexConfig};
use crate::reranker::CrossEncoderReranker;
use crate::schema::{AttrValue, NormalizedQuote};
use crate::RagError;

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Result count when the query does not ask for one
    pub default_top_k: usize,
    /// Candidates fetched from the index without reranking
    pub vector_width: usize,
    /// Candidates fetched from the index when reranking follows
    pub rerank_width: usize,
    pub reranking_enabled: bool,
    pub score_transform: ScoreTransform,
    /// Context character cap applied when building enriched texts
    pub max_context_chars: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            default_top_k: retrieval::DEFAULT_TOP_K,
            vector_width: retrieval::VECTOR_RETRIEVAL_WIDTH,
            rerank_width: retrieval::RERANK_RETRIEVAL_WIDTH,
            reranking_enabled: false,
            score_transform: ScoreTransform::default(),
            max_context_chars: enrichment::MAX_CONTEXT_CHARS,
        }
    }
}

/// A parsed search request
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    /// Requested result count; falls back to the configured default
    pub top_k: Option<usize>,
    /// Quote ids to leave out of the results
    pub exclude_ids: Vec<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: None,
            exclude_ids: Vec::new(),
        }
    }
}

/// Attribute keys exposed to callers; everything else stays internal
const PUBLIC_METADATA_KEYS: &[&str] = &[
    "author",
    "category",
    "tags",
    "mood",
    "need",
    "tone",
    "year",
    "language",
    "emotion_category",
    "emotion_intensity",
];

/// One search result, ready for serialization. Author and the other
/// public attributes travel inside `metadata`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoredResult {
    pub id: String,
    pub text: String,
    /// Similarity in (0, 1], rounded for presentation
    pub score: f32,
    pub metadata: BTreeMap<String, AttrValue>,
}

/// Query-path orchestrator, immutable after construction
pub struct Retriever {
    corpus: Arc<Corpus>,
    embedder: Embedder,
    reranker: Option<CrossEncoderReranker>,
    index: VectorIndex,
    config: RetrieverConfig,
}

impl Retriever {
    /// Embed and index the corpus.
    ///
    /// Quotes with an empty body stay in the corpus (they count toward
    /// `citations_count`) but are never indexed, so they cannot surface
    /// as results.
    pub fn new(
        corpus: Arc<Corpus>,
        embedder: Embedder,
        reranker: Option<CrossEncoderReranker>,
        config: RetrieverConfig,
    ) -> Result<Self, RagError> {
        let mut ids = Vec::new();
        let mut texts = Vec::new();
        for quote in corpus.iter() {
            if quote.display_text.is_empty() {
                debug!(id = %quote.id, "Skipping empty-bodied quote at indexing");
                continue;
            }
            ids.push(quote.id.clone());
            texts.push(build_enriched_text_with(quote, config.max_context_chars));
        }

        // Each transform assumes the distance metric it was defined for
        let metric = match config.score_transform {
            ScoreTransform::Reciprocal => DistanceMetric::SquaredL2,
            ScoreTransform::Complement => DistanceMetric::Cosine,
        };
        let mut index = VectorIndex::new(VectorIndexConfig {
            dim: embedder.dim(),
            metric,
        });
        let embeddings = embedder.embed_batch(&texts)?;
        for (id, embedding) in ids.into_iter().zip(embeddings) {
            index.add(id, embedding)?;
        }

        info!(
            indexed = index.len(),
            total = corpus.len(),
            reranking = reranker.is_some() && config.reranking_enabled,
            "Corpus indexed"
        );

        Ok(Self {
            corpus,
            embedder,
            reranker,
            index,
            config,
        })
    }

    /// Run one search end to end
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<ScoredResult>, RagError> {
        if query.text.trim().is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let top_k = query.top_k.unwrap_or(self.config.default_top_k);
        if top_k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let use_reranker = self.config.reranking_enabled && self.reranker.is_some();
        let width = if use_reranker {
            self.config.rerank_width
        } else {
            self.config.vector_width
        };
        // Over-fetch by the exclusion count so filtering cannot starve the
        // result set, capped at what the index actually holds. The width is
        // a fixed budget: a top_k above it is still served at most width
        // results.
        let fetch = (width + query.exclude_ids.len()).min(self.index.len());

        let query_embedding = self.embedder.embed(&query.text)?;
        let hits = self.index.search(&query_embedding, fetch)?;

        let excluded: HashSet<&str> = query.exclude_ids.iter().map(String::as_str).collect();
        let mut scored: Vec<(String, f32)> = hits
            .into_iter()
            .filter(|hit| !excluded.contains(hit.id.as_str()))
            .map(|hit| (hit.id, similarity(self.config.score_transform, hit.distance)))
            .collect();

        if use_reranker {
            scored = self.rerank(&query.text, scored)?;
        }

        scored.truncate(top_k);
        Ok(scored
            .into_iter()
            .filter_map(|(id, score)| {
                self.corpus.get(&id).map(|quote| ScoredResult {
                    id,
                    text: quote.display_text.clone(),
                    score: round_score(score),
                    metadata: public_metadata(quote),
                })
            })
            .collect())
    }

    /// Rerank candidates on their enriched text, so the cross-encoder sees
    /// the same signal the index was built from; rerank scores replace the
    /// vector-stage similarities outright.
    fn rerank(
        &self,
        query_text: &str,
        scored: Vec<(String, f32)>,
    ) -> Result<Vec<(String, f32)>, RagError> {
        let Some(reranker) = &self.reranker else {
            return Ok(scored);
        };

        let candidates: Vec<(String, String)> = scored
            .into_iter()
            .filter_map(|(id, _)| {
                self.corpus.get(&id).map(|quote| {
                    let enriched = build_enriched_text_with(quote, self.config.max_context_chars);
                    (id, enriched)
                })
            })
            .collect();

        let reranked = reranker.rerank(query_text, &candidates)?;
        Ok(reranked.into_iter().map(|r| (r.id, r.score)).collect())
    }

    /// Number of indexed quotes
    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }
}

/// Distance to similarity: 1 at distance 0, falling toward 0 as distance
/// grows (exactly 0 for an infinite reciprocal distance)
fn similarity(transform: ScoreTransform, distance: f32) -> f32 {
    match transform {
        ScoreTransform::Reciprocal => 1.0 / (1.0 + distance.max(0.0)),
        ScoreTransform::Complement => (1.0 - distance).max(0.0),
    }
}

fn public_metadata(quote: &NormalizedQuote) -> BTreeMap<String, AttrValue> {
    PUBLIC_METADATA_KEYS
        .iter()
        .filter_map(|&key| {
            quote
                .attributes
                .get(key)
                .filter(|value| value.has_content())
                .map(|value| (key.to_string(), value.clone()))
        })
        .collect()
}

fn round_score(score: f32) -> f32 {
    let factor = 10f32.powi(retrieval::SCORE_DECIMALS as i32);
    (score * factor).round() / factor
}

// Tests construct the deterministic fallback models directly; with the
// `onnx` feature they would need real model files on disk.
#[cfg(all(test, not(feature = "onnx")))]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingConfig;
    use crate::reranker::RerankerConfig;
    use crate::schema::normalize_corpus;
    use serde_json::json;

    fn corpus_from(data: serde_json::Value) -> Arc<Corpus> {
        Arc::new(Corpus::new(normalize_corpus(&data).unwrap()))
    }

    fn retriever(corpus: Arc<Corpus>, config: RetrieverConfig) -> Retriever {
        let embedder = Embedder::new("unused", "unused", EmbeddingConfig::default()).unwrap();
        let reranker = if config.reranking_enabled {
            Some(CrossEncoderReranker::new("unused", "unused", RerankerConfig::default()).unwrap())
        } else {
            None
        };
        Retriever::new(corpus, embedder, reranker, config).unwrap()
    }

    fn sample_corpus() -> Arc<Corpus> {
        corpus_from(json!([
            {
                "id": "1",
                "text": "Le courage grandit en osant.",
                "author": "Sénèque",
                "category": "Peur",
                "tags": ["peur", "dépassement", "soi", "courage"]
            },
            {
                "id": "2",
                "text": "L'amitié double les joies.",
                "author": "Bacon",
                "category": "Amitie",
                "tags": ["amitié", "joie"]
            },
            {
                "id": "3",
                "text": "Le travail éloigne l'ennui.",
                "author": "Voltaire",
                "category": "Travail",
                "tags": ["travail", "ennui"]
            },
            {
                "id": "4",
                "text": "La famille est le premier refuge.",
                "category": "Famille",
                "tags": ["famille", "refuge"]
            }
        ]))
    }

    #[test]
    fn test_empty_query_rejected() {
        let retriever = retriever(sample_corpus(), RetrieverConfig::default());
        let result = retriever.search(&SearchQuery::new("   "));
        assert!(matches!(result, Err(RagError::EmptyQuery)));
    }

    #[test]
    fn test_scores_bounded_and_sorted() {
        let retriever = retriever(sample_corpus(), RetrieverConfig::default());
        let results = retriever
            .search(&SearchQuery::new("le courage face à la peur"))
            .unwrap();

        assert!(!results.is_empty());
        for result in &results {
            assert!(result.score > 0.0 && result.score <= 1.0);
        }
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_top_k_cap() {
        let retriever = retriever(sample_corpus(), RetrieverConfig::default());
        let mut query = SearchQuery::new("une pensée");
        query.top_k = Some(2);
        assert!(retriever.search(&query).unwrap().len() <= 2);
    }

    #[test]
    fn test_excluded_ids_never_returned() {
        let retriever = retriever(sample_corpus(), RetrieverConfig::default());
        let mut query = SearchQuery::new("peur dépassement soi courage");
        query.exclude_ids = vec!["1".to_string()];

        let results = retriever.search(&query).unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.id != "1"));
    }

    #[test]
    fn test_width_caps_results_regardless_of_top_k() {
        let records: Vec<serde_json::Value> = (0..15)
            .map(|i| json!({"id": i.to_string(), "text": format!("pensée numéro {}", i)}))
            .collect();
        let retriever = retriever(corpus_from(json!(records)), RetrieverConfig::default());

        // top_k above the candidate pool width: the fixed budget wins
        let mut query = SearchQuery::new("une pensée");
        query.top_k = Some(12);
        let results = retriever.search(&query).unwrap();
        assert_eq!(results.len(), retrieval::VECTOR_RETRIEVAL_WIDTH);
    }

    #[test]
    fn test_exclusion_does_not_starve_results() {
        let retriever = retriever(sample_corpus(), RetrieverConfig::default());
        let mut query = SearchQuery::new("une pensée");
        query.top_k = Some(3);
        query.exclude_ids = vec!["1".to_string(), "2".to_string()];

        // 4 indexed quotes, 2 excluded: the other 2 must still come back
        let results = retriever.search(&query).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_semantic_match_via_tags() {
        let retriever = retriever(sample_corpus(), RetrieverConfig::default());
        let results = retriever
            .search(&SearchQuery::new("peur et dépassement de soi"))
            .unwrap();

        assert_eq!(results[0].id, "1");
        assert_eq!(results[0].text, "Le courage grandit en osant.");
        assert_eq!(
            results[0].metadata.get("author"),
            Some(&AttrValue::Text("Sénèque".to_string()))
        );
        assert_eq!(
            results[0].metadata.get("category"),
            Some(&AttrValue::Text("Peur".to_string()))
        );
        assert_eq!(
            results[0].metadata.get("tags"),
            Some(&AttrValue::Text("peur, dépassement, soi, courage".to_string()))
        );
    }

    #[test]
    fn test_empty_body_quote_counted_but_never_returned() {
        let corpus = corpus_from(json!([
            {"id": "full", "text": "Une vraie citation.", "tags": ["pensée"]},
            {"id": "hollow", "text": "", "author": "Personne"}
        ]));
        let retriever = retriever(corpus.clone(), RetrieverConfig::default());

        assert_eq!(corpus.len(), 2);
        assert_eq!(retriever.indexed_count(), 1);
        let results = retriever.search(&SearchQuery::new("une citation")).unwrap();
        assert!(results.iter().all(|r| r.id != "hollow"));
    }

    #[test]
    fn test_reranking_reorders_candidates() {
        // "bruit" shares only function words with the query, "cible" shares
        // one content word. The bag-of-words embedder counts function words
        // and ranks "bruit" first; the reranker strips them and flips the
        // order.
        let corpus = corpus_from(json!([
            {"id": "bruit", "text": "le la les de des"},
            {"id": "cible", "text": "courage toujours"}
        ]));
        let query = SearchQuery::new("le la les de courage");

        let plain = retriever(corpus.clone(), RetrieverConfig::default());
        let plain_results = plain.search(&query).unwrap();
        assert_eq!(plain_results[0].id, "bruit");

        let reranking = retriever(
            corpus,
            RetrieverConfig {
                reranking_enabled: true,
                ..RetrieverConfig::default()
            },
        );
        let reranked_results = reranking.search(&query).unwrap();
        assert_eq!(reranked_results[0].id, "cible");
    }

    #[test]
    fn test_complement_transform() {
        let corpus = corpus_from(json!([
            {"id": "1", "text": "pensée unique"}
        ]));
        let retriever = retriever(
            corpus,
            RetrieverConfig {
                score_transform: ScoreTransform::Complement,
                ..RetrieverConfig::default()
            },
        );

        let results = retriever.search(&SearchQuery::new("autre chose")).unwrap();
        for result in &results {
            assert!((0.0..=1.0).contains(&result.score));
        }
    }

    #[test]
    fn test_similarity_transform_edges() {
        assert_eq!(similarity(ScoreTransform::Reciprocal, 0.0), 1.0);
        assert_eq!(similarity(ScoreTransform::Reciprocal, f32::INFINITY), 0.0);
        assert!(
            similarity(ScoreTransform::Reciprocal, 0.5)
                > similarity(ScoreTransform::Reciprocal, 2.0)
        );

        assert_eq!(similarity(ScoreTransform::Complement, 0.0), 1.0);
        // Clamped at zero past the metric's range
        assert_eq!(similarity(ScoreTransform::Complement, 1.5), 0.0);
    }

    #[test]
    fn test_identical_query_scores_one() {
        // No side attributes, so the indexed text is the body itself and
        // querying with it lands at distance zero
        let corpus = corpus_from(json!([
            {"id": "1", "text": "le courage grandit"}
        ]));
        let retriever = retriever(corpus, RetrieverConfig::default());

        let results = retriever
            .search(&SearchQuery::new("le courage grandit"))
            .unwrap();
        assert_eq!(results[0].score, 1.0);
    }

    #[test]
    fn test_top_one_courage_query_with_and_without_exclusion() {
        let corpus = corpus_from(json!([
            {"id": "1", "text": "Le courage naît de la peur et du dépassement de soi."},
            {"id": "2", "text": "L'amour est le seul trésor qui grandit quand on le partage."},
            {"id": "3", "text": "La solitude forge les esprits libres."}
        ]));
        let retriever = retriever(corpus, RetrieverConfig::default());

        let mut query = SearchQuery::new("peur et dépassement de soi");
        query.top_k = Some(1);
        let results = retriever.search(&query).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "1");

        query.exclude_ids = vec!["1".to_string()];
        let results = retriever.search(&query).unwrap();
        assert!(results.iter().all(|r| r.id != "1"));
    }
}
