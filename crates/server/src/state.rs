//! Application State
//!
//! Shared state across all handlers. Everything is immutable after
//! startup; handlers only ever read through the Arcs.

use std::sync::Arc;

use quote_rag_config::Settings;
use quote_rag_retrieval::{Corpus, Retriever};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub corpus: Arc<Corpus>,
    pub retriever: Arc<Retriever>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, corpus: Arc<Corpus>, retriever: Arc<Retriever>) -> Self {
        Self {
            settings,
            corpus,
            retriever,
        }
    }
}
