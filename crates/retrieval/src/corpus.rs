//! Loaded corpus bookkeeping
//!
//! The corpus keeps every normalized quote in memory for the process
//! lifetime so results can be mapped back to their display text and
//! public attributes. It is never re-scanned per query; lookups go
//! through the id map.

use std::collections::HashMap;

use crate::schema::NormalizedQuote;

/// The full set of quotes loaded for this process lifetime
#[derive(Debug, Default)]
pub struct Corpus {
    quotes: Vec<NormalizedQuote>,
    by_id: HashMap<String, usize>,
}

impl Corpus {
    /// Build from an ordered, already-normalized quote list.
    ///
    /// Normalization guarantees unique ids, so the id map is total.
    pub fn new(quotes: Vec<NormalizedQuote>) -> Self {
        let by_id = quotes
            .iter()
            .enumerate()
            .map(|(idx, quote)| (quote.id.clone(), idx))
            .collect();

        Self { quotes, by_id }
    }

    /// Number of loaded quotes, including empty-bodied ones
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Look up a quote by id
    pub fn get(&self, id: &str) -> Option<&NormalizedQuote> {
        self.by_id.get(id).map(|&idx| &self.quotes[idx])
    }

    /// Iterate quotes in load order
    pub fn iter(&self) -> impl Iterator<Item = &NormalizedQuote> {
        self.quotes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::normalize_corpus;
    use serde_json::json;

    #[test]
    fn test_lookup_by_id() {
        let data = json!([
            {"id": "a", "text": "premier"},
            {"id": "b", "text": "second"}
        ]);
        let corpus = Corpus::new(normalize_corpus(&data).unwrap());

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get("b").unwrap().display_text, "second");
        assert!(corpus.get("c").is_none());
    }
}
