//! Corpus schema normalization
//!
//! The corpus file comes in one of three dialects (the hand-curated CSV
//! export, the GPT-enriched dataset, and the QuoteKG SPARQL extract), each
//! with its own field naming. A declarative field table per dialect maps
//! every raw record onto the same [`NormalizedQuote`] shape so the rest of
//! the pipeline never sees raw keys.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::RagError;

/// Scalar attribute value
///
/// Attributes are flattened to scalars: no nesting, no nulls. Missing text
/// fields normalize to `""`, missing flags to `false`, missing numeric
/// energy to `-1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttrValue {
    /// Text content, if this is a non-empty text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// True only for `Bool(true)`
    pub fn is_set(&self) -> bool {
        matches!(self, AttrValue::Bool(true))
    }

    /// True when the value carries information: non-empty text, a
    /// non-sentinel integer, any float, or a set flag
    pub fn has_content(&self) -> bool {
        match self {
            AttrValue::Text(s) => !s.is_empty(),
            AttrValue::Int(n) => *n >= 0,
            AttrValue::Float(_) => true,
            AttrValue::Bool(b) => *b,
        }
    }

    /// Render for enrichment fragments; empty string when unset
    pub fn render(&self) -> String {
        match self {
            AttrValue::Text(s) => s.clone(),
            AttrValue::Int(n) => n.to_string(),
            AttrValue::Float(f) => format!("{}", f),
            AttrValue::Bool(b) => b.to_string(),
        }
    }
}

/// A quote record after normalization, immutable once built
#[derive(Debug, Clone)]
pub struct NormalizedQuote {
    /// Unique within the loaded corpus
    pub id: String,
    /// Quote body as authored; returned to callers verbatim
    pub display_text: String,
    /// Flattened side fields, keyed by logical name
    pub attributes: BTreeMap<String, AttrValue>,
    /// Dialect this record was normalized from
    pub schema: QuoteSchema,
}

impl NormalizedQuote {
    /// Attribute lookup returning `None` for missing or empty text
    pub fn attr_text(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttrValue::as_text)
    }

    /// True when a boolean attribute is present and set
    pub fn attr_flag(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(AttrValue::is_set)
    }
}

/// Corpus dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSchema {
    /// `{id, text, author, category}` — the cleaned CSV export
    Classic,
    /// GPT-enriched dataset with tags, context and tone/mood/need labels,
    /// using French key aliases (`citation`, `auteur`, `contexte`)
    Gpt,
    /// QuoteKG SPARQL extract with emotion metadata, keyed by `uri`
    QuoteKg,
}

/// How a raw field coerces into an [`AttrValue`]
#[derive(Debug, Clone, Copy)]
enum FieldKind {
    /// String; numbers are stringified; missing becomes `""`
    Text,
    /// Boolean flag; missing becomes `false`
    Flag,
    /// Integer with `-1` sentinel for missing/unparseable
    IntSentinel,
    /// Float kept as a number when present, `""` otherwise
    FloatOrEmpty,
    /// List of strings joined with `", "`; a bare string passes through
    TagList,
}

/// One logical field: output name, raw key fallback chain, coercion
struct FieldSpec {
    name: &'static str,
    keys: &'static [&'static str],
    kind: FieldKind,
}

const fn field(
    name: &'static str,
    keys: &'static [&'static str],
    kind: FieldKind,
) -> FieldSpec {
    FieldSpec { name, keys, kind }
}

const CLASSIC_FIELDS: &[FieldSpec] = &[
    field("author", &["author", "auteur"], FieldKind::Text),
    field("category", &["category"], FieldKind::Text),
];

const GPT_FIELDS: &[FieldSpec] = &[
    field("author", &["author", "auteur"], FieldKind::Text),
    field("category", &["category"], FieldKind::Text),
    field("tags", &["tags"], FieldKind::TagList),
    field("context", &["context", "contexte"], FieldKind::Text),
    field("need", &["need"], FieldKind::Text),
    field("mood", &["mood"], FieldKind::Text),
    field("tone", &["tone"], FieldKind::Text),
    field("length", &["length"], FieldKind::Text),
    field("language", &["language"], FieldKind::Text),
    field("year", &["year", "annee"], FieldKind::Text),
    field("energy", &["energy"], FieldKind::IntSentinel),
    field("is_injunctive", &["is_injunctive"], FieldKind::Flag),
    field("is_guilt_inducing", &["is_guilt_inducing"], FieldKind::Flag),
    field("is_toxic_positive", &["is_toxic_positive"], FieldKind::Flag),
];

const QUOTEKG_FIELDS: &[FieldSpec] = &[
    field("author", &["author"], FieldKind::Text),
    field("year", &["year", "date"], FieldKind::Text),
    field("emotion_category", &["emotion_category"], FieldKind::Text),
    field(
        "emotion_intensity",
        &["emotion_intensity"],
        FieldKind::FloatOrEmpty,
    ),
    field("context", &["context", "contexte"], FieldKind::Text),
    field("source", &["source"], FieldKind::Text),
    field("is_misattributed", &["is_misattributed"], FieldKind::Flag),
];

/// Raw keys the quote body may live under, tried in order
const BODY_KEYS: &[&str] = &["text", "citation"];

/// Raw keys a source-provided id may live under, tried in order
const ID_KEYS: &[&str] = &["id", "uri"];

impl QuoteSchema {
    /// Field table for this dialect
    fn fields(self) -> &'static [FieldSpec] {
        match self {
            QuoteSchema::Classic => CLASSIC_FIELDS,
            QuoteSchema::Gpt => GPT_FIELDS,
            QuoteSchema::QuoteKg => QUOTEKG_FIELDS,
        }
    }

    /// Detect the dialect of a raw record from its keys
    pub fn detect(record: &Map<String, Value>) -> Self {
        if record.contains_key("uri")
            || record.contains_key("emotion_category")
            || record.contains_key("is_misattributed")
        {
            QuoteSchema::QuoteKg
        } else if record.contains_key("citation")
            || record.contains_key("auteur")
            || record.contains_key("tags")
            || record.contains_key("need")
            || record.contains_key("mood")
        {
            QuoteSchema::Gpt
        } else {
            QuoteSchema::Classic
        }
    }
}

/// Unwrap the record array from the top-level JSON document.
///
/// Accepts either a bare array or an object wrapping it under `quotes`
/// (QuoteKG export) or `citations`.
fn record_array(data: &Value) -> Result<&[Value], RagError> {
    match data {
        Value::Array(records) => Ok(records),
        Value::Object(map) => match map.get("quotes").or_else(|| map.get("citations")) {
            Some(Value::Array(records)) => Ok(records),
            _ => Err(RagError::Corpus(
                "Expected a top-level array or an object with a \"quotes\" array".to_string(),
            )),
        },
        other => Err(RagError::Corpus(format!(
            "Unexpected corpus JSON type: {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Normalize a raw corpus document into an ordered quote list.
///
/// Single left-to-right pass; id assignment is deterministic so repeated
/// loads of the same file produce identical ids. Duplicate base ids get a
/// `__dupN` suffix, the first occurrence keeps the bare id.
pub fn normalize_corpus(data: &Value) -> Result<Vec<NormalizedQuote>, RagError> {
    let records = record_array(data)?;

    let schema = records
        .iter()
        .find_map(Value::as_object)
        .map(QuoteSchema::detect)
        .unwrap_or(QuoteSchema::Classic);

    let mut quotes = Vec::with_capacity(records.len());
    let mut seen_ids: HashMap<String, usize> = HashMap::new();

    for (idx, record) in records.iter().enumerate() {
        let map = record.as_object().ok_or_else(|| RagError::InvalidRecord {
            position: idx,
            reason: format!("expected an object, got {}", type_name(record)),
        })?;

        let base_id = first_string(map, ID_KEYS).unwrap_or_else(|| format!("quote_{}", idx));

        let dup_index = seen_ids.entry(base_id.clone()).or_insert(0);
        let id = if *dup_index == 0 {
            base_id.clone()
        } else {
            format!("{}__dup{}", base_id, dup_index)
        };
        *dup_index += 1;

        let display_text = first_string(map, BODY_KEYS).unwrap_or_default();

        let mut attributes = BTreeMap::new();
        for spec in schema.fields() {
            attributes.insert(spec.name.to_string(), extract(map, spec));
        }

        quotes.push(NormalizedQuote {
            id,
            display_text,
            attributes,
            schema,
        });
    }

    Ok(quotes)
}

/// First non-empty trimmed string under any of `keys`
fn first_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn extract(map: &Map<String, Value>, spec: &FieldSpec) -> AttrValue {
    let raw = spec.keys.iter().find_map(|key| map.get(*key));

    match spec.kind {
        FieldKind::Text => AttrValue::Text(match raw {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }),
        FieldKind::Flag => AttrValue::Bool(matches!(raw, Some(Value::Bool(true)))),
        FieldKind::IntSentinel => AttrValue::Int(match raw {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(-1),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(-1),
            _ => -1,
        }),
        FieldKind::FloatOrEmpty => match raw {
            Some(Value::Number(n)) => n
                .as_f64()
                .map(AttrValue::Float)
                .unwrap_or(AttrValue::Text(String::new())),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(AttrValue::Float)
                .unwrap_or_else(|_| AttrValue::Text(s.trim().to_string())),
            _ => AttrValue::Text(String::new()),
        },
        FieldKind::TagList => AttrValue::Text(match raw {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            Some(Value::String(s)) => s.trim().to_string(),
            _ => String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classic_record() {
        let data = json!([
            {"id": "12", "text": "La vie est belle.", "author": "Anonyme", "category": "Vie"}
        ]);

        let quotes = normalize_corpus(&data).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].schema, QuoteSchema::Classic);
        assert_eq!(quotes[0].id, "12");
        assert_eq!(quotes[0].display_text, "La vie est belle.");
        assert_eq!(quotes[0].attr_text("author"), Some("Anonyme"));
        assert_eq!(quotes[0].attr_text("category"), Some("Vie"));
    }

    #[test]
    fn test_gpt_record_aliases() {
        let data = json!([
            {
                "citation": "Deviens qui tu es.",
                "auteur": "Nietzsche",
                "tags": ["identité", "authenticité"],
                "contexte": "Invitation à se réaliser pleinement.",
                "mood": "inspiré",
                "energy": 3,
                "is_injunctive": true
            }
        ]);

        let quotes = normalize_corpus(&data).unwrap();
        let q = &quotes[0];
        assert_eq!(q.schema, QuoteSchema::Gpt);
        assert_eq!(q.display_text, "Deviens qui tu es.");
        assert_eq!(q.attr_text("author"), Some("Nietzsche"));
        assert_eq!(q.attr_text("tags"), Some("identité, authenticité"));
        assert_eq!(q.attributes["energy"], AttrValue::Int(3));
        assert!(q.attr_flag("is_injunctive"));
        assert!(!q.attr_flag("is_guilt_inducing"));
    }

    #[test]
    fn test_quotekg_wrapper_and_uri_id() {
        let data = json!({
            "metadata": {"source": "QuoteKG"},
            "quotes": [
                {
                    "uri": "http://quotekg/q/42",
                    "text": "Le doute est le commencement de la sagesse.",
                    "author": "Aristote",
                    "emotion_category": "neutral",
                    "emotion_intensity": 0.4,
                    "context": null
                }
            ]
        });

        let quotes = normalize_corpus(&data).unwrap();
        let q = &quotes[0];
        assert_eq!(q.schema, QuoteSchema::QuoteKg);
        assert_eq!(q.id, "http://quotekg/q/42");
        assert_eq!(q.attributes["emotion_intensity"], AttrValue::Float(0.4));
        // null context normalizes to the empty string, not an absent key
        assert_eq!(q.attributes["context"], AttrValue::Text(String::new()));
    }

    #[test]
    fn test_duplicate_ids_get_suffixes() {
        let data = json!([
            {"id": "42", "text": "a"},
            {"id": "42", "text": "b"},
            {"id": "7", "text": "c"},
            {"id": "42", "text": "d"}
        ]);

        let quotes = normalize_corpus(&data).unwrap();
        let ids: Vec<&str> = quotes.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["42", "42__dup1", "7", "42__dup2"]);
    }

    #[test]
    fn test_missing_id_synthesized_from_position() {
        let data = json!([
            {"text": "sans id"},
            {"id": "", "text": "id vide"}
        ]);

        let quotes = normalize_corpus(&data).unwrap();
        assert_eq!(quotes[0].id, "quote_0");
        assert_eq!(quotes[1].id, "quote_1");
    }

    #[test]
    fn test_non_object_record_rejected() {
        let data = json!([{"text": "ok"}, "pas un objet"]);

        let err = normalize_corpus(&data).unwrap_err();
        match err {
            RagError::InvalidRecord { position, .. } => assert_eq!(position, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unexpected_top_level_rejected() {
        assert!(normalize_corpus(&json!(42)).is_err());
        assert!(normalize_corpus(&json!({"metadata": {}})).is_err());
    }

    #[test]
    fn test_empty_body_retained() {
        let data = json!([{"id": "1", "text": "   "}]);
        let quotes = normalize_corpus(&data).unwrap();
        assert_eq!(quotes[0].display_text, "");
    }

    #[test]
    fn test_energy_sentinel() {
        let data = json!([
            {"citation": "x", "energy": null},
            {"citation": "y", "energy": "pas un nombre"}
        ]);
        let quotes = normalize_corpus(&data).unwrap();
        assert_eq!(quotes[0].attributes["energy"], AttrValue::Int(-1));
        assert_eq!(quotes[1].attributes["energy"], AttrValue::Int(-1));
    }
}
