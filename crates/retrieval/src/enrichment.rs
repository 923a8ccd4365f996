//! Enriched-text construction
//!
//! Builds the string that actually gets embedded for each quote: the body
//! followed by `Label: value` fragments in a fixed priority order, most
//! semantically useful fields first. The enriched text is only ever fed to
//! the embedding model; callers always see the original display text.

use quote_rag_config::constants::enrichment::{ANONYMOUS_AUTHOR, MAX_CONTEXT_CHARS};

use crate::schema::{AttrValue, NormalizedQuote};

/// Descriptive synonyms for the terse category labels of the classic
/// corpus. The raw label alone ("Peur") is too short to be discriminative
/// for retrieval; the expansion gives the embedding model real signal.
/// Unknown categories fall back to the lowercased raw label.
fn category_context(category: &str) -> Option<&'static str> {
    let expanded = match category {
        "Amitie" => "amitié, relations, soutien social",
        "Philosophie" => "réflexion, sagesse, pensée profonde",
        "Amour" => "sentiment amoureux, relation amoureuse, cœur",
        "Revolution" => "changement, transformation sociale",
        "Famille" => "liens familiaux, proches, foyer",
        "Motivation" => "encouragement, inspiration, détermination",
        "Tristesse" => "mélancolie, chagrin, émotion difficile",
        "Bonheur" => "joie, contentement, bien-être",
        "Travail" => "métier, carrière, activité professionnelle",
        "Vie" => "existence, expérience humaine",
        "Peur" => "anxiété, stress, inquiétude, angoisse",
        "Colere" => "frustration, irritation, rage, énervement",
        "Solitude" => "isolement, seul, abandon",
        "Confiance" => "foi, assurance, sécurité",
        "Espoir" => "optimisme, attente positive, avenir",
        "Doute" => "incertitude, hésitation, questionnement",
        "Corps" => "physique, santé, bien-être corporel",
        "Perdre" => "perte, absence, manque",
        "Réussite" => "succès, accomplissement, victoire",
        "Échec" => "défaite, difficulté, revers",
        _ => return None,
    };
    Some(expanded)
}

/// Build the indexing text for a quote with the default context cap
pub fn build_enriched_text(quote: &NormalizedQuote) -> String {
    build_enriched_text_with(quote, MAX_CONTEXT_CHARS)
}

/// Build the indexing text for a quote.
///
/// Pure function of the quote: identical input yields byte-identical
/// output. Fragments are emitted only for non-empty attributes; boolean
/// flags only when true, so absent metadata never dilutes the embedding
/// with boilerplate.
pub fn build_enriched_text_with(quote: &NormalizedQuote, max_context_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !quote.display_text.is_empty() {
        parts.push(quote.display_text.clone());
    }

    if let Some(context) = quote.attr_text("context") {
        parts.push(format!(
            "Contexte: {}",
            truncate_chars(context, max_context_chars)
        ));
    }

    if let Some(tags) = quote.attr_text("tags") {
        parts.push(format!("Tags: {}", tags));
    }

    if let Some(category) = quote.attr_text("category") {
        let theme = category_context(category)
            .map(str::to_string)
            .unwrap_or_else(|| category.to_lowercase());
        parts.push(format!("Thème: {}", theme));
    }

    if let Some(need) = quote.attr_text("need") {
        parts.push(format!("Besoin: {}", need));
    }
    if let Some(mood) = quote.attr_text("mood") {
        parts.push(format!("Humeur: {}", mood));
    }
    if let Some(tone) = quote.attr_text("tone") {
        parts.push(format!("Ton: {}", tone));
    }

    if let Some(emotion) = quote.attr_text("emotion_category") {
        parts.push(format!("Émotion: {}", emotion));
    }
    if let Some(AttrValue::Float(intensity)) = quote.attributes.get("emotion_intensity") {
        parts.push(format!("Intensité émotion: {}", intensity));
    }

    if let Some(AttrValue::Int(energy)) = quote.attributes.get("energy") {
        if *energy >= 0 {
            parts.push(format!("Énergie: {}", energy));
        }
    }

    // Flags contribute only when set: a negative fragment on every quote
    // would add the same tokens everywhere and wash out the signal.
    if quote.attr_flag("is_injunctive") {
        parts.push("Style: injonctif".to_string());
    }
    if quote.attr_flag("is_guilt_inducing") {
        parts.push("Évite: culpabilisant".to_string());
    }
    if quote.attr_flag("is_toxic_positive") {
        parts.push("Évite: positivité toxique".to_string());
    }
    if quote.attr_flag("is_misattributed") {
        parts.push("Attribution incertaine".to_string());
    }

    if let Some(language) = quote.attr_text("language") {
        parts.push(format!("Langue: {}", language));
    }
    if let Some(length) = quote.attr_text("length") {
        parts.push(format!("Longueur: {}", length));
    }
    if let Some(year) = quote.attr_text("year") {
        parts.push(format!("Année: {}", year));
    }

    if let Some(author) = quote.attr_text("author") {
        if author != ANONYMOUS_AUTHOR {
            parts.push(format!("Auteur: {}", author));
        }
    }
    if let Some(source) = quote.attr_text("source") {
        parts.push(format!("Source: {}", source));
    }

    parts.join(" | ")
}

/// Cut at a character boundary and mark the cut with an ellipsis
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}
