//! Text normalization for rubric-overlap scoring
//!
//! Lower-cases, strips punctuation, folds domain synonyms (units and chemical
//! names) onto one canonical token and removes stop words. The overlap score
//! is the number of distinct quote tokens that also appear in the criterion
//! text.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Multi-word phrases folded before tokenizing, longest first
static PHRASE_SYNONYMS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    let mut phrases = vec![
        ("sodium hydroxide", "naoh"),
        ("hydrochloric acid", "hcl"),
        ("sulfuric acid", "h2so4"),
        ("sulphuric acid", "h2so4"),
        ("nitric acid", "hno3"),
        ("acetic acid", "ch3cooh"),
        ("ethanoic acid", "ch3cooh"),
        ("sodium chloride", "nacl"),
        ("calcium carbonate", "caco3"),
        ("potassium permanganate", "kmno4"),
        ("carbon dioxide", "co2"),
        ("degrees celsius", "celsius"),
        ("degrees centigrade", "celsius"),
        ("cubic centimetres", "ml"),
        ("cubic centimeters", "ml"),
        ("cubic centimetre", "ml"),
        ("cubic centimeter", "ml"),
        ("moles per litre", "molar"),
        ("moles per liter", "molar"),
        ("mol per litre", "molar"),
        ("mol per liter", "molar"),
        ("per cent", "percent"),
        ("end point", "endpoint"),
    ];
    phrases.sort_by_key(|(phrase, _)| std::cmp::Reverse(phrase.len()));
    phrases
});

/// Single-token equivalences
static TOKEN_SYNONYMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Volume
        ("cm3", "ml"),
        ("millilitre", "ml"),
        ("millilitres", "ml"),
        ("milliliter", "ml"),
        ("milliliters", "ml"),
        ("mls", "ml"),
        ("litre", "l"),
        ("litres", "l"),
        ("liter", "l"),
        ("liters", "l"),
        ("dm3", "l"),
        // Amount and concentration
        ("mole", "mol"),
        ("moles", "mol"),
        ("mols", "mol"),
        ("m", "molar"),
        ("moldm3", "molar"),
        ("concentrations", "concentration"),
        // Mass
        ("gram", "g"),
        ("grams", "g"),
        ("grammes", "g"),
        // Temperature
        ("celcius", "celsius"),
        ("centigrade", "celsius"),
        ("c", "celsius"),
        // Spelling variants
        ("sulphuric", "sulfuric"),
        ("colour", "color"),
        ("colours", "color"),
        ("colors", "color"),
        ("neutralise", "neutralize"),
        ("neutralised", "neutralize"),
        ("neutralized", "neutralize"),
        ("neutralisation", "neutralize"),
        ("neutralization", "neutralize"),
        ("titrate", "titration"),
        ("titrated", "titration"),
        ("titrating", "titration"),
        ("titrations", "titration"),
        ("indicators", "indicator"),
        ("burette", "buret"),
        ("burettes", "buret"),
        ("pipette", "pipet"),
        ("pipettes", "pipet"),
        ("endpoints", "endpoint"),
    ])
});

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be",
        "because", "been", "before", "but", "by", "can", "could", "did", "do", "does", "for",
        "from", "had", "has", "have", "he", "her", "his", "how", "i", "if", "in", "into", "is",
        "it", "its", "just", "like", "me", "more", "my", "no", "not", "of", "on", "or", "our",
        "she", "so", "some", "than", "that", "the", "their", "them", "then", "there", "these",
        "they", "this", "those", "to", "too", "um", "uh", "up", "us", "was", "we", "were",
        "what", "when", "which", "while", "who", "will", "with", "would", "yeah", "you", "your",
    ])
});

/// Lower-case, strip punctuation, collapse whitespace and fold phrases
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut padded = format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "));
    for (phrase, canonical) in PHRASE_SYNONYMS.iter() {
        let needle = format!(" {} ", phrase);
        let replacement = format!(" {} ", canonical);
        while padded.contains(&needle) {
            padded = padded.replace(&needle, &replacement);
        }
    }

    padded.trim().to_string()
}

/// Normalized, synonym-folded tokens with stop words removed
pub fn tokens(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|token| !STOP_WORDS.contains(token))
        .map(|token| {
            TOKEN_SYNONYMS
                .get(token)
                .copied()
                .unwrap_or(token)
                .to_string()
        })
        .collect()
}

pub fn token_set(text: &str) -> HashSet<String> {
    tokens(text).into_iter().collect()
}

/// Distinct quote tokens present in `target`
pub fn overlap_score(quote_tokens: &HashSet<String>, target: &HashSet<String>) -> usize {
    quote_tokens.intersection(target).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  The End-Point, REACHED!  "), "the endpoint reached");
    }

    #[test]
    fn test_tokens_remove_stop_words() {
        assert_eq!(tokens("we added the indicator to the flask"), vec!["added", "indicator", "flask"]);
    }

    #[test]
    fn test_chemical_names_fold_to_formula() {
        assert_eq!(tokens("Sodium Hydroxide"), vec!["naoh"]);
        assert_eq!(tokens("NaOH"), vec!["naoh"]);
        assert_eq!(tokens("sulphuric acid"), tokens("H2SO4"));
    }

    #[test]
    fn test_units_fold() {
        assert_eq!(tokens("25 cm3"), tokens("25 millilitres"));
        assert_eq!(tokens("25 cubic centimetres"), vec!["25", "ml"]);
        assert_eq!(tokens("0.1 moles per litre"), vec!["0", "1", "molar"]);
    }

    #[test]
    fn test_overlap_counts_distinct_tokens() {
        let quote = token_set("titrate titrate with the burette");
        let target = token_set("Performs a titration using a burette");
        assert_eq!(overlap_score(&quote, &target), 2);
    }

    #[test]
    fn test_empty_text() {
        assert!(tokens("").is_empty());
        assert!(tokens("?!").is_empty());
    }
}
