//! Canonical tokenization and token-overlap scoring: a cheap,
//! allocation-light tokenizer feeding the canonical-token pipeline the
//! classifier, simhash, and scoring all share.

pub mod simhash;

use std::collections::{HashSet, HashMap};
use std::sync::OnceLock;

/// Small stopword set dropped during canonicalization.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "of", "to", "in", "on", "at", "for", "with", "is",
    "are", "was", "were", "be", "been", "being", "it", "this", "that", "these", "those", "as",
    "by", "from", "into", "than", "then", "so", "such", "not", "no", "do", "does", "did",
];

/// A small synonym table used to optionally widen canonical tokens. Keys
/// and values are already-canonical tokens.
fn synonyms() -> &'static HashMap<&'static str, &'static [&'static str]> {
    static TABLE: OnceLock<HashMap<&'static str, &'static [&'static str]>> = OnceLock::new();
    TABLE.get_or_init(|| {
            HashMap::from([
                    ("buy", ["purchase"].as_slice()),
                    ("purchase", ["buy"].as_slice()),
                    ("sad", ["unhappy"].as_slice()),
                    ("unhappy", ["sad"].as_slice()),
                    ("happy", ["glad"].as_slice()),
                    ("glad", ["happy"].as_slice()),
            ])
    })
}

/// Lowercase, extract `[a-z0-9]+` runs, drop stopwords. Does not add
/// synonyms — see [`canonical_tokens_with_synonyms`] for that.
pub fn canonical_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            current.push(lower);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens.retain(|t| !STOPWORDS.contains(&t.as_str()));
    tokens
}

/// Canonical tokens with synonym expansion applied (each matching token
/// contributes its synonyms alongside itself).
pub fn canonical_tokens_with_synonyms(text: &str) -> Vec<String> {
    let base = canonical_tokens(text);
    let table = synonyms();
    let mut out = base.clone();
    for tok in &base {
        if let Some(extra) = table.get(tok.as_str()) {
            out.extend(extra.iter().map(|s| s.to_string()));
        }
    }
    out
}

/// Token overlap `|Q ∩ M| / |Q|` ; 0 if `query_tokens` is empty.
pub fn token_overlap(query_tokens: &[String], memory_tokens: &[String]) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let memory_set: HashSet<&str> = memory_tokens.iter().map(String::as_str).collect();
    let query_set: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();
    let intersection = query_set.iter().filter(|t| memory_set.contains(*t)).count();
    intersection as f64 / query_set.len() as f64
}
