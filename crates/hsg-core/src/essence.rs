//! Essence extraction: the lossy summary actually persisted.

use regex::Regex;
use std::sync::OnceLock;

const MIN_SENTENCE_LEN: usize = 10;

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
            Regex::new(r"(?i)\b(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}(/\d{2,4})?|january|february|march|april|may|june|july|august|september|october|november|december)\b").unwrap()
    })
}

fn amount_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[$€£]\s?\d+(\.\d+)?|\b\d+(\.\d+)?\s?(percent|%)\b").unwrap())
}

fn proper_noun_bigram_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").unwrap())
}

fn action_verb_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b\w+(ing|ed)\b").unwrap())
}

fn interrogative_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(who|what|when|where|why|how)\b").unwrap())
}

fn first_person_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(i|me|my|we|our|us)\b").unwrap())
}

/// Split `text` into sentences on `.!?`, dropping fragments shorter than
/// [`MIN_SENTENCE_LEN`] characters.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
    .map(str::trim)
    .filter(|s| s.len() > MIN_SENTENCE_LEN)
    .collect()
}

/// Score a sentence by domain cues: dates, amounts, proper-noun bigrams,
/// action verbs, interrogatives, short length, first-person pronouns.
pub fn score_sentence(sentence: &str) -> f64 {
    let mut score = 0.0;
    score += 1.5 * date_pattern().find_iter(sentence).count() as f64;
    score += 1.5 * amount_pattern().find_iter(sentence).count() as f64;
    score += 1.2 * proper_noun_bigram_pattern().find_iter(sentence).count() as f64;
    score += 0.5 * action_verb_pattern().find_iter(sentence).count() as f64;
    if interrogative_pattern().is_match(sentence) || sentence.trim_end().ends_with('?') {
        score += 1.0;
    }
    score += 0.8 * first_person_pattern().find_iter(sentence).count() as f64;
    // Short-length bonus: prefer punchy sentences over long run-ons.
    if sentence.len() < 80 {
        score += 0.5;
    }
    score
}

/// Extract the stored essence, bounded by `max_length`. Content that already
/// fits is returned unchanged.
pub fn extract_essence(content: &str, max_length: usize) -> String {
    if content.len() <= max_length {
        return content.to_string();
    }

    let sentences = split_sentences(content);
    let mut ranked: Vec<(usize, f64)> = sentences
    .iter()
    .enumerate()
    .map(|(i, s)| (i, score_sentence(s)))
    .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    // Select by index, not by sentence text: two sentences can share
    // identical text (e.g. a repeated phrase), and indices are the only way
    // to tell "this exact occurrence was chosen" from "some occurrence with
    // the same text was chosen".
    let mut selected: std::collections::BTreeSet<usize> = std::collections::BTreeSet::new();
    let mut used = 0usize;
    for (idx, _) in &ranked {
        let added = sentences[*idx].len() + 2;
        if used + added > max_length {
            continue;
        }
        selected.insert(*idx);
        used += added;
    }

    if selected.is_empty() {
        return content.chars().take(max_length).collect();
    }

    // `selected` is a BTreeSet, so iterating it already yields ascending
    // indices, preserving original sentence order for readability.
    let ordered: Vec<&str> = selected.iter().map(|&i| sentences[i]).collect();
    ordered.join(". ") + "."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_under_budget_is_unchanged() {
        let content = "short content.";
        assert_eq!(extract_essence(content, 500), content);
    }

    #[test]
    fn oversized_content_is_bounded() {
        let content = "This is sentence number one about nothing much. ".repeat(50);
        let essence = extract_essence(&content, 100);
        assert!(essence.len() <= 130); // small slack for joining punctuation
    }

    #[test]
    fn falls_back_to_hard_truncation_when_nothing_fits() {
        let content = "x".repeat(1000);
        let essence = extract_essence(&content, 20);
        assert_eq!(essence.len(), 20);
    }

    #[test]
    fn dates_and_first_person_boost_score() {
        let with_cues = score_sentence("Yesterday I met Alice at 10:00 on 2026-01-01");
        let plain = score_sentence("the cat sat on the windowsill quietly for a while");
        assert!(with_cues > plain);
    }
}
