//! Per-sector regex pattern tables.
//! Patterns are compiled once behind a [`OnceLock`] rather than re-compiled
//! on every classification call.

use crate::model::Sector;
use regex::Regex;
use std::sync::OnceLock;

/// One pattern and the weight it contributes per match.
pub struct SectorPattern {
    pub regex: Regex,
    pub weight: f64,
}

fn compile(pairs: &[(&str, f64)]) -> Vec<SectorPattern> {
    pairs
    .iter()
    .map(|(pat, weight)| SectorPattern {
            regex: Regex::new(&format!("(?i){pat}")).expect("static classifier pattern must compile"),
            weight: *weight,
    })
    .collect()
}

pub fn patterns_for(sector: Sector) -> &'static [SectorPattern] {
    static EPISODIC: OnceLock<Vec<SectorPattern>> = OnceLock::new();
    static SEMANTIC: OnceLock<Vec<SectorPattern>> = OnceLock::new();
    static PROCEDURAL: OnceLock<Vec<SectorPattern>> = OnceLock::new();
    static EMOTIONAL: OnceLock<Vec<SectorPattern>> = OnceLock::new();
    static REFLECTIVE: OnceLock<Vec<SectorPattern>> = OnceLock::new();

    match sector {
        Sector::Episodic => EPISODIC.get_or_init(|| {
                compile(&[
                        (r"\byesterday\b", 1.2),
                        (r"\btoday\b", 1.0),
                        (r"\btomorrow\b", 1.0),
                        (r"\blast (week|night|month|year)\b", 1.2),
                        (r"\b(at|around) \d{1,2}(:\d{2})?\s?(am|pm)?\b", 1.0),
                        (r"\bi (saw|met|went|visited|attended)\b", 1.3),
                        (r"\bremember when\b", 1.1),
                ])
        }),
        Sector::Semantic => SEMANTIC.get_or_init(|| {
                compile(&[
                        (r"\bis (a|an|the)\b", 0.8),
                        (r"\bdefin(e|ition|ed)\b", 1.1),
                        (r"\bmeans?\b", 0.7),
                        (r"\brefers to\b", 1.0),
                        (r"\bconsists of\b", 0.9),
                        (r"\b(the|a)\s+\w+\s+is\s+the\s+\w+\s+of\b", 1.2),
                ])
        }),
        Sector::Procedural => PROCEDURAL.get_or_init(|| {
                compile(&[
                        (r"\bstep\s*\d+\b", 1.4),
                        (r"\bfirst,?\s.*then\b", 1.0),
                        (r"\bhow to\b", 1.1),
                        (r"\binstall\b", 0.9),
                        (r"\bconfigure\b", 0.9),
                        (r"\brun\b", 0.6),
                        (r"\bprocedure\b", 1.0),
                ])
        }),
        Sector::Emotional => EMOTIONAL.get_or_init(|| {
                compile(&[
                        (r"\bi feel\b", 1.3),
                        (r"\b(happy|sad|angry|anxious|excited|afraid|proud|grateful)\b", 1.2),
                        (r"\blove\b", 1.0),
                        (r"\bhate\b", 1.0),
                        (r"\b(frustrat|overwhelm)(ed|ing)\b", 1.1),
                ])
        }),
        Sector::Reflective => REFLECTIVE.get_or_init(|| {
                compile(&[
                        (r"\bi (think|believe|wonder|realize|learned)\b", 1.2),
                        (r"\bin hindsight\b", 1.3),
                        (r"\blooking back\b", 1.2),
                        (r"\bnext time\b", 1.0),
                        (r"\blesson\b", 1.0),
                        (r"\bwhy did\b", 0.9),
                ])
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_sectors_have_at_least_one_pattern() {
        for sector in Sector::ALL {
            assert!(!patterns_for(sector).is_empty());
        }
    }

    #[test]
    fn procedural_patterns_match_numbered_steps() {
        let text = "Step 1: install. Step 2: configure. Step 3: run.";
        let count: usize = patterns_for(Sector::Procedural)
        .iter()
        .map(|p| p.regex.find_iter(text).count())
        .sum();
        assert!(count >= 3);
    }
}
