//! Sector classification.

mod patterns;

use crate::model::Sector;
use patterns::patterns_for;

/// Result of classifying a piece of text into cognitive sectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub primary: Sector,
    pub additional: Vec<Sector>,
    pub confidence: f64,
}

/// `score(sector) = Σ match_count · sector_weight`.
fn score(text: &str, sector: Sector) -> f64 {
    patterns_for(sector)
    .iter()
    .map(|p| p.regex.find_iter(text).count() as f64 * p.weight)
    .sum()
}

/// Classify `text`, optionally overridden by `meta_sector`.
pub fn classify(text: &str, meta_sector: Option<Sector>) -> Classification {
    if let Some(sector) = meta_sector {
        return Classification {
            primary: sector,
            additional: Vec::new(),
            confidence: 1.0,
        };
    }

    let scores: Vec<(Sector, f64)> = Sector::ALL.iter().map(|&s| (s, score(text, s))).collect();

    // argmax, ties broken by enumeration order (Sector::ALL is already in
    // that order, and this fold only replaces on strictly-greater score).
    let (primary, primary_score) = scores
    .iter()
    .copied()
    .fold((Sector::ALL[0], f64::MIN), |best, cur| {
            if cur.1 > best.1 {
                cur
            } else {
                best
            }
    });

    if primary_score <= 0.0 {
        return Classification {
            primary: Sector::Semantic,
            additional: Vec::new(),
            confidence: 0.2,
        };
    }

    let second_score = scores
    .iter()
    .filter(|(s, _)| *s != primary)
    .map(|(_, sc)| *sc)
    .fold(0.0_f64, f64::max);

    let additional_threshold = (1.0_f64).max(0.3 * primary_score);
    let additional: Vec<Sector> = scores
    .iter()
    .filter(|(s, sc)| *s != primary && *sc > 0.0 && *sc >= additional_threshold)
    .map(|(s, _)| *s)
    .collect();

    let confidence = (primary_score / (primary_score + second_score + 1.0)).clamp(0.0, 1.0);

    Classification {
        primary,
        additional,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_match_falls_back_to_semantic() {
        let c = classify("xk7 qqz 99", None);
        assert_eq!(c.primary, Sector::Semantic);
        assert_eq!(c.confidence, 0.2);
    }

    #[test]
    fn meta_sector_overrides_with_full_confidence() {
        let c = classify("anything at all", Some(Sector::Emotional));
        assert_eq!(c.primary, Sector::Emotional);
        assert_eq!(c.confidence, 1.0);
        assert!(c.additional.is_empty());
    }

    #[test]
    fn s2_procedural_classification_excludes_emotional() {
        let c = classify("Step 1: install. Step 2: configure. Step 3: run.", None);
        assert_eq!(c.primary, Sector::Procedural);
        assert!(!c.additional.contains(&Sector::Emotional));
    }

    #[test]
    fn confidence_is_clipped_to_unit_interval() {
        let c = classify("I feel happy and grateful, I love this, I am so excited", None);
        assert!((0.0..=1.0).contains(&c.confidence));
    }
}
