//! Cognitive sectors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five cognitive categories a memory may belong to.
/// Drives embedding weights, decay rate, and query routing. New variants may
/// be added in a minor release, so callers must not exhaustively match
/// without a wildcard arm.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Episodic,
    Semantic,
    Procedural,
    Emotional,
    Reflective,
}

impl Sector {
    /// All sectors, in the classifier's tie-break enumeration order.
    pub const ALL: [Sector; 5] = [
        Sector::Episodic,
        Sector::Semantic,
        Sector::Procedural,
        Sector::Emotional,
        Sector::Reflective,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Sector::Episodic => "episodic",
            Sector::Semantic => "semantic",
            Sector::Procedural => "procedural",
            Sector::Emotional => "emotional",
            Sector::Reflective => "reflective",
        }
    }

    pub fn parse_name(s: &str) -> Option<Sector> {
        match s.to_ascii_lowercase().as_str() {
            "episodic" => Some(Sector::Episodic),
            "semantic" => Some(Sector::Semantic),
            "procedural" => Some(Sector::Procedural),
            "emotional" => Some(Sector::Emotional),
            "reflective" => Some(Sector::Reflective),
            _ => None,
        }
    }

    /// Baseline decay lambda seeded per sector ; episodic memories fade fastest, semantic
    /// and procedural hold longest.
    pub fn default_decay_lambda(self) -> f64 {
        match self {
            Sector::Episodic => 0.02,
            Sector::Semantic => 0.005,
            Sector::Procedural => 0.008,
            Sector::Emotional => 0.015,
            Sector::Reflective => 0.01,
        }
    }

    /// Default multi-vector fusion weight `W_s` used in hybrid scoring.
    pub fn default_fusion_weight(self) -> f64 {
        match self {
            Sector::Episodic => 1.0,
            Sector::Semantic => 1.0,
            Sector::Procedural => 0.9,
            Sector::Emotional => 1.1,
            Sector::Reflective => 0.9,
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sector::parse_name(s).ok_or_else(|| format!("unknown sector: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_variants() {
        for sector in Sector::ALL {
            let parsed = Sector::parse_name(sector.as_str()).unwrap();
            assert_eq!(parsed, sector);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Sector::parse_name("EPISODIC"), Some(Sector::Episodic));
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(Sector::parse_name("bogus"), None);
    }

    #[test]
    fn enumeration_order_breaks_sector_ties() {
        assert_eq!(
            Sector::ALL.map(Sector::as_str),
            ["episodic", "semantic", "procedural", "emotional", "reflective"]
        );
    }
}
