// ============================================================
// Layer 3 — HANS Heuristics
// ============================================================
// Each HANS example targets one syntactic heuristic a model
// might be exploiting. Non-HANS examples carry the sentinel -1.

use serde::{Deserialize, Serialize};

/// Heuristic code stored for examples that have no heuristic.
pub const NO_HEURISTIC: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heuristic {
    LexicalOverlap,
    Subsequence,
    Constituent,
}

impl Heuristic {
    pub const ALL: [Heuristic; 3] = [
        Heuristic::LexicalOverlap,
        Heuristic::Subsequence,
        Heuristic::Constituent,
    ];

    pub fn code(self) -> i64 {
        match self {
            Heuristic::LexicalOverlap => 0,
            Heuristic::Subsequence    => 1,
            Heuristic::Constituent    => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Heuristic::LexicalOverlap => "lexical_overlap",
            Heuristic::Subsequence    => "subsequence",
            Heuristic::Constituent    => "constituent",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|h| h.name() == name.trim())
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|h| h.code() == code)
    }
}

/// Render a stored heuristic code, including the sentinel.
pub fn heuristic_code_name(code: i64) -> &'static str {
    Heuristic::from_code(code).map(Heuristic::name).unwrap_or("none")
}

/// A heuristic as it appears in an input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawHeuristic {
    Code(i64),
    Name(String),
}

impl RawHeuristic {
    pub fn resolve(&self) -> Option<i64> {
        match self {
            RawHeuristic::Code(c) if *c == NO_HEURISTIC => Some(NO_HEURISTIC),
            RawHeuristic::Code(c) => Heuristic::from_code(*c).map(Heuristic::code),
            RawHeuristic::Name(n) => Heuristic::from_name(n).map(Heuristic::code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_renders_as_none() {
        assert_eq!(heuristic_code_name(NO_HEURISTIC), "none");
        assert_eq!(heuristic_code_name(1), "subsequence");
    }

    #[test]
    fn test_raw_heuristic_resolution() {
        assert_eq!(RawHeuristic::Name("constituent".into()).resolve(), Some(2));
        assert_eq!(RawHeuristic::Code(7).resolve(), None);
        assert_eq!(RawHeuristic::Code(-1).resolve(), Some(NO_HEURISTIC));
    }
}
