// ============================================================
// Layer 3 — Handcrafted Types
// ============================================================
// A coarse category describing how the hypothesis relates to
// the premise on the surface. MNLI/SNLI accuracy is broken down
// per category at the end of every epoch, which shows whether a
// model does suspiciously well exactly where the words overlap.
//
// Categories (checked in this order when computed from text):
//   SUBSEQUENCE      hypothesis words are a contiguous run of
//                    premise words
//   LEXICAL_OVERLAP  every hypothesis word occurs in the premise
//   REGULAR          anything else
//
// CONSTITUENT needs a parse tree, so it is only ever taken from
// the input record.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandcraftedType {
    Regular,
    LexicalOverlap,
    Subsequence,
    Constituent,
}

impl HandcraftedType {
    pub const ALL: [HandcraftedType; 4] = [
        HandcraftedType::Regular,
        HandcraftedType::LexicalOverlap,
        HandcraftedType::Subsequence,
        HandcraftedType::Constituent,
    ];

    pub fn code(self) -> i64 {
        match self {
            HandcraftedType::Regular        => 0,
            HandcraftedType::LexicalOverlap => 1,
            HandcraftedType::Subsequence    => 2,
            HandcraftedType::Constituent    => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    /// Upper-case enum-style name, e.g. `LEXICAL_OVERLAP`.
    pub fn name(self) -> &'static str {
        match self {
            HandcraftedType::Regular        => "REGULAR",
            HandcraftedType::LexicalOverlap => "LEXICAL_OVERLAP",
            HandcraftedType::Subsequence    => "SUBSEQUENCE",
            HandcraftedType::Constituent    => "CONSTITUENT",
        }
    }

    /// Lower-case form used inside metric names.
    pub fn metric_name(self) -> String {
        self.name().to_lowercase()
    }

    /// Title-case form used in the per-example tables, e.g. `Lexical_Overlap`.
    pub fn title_name(self) -> String {
        title_case(self.name())
    }

    /// Categorise a premise/hypothesis pair from its words alone.
    pub fn classify(premise: &str, hypothesis: &str) -> Self {
        let p = words(premise);
        let h = words(hypothesis);
        if h.is_empty() {
            return HandcraftedType::Regular;
        }

        if h.len() <= p.len() && p.windows(h.len()).any(|w| w == h.as_slice()) {
            return HandcraftedType::Subsequence;
        }

        let vocab: HashSet<&str> = p.iter().map(String::as_str).collect();
        if h.iter().all(|w| vocab.contains(w.as_str())) {
            return HandcraftedType::LexicalOverlap;
        }

        HandcraftedType::Regular
    }
}

/// Title-case like Python's `str.title()`: a letter is upper-cased
/// when it follows a non-letter, everything else is lower-cased.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

/// Render a stored handcrafted code for tables; unknown codes fall back to the number.
pub fn handcrafted_code_title(code: i64) -> String {
    HandcraftedType::from_code(code)
        .map(HandcraftedType::title_name)
        .unwrap_or_else(|| code.to_string())
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsequence_detected_first() {
        let t = HandcraftedType::classify(
            "The doctor near the actor danced.",
            "The actor danced.",
        );
        assert_eq!(t, HandcraftedType::Subsequence);
    }

    #[test]
    fn test_lexical_overlap() {
        let t = HandcraftedType::classify(
            "The lawyer saw the doctor.",
            "The doctor saw the lawyer.",
        );
        assert_eq!(t, HandcraftedType::LexicalOverlap);
    }

    #[test]
    fn test_regular() {
        let t = HandcraftedType::classify("A man plays guitar.", "Nobody is playing music.");
        assert_eq!(t, HandcraftedType::Regular);
    }

    #[test]
    fn test_title_case_matches_python() {
        assert_eq!(title_case("LEXICAL_OVERLAP"), "Lexical_Overlap");
        assert_eq!(HandcraftedType::Regular.title_name(), "Regular");
        assert_eq!(HandcraftedType::Constituent.metric_name(), "constituent");
    }
}
