// ============================================================
// Layer 3 — Labels
// ============================================================
// MNLI / SNLI:  entailment=0, neutral=1, contradiction=2
// HANS:         entailment=0, non-entailment=1
//
// Both spaces share index 0 for entailment, which is what
// lets the classifier compare a HANS gold label against a
// three-way prediction after folding neutral+contradiction.

use serde::{Deserialize, Serialize};

/// Number of classes the classifier head predicts.
pub const NUM_NLI_CLASSES: usize = 3;

/// Label words used as generation targets, indexed by label id.
pub const NLI_LABEL_WORDS: [&str; 3] = ["entailment", "neutral", "contradiction"];

/// HANS label descriptions used in metric names.
pub const HANS_LABEL_NAMES: [&str; 2] = ["entailment", "non_entailment"];

/// Id SNLI uses for examples without annotator agreement.
pub const NO_GOLD_LABEL: i64 = -1;

/// A label as it appears in an input record: either the integer
/// id or the label word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLabel {
    Id(i64),
    Name(String),
}

impl RawLabel {
    /// Resolve to an integer label id in a `num_labels`-way space.
    ///
    /// Words are only accepted in the space they belong to:
    /// neutral / contradiction are three-way, non-entailment is
    /// two-way. Ids are passed through unchecked so the caller can
    /// decide what to do with `NO_GOLD_LABEL` and out-of-range ids.
    pub fn resolve(&self, num_labels: usize) -> Option<i64> {
        let three_way = num_labels == NLI_LABEL_WORDS.len();
        match self {
            RawLabel::Id(id) => Some(*id),
            RawLabel::Name(name) => match name.trim().to_lowercase().as_str() {
                "entailment"                                     => Some(0),
                "neutral" if three_way                           => Some(1),
                "contradiction" if three_way                     => Some(2),
                "non-entailment" | "non_entailment" if !three_way => Some(1),
                _                                                => None,
            },
        }
    }
}
