// ============================================================
// Layer 3 — NLI Example
// ============================================================
// A premise/hypothesis pair with its gold label and the tags
// used for the metric breakdowns. By the time an NliExample
// exists the input record has been validated: the label is a
// valid id for the dataset's label space and the handcrafted
// type is resolved.

use serde::{Deserialize, Serialize};

use crate::domain::dataset::DatasetId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NliExample {
    /// Index of the example within its dataset file
    pub idx: i64,

    pub dataset: DatasetId,

    pub premise: String,

    pub hypothesis: String,

    /// Gold label id in the dataset's own label space
    pub label: i64,

    /// Handcrafted type code (see `HandcraftedType`)
    pub handcrafted_type: i64,

    /// HANS heuristic code, `None` outside HANS
    pub heuristic: Option<i64>,
}

impl NliExample {
    pub fn new(
        idx:        i64,
        dataset:    DatasetId,
        premise:    impl Into<String>,
        hypothesis: impl Into<String>,
        label:      i64,
    ) -> Self {
        let premise    = premise.into();
        let hypothesis = hypothesis.into();
        let handcrafted_type =
            crate::domain::handcrafted::HandcraftedType::classify(&premise, &hypothesis).code();
        Self {
            idx,
            dataset,
            premise,
            hypothesis,
            label,
            handcrafted_type,
            heuristic: None,
        }
    }

    pub fn with_heuristic(mut self, heuristic: i64) -> Self {
        self.heuristic = Some(heuristic);
        self
    }

    pub fn with_handcrafted_type(mut self, code: i64) -> Self {
        self.handcrafted_type = code;
        self
    }
}
