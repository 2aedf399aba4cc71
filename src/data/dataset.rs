use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::dataset::DatasetId;

/// One encoded and padded example plus the metadata the
/// epoch-end breakdowns need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NliSample {
    pub input_ids:        Vec<u32>,
    pub attention_mask:   Vec<u32>,
    pub token_type_ids:   Vec<u32>,
    /// Generation target, always `LABEL_PAD_LENGTH` long
    pub target_ids:       Vec<u32>,
    pub idx:              i64,
    pub dataset:          i64,
    pub label:            i64,
    pub handcrafted_type: i64,
    pub heuristic:        i64,
}

impl NliSample {
    pub fn dataset_id(&self) -> Option<DatasetId> {
        DatasetId::from_code(self.dataset)
    }
}

pub struct NliDataset {
    samples: Vec<NliSample>,
}

impl NliDataset {
    pub fn new(samples: Vec<NliSample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }
}

impl Dataset<NliSample> for NliDataset {
    fn get(&self, index: usize) -> Option<NliSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
