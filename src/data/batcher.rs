// ============================================================
// Layer 4 — NLI Batcher
// ============================================================
// Implements Burn's Batcher trait to stack NliSamples into
// device tensors.
//
//   Input:  Vec of N NliSamples, each padded to length S
//   Output: NliBatch with
//             input_ids / attention_mask / token_type_ids  [N, S]
//             labels                                       [N]
//             labels_onehot                                [N, 3]
//             target_ids                                   [N, 5]
//             hans_train_mask                              [N]
//
// The samples themselves ride along on the CPU side: the step
// reads idx / dataset / handcrafted_type / heuristic from them
// when it builds the per-example records, and the first batch
// of each loader is dumped from them for debugging.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::NliSample;
use crate::domain::{dataset::DatasetId, label::NUM_NLI_CLASSES};

#[derive(Debug, Clone)]
pub struct NliBatch<B: Backend> {
    pub input_ids:       Tensor<B, 2, Int>,
    pub attention_mask:  Tensor<B, 2, Int>,
    pub token_type_ids:  Tensor<B, 2, Int>,
    pub labels:          Tensor<B, 1, Int>,
    /// One-hot gold labels over the three NLI classes
    pub labels_onehot:   Tensor<B, 2>,
    pub target_ids:      Tensor<B, 2, Int>,
    /// 1.0 for rows from hans_train, 0.0 otherwise
    pub hans_train_mask: Tensor<B, 1>,
    pub items:           Vec<NliSample>,
}

impl<B: Backend> NliBatch<B> {
    /// Dataset of the first example, which names the batch.
    pub fn dataset(&self) -> Option<DatasetId> {
        self.items.first().and_then(NliSample::dataset_id)
    }
}

#[derive(Clone, Debug)]
pub struct NliBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> NliBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn int_matrix(&self, rows: usize, cols: usize, values: Vec<i32>) -> Tensor<B, 2, Int> {
        Tensor::<B, 1, Int>::from_ints(values.as_slice(), &self.device).reshape([rows, cols])
    }
}

impl<B: Backend> Batcher<NliSample, NliBatch<B>> for NliBatcher<B> {
    fn batch(&self, items: Vec<NliSample>) -> NliBatch<B> {
        let batch_size = items.len();
        let seq_len    = items[0].input_ids.len();
        let target_len = items[0].target_ids.len();

        let flatten = |f: fn(&NliSample) -> &Vec<u32>| -> Vec<i32> {
            items.iter().flat_map(|s| f(s).iter().map(|&x| x as i32)).collect()
        };

        let input_ids      = self.int_matrix(batch_size, seq_len, flatten(|s| &s.input_ids));
        let attention_mask = self.int_matrix(batch_size, seq_len, flatten(|s| &s.attention_mask));
        let token_type_ids = self.int_matrix(batch_size, seq_len, flatten(|s| &s.token_type_ids));
        let target_ids     = self.int_matrix(batch_size, target_len, flatten(|s| &s.target_ids));

        let labels: Vec<i32> = items.iter().map(|s| s.label as i32).collect();
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        // One-hot built on the host: labels are always < 3
        let mut onehot = vec![0f32; batch_size * NUM_NLI_CLASSES];
        for (row, s) in items.iter().enumerate() {
            onehot[row * NUM_NLI_CLASSES + s.label as usize] = 1.0;
        }
        let labels_onehot = Tensor::<B, 1>::from_floats(onehot.as_slice(), &self.device)
            .reshape([batch_size, NUM_NLI_CLASSES]);

        let hans_train: Vec<f32> = items
            .iter()
            .map(|s| if s.dataset == DatasetId::HansTrain.code() { 1.0 } else { 0.0 })
            .collect();
        let hans_train_mask = Tensor::<B, 1>::from_floats(hans_train.as_slice(), &self.device);

        NliBatch {
            input_ids,
            attention_mask,
            token_type_ids,
            labels,
            labels_onehot,
            target_ids,
            hans_train_mask,
            items,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn sample(label: i64, dataset: DatasetId) -> NliSample {
        NliSample {
            input_ids:        vec![101, 7, 102, 0],
            attention_mask:   vec![1, 1, 1, 0],
            token_type_ids:   vec![0, 0, 0, 0],
            target_ids:       vec![5, 1, 0, 0, 0],
            idx:              0,
            dataset:          dataset.code(),
            label,
            handcrafted_type: 0,
            heuristic:        -1,
        }
    }

    #[test]
    fn test_shapes_and_onehot() {
        let batcher = NliBatcher::<NdArray>::new(Default::default());
        let batch   = batcher.batch(vec![
            sample(2, DatasetId::MnliTrain),
            sample(1, DatasetId::HansTrain),
        ]);

        assert_eq!(batch.input_ids.dims(), [2, 4]);
        assert_eq!(batch.target_ids.dims(), [2, 5]);
        assert_eq!(batch.dataset(), Some(DatasetId::MnliTrain));

        let onehot: Vec<f32> = batch.labels_onehot.into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(onehot, vec![0.0, 0.0, 1.0, 0.0, 1.0, 0.0]);

        let mask: Vec<f32> = batch.hans_train_mask.into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(mask, vec![0.0, 1.0]);
    }
}
