// ============================================================
// Layer 5 — Shared Step
// ============================================================
// One forward pass over a batch, identical for training and
// validation:
//
//   batch ──► model ──► loss [N] ──► mean ──► backward (train only)
//                   └─► per-example records (host side)
//
// Classifier (BertForNli)
//   prob = softmax(logits), hans_train rows folded to
//   [e, n + c, ε], loss = focal(log prob, one-hot label).
//   hans_validation rows are collapsed to [e, n + c] before the
//   prediction is read.
//
// Generative (T5ForNli)
//   loss = focal(logits, target tokens), averaged over the
//   target positions of each example. A prediction is the label
//   whose target sequence equals the argmax token sequence, or
//   -1 when none matches. Probability vectors are not defined
//   and are reported as [-1, -1, -1]. HANS is rejected.

use anyhow::{anyhow, Result};
use burn::{prelude::*, tensor::activation::softmax};

use crate::data::batcher::NliBatch;
use crate::data::dataset::NliSample;
use crate::domain::{
    dataset::DatasetId, error::ConfigError, label::NUM_NLI_CLASSES, record::BatchRecords,
};
use crate::ml::{
    focal::FocalLoss,
    generative::T5ForNli,
    harmonize::{argmax, collapse_to_two_way, fold_hans_train},
    model::BertForNli,
};

/// Everything a step needs besides the model and the batch.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub focal:         FocalLoss,
    /// Padded target token sequence per label id
    pub label_targets: Vec<Vec<u32>>,
}

pub struct StepOutput<B: Backend> {
    /// Scalar mean loss, still attached to the graph
    pub loss:    Tensor<B, 1>,
    pub records: BatchRecords,
}

/// A model that can run the shared NLI step.
pub trait NliModel<B: Backend> {
    fn step(&self, batch: &NliBatch<B>, ctx: &StepContext) -> Result<StepOutput<B>>;
}

impl<B: Backend> NliModel<B> for BertForNli<B> {
    fn step(&self, batch: &NliBatch<B>, ctx: &StepContext) -> Result<StepOutput<B>> {
        let logits = self.forward(
            batch.input_ids.clone(),
            batch.token_type_ids.clone(),
            batch.attention_mask.clone(),
        );
        let prob = fold_hans_train(softmax(logits, 1), batch.hans_train_mask.clone());
        let loss = ctx.focal.forward_target(prob.clone().log(), batch.labels_onehot.clone());

        let losses = floats(loss.clone().detach())?;
        let probs  = floats(prob.detach())?;
        let probs: Vec<Vec<f32>> = probs.chunks(NUM_NLI_CLASSES).map(<[f32]>::to_vec).collect();

        Ok(StepOutput {
            loss:    loss.mean(),
            records: classifier_records(&batch.items, losses, probs),
        })
    }
}

impl<B: Backend> NliModel<B> for T5ForNli<B> {
    fn step(&self, batch: &NliBatch<B>, ctx: &StepContext) -> Result<StepOutput<B>> {
        if let Some(dataset) = batch.items.iter().filter_map(NliSample::dataset_id).find(|d| d.is_hans()) {
            return Err(ConfigError::UnsupportedDataset { model: "t5", dataset }.into());
        }

        let logits = self.forward(
            batch.input_ids.clone(),
            batch.attention_mask.clone(),
            batch.target_ids.clone(),
        );
        let [n, target_len, vocab] = logits.dims();

        let loss = ctx
            .focal
            .forward_index(logits.clone().reshape([n * target_len, vocab]), batch.target_ids.clone().reshape([n * target_len]))
            .reshape([n, target_len])
            .mean_dim(1)
            .reshape([n]);

        let logits    = logits.detach();
        let predicted = ints(logits.clone().argmax(2).reshape([n, target_len]))?;
        let gathered  = floats(
            softmax(logits, 2)
                .gather(2, batch.target_ids.clone().reshape([n, target_len, 1]))
                .reshape([n, target_len]),
        )?;
        let losses = floats(loss.clone().detach())?;

        let predicted: Vec<Vec<u32>> = predicted
            .chunks(target_len)
            .map(|row| row.iter().map(|&t| t as u32).collect())
            .collect();
        let token_probs: Vec<Vec<f32>> = gathered.chunks(target_len).map(<[f32]>::to_vec).collect();

        Ok(StepOutput {
            loss:    loss.mean(),
            records: generative_records(&batch.items, losses, &predicted, &token_probs, &ctx.label_targets),
        })
    }
}

/// Per-example records from three-way probabilities.
pub fn classifier_records(items: &[NliSample], losses: Vec<f32>, probs: Vec<Vec<f32>>) -> BatchRecords {
    let mut records = BatchRecords::default();
    for ((item, loss), prob) in items.iter().zip(losses).zip(probs) {
        let prob = if item.dataset == DatasetId::HansValidation.code() {
            collapse_to_two_way(&prob)
        } else {
            prob
        };
        let pred      = argmax(&prob) as i64;
        let true_prob = usize::try_from(item.label).ok().and_then(|l| prob.get(l)).copied().unwrap_or(0.0);

        push_meta(&mut records, item);
        records.loss.push(loss);
        records.pred.push(pred);
        records.true_pred.push(if pred == item.label { 1.0 } else { 0.0 });
        records.prob.push(prob);
        records.true_prob.push(true_prob);
    }
    records
}

/// Per-example records from generated token sequences.
pub fn generative_records(
    items:         &[NliSample],
    losses:        Vec<f32>,
    predicted:     &[Vec<u32>],
    token_probs:   &[Vec<f32>],
    label_targets: &[Vec<u32>],
) -> BatchRecords {
    let mut records = BatchRecords::default();
    for (((item, loss), tokens), probs) in items.iter().zip(losses).zip(predicted).zip(token_probs) {
        let pred = label_targets
            .iter()
            .position(|target| target == tokens)
            .map_or(-1, |p| p as i64);
        let correct = *tokens == item.target_ids;

        push_meta(&mut records, item);
        records.loss.push(loss);
        records.pred.push(pred);
        records.true_pred.push(if correct { 1.0 } else { 0.0 });
        records.prob.push(vec![-1.0; NUM_NLI_CLASSES]);
        records.true_prob.push(probs.iter().product());
    }
    records
}

fn push_meta(records: &mut BatchRecords, item: &NliSample) {
    records.idx.push(item.idx);
    records.dataset.push(item.dataset);
    records.label.push(item.label);
    records.handcrafted_type.push(item.handcrafted_type);
    records.heuristic.push(item.heuristic);
}

pub(crate) fn floats<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))
}

pub(crate) fn ints<B: Backend, const D: usize>(t: Tensor<B, D, Int>) -> Result<Vec<i64>> {
    t.into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::NliBatcher;
    use crate::ml::model::NliModelConfig;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;

    type TB = NdArray;

    fn sample(dataset: DatasetId, label: i64, target: Vec<u32>) -> NliSample {
        NliSample {
            input_ids:        vec![101, 5, 102, 6, 102, 0, 0, 0],
            attention_mask:   vec![1, 1, 1, 1, 1, 0, 0, 0],
            token_type_ids:   vec![0, 0, 0, 1, 1, 0, 0, 0],
            target_ids:       target,
            idx:              label,
            dataset:          dataset.code(),
            label,
            handcrafted_type: 0,
            heuristic:        if dataset.is_hans() { 1 } else { -1 },
        }
    }

    fn ctx() -> StepContext {
        StepContext {
            focal:         FocalLoss::new(0.0),
            label_targets: vec![vec![7, 1, 0, 0, 0], vec![8, 1, 0, 0, 0], vec![9, 1, 0, 0, 0]],
        }
    }

    #[test]
    fn test_classifier_records_collapse_hans_validation() {
        let items = vec![
            sample(DatasetId::MnliValidationMatched, 2, vec![0; 5]),
            sample(DatasetId::HansValidation, 1, vec![0; 5]),
        ];
        let probs = vec![vec![0.2, 0.3, 0.5], vec![0.4, 0.35, 0.25]];
        let r = classifier_records(&items, vec![0.7, 0.9], probs);

        assert_eq!(r.pred, vec![2, 1]);
        assert_eq!(r.true_pred, vec![1.0, 1.0]);
        assert_eq!(r.prob[1].len(), 2);
        assert!((r.true_prob[1] - 0.6).abs() < 1e-6);
        assert_eq!(r.check_lengths(), Ok(2));
    }

    #[test]
    fn test_generative_records_decode_by_sequence() {
        let targets = ctx().label_targets;
        let items = vec![
            sample(DatasetId::SnliValidation, 1, targets[1].clone()),
            sample(DatasetId::SnliValidation, 0, targets[0].clone()),
        ];
        let predicted = vec![targets[1].clone(), vec![9, 9, 0, 0, 0]];
        let token_probs = vec![vec![0.5, 0.5, 1.0, 1.0, 1.0], vec![0.1, 0.2, 0.3, 0.4, 0.5]];

        let r = generative_records(&items, vec![0.1, 2.0], &predicted, &token_probs, &targets);

        assert_eq!(r.pred, vec![1, -1]);
        assert_eq!(r.true_pred, vec![1.0, 0.0]);
        assert_eq!(r.prob[0], vec![-1.0, -1.0, -1.0]);
        assert!((r.true_prob[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_classifier_step_accuracy_matches_predictions() {
        let device  = Default::default();
        let model   = NliModelConfig::new(120, 8).with_d_model(16).with_num_heads(2).with_num_layers(1).with_d_ff(32)
            .init_classifier::<TB>(&device);
        let batch   = NliBatcher::<TB>::new(device).batch(vec![
            sample(DatasetId::MnliTrain, 0, vec![0; 5]),
            sample(DatasetId::HansTrain, 1, vec![0; 5]),
            sample(DatasetId::HansValidation, 0, vec![0; 5]),
        ]);

        let out = model.step(&batch, &ctx()).unwrap();
        let r   = out.records;
        assert_eq!(r.check_lengths(), Ok(3));

        let from_preds = r.pred.iter().zip(&r.label).filter(|(p, l)| p == l).count() as f64 / 3.0;
        assert!((r.accuracy() - from_preds).abs() < 1e-12);
        assert!(floats(out.loss).unwrap()[0].is_finite());
    }

    #[test]
    fn test_generative_step_rejects_hans() {
        let device = Default::default();
        let model  = NliModelConfig::new(120, 8).with_d_model(16).with_num_heads(2).with_num_layers(1)
            .with_num_decoder_layers(1).with_d_ff(32)
            .init_generative::<TB>(0, &device);
        let batch  = NliBatcher::<TB>::new(device).batch(vec![
            sample(DatasetId::HansValidation, 0, vec![7, 1, 0, 0, 0]),
        ]);

        let err = model.step(&batch, &ctx()).err().unwrap();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_generative_step_records() {
        let device = Default::default();
        let model  = NliModelConfig::new(120, 8).with_d_model(16).with_num_heads(2).with_num_layers(1)
            .with_num_decoder_layers(1).with_d_ff(32)
            .init_generative::<TB>(0, &device);
        let batch  = NliBatcher::<TB>::new(device).batch(vec![
            sample(DatasetId::MnliTrain, 0, vec![7, 1, 0, 0, 0]),
            sample(DatasetId::MnliTrain, 2, vec![9, 1, 0, 0, 0]),
        ]);

        let out = model.step(&batch, &ctx()).unwrap();
        assert_eq!(out.records.check_lengths(), Ok(2));
        assert!(out.records.true_prob.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert!(out.records.pred.iter().all(|&p| (-1..3).contains(&p)));
    }
}
