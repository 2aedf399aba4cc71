// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Drives the shared step through the run lifecycle:
//
//   sanity validation (num_sanity_val_steps batches, discarded)
//   for each epoch:
//       training_step ─► backward ─► two optimizer groups ─► step_log
//       epoch_end("Train")           one aggregation per dataset
//       for each validation loader:
//           validation_step ─► step_log
//           epoch_end("Valid")
//       checkpoint
//
// Key Burn insight:
//   - Training uses Autodiff<Wgpu> for gradients
//   - model.valid() returns the model on the inner backend, so
//     validation loaders are built on the inner backend too
//   - GradientsParams are split by parameter id into a decay and
//     a no-decay group; each group has its own optimizer and both
//     step with the scheduled learning rate
//
// The loop is generic over the backend so tests can run it on
// Autodiff<NdArray>.

use anyhow::{anyhow, Result};
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{NliBatch, NliBatcher},
    dataset::{NliDataset, NliSample},
    encoder::PairEncoder,
};
use crate::domain::{
    dataset::DatasetId,
    model_kind::ModelKind,
    record::BatchRecords,
    traits::{DiscardSink, MetricSink},
};
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::embedding_size};
use crate::ml::{
    aggregate,
    focal::FocalLoss,
    optim::{OptimizerKind, OptimizerSettings},
    params::{NamedParams, ParamGroups},
    schedule::{resolve_warmup, total_training_steps, WarmupSchedule},
    step::{NliModel, StepContext},
};

pub type TrainBackend = Autodiff<Wgpu>;
pub type ValidBackend = Wgpu;

pub type Loader<B> = Arc<dyn DataLoader<NliBatch<B>>>;

/// Final validation scores of a run, `(metric name, value)`.
pub type Scores = Vec<(String, f64)>;

// ─── Entry points ─────────────────────────────────────────────────────────────

/// Fine-tune on `train`, validating on each of `valid` after every epoch.
pub fn run_training(
    cfg:         &TrainConfig,
    encoder:     &PairEncoder,
    train:       NliDataset,
    valid:       Vec<NliDataset>,
    checkpoints: &CheckpointManager,
    sink:        &mut dyn MetricSink,
) -> Result<Scores> {
    let device = WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    TrainBackend::seed(cfg.seed);

    let settings = cfg.optimizer_settings()?;
    let total    = total_training_steps(cfg.epochs, train.sample_count(), cfg.batch_size);
    let warmup   = resolve_warmup(cfg.warmup_steps, cfg.warmup_ratio, total)?;
    let schedule = WarmupSchedule::new(cfg.scheduler()?, settings.learning_rate, warmup, total);
    tracing::info!(
        "{} optimizer, {} schedule: lr={:e}, warmup={warmup} of {total} steps",
        settings.kind, schedule.kind, settings.learning_rate
    );

    let train_loader  = build_loader::<TrainBackend>(train, cfg, Some(cfg.seed), device.clone());
    let valid_loaders: Vec<Loader<ValidBackend>> = valid
        .into_iter()
        .map(|d| build_loader::<ValidBackend>(d, cfg, None, device.clone()))
        .collect();

    let model_cfg   = cfg.model_config(embedding_size(encoder.tokenizer()));
    let mut trainer = NliTrainer::new(step_context(cfg, encoder), encoder.tokenizer())
        .with_sanity_steps(cfg.num_sanity_val_steps)
        .with_log_every(cfg.log_every);
    let run = FitRun { settings, schedule, epochs: cfg.epochs, train: &train_loader, valid: &valid_loaders, checkpoints };

    let scores = match cfg.model {
        ModelKind::Bert => {
            let model = model_cfg.init_classifier::<TrainBackend>(&device);
            tracing::info!("Classifier ready: {} layers, d_model={}", cfg.num_layers, cfg.d_model);
            fit_with_optimizer(&mut trainer, model, run, sink)?
        }
        ModelKind::T5 => {
            let model = model_cfg.init_generative::<TrainBackend>(encoder.special().pad, &device);
            tracing::info!(
                "Encoder-decoder ready: {}+{} layers, d_model={}",
                cfg.num_layers, cfg.num_decoder_layers, cfg.d_model
            );
            fit_with_optimizer(&mut trainer, model, run, sink)?
        }
    };
    tracing::info!("Training finished after {} optimizer steps", trainer.global_step());
    Ok(scores)
}

/// Reload the latest checkpoint and run the validation pass only.
pub fn run_evaluation(
    cfg:         &TrainConfig,
    encoder:     &PairEncoder,
    valid:       Vec<NliDataset>,
    checkpoints: &CheckpointManager,
    sink:        &mut dyn MetricSink,
) -> Result<Scores> {
    let device = WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let loaders: Vec<Loader<ValidBackend>> = valid
        .into_iter()
        .map(|d| build_loader::<ValidBackend>(d, cfg, None, device.clone()))
        .collect();

    let model_cfg   = cfg.model_config(embedding_size(encoder.tokenizer()));
    let mut trainer = NliTrainer::new(step_context(cfg, encoder), encoder.tokenizer());

    match cfg.model {
        ModelKind::Bert => {
            let model = model_cfg.init_classifier::<ValidBackend>(&device);
            let (model, marker) = checkpoints.load_model::<ValidBackend, _>(model, &device)?;
            trainer.resume_at(marker.epoch, marker.step);
            trainer.validate(&model, &loaders, None, sink)
        }
        ModelKind::T5 => {
            let model = model_cfg.init_generative::<ValidBackend>(encoder.special().pad, &device);
            let (model, marker) = checkpoints.load_model::<ValidBackend, _>(model, &device)?;
            trainer.resume_at(marker.epoch, marker.step);
            trainer.validate(&model, &loaders, None, sink)
        }
    }
}

fn step_context(cfg: &TrainConfig, encoder: &PairEncoder) -> StepContext {
    StepContext {
        focal:         FocalLoss::new(cfg.focal_loss_gamma),
        label_targets: encoder.label_targets().to_vec(),
    }
}

fn build_loader<B: Backend>(
    dataset: NliDataset,
    cfg:     &TrainConfig,
    shuffle: Option<u64>,
    device:  B::Device,
) -> Loader<B> {
    let builder = DataLoaderBuilder::new(NliBatcher::<B>::new(device))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers.max(1));
    match shuffle {
        Some(seed) => builder.shuffle(seed).build(dataset),
        None => builder.build(dataset),
    }
}

// ─── Optimizer groups ─────────────────────────────────────────────────────────

/// One optimizer per parameter group. The decay optimizer carries
/// the configured weight decay, the no-decay one carries none.
pub struct GroupedOptimizer<O> {
    groups:   ParamGroups,
    decay:    O,
    no_decay: O,
}

impl<O> GroupedOptimizer<O> {
    pub fn new(groups: ParamGroups, decay: O, no_decay: O) -> Self {
        Self { groups, decay, no_decay }
    }

    pub fn step<B, M>(&mut self, lr: f64, model: M, grads: GradientsParams) -> M
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let (decay, no_decay) = self.groups.split::<B::InnerBackend>(grads);
        let model = self.decay.step(lr, model, decay);
        self.no_decay.step(lr, model, no_decay)
    }
}

/// Everything `fit` needs besides the model.
pub struct FitRun<'a, B: AutodiffBackend> {
    pub settings:    OptimizerSettings,
    pub schedule:    WarmupSchedule,
    pub epochs:      usize,
    pub train:       &'a Loader<B>,
    pub valid:       &'a [Loader<B::InnerBackend>],
    pub checkpoints: &'a CheckpointManager,
}

/// Build the two optimizer groups for `settings.kind` and fit.
pub fn fit_with_optimizer<B, M>(
    trainer: &mut NliTrainer<'_>,
    model:   M,
    run:     FitRun<'_, B>,
    sink:    &mut dyn MetricSink,
) -> Result<Scores>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + NliModel<B> + NamedParams,
    M::InnerModule: NliModel<B::InnerBackend>,
{
    let groups = ParamGroups::of(&model);
    tracing::info!(
        "Parameter groups: {} with weight decay, {} without",
        groups.decay.len(),
        groups.no_decay.len()
    );

    let s = run.settings;
    match s.kind {
        OptimizerKind::Adam => {
            let decay = AdamConfig::new()
                .with_epsilon(s.epsilon as f32)
                .with_weight_decay((s.weight_decay > 0.0).then(|| WeightDecayConfig::new(s.weight_decay as f32)))
                .init::<B, M>();
            let no_decay = AdamConfig::new().with_epsilon(s.epsilon as f32).init::<B, M>();
            trainer.fit(model, GroupedOptimizer::new(groups, decay, no_decay), run, sink)
        }
        OptimizerKind::AdamW => {
            let decay = AdamWConfig::new()
                .with_epsilon(s.epsilon as f32)
                .with_weight_decay(s.weight_decay as f32)
                .init::<B, M>();
            let no_decay = AdamWConfig::new()
                .with_epsilon(s.epsilon as f32)
                .with_weight_decay(0.0)
                .init::<B, M>();
            trainer.fit(model, GroupedOptimizer::new(groups, decay, no_decay), run, sink)
        }
    }
}

// ─── NliTrainer ───────────────────────────────────────────────────────────────

/// Runs steps, step logs and epoch-end aggregation, keeping
/// track of the current epoch and global step.
pub struct NliTrainer<'a> {
    ctx:          StepContext,
    tokenizer:    &'a Tokenizer,
    sanity_steps: usize,
    log_every:    usize,
    epoch:        usize,
    step:         usize,
}

impl<'a> NliTrainer<'a> {
    pub fn new(ctx: StepContext, tokenizer: &'a Tokenizer) -> Self {
        Self { ctx, tokenizer, sanity_steps: 0, log_every: 0, epoch: 0, step: 0 }
    }

    pub fn with_sanity_steps(mut self, steps: usize) -> Self {
        self.sanity_steps = steps;
        self
    }

    pub fn with_log_every(mut self, steps: usize) -> Self {
        self.log_every = steps;
        self
    }

    /// Continue numbering from a saved checkpoint.
    pub fn resume_at(&mut self, epoch: usize, step: usize) {
        self.epoch = epoch;
        self.step  = step;
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn global_step(&self) -> usize {
        self.step
    }

    pub fn fit<B, M, O>(
        &mut self,
        mut model: M,
        mut optim: GroupedOptimizer<O>,
        run:       FitRun<'_, B>,
        sink:      &mut dyn MetricSink,
    ) -> Result<Scores>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + NliModel<B>,
        M::InnerModule: NliModel<B::InnerBackend>,
        O: Optimizer<M, B>,
    {
        if self.sanity_steps > 0 && !run.valid.is_empty() {
            tracing::info!("Sanity check: {} validation batches per loader", self.sanity_steps);
            self.validate(&model.valid(), run.valid, Some(self.sanity_steps), &mut DiscardSink)?;
        }

        let mut scores = Vec::new();
        for epoch in 0..run.epochs {
            self.epoch = epoch;

            // ── Training phase ───────────────────────────────────────────────
            let mut epoch_records = Vec::new();
            for (batch_idx, batch) in run.train.iter().enumerate() {
                if batch_idx == 0 {
                    self.log_batch_for_debugging("Train", batch_idx, 0, &batch)?;
                }

                let out   = model.step(&batch, &self.ctx)?;
                let grads = GradientsParams::from_grads(out.loss.backward(), &model);
                let lr    = run.schedule.lr(self.step);
                model     = optim.step::<B, M>(lr, model, grads);
                self.step += 1;

                self.step_log("Train", batch.dataset(), &out.records, sink)?;
                if self.log_every > 0 && self.step % self.log_every == 0 {
                    tracing::info!(
                        "Epoch {:>3} step {:>6} | loss={:.4} | acc={:.3} | lr={:.3e}",
                        epoch, self.step, out.records.mean_loss(), out.records.accuracy(), lr
                    );
                }
                epoch_records.push(out.records);
            }
            self.epoch_end("Train", &BatchRecords::concat(epoch_records), sink)?;

            // ── Validation phase ─────────────────────────────────────────────
            // dropout is a no-op on the inner backend
            scores = self.validate(&model.valid(), run.valid, None, sink)?;

            run.checkpoints.save_model::<B, M>(&model, epoch, self.step)?;
            tracing::info!("Checkpoint saved for epoch {epoch} (step {})", self.step);
        }
        Ok(scores)
    }

    /// One pass over every loader, each aggregated on its own.
    /// `limit` caps the batches per loader.
    pub fn validate<B: Backend, M: NliModel<B>>(
        &mut self,
        model:   &M,
        loaders: &[Loader<B>],
        limit:   Option<usize>,
        sink:    &mut dyn MetricSink,
    ) -> Result<Scores> {
        let mut scores = Vec::new();
        for (loader_idx, loader) in loaders.iter().enumerate() {
            let mut records = Vec::new();
            for (batch_idx, batch) in loader.iter().enumerate() {
                if limit.is_some_and(|max| batch_idx >= max) {
                    break;
                }
                if batch_idx == 0 && limit.is_none() {
                    self.log_batch_for_debugging("Valid", batch_idx, loader_idx, &batch)?;
                }
                let out = model.step(&batch, &self.ctx)?;
                self.step_log("Valid", batch.dataset(), &out.records, sink)?;
                records.push(out.records);
            }
            scores.extend(self.epoch_end("Valid", &BatchRecords::concat(records), sink)?);
        }
        Ok(scores)
    }

    fn step_log(
        &self,
        prefix:  &str,
        dataset: Option<DatasetId>,
        records: &BatchRecords,
        sink:    &mut dyn MetricSink,
    ) -> Result<()> {
        let Some(dataset) = dataset else { return Ok(()) };
        for (name, value) in aggregate::step_scalars(prefix, dataset, records) {
            sink.log_scalar(&name, value, self.epoch, self.step)?;
        }
        Ok(())
    }

    /// Aggregate every dataset present in `records` separately.
    fn epoch_end(&self, split: &str, records: &BatchRecords, sink: &mut dyn MetricSink) -> Result<Scores> {
        let mut datasets: Vec<DatasetId> = records.dataset.iter().filter_map(|&c| DatasetId::from_code(c)).collect();
        datasets.sort();
        datasets.dedup();

        let mut scalars = Vec::new();
        for dataset in datasets {
            let report = aggregate::epoch_end(split, dataset, self.epoch, self.step, &records.filter_dataset(dataset))?;
            tracing::info!(
                "Epoch {:>3} | {split}/{dataset} | loss={:.4} | acc={:.1}% | n={}",
                self.epoch,
                report.summary.loss,
                report.summary.acc * 100.0,
                report.summary.count,
            );
            for (name, value) in &report.scalars {
                sink.log_scalar(name, *value, self.epoch, self.step)?;
            }
            sink.log_table(&report.table)?;
            scalars.extend(report.scalars);
        }
        Ok(scalars)
    }

    /// Dump a batch as JSON, with the decoded input text under `txt`.
    fn log_batch_for_debugging<B: Backend>(
        &self,
        prefix:     &str,
        batch_idx:  usize,
        loader_idx: usize,
        batch:      &NliBatch<B>,
    ) -> Result<()> {
        let txt  = decode_with_special_tokens(self.tokenizer, &batch.items)?;
        let json = serde_json::json!({ "items": batch.items, "txt": txt });
        tracing::info!("{prefix}/Batch/batch-{batch_idx}_dataloader-{loader_idx}:\n{json}");
        Ok(())
    }
}

/// Decode every sample's input ids, keeping [CLS] / [SEP] / [PAD].
fn decode_with_special_tokens(tokenizer: &Tokenizer, items: &[NliSample]) -> Result<Vec<String>> {
    items
        .iter()
        .map(|item| {
            tokenizer
                .decode(&item.input_ids, false)
                .map_err(|e| anyhow!("Cannot decode batch for debugging: {e}"))
        })
        .collect()
}
