// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a fine-tuning run in order:
//
//   Step 1: Validate the configuration      (fatal, before any I/O)
//   Step 2: Load train + valid examples     (Layer 4 - data)
//   Step 3: Load / fetch / build tokenizer  (Layer 6 - infra)
//   Step 4: Encode examples                 (Layer 4 - data)
//   Step 5: Save config, open run logger    (Layer 6 - infra)
//   Step 6: Run the training loop           (Layer 5 - ml)
//   Step 7: Append the run summary          (Layer 6 - infra)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{
    dataset::NliDataset,
    encoder::{EncodingStyle, PairEncoder},
    loader::JsonlLoader,
};
use crate::domain::{
    dataset::DatasetId,
    error::ConfigError,
    example::NliExample,
    model_kind::ModelKind,
    traits::ExampleSource,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{append_run_summary, construct_model_name, RunLogger},
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    model::NliModelConfig,
    optim::OptimizerSettings,
    schedule::{check_warmup, SchedulerKind},
    trainer::run_training,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every hyperparameter of a run. Saved as train_config.json in
// the run directory so `evaluate` can rebuild the same model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:       String,
    pub run_dir:        String,
    pub run_name:       Option<String>,
    pub model:          ModelKind,
    pub train_datasets: Vec<DatasetId>,
    pub valid_datasets: Vec<DatasetId>,

    pub batch_size:     usize,
    pub epochs:         usize,
    pub learning_rate:  f64,
    pub weight_decay:   f64,
    pub adam_epsilon:   f64,
    pub optimizer_name: String,
    /// Optional method string such as `adamw,lr=0.00003`
    pub optimizer:      Option<String>,
    pub scheduler_name: String,
    pub warmup_steps:   Option<usize>,
    pub warmup_ratio:   Option<f64>,
    pub focal_loss_gamma: f64,

    pub hidden_dropout:     f64,
    pub attention_dropout:  f64,
    pub classifier_dropout: f64,
    pub encoder_grad_scale: f64,

    pub d_model:            usize,
    pub num_heads:          usize,
    pub num_layers:         usize,
    pub num_decoder_layers: usize,
    pub d_ff:               usize,
    pub max_seq_len:        usize,
    pub vocab_size:         usize,

    pub num_workers:          usize,
    pub seed:                 u64,
    pub num_sanity_val_steps: usize,
    pub pretrained_tokenizer: bool,
    pub log_every:            usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       "data".to_string(),
            run_dir:        "runs/default".to_string(),
            run_name:       None,
            model:          ModelKind::Bert,
            train_datasets: vec![DatasetId::MnliTrain],
            valid_datasets: vec![
                DatasetId::MnliValidationMatched,
                DatasetId::MnliValidationMismatched,
                DatasetId::HansValidation,
            ],
            batch_size:     32,
            epochs:         3,
            learning_rate:  2e-5,
            weight_decay:   0.01,
            adam_epsilon:   1e-8,
            optimizer_name: "adamw".to_string(),
            optimizer:      None,
            scheduler_name: "linear".to_string(),
            warmup_steps:   None,
            warmup_ratio:   Some(0.1),
            focal_loss_gamma: 0.0,
            hidden_dropout:     0.1,
            attention_dropout:  0.1,
            classifier_dropout: 0.1,
            encoder_grad_scale: 1.0,
            d_model:            256,
            num_heads:          4,
            num_layers:         4,
            num_decoder_layers: 2,
            d_ff:               1024,
            max_seq_len:        128,
            vocab_size:         30522,
            num_workers:          1,
            seed:                 42,
            num_sanity_val_steps: 2,
            pretrained_tokenizer: false,
            log_every:            50,
        }
    }
}

impl TrainConfig {
    /// Reject bad names and combinations before anything is loaded.
    pub fn validate(&self) -> Result<()> {
        self.optimizer_settings()?;
        self.scheduler()?;
        check_warmup(self.warmup_steps, self.warmup_ratio)?;

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue { name: "batch_size", reason: "must be positive".into() }.into());
        }
        if self.focal_loss_gamma < 0.0 {
            return Err(ConfigError::InvalidValue {
                name:   "focal_loss_gamma",
                reason: format!("must be non-negative, got {}", self.focal_loss_gamma),
            }
            .into());
        }
        if self.d_model % self.num_heads.max(1) != 0 {
            return Err(ConfigError::InvalidValue {
                name:   "d_model",
                reason: format!("{} is not divisible by num_heads={}", self.d_model, self.num_heads),
            }
            .into());
        }
        if self.model.is_generative() {
            let hans = self.train_datasets.iter().chain(&self.valid_datasets).find(|d| d.is_hans());
            if let Some(&dataset) = hans {
                return Err(ConfigError::UnsupportedDataset { model: "t5", dataset }.into());
            }
        }
        Ok(())
    }

    /// Optimizer name and flags, overridden by `--optimizer`.
    pub fn optimizer_settings(&self) -> Result<OptimizerSettings> {
        OptimizerSettings::resolve(
            &self.optimizer_name,
            self.optimizer.as_deref(),
            self.learning_rate,
            self.weight_decay,
            self.adam_epsilon,
        )
    }

    pub fn scheduler(&self) -> Result<SchedulerKind, ConfigError> {
        self.scheduler_name.parse()
    }

    /// Architecture for a tokenizer with `embedding_size` ids.
    pub fn model_config(&self, embedding_size: usize) -> NliModelConfig {
        NliModelConfig::new(embedding_size, self.max_seq_len)
            .with_d_model(self.d_model)
            .with_num_heads(self.num_heads)
            .with_num_layers(self.num_layers)
            .with_num_decoder_layers(self.num_decoder_layers)
            .with_d_ff(self.d_ff)
            .with_hidden_dropout(self.hidden_dropout)
            .with_attention_dropout(self.attention_dropout)
            .with_classifier_dropout(self.classifier_dropout)
            .with_encoder_grad_scale(self.encoder_grad_scale)
    }

    pub fn encoding_style(&self) -> EncodingStyle {
        if self.model.is_generative() {
            EncodingStyle::Generative
        } else {
            EncodingStyle::Classifier
        }
    }

    /// Hyperparameters as rendered strings, in a fixed order.
    pub fn params(&self) -> Vec<(String, String)> {
        let opt = |v: Option<String>| v.unwrap_or_else(|| "None".to_string());
        let list = |ds: &[DatasetId]| ds.iter().map(|d| d.as_str()).collect::<Vec<_>>().join(" ");
        vec![
            ("model".into(), self.model.to_string()),
            ("train_datasets".into(), list(&self.train_datasets)),
            ("valid_datasets".into(), list(&self.valid_datasets)),
            ("batch_size".into(), self.batch_size.to_string()),
            ("epochs".into(), self.epochs.to_string()),
            ("learning_rate".into(), self.learning_rate.to_string()),
            ("weight_decay".into(), self.weight_decay.to_string()),
            ("adam_epsilon".into(), self.adam_epsilon.to_string()),
            ("optimizer_name".into(), self.optimizer_name.clone()),
            ("optimizer".into(), opt(self.optimizer.clone())),
            ("scheduler_name".into(), self.scheduler_name.clone()),
            ("warmup_steps".into(), opt(self.warmup_steps.map(|v| v.to_string()))),
            ("warmup_ratio".into(), opt(self.warmup_ratio.map(|v| v.to_string()))),
            ("focal_loss_gamma".into(), self.focal_loss_gamma.to_string()),
            ("hidden_dropout".into(), self.hidden_dropout.to_string()),
            ("attention_dropout".into(), self.attention_dropout.to_string()),
            ("classifier_dropout".into(), self.classifier_dropout.to_string()),
            ("encoder_grad_scale".into(), self.encoder_grad_scale.to_string()),
            ("seed".into(), self.seed.to_string()),
        ]
    }

    /// `--run-name`, or a name built from the headline hyperparameters.
    pub fn resolved_run_name(&self) -> String {
        self.run_name.clone().unwrap_or_else(|| {
            construct_model_name(
                &self.params(),
                &["model", "learning_rate", "batch_size", "focal_loss_gamma"],
            )
        })
    }

    /// `runs.csv` lives next to the run directories.
    pub fn summary_path(&self) -> PathBuf {
        let run_dir = Path::new(&self.run_dir);
        run_dir.parent().unwrap_or(run_dir).join("runs.csv")
    }
}

// ─── Shared preparation ──────────────────────────────────────────────────────

/// Load every split in `datasets` and encode each into its own dataset.
pub(crate) fn load_datasets(
    source:   &dyn ExampleSource,
    encoder:  &PairEncoder,
    datasets: &[DatasetId],
) -> Result<Vec<(DatasetId, NliDataset)>> {
    datasets
        .iter()
        .map(|&dataset| {
            let examples = source.load(dataset)?;
            let samples  = encoder
                .encode_all(&examples)
                .with_context(|| format!("Cannot encode {dataset}"))?;
            tracing::info!("Encoded {} examples from {dataset}", samples.len());
            Ok((dataset, NliDataset::new(samples)))
        })
        .collect()
}

fn corpus_texts(examples: &[NliExample]) -> Vec<String> {
    examples
        .iter()
        .flat_map(|e| [e.premise.clone(), e.hypothesis.clone()])
        .collect()
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Load examples ────────────────────────────────────────────
        tracing::info!("Loading datasets from '{}'", cfg.data_dir);
        let loader = JsonlLoader::new(&cfg.data_dir);
        let mut train_examples = Vec::new();
        for &dataset in &cfg.train_datasets {
            train_examples.extend(loader.load(dataset)?);
        }
        tracing::info!("Loaded {} training examples", train_examples.len());

        // ── Step 3: Tokenizer ────────────────────────────────────────────────
        // Built from the training text unless a pretrained one is requested
        let store      = TokenizerStore::new(&cfg.run_dir);
        let pretrained = cfg.pretrained_tokenizer.then(|| cfg.model.pretrained_id());
        let tokenizer  = store.load_or_build(&corpus_texts(&train_examples), cfg.vocab_size, pretrained)?;

        // ── Step 4: Encode ───────────────────────────────────────────────────
        let encoder = PairEncoder::new(tokenizer, cfg.encoding_style(), cfg.max_seq_len)?;
        let train   = NliDataset::new(encoder.encode_all(&train_examples)?);
        let valid   = load_datasets(&loader, &encoder, &cfg.valid_datasets)?;

        // ── Step 5: Persist config, open logger ──────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.run_dir)?;
        checkpoints.save_config(cfg)?;
        let run_name   = cfg.resolved_run_name();
        let mut logger = RunLogger::new(&cfg.run_dir, &run_name)?;
        tracing::info!("Run '{run_name}' logging to '{}'", logger.metrics_path().display());

        // ── Step 6: Train ────────────────────────────────────────────────────
        let valid: Vec<NliDataset> = valid.into_iter().map(|(_, d)| d).collect();
        let scores = run_training(cfg, &encoder, train, valid, &checkpoints, &mut logger)?;

        // ── Step 7: Summary row ──────────────────────────────────────────────
        let mut params = vec![("run_name".to_string(), run_name)];
        params.extend(cfg.params());
        append_run_summary(&cfg.summary_path(), &params, &scores)?;

        tracing::info!("Training complete!");
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_warmup_exclusivity_is_fatal() {
        let both = TrainConfig { warmup_steps: Some(100), warmup_ratio: Some(0.1), ..Default::default() };
        let err  = both.validate().unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::ConflictingWarmup));

        let neither = TrainConfig { warmup_steps: None, warmup_ratio: None, ..Default::default() };
        let err     = neither.validate().unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::MissingWarmup));
    }

    #[test]
    fn test_unknown_names_are_fatal() {
        let cfg = TrainConfig { optimizer_name: "sgd".into(), ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = TrainConfig { scheduler_name: "cosine".into(), ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_generative_rejects_hans() {
        let cfg = TrainConfig { model: ModelKind::T5, ..Default::default() };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnsupportedDataset { dataset: DatasetId::HansValidation, .. })
        ));
    }

    #[test]
    fn test_default_run_name() {
        let cfg = TrainConfig::default();
        assert_eq!(
            cfg.resolved_run_name(),
            "model:bert-learning_rate:0.00002-batch_size:32-focal_loss_gamma:0-"
        );
        let named = TrainConfig { run_name: Some("baseline".into()), ..Default::default() };
        assert_eq!(named.resolved_run_name(), "baseline");
    }

    #[test]
    fn test_summary_path_next_to_run_dir() {
        let cfg = TrainConfig { run_dir: "runs/a".into(), ..Default::default() };
        assert_eq!(cfg.summary_path(), PathBuf::from("runs/runs.csv"));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let cfg  = TrainConfig { model: ModelKind::T5, valid_datasets: vec![DatasetId::SnliTest], ..Default::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"model\":\"t5\""));
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.valid_datasets, vec![DatasetId::SnliTest]);
        assert_eq!(back.model, ModelKind::T5);
    }
}
