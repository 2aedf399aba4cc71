// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `evaluate`, and all
// their configurable flags.
//
// Dataset lists are comma separated dataset identifiers:
//   --train-datasets mnli_train,hans_train
//   --valid-datasets mnli_validation_matched,hans_validation
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::domain::{
    dataset::{parse_dataset_list, DatasetId},
    error::ConfigError,
    model_kind::ModelKind,
};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune an NLI model and validate after every epoch
    Train(TrainArgs),

    /// Re-run validation on the latest checkpoint of a run
    Evaluate(EvalArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory holding <dataset>.jsonl files
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Directory for checkpoints, tokenizer, metrics and tables
    #[arg(long, default_value = "runs/default")]
    pub run_dir: String,

    /// Run name used in the artifact manifest and runs.csv
    #[arg(long)]
    pub run_name: Option<String>,

    /// Model family: bert or t5
    #[arg(long, default_value = "bert")]
    pub model: ModelKind,

    #[arg(long, default_value = "mnli_train")]
    pub train_datasets: String,

    #[arg(long, default_value = "mnli_validation_matched,mnli_validation_mismatched,hans_validation")]
    pub valid_datasets: String,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    #[arg(long, default_value_t = 2e-5)]
    pub learning_rate: f64,

    /// Applied to every parameter except biases and LayerNorm weights
    #[arg(long, default_value_t = 0.01)]
    pub weight_decay: f64,

    #[arg(long, default_value_t = 1e-8)]
    pub adam_epsilon: f64,

    /// adam or adamw
    #[arg(long, default_value = "adamw")]
    pub optimizer_name: String,

    /// Method string such as `adam,lr=0.0001,eps=0.000001`;
    /// overrides --optimizer-name and the matching flags
    #[arg(long)]
    pub optimizer: Option<String>,

    /// linear or polynomial
    #[arg(long, default_value = "linear")]
    pub scheduler_name: String,

    /// Exactly one of --warmup-steps / --warmup-ratio
    #[arg(long)]
    pub warmup_steps: Option<usize>,

    #[arg(long)]
    pub warmup_ratio: Option<f64>,

    /// 0 gives plain cross-entropy
    #[arg(long, default_value_t = 0.0)]
    pub focal_loss_gamma: f64,

    #[arg(long, default_value_t = 0.1)]
    pub hidden_dropout: f64,

    #[arg(long, default_value_t = 0.1)]
    pub attention_dropout: f64,

    #[arg(long, default_value_t = 0.1)]
    pub classifier_dropout: f64,

    /// Gradient multiplier on the pooled output; -1 reverses it
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub encoder_grad_scale: f64,

    /// Hidden dimension of the transformer
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 4)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 4)]
    pub num_layers: usize,

    /// Decoder depth of the t5 model
    #[arg(long, default_value_t = 2)]
    pub num_decoder_layers: usize,

    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 128)]
    pub max_seq_len: usize,

    /// Size of a tokenizer built from the corpus
    #[arg(long, default_value_t = 30522)]
    pub vocab_size: usize,

    /// Fetch bert-base-uncased / t5-small from the HuggingFace Hub
    #[arg(long)]
    pub pretrained_tokenizer: bool,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Validation batches run (and discarded) before training
    #[arg(long, default_value_t = 2)]
    pub num_sanity_val_steps: usize,

    /// Progress line every N optimizer steps, 0 disables it
    #[arg(long, default_value_t = 50)]
    pub log_every: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl TryFrom<TrainArgs> for TrainConfig {
    type Error = ConfigError;

    fn try_from(a: TrainArgs) -> Result<Self, Self::Error> {
        Ok(TrainConfig {
            data_dir:       a.data_dir,
            run_dir:        a.run_dir,
            run_name:       a.run_name,
            model:          a.model,
            train_datasets: parse_dataset_list(&a.train_datasets)?,
            valid_datasets: parse_dataset_list(&a.valid_datasets)?,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            learning_rate:  a.learning_rate,
            weight_decay:   a.weight_decay,
            adam_epsilon:   a.adam_epsilon,
            optimizer_name: a.optimizer_name,
            optimizer:      a.optimizer,
            scheduler_name: a.scheduler_name,
            warmup_steps:   a.warmup_steps,
            warmup_ratio:   a.warmup_ratio,
            focal_loss_gamma:   a.focal_loss_gamma,
            hidden_dropout:     a.hidden_dropout,
            attention_dropout:  a.attention_dropout,
            classifier_dropout: a.classifier_dropout,
            encoder_grad_scale: a.encoder_grad_scale,
            d_model:            a.d_model,
            num_heads:          a.num_heads,
            num_layers:         a.num_layers,
            num_decoder_layers: a.num_decoder_layers,
            d_ff:               a.d_ff,
            max_seq_len:        a.max_seq_len,
            vocab_size:         a.vocab_size,
            num_workers:          a.num_workers,
            seed:                 a.seed,
            num_sanity_val_steps: a.num_sanity_val_steps,
            pretrained_tokenizer: a.pretrained_tokenizer,
            log_every:            a.log_every,
        })
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Run directory written by `train`
    #[arg(long)]
    pub run_dir: String,

    /// Overrides the data directory saved with the run
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Datasets to evaluate on; defaults to the run's validation datasets
    #[arg(long, default_value = "")]
    pub datasets: String,
}

impl EvalArgs {
    pub fn dataset_ids(&self) -> Result<Vec<DatasetId>, ConfigError> {
        parse_dataset_list(&self.datasets)
    }
}
