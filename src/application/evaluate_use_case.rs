// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Re-runs the validation pass of a finished run:
//
//   1. Reload train_config.json from the run directory
//   2. Reload the run's tokenizer
//   3. Encode the requested datasets (default: the run's
//      validation datasets)
//   4. Load the latest checkpoint and validate, logging into the
//      same metrics.csv under the checkpoint's epoch / step

use anyhow::Result;

use crate::application::train_use_case::{load_datasets, TrainConfig};
use crate::data::{dataset::NliDataset, encoder::PairEncoder, loader::JsonlLoader};
use crate::domain::{dataset::DatasetId, error::ConfigError};
use crate::infra::{checkpoint::CheckpointManager, metrics::RunLogger, tokenizer_store::TokenizerStore};
use crate::ml::trainer::{run_evaluation, Scores};

pub struct EvaluateUseCase {
    run_dir:  String,
    data_dir: Option<String>,
    datasets: Vec<DatasetId>,
}

impl EvaluateUseCase {
    /// An empty `datasets` list means the run's own validation datasets.
    pub fn new(run_dir: String, data_dir: Option<String>, datasets: Vec<DatasetId>) -> Self {
        Self { run_dir, data_dir, datasets }
    }

    pub fn execute(&self) -> Result<Scores> {
        let checkpoints = CheckpointManager::new(&self.run_dir)?;
        let mut cfg: TrainConfig = checkpoints.load_config()?;
        cfg.run_dir = self.run_dir.clone();
        if let Some(dir) = &self.data_dir {
            cfg.data_dir = dir.clone();
        }
        let datasets = if self.datasets.is_empty() { cfg.valid_datasets.clone() } else { self.datasets.clone() };
        tracing::info!(
            "Evaluating '{}' ({}) on {} dataset(s)",
            self.run_dir,
            cfg.model,
            datasets.len()
        );

        if cfg.model.is_generative() {
            if let Some(&dataset) = datasets.iter().find(|d| d.is_hans()) {
                return Err(ConfigError::UnsupportedDataset { model: "t5", dataset }.into());
            }
        }

        let tokenizer = TokenizerStore::new(&self.run_dir).load()?;
        let encoder   = PairEncoder::new(tokenizer, cfg.encoding_style(), cfg.max_seq_len)?;
        let loader    = JsonlLoader::new(&cfg.data_dir);
        let valid: Vec<NliDataset> = load_datasets(&loader, &encoder, &datasets)?
            .into_iter()
            .map(|(_, d)| d)
            .collect();

        let mut logger = RunLogger::new(&self.run_dir, cfg.resolved_run_name())?;
        let scores = run_evaluation(&cfg, &encoder, valid, &checkpoints, &mut logger)?;
        tracing::info!("Evaluation complete: {} scores", scores.len());
        Ok(scores)
    }
}
