// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights at full precision using
// Burn's NamedMpkGzFileRecorder.
//
// What gets saved:
//   1. Model weights (.mpk.gz file), one per epoch
//   2. latest.json        — epoch and global step of the last save
//   3. train_config.json  — every hyperparameter of the run
//
// The config is saved separately because evaluation has to
// rebuild the exact architecture (model kind, d_model, layers)
// before the weights can be loaded into it.
//
// File layout:
//   <run_dir>/checkpoints/
//     model_epoch_0.mpk.gz
//     model_epoch_1.mpk.gz
//     ...
//     latest.json
//   <run_dir>/train_config.json

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;

/// Position of the last saved checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMarker {
    pub epoch: usize,
    pub step:  usize,
}

/// Manages saving and loading of model checkpoints.
pub struct CheckpointManager {
    run_dir: PathBuf,
    dir:     PathBuf,
}

impl CheckpointManager {
    /// Creates `<run_dir>/checkpoints` if it doesn't already exist.
    pub fn new(run_dir: impl Into<PathBuf>) -> Result<Self> {
        let run_dir = run_dir.into();
        let dir     = run_dir.join("checkpoints");
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { run_dir, dir })
    }

    /// Save model weights after `epoch`, at global step `step`.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize, step: usize) -> Result<()> {
        // Recorder adds the extension
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        NamedMpkGzFileRecorder::<FullPrecisionSettings>::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let marker = CheckpointMarker { epoch, step };
        fs::write(self.dir.join("latest.json"), serde_json::to_string(&marker)?)
            .with_context(|| "Failed to write latest.json")?;

        tracing::debug!("Saved checkpoint: epoch {} step {}", epoch, step);
        Ok(())
    }

    /// Load weights from the latest checkpoint into `model`.
    ///
    /// The model must have the architecture the checkpoint was
    /// saved with, or loading fails.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<(M, CheckpointMarker)> {
        let marker = self.latest()?;
        let path   = self.dir.join(format!("model_epoch_{}", marker.epoch));

        tracing::info!("Loading checkpoint from epoch {}", marker.epoch);

        let record = NamedMpkGzFileRecorder::<FullPrecisionSettings>::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;

        Ok((model.load_record(record), marker))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.run_dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.run_dir.join("train_config.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' before 'evaluate'.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn latest(&self) -> Result<CheckpointMarker> {
        let path = self.dir.join("latest.json");
        let s = fs::read_to_string(&path)
            .with_context(|| "Cannot find 'latest.json'. Have you run 'train' first?")?;
        Ok(serde_json::from_str(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::{Linear, LinearConfig};

    #[test]
    fn test_model_roundtrip_and_marker() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();

        let model: Linear<NdArray> = LinearConfig::new(3, 2).init(&device);
        ckpt.save_model::<NdArray, _>(&model, 1, 40).unwrap();
        assert_eq!(ckpt.latest().unwrap(), CheckpointMarker { epoch: 1, step: 40 });

        assert!(dir.path().join("checkpoints/model_epoch_1.mpk.gz").exists());

        let fresh: Linear<NdArray> = LinearConfig::new(3, 2).init(&device);
        let (loaded, marker) = ckpt.load_model::<NdArray, _>(fresh, &device).unwrap();
        assert_eq!(marker.epoch, 1);

        let a: Vec<f32> = model.weight.val().into_data().convert::<f32>().to_vec().unwrap();
        let b: Vec<f32> = loaded.weight.val().into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_checkpoint_is_error() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.latest().is_err());
    }
}
