// ============================================================
// Layer 4 — JSONL Example Loader
// ============================================================
// Loads one dataset split from <data_dir>/<dataset>.jsonl.
//
// One JSON object per line:
//   {"idx": 12, "premise": "...", "hypothesis": "...",
//    "label": 0 | "entailment",
//    "heuristic": "lexical_overlap",      (HANS only)
//    "handcrafted_type": 1}               (optional)
//
// Validation performed per line:
//   - the label must resolve to an id in the dataset's label
//     space (3-way for MNLI/SNLI, 2-way for HANS)
//   - SNLI marks examples without a gold label with -1; those
//     are skipped with a warning, anything else invalid is an
//     error pointing at the offending line
//   - a missing handcrafted_type is computed from the text
//   - blank lines are ignored

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::{Path, PathBuf}};

use crate::data::preprocessor::Preprocessor;
use crate::domain::{
    dataset::{DatasetFamily, DatasetId},
    example::NliExample,
    handcrafted::HandcraftedType,
    heuristic::{RawHeuristic, NO_HEURISTIC},
    label::{RawLabel, NO_GOLD_LABEL},
    traits::ExampleSource,
};

/// One line of an input file as written on disk.
#[derive(Debug, Deserialize)]
struct RawRecord {
    idx:              Option<i64>,
    premise:          String,
    hypothesis:       String,
    label:            RawLabel,
    heuristic:        Option<RawHeuristic>,
    handcrafted_type: Option<i64>,
}

/// Reads dataset splits from a directory of `.jsonl` files.
pub struct JsonlLoader {
    dir:          PathBuf,
    preprocessor: Preprocessor,
}

impl JsonlLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), preprocessor: Preprocessor::new() }
    }

    /// Path of the file holding a dataset split.
    pub fn path_for(&self, dataset: DatasetId) -> PathBuf {
        self.dir.join(format!("{dataset}.jsonl"))
    }

    fn parse_file(&self, dataset: DatasetId, path: &Path) -> Result<Vec<NliExample>> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read dataset file '{}'", path.display()))?;

        let mut examples = Vec::new();
        let mut skipped  = 0usize;

        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: RawRecord = serde_json::from_str(line).with_context(|| {
                format!("{}:{}: malformed record", path.display(), line_no + 1)
            })?;

            match self.to_example(dataset, line_no, record) {
                Ok(Some(ex)) => examples.push(ex),
                Ok(None)     => skipped += 1,
                Err(e)       => {
                    return Err(e.context(format!("{}:{}", path.display(), line_no + 1)))
                }
            }
        }

        if skipped > 0 {
            tracing::warn!("{dataset}: skipped {skipped} examples without a gold label");
        }
        Ok(examples)
    }

    fn to_example(
        &self,
        dataset: DatasetId,
        line_no: usize,
        record:  RawRecord,
    ) -> Result<Option<NliExample>> {
        let label = match record.label.resolve(dataset.num_labels()) {
            Some(NO_GOLD_LABEL) if dataset.family() == DatasetFamily::Snli => return Ok(None),
            Some(l) if l >= 0 && (l as usize) < dataset.num_labels() => l,
            _ => bail!("label {:?} is not valid for {dataset}", record.label),
        };

        let premise    = self.preprocessor.clean(&record.premise);
        let hypothesis = self.preprocessor.clean(&record.hypothesis);

        let idx = record.idx.unwrap_or(line_no as i64);
        let mut example = NliExample::new(idx, dataset, premise, hypothesis, label);

        if let Some(code) = record.handcrafted_type {
            if HandcraftedType::from_code(code).is_none() {
                bail!("unknown handcrafted_type {code}");
            }
            example = example.with_handcrafted_type(code);
        }

        if let Some(raw) = record.heuristic {
            let code = raw
                .resolve()
                .with_context(|| format!("unknown heuristic {raw:?}"))?;
            if code != NO_HEURISTIC {
                example = example.with_heuristic(code);
            }
        }

        Ok(Some(example))
    }
}

impl ExampleSource for JsonlLoader {
    fn load(&self, dataset: DatasetId) -> Result<Vec<NliExample>> {
        let path = self.path_for(dataset);
        if !path.exists() {
            bail!(
                "Dataset file '{}' does not exist. Expected one JSONL file per dataset in '{}'",
                path.display(),
                self.dir.display()
            );
        }

        let examples = self.parse_file(dataset, &path)?;
        tracing::info!("Loaded {} examples for {}", examples.len(), dataset);
        Ok(examples)
    }
}
