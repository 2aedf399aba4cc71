// ============================================================
// Layer 6 — Run Logger
// ============================================================
// Local stand-in for an experiment tracker. Everything a run
// reports ends up as plain files under the run directory:
//
//   <run_dir>/metrics.csv      one row per scalar
//                              epoch,step,name,value
//   <run_dir>/tables/*.csv     per-example epoch tables
//   <run_dir>/artifacts.jsonl  one manifest line per table
//
// and, once training finishes, one summary row per run in a
// shared runs.csv (hyperparameters, then final scores).
//
// Example metrics.csv:
//   epoch,step,name,value
//   0,50,Train/mnli_train/loss_step,1.093211
//   0,120,Valid/mnli_validation_matched/acc_epoch,0.412000

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, WriterBuilder};

use crate::domain::{record::EpochTable, traits::MetricSink};

/// One line of `artifacts.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub name:     String,
    #[serde(rename = "type")]
    pub kind:     String,
    pub path:     String,
    pub metadata: ArtifactMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub epoch: usize,
    pub step:  usize,
}

/// Writes scalars, epoch tables and the artifact manifest of one run.
pub struct RunLogger {
    run_name:      String,
    metrics_path:  PathBuf,
    tables_dir:    PathBuf,
    manifest_path: PathBuf,
}

impl RunLogger {
    /// Create the run directory layout. The metrics header is
    /// only written for a new file so evaluation appends to the
    /// training log.
    pub fn new(run_dir: impl AsRef<Path>, run_name: impl Into<String>) -> Result<Self> {
        let run_dir    = run_dir.as_ref();
        let tables_dir = run_dir.join("tables");
        fs::create_dir_all(&tables_dir)
            .with_context(|| format!("Cannot create '{}'", tables_dir.display()))?;

        let metrics_path = run_dir.join("metrics.csv");
        if !metrics_path.exists() {
            let mut w = csv::Writer::from_path(&metrics_path)
                .with_context(|| format!("Cannot create '{}'", metrics_path.display()))?;
            w.write_record(["epoch", "step", "name", "value"])?;
            w.flush()?;
            tracing::debug!("Created metrics CSV: '{}'", metrics_path.display());
        }

        Ok(Self {
            run_name: run_name.into(),
            metrics_path,
            tables_dir,
            manifest_path: run_dir.join("artifacts.jsonl"),
        })
    }

    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }
}

impl MetricSink for RunLogger {
    fn log_scalar(&mut self, name: &str, value: f64, epoch: usize, step: usize) -> Result<()> {
        let mut w = WriterBuilder::new()
            .has_headers(false)
            .from_writer(OpenOptions::new().append(true).open(&self.metrics_path)?);
        w.write_record([epoch.to_string(), step.to_string(), name.to_string(), format!("{value:.6}")])?;
        w.flush()?;
        Ok(())
    }

    fn log_table(&mut self, table: &EpochTable) -> Result<()> {
        let path = self.tables_dir.join(table.file_name());
        let mut w = csv::Writer::from_path(&path)
            .with_context(|| format!("Cannot write table '{}'", path.display()))?;
        w.write_record(&table.header)?;
        for row in &table.rows {
            w.write_record(row)?;
        }
        w.flush()?;

        let entry = ArtifactEntry {
            name:     format!("{}-{}-{}_epoch_end_df", self.run_name, table.split, table.dataset),
            kind:     "df".to_string(),
            path:     path.display().to_string(),
            metadata: ArtifactMetadata { epoch: table.epoch, step: table.step },
        };
        let mut manifest = OpenOptions::new().create(true).append(true).open(&self.manifest_path)?;
        writeln!(manifest, "{}", serde_json::to_string(&entry)?)?;

        tracing::debug!("Exported {} rows to '{}'", table.rows.len(), path.display());
        Ok(())
    }
}

// ─── Experiment utilities ─────────────────────────────────────────────────────

/// Build a run name from selected hyperparameters.
///
/// A single name is returned verbatim; otherwise every name is
/// rendered as `name:value-`.
pub fn construct_model_name(params: &[(String, String)], names: &[&str]) -> String {
    if let [only] = names {
        return (*only).to_string();
    }
    names
        .iter()
        .map(|name| {
            let value = params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .unwrap_or("");
            format!("{name}:{value}-")
        })
        .collect()
}

/// Append one row of hyperparameters followed by scores to a
/// shared summary CSV.
///
/// An empty or missing file gets a header first. Otherwise the
/// row follows the existing header's column order, and a column
/// missing from this run is an error.
pub fn append_run_summary(
    path:   &Path,
    params: &[(String, String)],
    scores: &[(String, f64)],
) -> Result<()> {
    let mut row: Vec<(String, String)> = params.to_vec();
    row.extend(scores.iter().map(|(k, v)| (k.clone(), v.to_string())));

    let existing = existing_header(path)?;
    let is_new   = existing.is_none();
    let header: Vec<String> = existing.unwrap_or_else(|| row.iter().map(|(k, _)| k.clone()).collect());

    let mut values = Vec::with_capacity(header.len());
    for column in &header {
        match row.iter().find(|(k, _)| k == column) {
            Some((_, v)) => values.push(v.clone()),
            None => bail!("Run summary is missing column `{column}` required by '{}'", path.display()),
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open run summary '{}'", path.display()))?;
    let mut w = WriterBuilder::new().has_headers(false).from_writer(file);
    if is_new {
        w.write_record(&header)?;
    }
    w.write_record(&values)?;
    w.flush()?;

    tracing::info!("Appended run summary to '{}'", path.display());
    Ok(())
}

/// Header of an existing summary file; `None` when the file is
/// missing or empty.
fn existing_header(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Cannot read run summary '{}'", path.display()))?;
    match reader.records().next() {
        Some(record) => {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                Ok(None)
            } else {
                Ok(Some(record.iter().map(str::to_string).collect()))
            }
        }
        None => Ok(None),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::DatasetId;

    fn params() -> Vec<(String, String)> {
        vec![
            ("model".to_string(), "bert".to_string()),
            ("learning_rate".to_string(), "0.00002".to_string()),
        ]
    }

    #[test]
    fn test_construct_model_name() {
        assert_eq!(construct_model_name(&params(), &["model"]), "model");
        assert_eq!(
            construct_model_name(&params(), &["model", "learning_rate"]),
            "model:bert-learning_rate:0.00002-"
        );
    }

    #[test]
    fn test_scalars_and_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = RunLogger::new(dir.path(), "run").unwrap();
        logger.log_scalar("Valid/snli_validation/acc_epoch", 0.5, 1, 20).unwrap();

        let table = EpochTable {
            split:   "Valid".into(),
            dataset: DatasetId::SnliValidation,
            epoch:   1,
            step:    20,
            header:  vec!["".into(), "datapoint_prob".into()],
            rows:    vec![vec!["0".into(), "[0.1 0.9]".into()]],
        };
        logger.log_table(&table).unwrap();

        let metrics = fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(metrics, "epoch,step,name,value\n1,20,Valid/snli_validation/acc_epoch,0.500000\n");

        let manifest = fs::read_to_string(dir.path().join("artifacts.jsonl")).unwrap();
        let entry: ArtifactEntry = serde_json::from_str(manifest.trim()).unwrap();
        assert_eq!(entry.name, "run-Valid-snli_validation_epoch_end_df");
        assert_eq!(entry.kind, "df");
        assert_eq!(entry.metadata, ArtifactMetadata { epoch: 1, step: 20 });
        assert!(Path::new(&entry.path).exists());
    }

    #[test]
    fn test_run_summary_header_then_rows() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.csv");
        let scores = vec![("acc".to_string(), 0.75)];

        append_run_summary(&path, &params(), &scores).unwrap();
        append_run_summary(&path, &params(), &scores).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["model,learning_rate,acc", "bert,0.00002,0.75", "bert,0.00002,0.75"]);
    }

    #[test]
    fn test_run_summary_missing_column_is_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.csv");
        append_run_summary(&path, &params(), &[("acc".to_string(), 0.5)]).unwrap();
        assert!(append_run_summary(&path, &params(), &[]).is_err());
    }

    #[test]
    fn test_run_summary_quotes_and_reuses_header() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.csv");
        let params = vec![("optimizer".to_string(), "adam,lr=0.1".to_string())];

        append_run_summary(&path, &params, &[("acc".to_string(), 0.5)]).unwrap();
        append_run_summary(&path, &params, &[("acc".to_string(), 0.25)]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["optimizer,acc", "\"adam,lr=0.1\",0.5", "\"adam,lr=0.1\",0.25"]);
        assert_eq!(
            existing_header(&path).unwrap(),
            Some(vec!["optimizer".to_string(), "acc".to_string()])
        );
    }

    #[test]
    fn test_existing_header_of_empty_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.csv");
        assert_eq!(existing_header(&path).unwrap(), None);
        fs::write(&path, "").unwrap();
        assert_eq!(existing_header(&path).unwrap(), None);
    }
}
