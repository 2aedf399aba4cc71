// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to data sources and metric sinks
// through these traits only:
//
//   ExampleSource  — JsonlLoader reads <data_dir>/<dataset>.jsonl
//   MetricSink     — RunLogger writes CSVs and the artifact
//                    manifest; DiscardSink swallows everything
//                    during the sanity validation pass

use anyhow::Result;

use crate::domain::{dataset::DatasetId, example::NliExample, record::EpochTable};

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Anything that can produce the examples of a dataset split.
pub trait ExampleSource {
    fn load(&self, dataset: DatasetId) -> Result<Vec<NliExample>>;
}

// ─── MetricSink ───────────────────────────────────────────────────────────────
/// Receives named scalar metrics and per-example tables.
pub trait MetricSink {
    /// Record one named scalar at the given epoch / global step.
    fn log_scalar(&mut self, name: &str, value: f64, epoch: usize, step: usize) -> Result<()>;

    /// Export the full per-example table of one epoch-end aggregation.
    fn log_table(&mut self, table: &EpochTable) -> Result<()>;
}

/// A sink that drops everything it is given.
#[derive(Debug, Default)]
pub struct DiscardSink;

impl MetricSink for DiscardSink {
    fn log_scalar(&mut self, name: &str, value: f64, _epoch: usize, _step: usize) -> Result<()> {
        tracing::debug!("(discarded) {name}={value:.4}");
        Ok(())
    }

    fn log_table(&mut self, _table: &EpochTable) -> Result<()> {
        Ok(())
    }
}
