// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs      — Saving and loading model weights with
//                        Burn's NamedMpkGzFileRecorder, plus the
//                        TrainConfig JSON evaluation rebuilds
//                        the model from.
//
//   tokenizer_store.rs — Tokenizer persistence. Loads the run's
//                        tokenizer.json, fetches a pretrained one
//                        from the HuggingFace Hub, or builds a
//                        word-level vocabulary from the corpus.
//
//   metrics.rs         — RunLogger, the MetricSink that writes
//                        scalar metrics, per-example epoch tables
//                        and the artifact manifest, plus the
//                        shared runs.csv summary.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer loading, fetching and building
pub mod tokenizer_store;

/// Scalar metrics, epoch tables and run summaries
pub mod metrics;
