// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from JSONL files on disk to tensor batches.
//
//   <data_dir>/<dataset>.jsonl
//       │
//       ▼
//   JsonlLoader       → parses records, validates labels,
//       │               resolves heuristics / handcrafted types
//       ▼
//   Preprocessor      → normalises whitespace in each sentence
//       │
//       ▼
//   PairEncoder       → tokenises into classifier or generative
//       │               layout, pads to max_seq_len
//       ▼
//   NliDataset        → implements Burn's Dataset trait
//       │
//       ▼
//   NliBatcher        → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the step functions

/// Reads dataset splits from JSONL files
pub mod loader;

/// Normalises raw sentence text
pub mod preprocessor;

/// Tokenises premise/hypothesis pairs and label targets
pub mod encoder;

/// Implements Burn's Dataset trait for NLI samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
