// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types describing the NLI evaluation world:
// which dataset an example came from, which label space it
// lives in, which HANS heuristic it probes and which
// handcrafted category it falls into.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, traits and errors
//
// Everything above (data, ml, infra) speaks in these types,
// so the integer codes used inside tensors and the strings
// used in metric names are defined exactly once, here.

// Dataset identifiers (mnli_train, hans_validation, ...)
pub mod dataset;

// Three-way NLI labels and two-way HANS labels
pub mod label;

// HANS heuristic tags (lexical_overlap, subsequence, constituent)
pub mod heuristic;

// Handcrafted premise/hypothesis categories
pub mod handcrafted;

// Model family of a run (bert, t5)
pub mod model_kind;

// A single premise/hypothesis example
pub mod example;

// Per-example result columns and epoch tables
pub mod record;

// Domain error types
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
