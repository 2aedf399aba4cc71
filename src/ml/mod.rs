// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn tensor code: models, losses,
// label harmonization, the shared step, epoch aggregation and
// the training loop. The layers above only see plain Rust
// types (records, scalars, configs).
//
//   model.rs       — BERT-style encoder + three-way classifier
//   generative.rs  — encoder-decoder that generates label words
//   step.rs        — one forward pass → loss + per-example records
//   harmonize.rs   — three-way ↔ two-way HANS probability mapping
//   focal.rs       — focal loss over log-softmax scores
//   grad.rs        — grad_mul_const (gradient scaling / reversal)
//   aggregate.rs   — epoch-end scalars and per-example tables
//   params.rs      — decay / no-decay parameter groups by name
//   optim.rs       — optimizer names and method strings
//   schedule.rs    — linear / polynomial warmup schedules
//   trainer.rs     — sanity check, epochs, validation, checkpoints
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Devlin et al. (2019) BERT
//            Raffel et al. (2020) T5
//            Lin et al. (2017) Focal Loss

/// Focal loss
pub mod focal;

/// Gradient scaling that is the identity in the forward pass
pub mod grad;

/// HANS label-space harmonization
pub mod harmonize;

/// Named parameters and weight-decay groups
pub mod params;

/// Encoder blocks and the classifier model
pub mod model;

/// Encoder-decoder model for label generation
pub mod generative;

/// Shared training / validation step
pub mod step;

/// Epoch-end aggregation
pub mod aggregate;

/// Optimizer selection and method-string parsing
pub mod optim;

/// Learning rate warmup and decay
pub mod schedule;

/// Full training loop with validation and checkpointing
pub mod trainer;
