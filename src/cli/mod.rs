// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    — fine-tunes a model, validating every epoch
//   2. `evaluate` — reloads a run and validates its checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, TrainArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "nli-probe",
    version = "0.1.0",
    about = "Fine-tune and evaluate NLI models on MNLI, SNLI and HANS with per-heuristic breakdowns."
)]
pub struct Cli {
    /// The subcommand to run (train or evaluate)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

/// Converts CLI args into a TrainConfig and hands off to Layer 2.
fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::{TrainConfig, TrainUseCase};

    tracing::info!("Starting {} training on data in: {}", args.model, args.data_dir);

    let config   = TrainConfig::try_from(args)?;
    let run_dir  = config.run_dir.clone();
    let use_case = TrainUseCase::new(config);
    use_case.execute()?;

    println!("Training complete. Run saved to {run_dir}");
    Ok(())
}

/// Runs validation on a saved run and prints the scores.
fn run_evaluate(args: EvalArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let datasets = args.dataset_ids()?;
    let use_case = EvaluateUseCase::new(args.run_dir, args.data_dir, datasets);
    let scores   = use_case.execute()?;

    for (name, value) in scores {
        println!("{name:<60} {value:.4}");
    }
    Ok(())
}
