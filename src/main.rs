//! Galaxia CLI
//!
//! Single-command training entry point for the galaxia library.
//!
//! # Usage
//!
//! ```bash
//! # Train with defaults (synthetic stamps, cosine schedule, adafactor)
//! galaxia --training-steps 2000
//!
//! # Fourier likelihood with a piecewise milestone schedule
//! galaxia --noise Fourier --schedule piecewise --opt adam
//!
//! # Record metrics as JSON lines
//! galaxia --metrics metrics.jsonl
//! ```

use clap::Parser;
use galaxia::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
