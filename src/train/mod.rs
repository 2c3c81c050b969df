//! Training loop, configuration, and tracking
//!
//! This module drives the full run:
//! - Configuration surface and one-shot resolution into closed strategies
//! - Loss traces for train and held-out metrics
//! - The experiment-tracking sink seam
//! - The trainer state machine with its best-checkpoint policy

mod config;
mod trace;
mod tracking;
mod trainer;

pub use config::{ResolvedConfig, TrainConfig, EVAL_PASSES};
pub use trace::{LossTrace, TracePoint};
pub use tracking::{JsonlSink, MetricSink, NullSink, RunSummary};
pub use trainer::{CheckpointPolicy, TrainReport, Trainer, TrainingState};
