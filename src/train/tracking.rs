//! Experiment-tracking seam
//!
//! The trainer reports per-step scalars and the final best-step summary
//! through [`MetricSink`]. Sink failures are the one error class the loop
//! swallows: a flaky tracking backend must never abort a long training run,
//! so the trainer logs the failure and continues.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Final report handed to the tracking backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identity
    pub run_id: String,
    /// Step with the lowest training loss, with the value
    pub best_step_loss: usize,
    /// Lowest training loss
    pub best_loss: f32,
    /// Step with the lowest auxiliary log-likelihood metric, with the value
    pub best_step_log_likelihood: usize,
    /// Lowest auxiliary log-likelihood metric
    pub best_log_likelihood: f32,
    /// Step of the checkpoint behind the `best` alias
    pub checkpoint_step: usize,
}

/// Receiver of scalar metrics and the final summary
pub trait MetricSink {
    /// Record one scalar against a step
    fn scalar(&mut self, name: &str, step: usize, value: f32) -> Result<()>;

    /// Record the final best-step summary
    fn summary(&mut self, summary: &RunSummary) -> Result<()>;
}

/// Sink that discards everything
pub struct NullSink;

impl MetricSink for NullSink {
    fn scalar(&mut self, _name: &str, _step: usize, _value: f32) -> Result<()> {
        Ok(())
    }

    fn summary(&mut self, _summary: &RunSummary) -> Result<()> {
        Ok(())
    }
}

/// Sink appending JSON lines to a file
pub struct JsonlSink {
    writer: BufWriter<File>,
}

#[derive(Serialize)]
struct ScalarRecord<'a> {
    name: &'a str,
    step: usize,
    value: f32,
}

impl JsonlSink {
    /// Create or truncate the metrics file at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self { writer: BufWriter::new(file) })
    }
}

impl MetricSink for JsonlSink {
    fn scalar(&mut self, name: &str, step: usize, value: f32) -> Result<()> {
        let line = serde_json::to_string(&ScalarRecord { name, step, value })
            .map_err(|e| crate::Error::Serialization(e.to_string()))?;
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    fn summary(&mut self, summary: &RunSummary) -> Result<()> {
        let line = serde_json::to_string(summary)
            .map_err(|e| crate::Error::Serialization(e.to_string()))?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}
