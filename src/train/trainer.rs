//! Training loop and checkpoint policy
//!
//! Drives the step-synchronous cycle: pull a batch, evaluate the objective
//! with a fresh sub-key, update parameters through the scheduled optimizer,
//! book-keep the loss trace, persist on new qualifying bests, and periodically
//! score the held-out split in inference mode. All mutable training state
//! lives in an explicit [`TrainingState`] value owned by the trainer; there
//! are no module-level accumulators.

use crate::arch::Autoencoder;
use crate::checkpoint::CheckpointStore;
use crate::data::Dataset;
use crate::objective::ElboObjective;
use crate::optim::Optimizer;
use crate::params::ModelParams;
use crate::rng::PrngKey;
use crate::train::{LossTrace, MetricSink, ResolvedConfig, RunSummary, TrainConfig};
use crate::{Error, Result};
use tracing::{error, info, warn};

/// Sentinel standing in for +infinity before the first observed loss
const BEST_LOSS_SENTINEL: f32 = 1e6;

/// Best-checkpoint selection policy
///
/// Tracks the running best loss and answers whether a step's parameters
/// qualify for persistence: the loss must improve on the best so far AND the
/// new best must sit under the activation threshold.
#[derive(Clone, Copy, Debug)]
pub struct CheckpointPolicy {
    best_loss: f32,
    threshold: f32,
}

impl CheckpointPolicy {
    /// Create with the configured activation threshold
    pub fn new(threshold: f32) -> Self {
        Self { best_loss: BEST_LOSS_SENTINEL, threshold }
    }

    /// Observe one step's loss; returns true when a checkpoint should be saved
    pub fn observe(&mut self, loss: f32) -> bool {
        if loss < self.best_loss {
            self.best_loss = loss;
            return self.best_loss < self.threshold;
        }
        false
    }

    /// Running best loss
    pub fn best_loss(&self) -> f32 {
        self.best_loss
    }
}

/// Mutable state threaded through the run
#[derive(Debug)]
pub struct TrainingState {
    /// Current global step (1-based once training starts)
    pub step: usize,
    /// Best-checkpoint policy state
    pub policy: CheckpointPolicy,
    /// Step of the last successful checkpoint save
    pub checkpoint_step: Option<usize>,
    /// Count of checkpoint saves that failed and were skipped
    pub save_failures: usize,
    /// Per-step train metrics
    pub train_trace: LossTrace,
    /// Per-evaluation held-out metrics
    pub eval_trace: LossTrace,
}

/// Final report of a completed run
#[derive(Debug)]
pub struct TrainReport {
    /// Parameters reloaded from the `best` checkpoint
    pub params: ModelParams,
    /// Per-step train metrics
    pub train_trace: LossTrace,
    /// Per-evaluation held-out metrics
    pub eval_trace: LossTrace,
    /// Step with the lowest training loss
    pub best_step_loss: usize,
    /// Step with the lowest auxiliary log-likelihood metric
    pub best_step_log_likelihood: usize,
    /// Step behind the `best` alias
    pub checkpoint_step: usize,
    /// Checkpoint saves that failed during the run
    pub save_failures: usize,
}

/// Orchestrates one training run
pub struct Trainer<A: Autoencoder, D: Dataset> {
    arch: A,
    dataset: D,
    config: TrainConfig,
    resolved: ResolvedConfig,
    objective: ElboObjective,
    optimizer: Box<dyn Optimizer>,
    store: CheckpointStore,
    sink: Box<dyn MetricSink>,
}

impl<A: Autoencoder, D: Dataset> Trainer<A, D> {
    /// Resolve the configuration and assemble a trainer.
    ///
    /// All unknown-tag and invalid-value errors surface here, before any
    /// training step runs.
    pub fn new(
        arch: A,
        dataset: D,
        config: TrainConfig,
        sink: Box<dyn MetricSink>,
    ) -> Result<Self> {
        let resolved = config.resolve()?;
        let objective = ElboObjective::new(resolved.noise_mode, config.reg_coeff);
        let optimizer = resolved.optimizer.build(config.learning_rate);
        let store = CheckpointStore::new(&config.checkpoint_dir, &config.run_id);
        Ok(Self { arch, dataset, config, resolved, objective, optimizer, store, sink })
    }

    /// Checkpoint store backing this run
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Run the full state machine: initialize, train, evaluate periodically,
    /// finalize against the best checkpoint.
    pub fn fit(&mut self) -> Result<TrainReport> {
        // Initializing: one fixed-shape probe batch seeds both sub-trees.
        let root = PrngKey::from_seed(self.config.seed);
        let (init_key, mut train_key) = root.split();
        let probe = self.dataset.next_train()?;
        let mut params = self.arch.init(&init_key, &probe)?;

        let mut state = TrainingState {
            step: 0,
            policy: CheckpointPolicy::new(self.config.checkpoint_threshold),
            checkpoint_step: None,
            save_failures: 0,
            train_trace: LossTrace::new(),
            eval_trace: LossTrace::new(),
        };

        info!(
            run_id = %self.config.run_id,
            dataset = %self.config.dataset,
            total_steps = self.config.total_steps,
            eval_cadence = self.resolved.eval_cadence,
            "starting training"
        );

        // Training.
        for step in 1..=self.config.total_steps {
            state.step = step;
            let (next, step_key) = train_key.split();
            train_key = next;

            let batch = self.dataset.next_train()?;
            let lr = self.resolved.schedule.rate(step - 1, self.config.learning_rate);
            self.optimizer.set_lr(lr);

            let (value, grads) =
                self.objective.loss_and_grad(&self.arch, &params, &step_key, &batch)?;
            self.optimizer.step(&mut params, &grads)?;

            state.train_trace.record(step, value.loss, value.neg_log_likelihood);
            self.emit_scalar("loss", step, value.loss);
            self.emit_scalar("log_likelihood", step, value.neg_log_likelihood);

            if state.policy.observe(value.loss) {
                match self.store.save(step, &params) {
                    Ok(_) => state.checkpoint_step = Some(step),
                    Err(e) => {
                        // The previous `best` alias stays resolvable.
                        state.save_failures += 1;
                        error!(step, "checkpoint save failed: {e}");
                    }
                }
            }

            // Evaluating.
            if self.resolved.eval_cadence > 0 && step % self.resolved.eval_cadence == 0 {
                let (next, eval_key) = train_key.split();
                train_key = next;
                let (test_loss, test_ll) = self.evaluate(&params, &eval_key)?;
                state.eval_trace.record(step, test_loss, test_ll);
                self.emit_scalar("test_loss", step, test_loss);
                self.emit_scalar("test_log_likelihood", step, test_ll);
                info!(step, loss = value.loss, test_loss, "evaluation pass");
            }
        }

        self.finalize(params, state)
    }

    /// Score the held-out split once in inference mode, returning the mean
    /// loss and the mean auxiliary metric
    fn evaluate(&mut self, params: &ModelParams, key: &PrngKey) -> Result<(f32, f32)> {
        let batches = self.dataset.eval_split()?;
        if batches.is_empty() {
            return Err(Error::DataExhausted(
                "evaluation split produced no batches".to_string(),
            ));
        }

        let mut key = *key;
        let mut loss_total = 0.0;
        let mut ll_total = 0.0;
        let count = batches.len() as f32;
        for batch in &batches {
            let (next, batch_key) = key.split();
            key = next;
            let value = self.objective.loss(&self.arch, params, &batch_key, batch)?;
            loss_total += value.loss;
            ll_total += value.neg_log_likelihood;
        }
        Ok((loss_total / count, ll_total / count))
    }

    /// Finalizing: reload the best checkpoint and assemble the report
    fn finalize(&mut self, params: ModelParams, state: TrainingState) -> Result<TrainReport> {
        let checkpoint_step = state
            .checkpoint_step
            .ok_or_else(|| Error::NoCheckpoint(self.config.run_id.clone()))?;
        let best_params = self.store.load_best(&params)?;

        let (best_step_loss, best_loss) = state
            .train_trace
            .argmin_loss()
            .ok_or_else(|| Error::DataExhausted("training produced no steps".to_string()))?;
        let (best_step_log_likelihood, best_log_likelihood) = state
            .train_trace
            .argmin_log_likelihood()
            .ok_or_else(|| Error::DataExhausted("training produced no steps".to_string()))?;

        info!(
            best_step_loss,
            best_loss, best_step_log_likelihood, checkpoint_step, "run finished"
        );

        let summary = RunSummary {
            run_id: self.config.run_id.clone(),
            best_step_loss,
            best_loss,
            best_step_log_likelihood,
            best_log_likelihood,
            checkpoint_step,
        };
        if let Err(e) = self.sink.summary(&summary) {
            warn!("metric sink rejected summary: {e}");
        }

        Ok(TrainReport {
            params: best_params,
            train_trace: state.train_trace,
            eval_trace: state.eval_trace,
            best_step_loss,
            best_step_log_likelihood,
            checkpoint_step,
            save_failures: state.save_failures,
        })
    }

    fn emit_scalar(&mut self, name: &str, step: usize, value: f32) {
        if let Err(e) = self.sink.scalar(name, step, value) {
            warn!(step, "metric sink rejected {name}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // CheckpointPolicy tests
    // =========================================================================

    #[test]
    fn test_policy_saves_exactly_once_for_reference_trace() {
        // Trace [5.0, 2.0, 3.0, 0.8, 0.9] with threshold 1.0: only 0.8 both
        // improves on the best and clears the activation threshold.
        let mut policy = CheckpointPolicy::new(1.0);
        let decisions: Vec<bool> =
            [5.0, 2.0, 3.0, 0.8, 0.9].iter().map(|&loss| policy.observe(loss)).collect();
        assert_eq!(decisions, vec![false, false, false, true, false]);
        assert_eq!(decisions.iter().filter(|&&d| d).count(), 1);
    }

    #[test]
    fn test_policy_tracks_best_above_threshold() {
        let mut policy = CheckpointPolicy::new(1.0);
        policy.observe(5.0);
        policy.observe(2.0);
        assert_eq!(policy.best_loss(), 2.0);
    }

    #[test]
    fn test_policy_saves_on_each_qualifying_improvement() {
        let mut policy = CheckpointPolicy::new(1.0);
        assert!(policy.observe(0.9));
        assert!(policy.observe(0.5));
        assert!(!policy.observe(0.7));
        assert!(policy.observe(0.1));
    }

    #[test]
    fn test_policy_starts_from_large_sentinel() {
        let mut policy = CheckpointPolicy::new(1e9);
        // First observation below the sentinel qualifies when the threshold
        // allows it.
        assert!(policy.observe(9e5));
    }
}
