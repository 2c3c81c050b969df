//! Loss traces
//!
//! Append-only, step-ordered record of scalar training metrics, kept
//! separately for the train stream and the held-out split. Consumed by the
//! best-step report and by downstream plotting.

use serde::{Deserialize, Serialize};

/// One recorded point
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TracePoint {
    /// Global training step
    pub step: usize,
    /// Training loss at the step
    pub loss: f32,
    /// Auxiliary negative mean log-likelihood at the step
    pub log_likelihood: f32,
}

/// Step-ordered sequence of trace points
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LossTrace {
    points: Vec<TracePoint>,
}

impl LossTrace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point; steps must arrive in increasing order
    pub fn record(&mut self, step: usize, loss: f32, log_likelihood: f32) {
        debug_assert!(
            self.points.last().is_none_or(|last| last.step < step),
            "trace steps must increase"
        );
        self.points.push(TracePoint { step, loss, log_likelihood });
    }

    /// Number of recorded points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate points in step order
    pub fn iter(&self) -> impl Iterator<Item = &TracePoint> {
        self.points.iter()
    }

    /// Step with the lowest loss, with the value
    pub fn argmin_loss(&self) -> Option<(usize, f32)> {
        self.argmin_by(|p| p.loss)
    }

    /// Step with the lowest auxiliary log-likelihood metric, with the value
    pub fn argmin_log_likelihood(&self) -> Option<(usize, f32)> {
        self.argmin_by(|p| p.log_likelihood)
    }

    fn argmin_by(&self, metric: impl Fn(&TracePoint) -> f32) -> Option<(usize, f32)> {
        self.points
            .iter()
            .min_by(|a, b| metric(a).total_cmp(&metric(b)))
            .map(|p| (p.step, metric(p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_trace_has_no_argmin() {
        assert!(LossTrace::new().argmin_loss().is_none());
    }

    #[test]
    fn test_argmin_loss_finds_lowest_point() {
        let mut trace = LossTrace::new();
        for (step, loss) in [(1, 5.0), (2, 2.0), (3, 3.0), (4, 0.8), (5, 0.9)] {
            trace.record(step, loss, loss * 0.5);
        }
        assert_eq!(trace.argmin_loss(), Some((4, 0.8)));
    }

    #[test]
    fn test_argmin_metrics_are_independent() {
        let mut trace = LossTrace::new();
        trace.record(1, 1.0, 9.0);
        trace.record(2, 3.0, 2.0);
        assert_eq!(trace.argmin_loss().unwrap().0, 1);
        assert_eq!(trace.argmin_log_likelihood().unwrap().0, 2);
    }

    #[test]
    fn test_trace_grows_monotonically() {
        let mut trace = LossTrace::new();
        trace.record(10, 1.0, 1.0);
        trace.record(20, 2.0, 2.0);
        let steps: Vec<usize> = trace.iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![10, 20]);
    }
}
