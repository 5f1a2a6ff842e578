use crate::error::{HarnessError, Result};
use std::time::Duration;

/// Budget and pacing for one harness invocation.
///
/// Exactly one of `duration` and `iterations` must be non-zero. A zero
/// `interval` runs unthrottled; a zero `report_every` disables snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub duration: Duration,
    pub iterations: u64,
    pub interval: Duration,
    pub workers: usize,
    pub report_every: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration: Duration::ZERO,
            iterations: 0,
            interval: Duration::ZERO,
            workers: 1,
            report_every: Duration::ZERO,
        }
    }
}

impl RunConfig {
    /// Wall-clock bound run with a single unthrottled worker.
    pub fn for_duration(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    /// Iteration bound run with a single unthrottled worker.
    pub fn for_iterations(iterations: u64) -> Self {
        Self {
            iterations,
            ..Self::default()
        }
    }

    pub fn paced(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn report_every(mut self, every: Duration) -> Self {
        self.report_every = every;
        self
    }

    pub fn is_paced(&self) -> bool {
        !self.interval.is_zero()
    }

    pub fn is_duration_bound(&self) -> bool {
        !self.duration.is_zero()
    }

    pub fn validate(&self) -> Result<()> {
        match (self.duration.is_zero(), self.iterations == 0) {
            (true, true) => {
                return Err(HarnessError::Config(
                    "either a duration or an iteration count is required".to_string(),
                ))
            }
            (false, false) => {
                return Err(HarnessError::Config(format!(
                    "ambiguous budget: duration {:?} and {} iterations both set",
                    self.duration, self.iterations
                )))
            }
            _ => {}
        }
        if self.workers < 1 {
            return Err(HarnessError::Config(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
