use crate::config::RunConfig;
use crate::error::{HarnessError, Result};
use crate::pacer::Pacer;
use crate::recorder::SampleRecorder;
use crate::reducer::{summarize, PercentileSummary};
use crate::reporter::{Reporter, Snapshot};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// The operation under measurement. Returns either its own elapsed
/// nanoseconds or a count of operations it completed.
pub type UnitOfWork = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Cooperative stop signal shared between a caller and a running driver.
/// Once cancelled it stays cancelled; every later run on the same handle
/// returns at once with `cancelled` set.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one run, owned by the caller.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub count: u64,
    pub elapsed: Duration,
    /// Samples in the order the recorder linearized them.
    pub samples: Vec<i64>,
    pub summary: Option<PercentileSummary>,
    pub cancelled: bool,
}

impl RunResult {
    pub fn summary(&self) -> Result<&PercentileSummary> {
        self.summary.as_ref().ok_or(HarnessError::EmptySampleSet)
    }

    /// Samples per second of wall-clock time.
    pub fn sample_rate(&self) -> f64 {
        self.count as f64 / self.elapsed.as_secs_f64().max(0.001)
    }

    /// Sum of sample values per second; the operation rate in throughput mode.
    pub fn value_rate(&self) -> f64 {
        let total: i128 = self.samples.iter().map(|&v| v as i128).sum();
        total as f64 / self.elapsed.as_secs_f64().max(0.001)
    }
}

/// Runs a unit of work under a [`RunConfig`] and feeds a [`SampleRecorder`].
pub struct Driver {
    config: RunConfig,
    recorder: Arc<SampleRecorder>,
    cancel: CancelHandle,
}

/// Validate `config`, run `unit` to completion and return the result.
pub async fn run<F>(config: RunConfig, unit: F) -> Result<RunResult>
where
    F: Fn() -> i64 + Send + Sync + 'static,
{
    Driver::new(config)?.run(unit).await
}

impl Driver {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            recorder: Arc::new(SampleRecorder::new()),
            cancel: CancelHandle::new(),
        })
    }

    /// Record into a caller-owned recorder, e.g. to keep partial samples
    /// reachable if the run fails.
    pub fn with_recorder(mut self, recorder: Arc<SampleRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn recorder(&self) -> Arc<SampleRecorder> {
        self.recorder.clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub async fn run<F>(&self, unit: F) -> Result<RunResult>
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.execute(Arc::new(unit), None).await
    }

    /// Like [`Driver::run`], emitting a [`Snapshot`] every
    /// `config.report_every` while the workers run.
    pub async fn run_reporting<F, E>(&self, unit: F, emit: E) -> Result<RunResult>
    where
        F: Fn() -> i64 + Send + Sync + 'static,
        E: Fn(Snapshot) + Send + Sync + 'static,
    {
        self.execute(Arc::new(unit), Some(Box::new(emit))).await
    }

    pub async fn execute(
        &self,
        unit: UnitOfWork,
        emit: Option<Box<dyn Fn(Snapshot) + Send + Sync>>,
    ) -> Result<RunResult> {
        let cfg = &self.config;
        cfg.validate()?;
        // Each run starts from an empty recorder.
        self.recorder.clear();
        info!(
            workers = cfg.workers,
            duration = ?cfg.duration,
            iterations = cfg.iterations,
            interval = ?cfg.interval,
            "starting run"
        );

        let started = Instant::now();
        let halt = Arc::new(AtomicBool::new(false));
        let claimed = Arc::new(AtomicU64::new(0));

        let reporter = match emit {
            Some(emit) if !cfg.report_every.is_zero() => Some(Reporter::start(
                self.recorder.clone(),
                started,
                cfg.report_every,
                emit,
            )),
            _ => None,
        };

        let mut set = JoinSet::new();
        for worker in 0..cfg.workers {
            let lane = Lane {
                worker,
                unit: unit.clone(),
                recorder: self.recorder.clone(),
                cancel: self.cancel.clone(),
                halt: halt.clone(),
                claimed: claimed.clone(),
                iterations: cfg.iterations,
                deadline: cfg.is_duration_bound().then(|| started + cfg.duration),
                // Stagger paced workers across one interval.
                pacing: cfg.is_paced().then(|| {
                    let offset = cfg.interval.mul_f64(worker as f64 / cfg.workers as f64);
                    (cfg.interval, started + offset)
                }),
            };
            set.spawn_blocking(move || lane.drive());
        }

        let mut failure = None;
        let mut cancelled = false;
        while let Some(res) = set.join_next().await {
            match res {
                Ok(exit) => {
                    debug!(
                        worker = exit.worker,
                        samples = exit.done,
                        cancelled = exit.cancelled,
                        "worker finished"
                    );
                    cancelled |= exit.cancelled;
                }
                Err(e) => {
                    warn!(error = %e, "worker failed, stopping remaining workers");
                    halt.store(true, Ordering::SeqCst);
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }
        let elapsed = started.elapsed();

        if let Some(reporter) = reporter {
            reporter.stop().await;
        }
        if let Some(e) = failure {
            return Err(e.into());
        }

        let samples = self.recorder.snapshot();
        let result = RunResult {
            count: samples.len() as u64,
            elapsed,
            summary: summarize(&samples).ok(),
            samples,
            cancelled,
        };
        info!(
            samples = result.count,
            elapsed = ?result.elapsed,
            cancelled = result.cancelled,
            "run finished"
        );
        Ok(result)
    }
}

/// How one worker's loop ended.
struct LaneExit {
    worker: usize,
    done: u64,
    /// Stopped by the caller's cancel rather than by its budget.
    cancelled: bool,
}

/// One worker's copy of the loop.
struct Lane {
    worker: usize,
    unit: UnitOfWork,
    recorder: Arc<SampleRecorder>,
    cancel: CancelHandle,
    halt: Arc<AtomicBool>,
    claimed: Arc<AtomicU64>,
    iterations: u64,
    deadline: Option<Instant>,
    pacing: Option<(Duration, Instant)>,
}

impl Lane {
    fn stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.halt.load(Ordering::Relaxed)
    }

    /// Every iteration slot has been claimed or the deadline has passed.
    fn budget_spent(&self) -> bool {
        if self.iterations > 0 && self.claimed.load(Ordering::SeqCst) >= self.iterations {
            return true;
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    fn drive(self) -> LaneExit {
        let mut pacer = self
            .pacing
            .map(|(interval, first)| Pacer::new(interval, first));
        let mut done = 0u64;
        let mut cancelled = false;

        loop {
            // A finished budget wins over a late cancel.
            if self.budget_spent() {
                break;
            }
            if self.stopped() {
                cancelled = self.cancel.is_cancelled();
                break;
            }
            if let Some(pacer) = &pacer {
                if !pacer.wait(self.deadline, || self.stopped() || self.budget_spent()) {
                    cancelled = !self.budget_spent() && self.cancel.is_cancelled();
                    break;
                }
            }
            // Iteration budgets are shared: each slot is claimed exactly once.
            if self.iterations > 0 && self.claimed.fetch_add(1, Ordering::SeqCst) >= self.iterations
            {
                break;
            }

            let sample = (self.unit)();
            self.recorder.record(sample);
            done += 1;

            if let Some(pacer) = &mut pacer {
                pacer.advance();
            }
        }
        LaneExit {
            worker: self.worker,
            done,
            cancelled,
        }
    }
}
