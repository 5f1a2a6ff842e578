use crate::recorder::{Counts, SampleRecorder};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Progress of a run at one reporter tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub elapsed_seconds: f64,
    pub total_count: u64,
    pub interval_count: u64,
    /// Samples per second over the interval since the previous tick.
    pub interval_rate_per_second: f64,
    pub total_value: i64,
    pub interval_value: i64,
    /// Sum of sample values per second over the interval.
    pub interval_value_rate_per_second: f64,
}

impl Snapshot {
    pub fn between(
        started_at: Instant,
        previous: (Counts, Instant),
        current: (Counts, Instant),
    ) -> Self {
        let (prev, prev_at) = previous;
        let (now, now_at) = current;
        let span = now_at.saturating_duration_since(prev_at).as_secs_f64();
        let interval_count = now.samples.saturating_sub(prev.samples);
        let interval_value = now.total.wrapping_sub(prev.total);
        let per_second = |n: f64| if span > 0.0 { n / span } else { 0.0 };

        Self {
            elapsed_seconds: now_at.saturating_duration_since(started_at).as_secs_f64(),
            total_count: now.samples,
            interval_count,
            interval_rate_per_second: per_second(interval_count as f64),
            total_value: now.total,
            interval_value,
            interval_value_rate_per_second: per_second(interval_value as f64),
        }
    }
}

/// Emits [`Snapshot`]s on its own timer, reading only the recorder's
/// atomic counters.
pub struct Reporter;

impl Reporter {
    /// Spawn the reporting task on the current tokio runtime. The first
    /// snapshot is emitted one `every` after `started_at`.
    pub fn start<E>(
        recorder: Arc<SampleRecorder>,
        started_at: Instant,
        every: Duration,
        emit: E,
    ) -> ReporterHandle
    where
        E: Fn(Snapshot) + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let first = tokio::time::Instant::from_std(started_at) + every;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut previous = (Counts::default(), started_at);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let current = (recorder.snapshot_count(), Instant::now());
                        emit(Snapshot::between(started_at, previous, current));
                        previous = current;
                    }
                }
            }
            debug!("reporter stopped");
        });

        ReporterHandle {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }
}

/// Owner of a running reporter. Dropping it aborts the task.
pub struct ReporterHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ReporterHandle {
    /// Signal the reporter and wait until it has emitted its last snapshot.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
