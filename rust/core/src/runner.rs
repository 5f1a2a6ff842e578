use crate::demo::{Demo, DemoFactory};
use crate::driver::{CancelHandle, Driver, RunResult};
use crate::metrics::{raw_samples, threshold_counts, LatencyStats, RunMetrics, Summary};
use crate::process_stats::memory_stats;
use crate::reporter::Snapshot;
use crate::workload::{SampleKind, Workload};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Receives each periodic snapshot together with the running demo, so the
/// caller can read its mode, unit label and status lines.
pub type Progress = Arc<dyn Fn(&Snapshot, &dyn Demo) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RunOptions {
    pub cancel: CancelHandle,
    pub progress: Option<Progress>,
}

/// Create the demo, run the optional warm-up, run the measured phase and
/// reduce it into [`RunMetrics`].
pub async fn run_workload(
    factory: &dyn DemoFactory,
    wl: Workload,
    opts: RunOptions,
) -> Result<RunMetrics> {
    let measured = wl.run_config();
    measured.validate()?;

    let demo: Arc<dyn Demo> = Arc::from(factory.create(&wl)?);
    info!(demo = factory.name(), workload = %wl.name, "demo ready");

    let outcome = drive(&demo, &wl, &opts).await;
    demo.shutdown();
    let (started_at, result) = outcome?;

    let summary_stats = result.summary.as_ref();
    let latency = match demo.kind() {
        SampleKind::Latency => summary_stats.map(LatencyStats::from_summary),
        SampleKind::Throughput => None,
    };
    let thresholds = match (demo.kind(), summary_stats) {
        (SampleKind::Latency, Some(s)) => threshold_counts(s, &wl.thresholds()),
        _ => Vec::new(),
    };

    let summary = Summary {
        demo: factory.name().to_string(),
        workload: wl.name.clone(),
        mode: demo.kind(),
        workers: measured.workers,
        started_at,
        samples: result.count,
        duration_s: result.elapsed.as_secs_f64(),
        sample_rate: result.sample_rate(),
        value_rate: result.value_rate(),
        unit_label: demo.unit_label().to_string(),
        latency,
        thresholds,
        memory: memory_stats(),
        status: demo.status(),
        cancelled: result.cancelled,
    };

    Ok(RunMetrics {
        samples: raw_samples(&result),
        summary,
    })
}

async fn drive(
    demo: &Arc<dyn Demo>,
    wl: &Workload,
    opts: &RunOptions,
) -> Result<(chrono::DateTime<Utc>, RunResult)> {
    // Warm-up samples land in the warm-up driver's own recorder and are
    // dropped with it.
    if let Some(warm) = wl.warmup_config() {
        info!(duration = ?warm.duration, iterations = warm.iterations, "warming up");
        let driver = Driver::new(warm)?.with_cancel(opts.cancel.clone());
        let res = driver.execute(demo.unit_of_work(), None).await?;
        info!(samples = res.count, "warm-up finished");
    }

    let driver = Driver::new(wl.run_config())?.with_cancel(opts.cancel.clone());
    let emit = opts.progress.clone().map(|progress| {
        let demo = demo.clone();
        Box::new(move |snap: Snapshot| progress(&snap, demo.as_ref()))
            as Box<dyn Fn(Snapshot) + Send + Sync>
    });

    let started_at = Utc::now();
    let result = driver.execute(demo.unit_of_work(), emit).await?;
    Ok((started_at, result))
}
