use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rtdemo_core::{
    run_workload, Demo, DemoFactory, Progress, RunOptions, SampleKind, Snapshot, UnitOfWork,
    Workload,
};

struct DummyDemo {
    calls: Arc<AtomicU64>,
}

impl Demo for DummyDemo {
    fn kind(&self) -> SampleKind {
        SampleKind::Latency
    }
    fn unit_of_work(&self) -> UnitOfWork {
        let calls = self.calls.clone();
        Arc::new(move || {
            // Simulate very small latency
            calls.fetch_add(1, Ordering::Relaxed);
            std::thread::sleep(Duration::from_micros(10));
            2_000_000
        })
    }
    fn status(&self) -> Vec<(String, String)> {
        vec![("calls".to_string(), self.calls.load(Ordering::Relaxed).to_string())]
    }
}

struct DummyFactory {
    calls: Arc<AtomicU64>,
}

impl DemoFactory for DummyFactory {
    fn name(&self) -> &'static str {
        "dummy"
    }
    fn about(&self) -> &'static str {
        "sleeps for ten microseconds"
    }
    fn default_workload(&self) -> Workload {
        Workload::new("dummy", "dummy")
    }
    fn create(&self, _wl: &Workload) -> anyhow::Result<Box<dyn Demo>> {
        Ok(Box::new(DummyDemo {
            calls: self.calls.clone(),
        }))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_workload_smoke() {
    let calls = Arc::new(AtomicU64::new(0));
    let factory = DummyFactory {
        calls: calls.clone(),
    };
    let mut wl = factory.default_workload();
    wl.duration = Some(Duration::from_millis(300));
    wl.workers = 2;
    wl.report_every = Some(Duration::from_millis(100));
    wl.warmup_iterations = 50;
    wl.set_thresholds(&[Duration::from_millis(1), Duration::from_millis(10)]);

    let ticks = Arc::new(Mutex::new(Vec::new()));
    let sink = ticks.clone();
    let progress: Progress = Arc::new(move |snap: &Snapshot, demo: &dyn Demo| {
        sink.lock().unwrap().push((snap.total_count, demo.status()));
    });
    let opts = RunOptions {
        progress: Some(progress),
        ..RunOptions::default()
    };

    let res = run_workload(&factory, wl, opts).await.expect("run");
    let s = &res.summary;
    assert!(s.samples > 0);
    assert!(s.sample_rate > 0.0);
    assert_eq!(s.samples as usize, res.samples.len());
    // warm-up calls never reach the summary
    assert_eq!(calls.load(Ordering::Relaxed), s.samples + 50);
    assert_eq!(s.mode, SampleKind::Latency);
    let latency = s.latency.as_ref().expect("latency stats");
    assert_eq!(latency.p50_us, 2_000.0);
    assert_eq!(s.thresholds.len(), 2);
    assert_eq!(s.thresholds[0].count as u64, s.samples);
    assert_eq!(s.thresholds[1].count, 0);
    assert!(!s.cancelled);
    assert!(!ticks.lock().unwrap().is_empty());
    assert_eq!(ticks.lock().unwrap()[0].1[0].0, "calls");
}

#[tokio::test]
async fn run_workload_rejects_bad_budget() {
    let factory = DummyFactory {
        calls: Arc::new(AtomicU64::new(0)),
    };
    let wl = factory.default_workload();
    let err = run_workload(&factory, wl, RunOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("configuration error"));
}
