use rtdemo_core::{Driver, Reporter, RunConfig, SampleRecorder, Snapshot};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn snapshots_follow_the_run() {
    let snaps: Arc<Mutex<Vec<Snapshot>>> = Arc::default();
    let sink = snaps.clone();
    let cfg = RunConfig::for_duration(Duration::from_millis(350))
        .paced(Duration::from_micros(500))
        .report_every(Duration::from_millis(50));

    let res = Driver::new(cfg)
        .unwrap()
        .run_reporting(|| 1_000, move |s| sink.lock().unwrap().push(s))
        .await
        .unwrap();

    let snaps = snaps.lock().unwrap();
    assert!(snaps.len() >= 3, "only {} snapshots", snaps.len());
    assert!(snaps.windows(2).all(|w| w[0].total_count <= w[1].total_count));
    assert!(snaps.windows(2).all(|w| w[0].elapsed_seconds < w[1].elapsed_seconds));
    let last = snaps.last().unwrap();
    assert!(last.total_count <= res.count);
    assert_eq!(last.total_value, last.total_count as i64 * 1_000);
    let summed: u64 = snaps.iter().map(|s| s.interval_count).sum();
    assert_eq!(summed, last.total_count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_snapshots_when_disabled() {
    let snaps: Arc<Mutex<Vec<Snapshot>>> = Arc::default();
    let sink = snaps.clone();
    let cfg = RunConfig::for_duration(Duration::from_millis(100));

    Driver::new(cfg)
        .unwrap()
        .run_reporting(|| 1, move |s| sink.lock().unwrap().push(s))
        .await
        .unwrap();

    assert!(snaps.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn standalone_reporter_stops_on_request() {
    let recorder = Arc::new(SampleRecorder::new());
    let snaps: Arc<Mutex<Vec<Snapshot>>> = Arc::default();
    let sink = snaps.clone();

    let handle = Reporter::start(
        recorder.clone(),
        Instant::now(),
        Duration::from_millis(20),
        move |s| sink.lock().unwrap().push(s),
    );
    for v in 0..10 {
        recorder.record(v);
    }
    tokio::time::sleep(Duration::from_millis(110)).await;
    handle.stop().await;

    let seen = snaps.lock().unwrap().len();
    assert!(seen >= 2);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(snaps.lock().unwrap().len(), seen);
    assert_eq!(snaps.lock().unwrap().last().unwrap().total_count, 10);
}
