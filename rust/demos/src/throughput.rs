//! Batch throughput: each iteration builds a large set of data points and
//! repeatedly folds over the growing set.

use rand::Rng;
use rtdemo_core::{Demo, DemoFactory, SampleKind, UnitOfWork, Workload};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub struct ThroughputFactory;

impl DemoFactory for ThroughputFactory {
    fn name(&self) -> &'static str {
        "throughput"
    }

    fn about(&self) -> &'static str {
        "timed iterations creating and folding over 100k data points"
    }

    fn default_workload(&self) -> Workload {
        let mut wl =
            Workload::new("throughput", self.name()).with_option("operations", 100_000);
        wl.iterations = 5;
        wl.warmup_iterations = 5;
        wl
    }

    fn create(&self, wl: &Workload) -> anyhow::Result<Box<dyn Demo>> {
        Ok(Box::new(ThroughputDemo {
            operations: wl.option("operations", 100_000usize)?,
            totals: Arc::new(Totals::default()),
        }))
    }
}

#[derive(Default)]
struct Totals {
    operations: AtomicU64,
    nanos: AtomicU64,
}

struct ThroughputDemo {
    operations: usize,
    totals: Arc<Totals>,
}

impl Demo for ThroughputDemo {
    fn kind(&self) -> SampleKind {
        SampleKind::Latency
    }

    fn unit_of_work(&self) -> UnitOfWork {
        let operations = self.operations;
        let totals = self.totals.clone();
        Arc::new(move || {
            let start = Instant::now();
            let ops = run_iteration(operations, &mut rand::thread_rng());
            let ns = start.elapsed().as_nanos() as u64;
            totals.operations.fetch_add(ops.0, Ordering::Relaxed);
            totals.nanos.fetch_add(ns, Ordering::Relaxed);
            ns as i64
        })
    }

    fn status(&self) -> Vec<(String, String)> {
        let ops = self.totals.operations.load(Ordering::Relaxed);
        let nanos = self.totals.nanos.load(Ordering::Relaxed);
        let rate = if nanos == 0 {
            0.0
        } else {
            ops as f64 * 1e9 / nanos as f64
        };
        vec![
            ("operations".to_string(), ops.to_string()),
            ("ops/sec".to_string(), format!("{rate:.0}")),
        ]
    }
}

pub struct DataPoint {
    timestamp: i64,
    value: f64,
    label: String,
    _payload: Vec<u8>,
}

impl DataPoint {
    pub fn new(timestamp: i64, value: f64, label: String) -> Self {
        Self {
            timestamp,
            value,
            label,
            _payload: vec![0u8; 1024],
        }
    }

    pub fn compute(&self) -> f64 {
        let label_hash = self
            .label
            .bytes()
            .fold(0i32, |h, b| h.wrapping_mul(31).wrapping_add(b as i32));
        self.value.sin() * (self.timestamp as f64).cos() + label_hash as f64
    }
}

/// Create `operations` data points, folding over everything created so far
/// after every hundredth one. Returns the operation count and the checksum.
pub fn run_iteration(operations: usize, rng: &mut impl Rng) -> (u64, i64) {
    let epoch = Instant::now();
    let mut points = Vec::with_capacity(operations);
    let mut computed = 0i64;

    for i in 0..operations {
        points.push(DataPoint::new(
            epoch.elapsed().as_nanos() as i64,
            rng.gen::<f64>() * 1000.0,
            format!("data_{i}"),
        ));
        if i % 100 == 0 {
            computed = points
                .iter()
                .fold(computed, |acc, p| acc.wrapping_add(p.compute() as i64));
        }
    }
    computed = points
        .iter()
        .fold(computed, |acc, p| acc.wrapping_add(p.compute() as i64));

    (operations as u64, black_box(computed))
}
