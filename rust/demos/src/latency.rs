//! Request latency under a steady arrival rate. Each request allocates a
//! few buffers and folds over them; allocator stalls show up as tail
//! latency.

use rtdemo_core::{Demo, DemoFactory, SampleKind, UnitOfWork, Workload};
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct LatencyFactory;

impl DemoFactory for LatencyFactory {
    fn name(&self) -> &'static str {
        "latency"
    }

    fn about(&self) -> &'static str {
        "paced requests allocating small buffers; reports latency percentiles"
    }

    fn default_workload(&self) -> Workload {
        let mut wl = Workload::new("latency", self.name())
            .with_option("request_objects", 10)
            .with_option("object_bytes", 1024);
        wl.duration = Some(Duration::from_secs(30));
        // 10,000 requests per second
        wl.interval = Some(Duration::from_micros(100));
        wl.warmup = Some(Duration::from_secs(5));
        wl.report_every = Some(Duration::from_secs(5));
        wl.set_thresholds(&[Duration::from_millis(1), Duration::from_millis(10)]);
        wl
    }

    fn create(&self, wl: &Workload) -> anyhow::Result<Box<dyn Demo>> {
        Ok(Box::new(LatencyDemo {
            objects: wl.option("request_objects", 10usize)?,
            object_bytes: wl.option("object_bytes", 1024usize)?,
        }))
    }
}

struct LatencyDemo {
    objects: usize,
    object_bytes: usize,
}

impl Demo for LatencyDemo {
    fn kind(&self) -> SampleKind {
        SampleKind::Latency
    }

    fn unit_of_work(&self) -> UnitOfWork {
        let (objects, object_bytes) = (self.objects, self.object_bytes);
        Arc::new(move || {
            let request = Request::new(objects, object_bytes);
            let response = request.process();
            black_box(response.result);
            response.latency().as_nanos() as i64
        })
    }
}

pub struct Request {
    started: Instant,
    data: Vec<Vec<u8>>,
}

pub struct Response {
    started: Instant,
    pub result: usize,
}

impl Request {
    pub fn new(objects: usize, object_bytes: usize) -> Self {
        let started = Instant::now();
        let data = (0..objects).map(|_| vec![0u8; object_bytes]).collect();
        Self { started, data }
    }

    pub fn process(self) -> Response {
        let result = self.data.iter().map(|b| black_box(b).len()).sum();
        Response {
            started: self.started,
            result,
        }
    }
}

impl Response {
    /// Time since the request was created.
    pub fn latency(&self) -> Duration {
        self.started.elapsed()
    }
}
