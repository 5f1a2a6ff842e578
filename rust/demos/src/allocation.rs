//! Allocation rate: short-lived buffers created as fast as possible.

use crate::mb;
use rtdemo_core::{Demo, DemoFactory, SampleKind, UnitOfWork, Workload};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct AllocationFactory;

impl DemoFactory for AllocationFactory {
    fn name(&self) -> &'static str {
        "allocation"
    }

    fn about(&self) -> &'static str {
        "allocates batches of short-lived buffers as fast as possible"
    }

    fn default_workload(&self) -> Workload {
        let mut wl = Workload::new("allocation", self.name())
            .with_option("batch", 10_000)
            .with_option("object_bytes", 1024);
        wl.duration = Some(Duration::from_secs(30));
        wl.report_every = Some(Duration::from_secs(5));
        wl
    }

    fn create(&self, wl: &Workload) -> anyhow::Result<Box<dyn Demo>> {
        let batch = wl.option("batch", 10_000usize)?;
        let object_bytes = wl.option("object_bytes", 1024usize)?;
        anyhow::ensure!(batch > 0, "batch must be positive");
        Ok(Box::new(AllocationDemo {
            batch,
            object_bytes,
            allocated: Arc::new(AtomicU64::new(0)),
        }))
    }
}

struct AllocationDemo {
    batch: usize,
    object_bytes: usize,
    allocated: Arc<AtomicU64>,
}

impl Demo for AllocationDemo {
    fn kind(&self) -> SampleKind {
        SampleKind::Throughput
    }

    fn unit_label(&self) -> &'static str {
        "objects"
    }

    fn unit_of_work(&self) -> UnitOfWork {
        let (batch, object_bytes) = (self.batch, self.object_bytes);
        let allocated = self.allocated.clone();
        Arc::new(move || {
            let created = allocate_batch(batch, object_bytes);
            allocated.fetch_add((created * object_bytes) as u64, Ordering::Relaxed);
            created as i64
        })
    }

    fn status(&self) -> Vec<(String, String)> {
        vec![(
            "allocated".to_string(),
            mb(self.allocated.load(Ordering::Relaxed)),
        )]
    }
}

/// Allocate `count` buffers of `bytes` each and drop them together.
pub fn allocate_batch(count: usize, bytes: usize) -> usize {
    let mut batch = Vec::with_capacity(count);
    for _ in 0..count {
        batch.push(black_box(vec![0u8; bytes]));
    }
    black_box(&batch);
    batch.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_reports_objects_created() {
        assert_eq!(allocate_batch(128, 16), 128);
    }

    #[test]
    fn unit_of_work_counts_bytes() {
        let wl = AllocationFactory
            .default_workload()
            .with_option("batch", 10)
            .with_option("object_bytes", 1024 * 1024);
        let demo = AllocationFactory.create(&wl).unwrap();
        let unit = demo.unit_of_work();
        assert_eq!(unit(), 10);
        assert_eq!(unit(), 10);
        assert_eq!(demo.status()[0].1, "20 MB");
        assert_eq!(demo.kind(), SampleKind::Throughput);
    }

    #[test]
    fn rejects_empty_batch() {
        let wl = AllocationFactory.default_workload().with_option("batch", 0);
        assert!(AllocationFactory.create(&wl).is_err());
    }
}
