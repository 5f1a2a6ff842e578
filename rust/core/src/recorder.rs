use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counters readable without touching the sample lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub samples: u64,
    /// Running sum of sample values (wrapping).
    pub total: i64,
}

/// Append-only store of samples shared by all workers of a run.
///
/// Each `record` holds the lock for a single push only. The counters are
/// updated inside the same critical section so `len` never disagrees with
/// the stored samples once a writer has returned.
pub struct SampleRecorder {
    samples: Mutex<Vec<i64>>,
    count: AtomicU64,
    total: AtomicI64,
}

impl Default for SampleRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleRecorder {
    pub fn new() -> Self {
        Self::with_capacity(100_000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(Vec::with_capacity(capacity)),
            count: AtomicU64::new(0),
            total: AtomicI64::new(0),
        }
    }

    pub fn record(&self, sample: i64) {
        let mut samples = self.lock();
        samples.push(sample);
        self.count.fetch_add(1, Ordering::Release);
        self.total.fetch_add(sample, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot_count(&self) -> Counts {
        Counts {
            samples: self.count.load(Ordering::Acquire),
            total: self.total.load(Ordering::Relaxed),
        }
    }

    /// Point-in-time copy in insertion order.
    pub fn snapshot(&self) -> Vec<i64> {
        self.lock().clone()
    }

    /// Point-in-time copy sorted ascending; the live store is left as is.
    pub fn drain_sorted(&self) -> Vec<i64> {
        let mut sorted = self.snapshot();
        sorted.sort_unstable();
        sorted
    }

    pub fn clear(&self) {
        let mut samples = self.lock();
        samples.clear();
        self.count.store(0, Ordering::Release);
        self.total.store(0, Ordering::Relaxed);
    }

    // A panicking unit of work never runs while the lock is held, so the
    // vector is consistent even if the mutex reports poisoning.
    fn lock(&self) -> MutexGuard<'_, Vec<i64>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
