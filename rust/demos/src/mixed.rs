//! Mixed workload: short-lived request buffers next to a long-lived shared
//! cache, with periodic allocation bursts and a TTL sweep of the cache.

use crate::background::Background;
use crate::filled_buffer;
use rand::Rng;
use rtdemo_core::{Demo, DemoFactory, SampleKind, UnitOfWork, Workload};
use std::collections::HashMap;
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::info;

pub struct MixedFactory;

impl DemoFactory for MixedFactory {
    fn name(&self) -> &'static str {
        "mixed"
    }

    fn about(&self) -> &'static str {
        "short-lived buffers plus a shared TTL cache, with periodic allocation bursts"
    }

    fn default_workload(&self) -> Workload {
        let mut wl = Workload::new("mixed", self.name())
            .with_option("keys", 10_000)
            .with_option("value_bytes", 10 * 1024)
            .with_option("burst_every_ms", 5_000)
            .with_option("cleanup_every_ms", 10_000)
            .with_option("ttl_ms", 30_000);
        wl.duration = Some(Duration::from_secs(60));
        wl.workers = 0;
        wl.interval = Some(Duration::from_millis(1));
        wl.report_every = Some(Duration::from_secs(5));
        wl.set_thresholds(&[Duration::from_millis(1), Duration::from_millis(10)]);
        wl
    }

    fn create(&self, wl: &Workload) -> anyhow::Result<Box<dyn Demo>> {
        let keys = wl.option("keys", 10_000usize)?;
        anyhow::ensure!(keys > 0, "keys must be positive");
        let value_bytes = wl.option("value_bytes", 10 * 1024usize)?;
        let burst_every = Duration::from_millis(wl.option("burst_every_ms", 5_000u64)?);
        let cleanup_every = Duration::from_millis(wl.option("cleanup_every_ms", 10_000u64)?);
        let ttl = Duration::from_millis(wl.option("ttl_ms", 30_000u64)?);

        let cache = Arc::new(Cache::new(value_bytes));
        cache.prefill(keys / 2);
        info!(entries = cache.len(), "cache initialised");

        let bursts = Arc::new(AtomicU64::new(0));
        let mut helpers = Vec::new();
        {
            let bursts = bursts.clone();
            helpers.push(Background::spawn("burst-generator", burst_every, move || {
                generate_burst(10_000, 1024);
                bursts.fetch_add(1, Ordering::Relaxed);
            })?);
        }
        {
            let cache = cache.clone();
            helpers.push(Background::spawn("cache-cleanup", cleanup_every, move || {
                let removed = cache.evict_expired(ttl, Instant::now());
                if removed > 0 {
                    info!(removed, "cache cleanup");
                }
            })?);
        }

        Ok(Box::new(MixedDemo {
            keys,
            cache,
            bursts,
            helpers: Mutex::new(helpers),
        }))
    }
}

struct MixedDemo {
    keys: usize,
    cache: Arc<Cache>,
    bursts: Arc<AtomicU64>,
    helpers: Mutex<Vec<Background>>,
}

impl Demo for MixedDemo {
    fn kind(&self) -> SampleKind {
        SampleKind::Latency
    }

    fn unit_of_work(&self) -> UnitOfWork {
        let cache = self.cache.clone();
        let keys = self.keys;
        Arc::new(move || {
            let start = Instant::now();

            let short_lived: Vec<Vec<u8>> = (0..100).map(|_| vec![0u8; 1024]).collect();
            let key = rand::thread_rng().gen_range(0..keys);
            cache.access(&format!("cache_{key}"));
            let result: usize = short_lived.iter().map(|b| black_box(b).len()).sum();
            black_box(result);

            start.elapsed().as_nanos() as i64
        })
    }

    fn status(&self) -> Vec<(String, String)> {
        vec![
            ("cache entries".to_string(), self.cache.len().to_string()),
            ("evicted".to_string(), self.cache.evicted().to_string()),
            (
                "bursts".to_string(),
                self.bursts.load(Ordering::Relaxed).to_string(),
            ),
        ]
    }

    fn shutdown(&self) {
        let mut helpers = self.helpers.lock().unwrap_or_else(PoisonError::into_inner);
        for helper in helpers.iter_mut() {
            helper.stop();
        }
        helpers.clear();
    }
}

pub struct CachedObject {
    data: Vec<u8>,
    last_accessed: Instant,
    access_count: u64,
}

impl CachedObject {
    fn new(size: usize, now: Instant) -> Self {
        Self {
            data: filled_buffer(size),
            last_accessed: now,
            access_count: 0,
        }
    }

    fn access(&mut self, now: Instant) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_accessed) > ttl
    }
}

/// Shared cache of long-lived values, keyed by name.
pub struct Cache {
    entries: Mutex<HashMap<String, CachedObject>>,
    value_bytes: usize,
    evicted: AtomicU64,
}

impl Cache {
    pub fn new(value_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            value_bytes,
            evicted: AtomicU64::new(0),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CachedObject>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn prefill(&self, count: usize) {
        let now = Instant::now();
        let mut entries = self.entries();
        for i in 0..count {
            entries.insert(format!("cache_{i}"), CachedObject::new(self.value_bytes, now));
        }
    }

    /// Touch `key`, creating it when absent. Returns its access count.
    pub fn access(&self, key: &str) -> u64 {
        let now = Instant::now();
        let mut entries = self.entries();
        let obj = entries
            .entry(key.to_string())
            .or_insert_with(|| CachedObject::new(self.value_bytes, now));
        obj.access(now);
        black_box(obj.data.len());
        obj.access_count
    }

    /// Remove entries idle for longer than `ttl` as of `now`.
    pub fn evict_expired(&self, ttl: Duration, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, obj| !obj.is_expired(ttl, now));
        let removed = before - entries.len();
        self.evicted.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

/// Allocate and drop `count` buffers in one go.
pub fn generate_burst(count: usize, bytes: usize) -> usize {
    let burst: Vec<Vec<u8>> = (0..count).map(|_| vec![0u8; bytes]).collect();
    black_box(&burst).len()
}
