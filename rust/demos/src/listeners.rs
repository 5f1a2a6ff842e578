//! Event bus whose subscribers are never removed, next to one where each
//! subscription is released when the subscriber goes out of scope.

use crate::{filled_buffer, mb};
use rand::Rng;
use rtdemo_core::{Demo, DemoFactory, SampleKind, UnitOfWork, Workload};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Listener: Send + Sync {
    fn on_event(&self, event: &str);

    /// Heap bytes kept alive by this listener.
    fn retained_bytes(&self) -> usize {
        0
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, Arc<dyn Listener>>,
}

/// Publishes events to every registered listener.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self, listener: Arc<dyn Listener>) -> Subscription {
        let mut reg = self.registry();
        let id = reg.next_id;
        reg.next_id += 1;
        reg.listeners.insert(id, listener);
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Deliver `event` to the listeners registered when the call started.
    /// Listeners run outside the registry lock.
    pub fn publish(&self, event: &str) -> usize {
        let listeners: Vec<_> = self.registry().listeners.values().cloned().collect();
        for listener in &listeners {
            listener.on_event(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.registry().listeners.len()
    }

    pub fn retained_bytes(&self) -> u64 {
        self.registry()
            .listeners
            .values()
            .map(|l| l.retained_bytes() as u64)
            .sum()
    }
}

/// Registration handle. Dropping it unsubscribes the listener.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<Mutex<Registry>>,
    id: Option<u64>,
}

impl Subscription {
    /// Give up the handle without unsubscribing. The bus keeps the listener
    /// for as long as the bus lives.
    pub fn detach(mut self) {
        self.id = None;
    }

    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let (Some(id), Some(bus)) = (self.id.take(), self.bus.upgrade()) else {
            return;
        };
        bus.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .remove(&id);
    }
}

/// Heavy subscriber: holds a large buffer plus every event it has seen.
pub struct DataProcessor {
    pub id: String,
    buffer: Vec<u8>,
    processed: Mutex<Vec<String>>,
}

impl DataProcessor {
    pub fn new(id: String, buffer_bytes: usize) -> Self {
        Self {
            id,
            buffer: filled_buffer(buffer_bytes),
            processed: Mutex::new(Vec::new()),
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Listener for DataProcessor {
    fn on_event(&self, event: &str) {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.to_string());
    }

    fn retained_bytes(&self) -> usize {
        self.buffer.len()
    }
}

pub struct ListenersFactory {
    scoped: bool,
}

impl ListenersFactory {
    pub fn leaking() -> Self {
        Self { scoped: false }
    }

    pub fn scoped() -> Self {
        Self { scoped: true }
    }
}

impl DemoFactory for ListenersFactory {
    fn name(&self) -> &'static str {
        if self.scoped {
            "listener-scoped"
        } else {
            "listener-leak"
        }
    }

    fn about(&self) -> &'static str {
        if self.scoped {
            "processors unsubscribe when dropped; listener count stays at zero"
        } else {
            "processors subscribe to an event bus and are never unsubscribed"
        }
    }

    fn default_workload(&self) -> Workload {
        let mut wl = Workload::new(self.name(), self.name())
            .with_option("processors_per_tick", 5)
            .with_option("buffer_bytes", 10 * crate::MIB);
        wl.duration = Some(Duration::from_secs(40 * 60));
        wl.interval = Some(Duration::from_millis(200));
        wl.report_every = Some(Duration::from_secs(60));
        wl
    }

    fn create(&self, wl: &Workload) -> anyhow::Result<Box<dyn Demo>> {
        Ok(Box::new(ListenersDemo {
            scoped: self.scoped,
            per_tick: wl.option("processors_per_tick", 5usize)?,
            buffer_bytes: wl.option("buffer_bytes", 10 * crate::MIB)?,
            bus: EventBus::new(),
            created: Arc::new(AtomicU64::new(0)),
        }))
    }
}

struct ListenersDemo {
    scoped: bool,
    per_tick: usize,
    buffer_bytes: usize,
    bus: EventBus,
    created: Arc<AtomicU64>,
}

impl Demo for ListenersDemo {
    fn kind(&self) -> SampleKind {
        SampleKind::Throughput
    }

    fn unit_label(&self) -> &'static str {
        "processors"
    }

    fn unit_of_work(&self) -> UnitOfWork {
        let bus = self.bus.clone();
        let created = self.created.clone();
        let (scoped, per_tick, buffer_bytes) = (self.scoped, self.per_tick, self.buffer_bytes);
        Arc::new(move || {
            for _ in 0..per_tick {
                let n = created.fetch_add(1, Ordering::Relaxed);
                let processor = Arc::new(DataProcessor::new(format!("proc_{n}"), buffer_bytes));
                let subscription = bus.subscribe(processor);
                bus.publish(&format!("event_{}", now_millis()));
                if !scoped {
                    subscription.detach();
                }
            }
            if rand::thread_rng().gen_ratio(1, 10) {
                bus.publish(&format!("periodic_event_{}", now_millis()));
            }
            per_tick as i64
        })
    }

    fn status(&self) -> Vec<(String, String)> {
        vec![
            (
                "active listeners".to_string(),
                self.bus.listener_count().to_string(),
            ),
            (
                "created".to_string(),
                self.created.load(Ordering::Relaxed).to_string(),
            ),
            ("retained".to_string(), mb(self.bus.retained_bytes())),
        ]
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus = EventBus::new();
        let p = Arc::new(DataProcessor::new("p".into(), 16));
        let sub = bus.subscribe(p.clone());
        assert_eq!(bus.listener_count(), 1);
        assert_eq!(bus.publish("a"), 1);
        drop(sub);
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.publish("b"), 0);
        assert_eq!(p.processed(), 1);
    }

    #[test]
    fn detached_subscription_stays_registered() {
        let bus = EventBus::new();
        let p = Arc::new(DataProcessor::new("p".into(), 64));
        bus.subscribe(p.clone()).detach();
        bus.publish("a");
        bus.publish("b");
        assert_eq!(bus.listener_count(), 1);
        assert_eq!(bus.retained_bytes(), 64);
        assert_eq!(p.processed(), 2);
    }

    #[test]
    fn cancel_and_outliving_the_bus() {
        let bus = EventBus::new();
        let sub = bus.subscribe(Arc::new(DataProcessor::new("p".into(), 1)));
        sub.cancel();
        assert_eq!(bus.listener_count(), 0);

        let sub = bus.subscribe(Arc::new(DataProcessor::new("q".into(), 1)));
        drop(bus);
        drop(sub);
    }

    #[test]
    fn listener_may_subscribe_while_handling_an_event() {
        struct Spawner {
            bus: EventBus,
        }
        impl Listener for Spawner {
            fn on_event(&self, _event: &str) {
                self.bus
                    .subscribe(Arc::new(DataProcessor::new("child".into(), 1)))
                    .detach();
            }
        }

        let bus = EventBus::new();
        bus.subscribe(Arc::new(Spawner { bus: bus.clone() })).detach();
        // the new child is not part of this delivery
        assert_eq!(bus.publish("x"), 1);
        assert_eq!(bus.listener_count(), 2);
    }

    #[test]
    fn leak_and_scoped_demos() {
        let small = |f: &ListenersFactory| f.default_workload().with_option("buffer_bytes", 1024);

        let leak = ListenersFactory::leaking();
        let demo = leak.create(&small(&leak)).unwrap();
        let unit = demo.unit_of_work();
        assert_eq!(unit(), 5);
        unit();
        let status = demo.status();
        assert_eq!(status[0].1, "10");
        assert_eq!(status[1].1, "10");

        let scoped = ListenersFactory::scoped();
        let demo = scoped.create(&small(&scoped)).unwrap();
        let unit = demo.unit_of_work();
        unit();
        unit();
        let status = demo.status();
        assert_eq!(status[0].1, "0");
        assert_eq!(status[1].1, "10");
        assert_eq!(status[2].1, "0 MB");
    }
}
