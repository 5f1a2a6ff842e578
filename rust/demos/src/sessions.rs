//! Session store that grows without bound, next to a bounded store with a
//! size cap and a TTL sweep.

use crate::{filled_buffer, mb};
use rand::Rng;
use rtdemo_core::{Demo, DemoFactory, SampleKind, UnitOfWork, Workload};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_sessions: usize,
    pub ttl: Duration,
    pub sweep_every: Duration,
}

pub struct SessionsFactory {
    bounded: bool,
}

impl SessionsFactory {
    pub fn leaking() -> Self {
        Self { bounded: false }
    }

    pub fn bounded() -> Self {
        Self { bounded: true }
    }
}

impl DemoFactory for SessionsFactory {
    fn name(&self) -> &'static str {
        if self.bounded {
            "session-bounded"
        } else {
            "session-leak"
        }
    }

    fn about(&self) -> &'static str {
        if self.bounded {
            "session store with a size cap and TTL sweep; memory stays flat"
        } else {
            "session store that is never cleaned; memory grows until the process dies"
        }
    }

    fn default_workload(&self) -> Workload {
        let mut wl = Workload::new(self.name(), self.name())
            .with_option("sessions_per_tick", 10)
            .with_option("session_bytes", crate::MIB);
        if self.bounded {
            wl = wl
                .with_option("max_sessions", 500)
                .with_option("ttl_secs", 300)
                .with_option("sweep_secs", 30);
        }
        wl.duration = Some(Duration::from_secs(40 * 60));
        wl.interval = Some(Duration::from_millis(100));
        wl.report_every = Some(Duration::from_secs(60));
        wl
    }

    fn create(&self, wl: &Workload) -> anyhow::Result<Box<dyn Demo>> {
        let per_tick = wl.option("sessions_per_tick", 10usize)?;
        let session_bytes = wl.option("session_bytes", crate::MIB)?;
        let limits = if self.bounded {
            let max_sessions = wl.option("max_sessions", 500usize)?;
            anyhow::ensure!(max_sessions > 0, "max_sessions must be positive");
            Some(SessionLimits {
                max_sessions,
                ttl: Duration::from_secs(wl.option("ttl_secs", 300u64)?),
                sweep_every: Duration::from_secs(wl.option("sweep_secs", 30u64)?),
            })
        } else {
            None
        };
        Ok(Box::new(SessionsDemo {
            per_tick,
            store: Arc::new(Mutex::new(SessionStore::new(session_bytes, limits))),
        }))
    }
}

struct SessionsDemo {
    per_tick: usize,
    store: Arc<Mutex<SessionStore>>,
}

impl SessionsDemo {
    fn store(&self) -> MutexGuard<'_, SessionStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Demo for SessionsDemo {
    fn kind(&self) -> SampleKind {
        SampleKind::Throughput
    }

    fn unit_label(&self) -> &'static str {
        "sessions"
    }

    fn unit_of_work(&self) -> UnitOfWork {
        let store = self.store.clone();
        let per_tick = self.per_tick;
        Arc::new(move || {
            let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
            for _ in 0..per_tick {
                store.create();
                store.touch_random(&mut rand::thread_rng());
            }
            let removed = store.maybe_sweep(Instant::now());
            if removed > 0 {
                info!(removed, "expired sessions swept");
            }
            per_tick as i64
        })
    }

    fn status(&self) -> Vec<(String, String)> {
        let store = self.store();
        let mut active = store.len().to_string();
        if let Some(limits) = store.limits {
            active = format!("{active} / {}", limits.max_sessions);
        }
        vec![
            ("active sessions".to_string(), active),
            ("created".to_string(), store.created.to_string()),
            ("removed".to_string(), store.removed.to_string()),
            ("retained".to_string(), mb(store.retained_bytes())),
        ]
    }
}

pub struct Session {
    pub id: String,
    pub created_at: Instant,
    pub last_access: Instant,
    data: Vec<u8>,
    activity: Vec<String>,
}

impl Session {
    fn new(id: String, bytes: usize, now: Instant) -> Self {
        let mut rng = rand::thread_rng();
        let activity = (0..100)
            .map(|i| format!("action_{}_{i}", rng.gen_range(0..1000)))
            .collect();
        Self {
            id,
            created_at: now,
            last_access: now,
            data: filled_buffer(bytes),
            activity,
        }
    }

    fn record(&mut self, activity: String, now: Instant) {
        self.last_access = now;
        self.activity.push(activity);
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_access) > ttl
    }

    pub fn activity_len(&self) -> usize {
        self.activity.len()
    }
}

/// Sessions in creation order. Without limits nothing is ever removed.
pub struct SessionStore {
    sessions: Vec<Session>,
    session_bytes: usize,
    limits: Option<SessionLimits>,
    last_sweep: Instant,
    created: u64,
    removed: u64,
}

impl SessionStore {
    pub fn new(session_bytes: usize, limits: Option<SessionLimits>) -> Self {
        Self {
            sessions: Vec::new(),
            session_bytes,
            limits,
            last_sweep: Instant::now(),
            created: 0,
            removed: 0,
        }
    }

    pub fn create(&mut self) -> &Session {
        self.create_at(Instant::now())
    }

    fn create_at(&mut self, now: Instant) -> &Session {
        if let Some(limits) = self.limits {
            while self.sessions.len() >= limits.max_sessions {
                self.evict_least_recent();
            }
        }
        let id = format!("session_{}", self.created);
        self.created += 1;
        let idx = self.sessions.len();
        self.sessions.push(Session::new(id, self.session_bytes, now));
        &self.sessions[idx]
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .sessions
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.last_access)
            .map(|(i, _)| i);
        if let Some(i) = oldest {
            self.sessions.remove(i);
            self.removed += 1;
        }
    }

    /// Record activity on a random session.
    pub fn touch_random<R: Rng>(&mut self, rng: &mut R) {
        self.touch_random_at(rng, Instant::now());
    }

    fn touch_random_at<R: Rng>(&mut self, rng: &mut R, now: Instant) {
        if self.sessions.is_empty() {
            return;
        }
        let i = rng.gen_range(0..self.sessions.len());
        self.sessions[i].record(format!("activity_{}", self.created), now);
    }

    /// Run the TTL sweep if the store is bounded and a sweep is due.
    pub fn maybe_sweep(&mut self, now: Instant) -> usize {
        let Some(limits) = self.limits else {
            return 0;
        };
        if now.saturating_duration_since(self.last_sweep) < limits.sweep_every {
            return 0;
        }
        self.last_sweep = now;
        self.sweep_expired(limits.ttl, now)
    }

    /// Remove sessions idle for longer than `ttl`.
    pub fn sweep_expired(&mut self, ttl: Duration, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|s| !s.is_expired(ttl, now));
        let removed = before - self.sessions.len();
        self.removed += removed as u64;
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn retained_bytes(&self) -> u64 {
        self.sessions.iter().map(|s| s.data.len() as u64).sum()
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn removed(&self) -> u64 {
        self.removed
    }
}
