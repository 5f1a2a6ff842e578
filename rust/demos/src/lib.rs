//! Demo workloads that drive the measurement harness: allocation pressure,
//! request latency, batch throughput, a mixed cache workload, leak patterns
//! next to their fixes, and branch prediction.

pub mod allocation;
pub mod background;
pub mod branch;
pub mod latency;
pub mod listeners;
pub mod mixed;
pub mod sessions;
pub mod throughput;

use rtdemo_core::DemoFactory;

pub use allocation::AllocationFactory;
pub use branch::BranchFactory;
pub use latency::LatencyFactory;
pub use listeners::ListenersFactory;
pub use mixed::MixedFactory;
pub use sessions::SessionsFactory;
pub use throughput::ThroughputFactory;

pub const MIB: usize = 1024 * 1024;

pub fn factories() -> Vec<Box<dyn DemoFactory>> {
    vec![
        Box::new(AllocationFactory),
        Box::new(LatencyFactory),
        Box::new(ThroughputFactory),
        Box::new(MixedFactory),
        Box::new(SessionsFactory::leaking()),
        Box::new(SessionsFactory::bounded()),
        Box::new(ListenersFactory::leaking()),
        Box::new(ListenersFactory::scoped()),
        Box::new(BranchFactory),
    ]
}

pub fn find(name: &str) -> Option<Box<dyn DemoFactory>> {
    factories().into_iter().find(|f| f.name() == name)
}

/// A buffer whose pages are actually touched, so it shows up in RSS.
pub(crate) fn filled_buffer(bytes: usize) -> Vec<u8> {
    vec![0xA5; bytes]
}

/// Status value in whole megabytes.
pub(crate) fn mb(bytes: u64) -> String {
    format!("{} MB", bytes / MIB as u64)
}
