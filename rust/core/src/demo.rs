use crate::driver::UnitOfWork;
use crate::workload::{SampleKind, Workload};

/// A running demo: owns whatever state its unit of work touches
/// (caches, session stores, event buses) and the helpers around it.
pub trait Demo: Send + Sync {
    /// Meaning of the samples the unit of work returns.
    fn kind(&self) -> SampleKind;

    /// A fresh handle to the operation under measurement. Called once per
    /// run phase; all workers of the phase share it.
    fn unit_of_work(&self) -> UnitOfWork;

    /// Label for one unit of a throughput sample, e.g. "objects".
    fn unit_label(&self) -> &'static str {
        "ops"
    }

    /// Demo specific state shown next to progress snapshots and results.
    fn status(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Stop background helpers. Called once after the measured run.
    fn shutdown(&self) {}
}

/// Creates demo instances and describes their default workload.
pub trait DemoFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn about(&self) -> &'static str;

    /// Budget and knobs the demo runs with when no workload file is given.
    fn default_workload(&self) -> Workload;

    fn create(&self, workload: &Workload) -> anyhow::Result<Box<dyn Demo>>;
}
