pub mod config;
pub mod demo;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod pacer;
pub mod process_stats;
pub mod recorder;
pub mod reducer;
pub mod reporter;
pub mod runner;
pub mod workload;

pub use config::RunConfig;
pub use demo::{Demo, DemoFactory};
pub use driver::{run, CancelHandle, Driver, RunResult, UnitOfWork};
pub use error::{HarnessError, Result};
pub use metrics::{LatencyStats, RawSample, RunMetrics, Summary};
pub use recorder::SampleRecorder;
pub use reducer::{summarize, PercentileSummary};
pub use reporter::{Reporter, ReporterHandle, Snapshot};
pub use runner::{run_workload, Progress, RunOptions};
pub use workload::{SampleKind, Workload, WorkloadFile};
