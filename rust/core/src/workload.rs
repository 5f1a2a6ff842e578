use crate::config::RunConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// What a demo's samples mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// Nanoseconds taken by one unit of work.
    Latency,
    /// Operations completed by one unit of work.
    Throughput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub demo: String,
    #[serde(default, with = "humantime_serde")]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub iterations: u64,
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
    /// Zero means one worker per available CPU.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default, with = "humantime_serde")]
    pub report_every: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub warmup: Option<Duration>,
    #[serde(default)]
    pub warmup_iterations: u64,
    /// Latency thresholds reported as "count above" lines.
    #[serde(default)]
    pub thresholds: Vec<humantime_serde::Serde<Duration>>,
    /// Demo specific knobs.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn default_workers() -> usize {
    1
}

impl Workload {
    pub fn new(name: &str, demo: &str) -> Self {
        Self {
            name: name.to_string(),
            demo: demo.to_string(),
            duration: None,
            iterations: 0,
            interval: None,
            workers: 1,
            report_every: None,
            warmup: None,
            warmup_iterations: 0,
            thresholds: Vec::new(),
            options: HashMap::new(),
        }
    }

    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            self.workers
        }
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            duration: self.duration.unwrap_or_default(),
            iterations: self.iterations,
            interval: self.interval.unwrap_or_default(),
            workers: self.resolved_workers(),
            report_every: self.report_every.unwrap_or_default(),
        }
    }

    /// Config of the warm-up run, if one was requested. Warm-ups keep the
    /// measured run's pacing and workers but never report.
    pub fn warmup_config(&self) -> Option<RunConfig> {
        let base = match self.warmup {
            Some(d) if !d.is_zero() => RunConfig::for_duration(d),
            _ if self.warmup_iterations > 0 => RunConfig::for_iterations(self.warmup_iterations),
            _ => return None,
        };
        Some(
            base.paced(self.interval.unwrap_or_default())
                .with_workers(self.resolved_workers()),
        )
    }

    pub fn thresholds(&self) -> Vec<Duration> {
        self.thresholds.iter().map(|t| **t).collect()
    }

    pub fn set_thresholds(&mut self, thresholds: &[Duration]) {
        self.thresholds = thresholds.iter().copied().map(Into::into).collect();
    }

    pub fn with_option(mut self, key: &str, value: impl ToString) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    /// Parse option `key`, falling back to `default` when absent.
    pub fn option<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.options.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("option {key}={raw}: {e}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkloadFile;

impl WorkloadFile {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Workload> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading workload {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("parsing workload {}", path.display()))
    }

    pub fn parse(s: &str) -> anyhow::Result<Workload> {
        let wl: Workload = serde_yaml::from_str(s)?;
        Ok(wl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATENCY: &str = r#"
name: latency-10k
demo: latency
duration: 30s
interval: 100us
report_every: 5s
warmup: 5s
thresholds: [1ms, 10ms]
options:
  request_objects: "10"
"#;

    #[test]
    fn parses_humantime_fields() {
        let wl = WorkloadFile::parse(LATENCY).unwrap();
        assert_eq!(wl.duration, Some(Duration::from_secs(30)));
        assert_eq!(wl.interval, Some(Duration::from_micros(100)));
        assert_eq!(wl.workers, 1);
        assert_eq!(
            wl.thresholds(),
            vec![Duration::from_millis(1), Duration::from_millis(10)]
        );
        assert_eq!(wl.option("request_objects", 0usize).unwrap(), 10);
        assert_eq!(wl.option("missing", 7u32).unwrap(), 7);
    }

    #[test]
    fn converts_to_run_config() {
        let wl = WorkloadFile::parse(LATENCY).unwrap();
        let cfg = wl.run_config();
        assert_eq!(cfg.duration, Duration::from_secs(30));
        assert_eq!(cfg.iterations, 0);
        assert_eq!(cfg.interval, Duration::from_micros(100));
        assert_eq!(cfg.report_every, Duration::from_secs(5));
        assert!(cfg.validate().is_ok());

        let warm = wl.warmup_config().unwrap();
        assert_eq!(warm.duration, Duration::from_secs(5));
        assert_eq!(warm.interval, Duration::from_micros(100));
        assert!(warm.report_every.is_zero());
    }

    #[test]
    fn iteration_warmup_and_cpu_workers() {
        let wl = WorkloadFile::parse(
            "name: t\ndemo: throughput\niterations: 5\nwarmup_iterations: 3\nworkers: 0\n",
        )
        .unwrap();
        assert!(wl.resolved_workers() >= 1);
        let warm = wl.warmup_config().unwrap();
        assert_eq!(warm.iterations, 3);
        assert!(warm.duration.is_zero());
    }

    #[test]
    fn no_warmup_by_default() {
        let wl = Workload::new("x", "allocation");
        assert!(wl.warmup_config().is_none());
        assert!(wl.run_config().validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latency.yaml");
        std::fs::write(&path, LATENCY).unwrap();
        assert_eq!(WorkloadFile::load(&path).unwrap().demo, "latency");

        let err = WorkloadFile::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn bad_option_is_reported() {
        let wl = Workload::new("x", "branch").with_option("size", "lots");
        let err = wl.option("size", 1usize).unwrap_err();
        assert!(err.to_string().contains("size=lots"));
    }
}
