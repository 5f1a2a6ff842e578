use crate::driver::RunResult;
use crate::process_stats::MemoryStats;
use crate::reducer::PercentileSummary;
use crate::workload::SampleKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct RawSample {
    pub seq: u64,
    pub value: i64,
}

/// Latency percentiles in microseconds.
#[derive(Debug, Clone, Serialize)]
pub struct LatencyStats {
    pub avg_us: f64,
    pub p50_us: f64,
    pub p90_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub p999_us: f64,
    pub max_us: f64,
}

impl LatencyStats {
    pub fn from_summary(s: &PercentileSummary) -> Self {
        Self {
            avg_us: s.mean / 1000.0,
            p50_us: ns_to_us(s.p50),
            p90_us: ns_to_us(s.p90),
            p95_us: ns_to_us(s.p95),
            p99_us: ns_to_us(s.p99),
            p999_us: ns_to_us(s.p999),
            max_us: ns_to_us(s.max),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdCount {
    pub threshold_ms: f64,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub demo: String,
    pub workload: String,
    pub mode: SampleKind,
    pub workers: usize,
    pub started_at: DateTime<Utc>,
    pub samples: u64,
    pub duration_s: f64,
    /// Samples per second.
    pub sample_rate: f64,
    /// Sum of sample values per second; meaningful in throughput mode.
    pub value_rate: f64,
    pub unit_label: String,
    pub latency: Option<LatencyStats>,
    pub thresholds: Vec<ThresholdCount>,
    pub memory: MemoryStats,
    pub status: Vec<(String, String)>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub summary: Summary,
    pub samples: Vec<RawSample>,
}

/// Number the measured run's samples in insertion order.
pub fn raw_samples(result: &RunResult) -> Vec<RawSample> {
    result
        .samples
        .iter()
        .enumerate()
        .map(|(seq, &value)| RawSample {
            seq: seq as u64,
            value,
        })
        .collect()
}

/// Count-above lines for latency thresholds.
pub fn threshold_counts(s: &PercentileSummary, thresholds: &[Duration]) -> Vec<ThresholdCount> {
    thresholds
        .iter()
        .map(|t| {
            let ns = i64::try_from(t.as_nanos()).unwrap_or(i64::MAX);
            ThresholdCount {
                threshold_ms: t.as_secs_f64() * 1000.0,
                count: s.threshold_exceed_count(ns),
                percent: s.threshold_exceed_percent(ns),
            }
        })
        .collect()
}

pub fn ns_to_us(ns: i64) -> f64 {
    ns as f64 / 1_000.0
}

pub fn ns_to_ms(ns: i64) -> f64 {
    ns as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::summarize;

    #[test]
    fn latency_stats_in_microseconds() {
        let s = summarize(&[1_000, 2_000, 3_000, 4_000]).unwrap();
        let stats = LatencyStats::from_summary(&s);
        assert_eq!(stats.avg_us, 2.5);
        assert_eq!(stats.p50_us, 3.0);
        assert_eq!(stats.max_us, 4.0);
    }

    #[test]
    fn threshold_lines() {
        let s = summarize(&[500_000, 2_000_000, 15_000_000, 700_000]).unwrap();
        let lines = threshold_counts(&s, &[Duration::from_millis(1), Duration::from_millis(10)]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].threshold_ms, 1.0);
        assert_eq!(lines[0].count, 2);
        assert_eq!(lines[0].percent, 50.0);
        assert_eq!(lines[1].count, 1);
    }

    #[test]
    fn summary_serializes_mode_in_lowercase() {
        let summary = Summary {
            demo: "allocation".into(),
            workload: "allocation".into(),
            mode: SampleKind::Throughput,
            workers: 1,
            started_at: Utc::now(),
            samples: 2,
            duration_s: 1.0,
            sample_rate: 2.0,
            value_rate: 20_000.0,
            unit_label: "objects".into(),
            latency: None,
            thresholds: Vec::new(),
            memory: MemoryStats::default(),
            status: vec![("allocated".into(), "19 MB".into())],
            cancelled: false,
        };
        let v = serde_json::to_value(&summary).unwrap();
        assert_eq!(v["mode"], "throughput");
        assert!(v["latency"].is_null());
        assert_eq!(v["status"][0][1], "19 MB");
    }

    #[test]
    fn unit_conversions() {
        assert_eq!(ns_to_us(1_500), 1.5);
        assert_eq!(ns_to_ms(2_500_000), 2.5);
    }
}
