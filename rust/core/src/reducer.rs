use crate::error::{HarnessError, Result};
use serde::Serialize;

pub const QUANTILES: [f64; 5] = [0.50, 0.90, 0.95, 0.99, 0.999];

/// Summary statistics over a finished sample set.
///
/// Percentiles use the truncating index `floor(count * q)` clamped to the
/// last element, with no interpolation between ranks.
#[derive(Debug, Clone, Serialize)]
pub struct PercentileSummary {
    pub count: usize,
    pub mean: f64,
    pub min: i64,
    pub p50: i64,
    pub p90: i64,
    pub p95: i64,
    pub p99: i64,
    pub p999: i64,
    pub max: i64,
    #[serde(skip)]
    sorted: Vec<i64>,
}

/// Copy `samples`, sort the copy and reduce it.
pub fn summarize(samples: &[i64]) -> Result<PercentileSummary> {
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    PercentileSummary::from_sorted(sorted)
}

impl PercentileSummary {
    /// Reduce an already ascending sample set.
    pub fn from_sorted(sorted: Vec<i64>) -> Result<Self> {
        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return Err(HarnessError::EmptySampleSet);
        };
        debug_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));

        let sum: i128 = sorted.iter().map(|&v| v as i128).sum();
        let mean = sum as f64 / sorted.len() as f64;

        Ok(Self {
            count: sorted.len(),
            mean,
            min,
            p50: percentile(&sorted, 0.50),
            p90: percentile(&sorted, 0.90),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            p999: percentile(&sorted, 0.999),
            max,
            sorted,
        })
    }

    /// Value at quantile `q` of the summarized set.
    pub fn quantile(&self, q: f64) -> i64 {
        percentile(&self.sorted, q)
    }

    /// Number of samples strictly greater than `threshold`.
    pub fn threshold_exceed_count(&self, threshold: i64) -> usize {
        self.count - self.sorted.partition_point(|&v| v <= threshold)
    }

    /// Share of samples strictly greater than `threshold`, in percent.
    pub fn threshold_exceed_percent(&self, threshold: i64) -> f64 {
        self.threshold_exceed_count(threshold) as f64 * 100.0 / self.count as f64
    }

    pub fn sum(&self) -> i128 {
        self.sorted.iter().map(|&v| v as i128).sum()
    }
}

/// Element at index `floor(q * n)`, clamped; `sorted` must be non-empty.
fn percentile(sorted: &[i64], q: f64) -> i64 {
    let idx = (q * sorted.len() as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
