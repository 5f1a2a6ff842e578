use rtdemo_core::metrics::ThresholdCount;
use rtdemo_core::process_stats::MemoryStats;
use rtdemo_core::{SampleKind, Snapshot, Summary};
use std::fmt::Write;

/// One progress line for a periodic snapshot.
pub fn progress_line(snap: &Snapshot, mode: SampleKind, unit: &str, status: &[(String, String)]) -> String {
    let mut line = format!(
        "[{:>7.1}s] samples {} (+{}, {:.1}/s)",
        snap.elapsed_seconds, snap.total_count, snap.interval_count, snap.interval_rate_per_second
    );
    if mode == SampleKind::Throughput {
        let _ = write!(
            line,
            " | {} {unit}/s",
            human_rate(snap.interval_value_rate_per_second)
        );
    }
    for (key, value) in status {
        let _ = write!(line, " | {key}: {value}");
    }
    line
}

/// Final multi-line report.
pub fn render(summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ({}) ===", summary.demo, summary.workload);
    if summary.cancelled {
        let _ = writeln!(out, "run cancelled; partial results");
    }
    let _ = writeln!(
        out,
        "samples: {} in {:.2}s with {} worker(s) ({:.1}/s)",
        summary.samples, summary.duration_s, summary.workers, summary.sample_rate
    );
    match (summary.mode, &summary.latency) {
        (SampleKind::Latency, Some(l)) => {
            let _ = writeln!(out, "latency (us):");
            for (label, v) in [
                ("avg", l.avg_us),
                ("p50", l.p50_us),
                ("p90", l.p90_us),
                ("p95", l.p95_us),
                ("p99", l.p99_us),
                ("p99.9", l.p999_us),
                ("max", l.max_us),
            ] {
                let _ = writeln!(out, "  {label:<6} {v:>12.2}");
            }
            for t in &summary.thresholds {
                let _ = writeln!(out, "{}", threshold_line(t));
            }
        }
        (SampleKind::Latency, None) => {
            let _ = writeln!(out, "no samples recorded");
        }
        (SampleKind::Throughput, _) => {
            let _ = writeln!(
                out,
                "throughput: {} {}/s",
                human_rate(summary.value_rate),
                summary.unit_label
            );
        }
    }
    let _ = writeln!(out, "memory: {}", memory_line(&summary.memory));
    for (key, value) in &summary.status {
        let _ = writeln!(out, "{key}: {value}");
    }
    out
}

pub fn threshold_line(t: &ThresholdCount) -> String {
    format!("  > {} ms: {} ({:.3}%)", t.threshold_ms, t.count, t.percent)
}

fn memory_line(m: &MemoryStats) -> String {
    match (m.rss_mb(), m.peak_rss_mb()) {
        (Some(rss), Some(peak)) => format!("rss {rss} MB, peak {peak} MB"),
        (Some(rss), None) => format!("rss {rss} MB"),
        _ => "unavailable".to_string(),
    }
}

/// Scale a per-second rate to K/M/G.
pub fn human_rate(rate: f64) -> String {
    match rate {
        r if r >= 1e9 => format!("{:.2}G", r / 1e9),
        r if r >= 1e6 => format!("{:.2}M", r / 1e6),
        r if r >= 1e3 => format!("{:.2}K", r / 1e3),
        r => format!("{r:.1}"),
    }
}
