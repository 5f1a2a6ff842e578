use anyhow::Result;
use serde::Serialize;

/// Memory figures of the current process.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct MemoryStats {
    /// Resident set size in bytes
    pub rss_bytes: Option<u64>,
    /// Peak resident set size in bytes
    pub peak_rss_bytes: Option<u64>,
}

impl MemoryStats {
    pub fn rss_mb(&self) -> Option<u64> {
        self.rss_bytes.map(|b| b / 1024 / 1024)
    }

    pub fn peak_rss_mb(&self) -> Option<u64> {
        self.peak_rss_bytes.map(|b| b / 1024 / 1024)
    }
}

/// Current memory stats; all fields are `None` where `/proc` is unavailable.
pub fn memory_stats() -> MemoryStats {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| parse_status(&status).ok())
        .unwrap_or_default()
}

/// Extract `VmRSS` and `VmHWM` from a `/proc/<pid>/status` body.
pub fn parse_status(status: &str) -> Result<MemoryStats> {
    let mut stats = MemoryStats::default();
    for line in status.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "VmRSS" => stats.rss_bytes = Some(parse_memory_size(value)?),
            "VmHWM" => stats.peak_rss_bytes = Some(parse_memory_size(value)?),
            _ => {}
        }
    }
    Ok(stats)
}

/// Parse memory size string (e.g., "123456 kB", "12 MB") to bytes
fn parse_memory_size(s: &str) -> Result<u64> {
    let s = s.trim();
    let (num_str, unit) = match s.split_once(char::is_whitespace) {
        Some((num, unit)) => (num, unit.trim()),
        None => (s, "B"),
    };

    let num = num_str.parse::<u64>()?;

    let bytes = match unit {
        "GB" | "gB" => num * 1024 * 1024 * 1024,
        "MB" | "mB" => num * 1024 * 1024,
        "kB" | "KB" => num * 1024,
        "B" => num,
        _ => anyhow::bail!("unknown memory unit in: {}", s),
    };

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_proc_status() {
        let status = "Name:\trtdemo\nVmPeak:\t  300000 kB\nVmHWM:\t    2048 kB\nVmRSS:\t    1024 kB\nThreads:\t4\n";
        let stats = parse_status(status).unwrap();
        assert_eq!(stats.rss_bytes, Some(1024 * 1024));
        assert_eq!(stats.peak_rss_bytes, Some(2048 * 1024));
        assert_eq!(stats.rss_mb(), Some(1));
        assert_eq!(stats.peak_rss_mb(), Some(2));
    }

    #[test]
    fn missing_fields_stay_none() {
        let stats = parse_status("Name:\tx\n").unwrap();
        assert_eq!(stats, MemoryStats::default());
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_memory_size("12 furlongs").is_err());
        assert_eq!(parse_memory_size("3 MB").unwrap(), 3 * 1024 * 1024);
        assert_eq!(parse_memory_size("17").unwrap(), 17);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn reads_own_status() {
        assert!(memory_stats().rss_bytes.unwrap_or(0) > 0);
    }
}
