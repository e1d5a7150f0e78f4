use std::fs;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// RAM usage is a structured reading rather than a single [`Sample`](crate::core::Sample):
/// spec §4.4 calls for `{ used_gib, total_gib, used_pct }` together, since
/// the UI always shows all three at once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RamReading {
    pub used_gib: f64,
    pub total_gib: f64,
    pub used_pct: f64,
}

#[cfg(target_os = "linux")]
fn read_meminfo() -> Option<RamReading> {
    let content = fs::read_to_string("/proc/meminfo").ok()?;
    let mut total_kib = None;
    let mut available_kib = None;
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        let value: u64 = parts[1].parse().ok()?;
        match parts[0] {
            "MemTotal:" => total_kib = Some(value),
            "MemAvailable:" => available_kib = Some(value),
            _ => {}
        }
    }
    let total_kib = total_kib?;
    let available_kib = available_kib.unwrap_or(0);
    let total_gib = (total_kib as f64 * 1024.0) / GIB;
    let used_gib = ((total_kib.saturating_sub(available_kib)) as f64 * 1024.0) / GIB;
    let used_pct = if total_gib > 0.0 {
        (used_gib / total_gib * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    Some(RamReading { used_gib, total_gib, used_pct })
}

#[cfg(not(target_os = "linux"))]
fn read_meminfo() -> Option<RamReading> {
    use sysinfo::System;
    let mut sys = System::new();
    sys.refresh_memory();
    let total_gib = sys.total_memory() as f64 / GIB;
    let used_gib = sys.used_memory() as f64 / GIB;
    let used_pct = if total_gib > 0.0 {
        (used_gib / total_gib * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    Some(RamReading { used_gib, total_gib, used_pct })
}

/// `RamUsage` has no delta to wait on — every reading is immediate.
pub struct RamUsageCollector;

impl RamUsageCollector {
    pub fn new() -> Self {
        Self
    }

    pub fn sample(&mut self) -> Option<RamReading> {
        read_meminfo()
    }
}

impl Default for RamUsageCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_os = "linux")]
    fn reads_real_meminfo() {
        let mut c = RamUsageCollector::new();
        let reading = c.sample().expect("/proc/meminfo should be readable in CI");
        assert!(reading.total_gib > 0.0);
        assert!(reading.used_pct >= 0.0 && reading.used_pct <= 100.0);
    }
}
