use crate::core::Sample;
use std::fs;
use std::time::Instant;

use super::DeltaClock;

/// Raw `/proc/stat` CPU line: (user, nice, system, idle, iowait, irq,
/// softirq, steal). Guest/guest_nice are intentionally excluded, matching
/// the classic "busy = total - idle - iowait" convention.
#[derive(Clone, Copy, Default)]
struct CpuTimes {
    user: u64,
    nice: u64,
    system: u64,
    idle: u64,
    iowait: u64,
    irq: u64,
    softirq: u64,
    steal: u64,
}

impl CpuTimes {
    fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle + self.iowait + self.irq + self.softirq + self.steal
    }

    fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }

    fn parse(fields: &[&str]) -> Option<CpuTimes> {
        let v = |i: usize| fields.get(i).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        if fields.len() < 5 {
            return None;
        }
        Some(CpuTimes {
            user: v(1),
            nice: v(2),
            system: v(3),
            idle: v(4),
            iowait: v(5),
            irq: v(6),
            softirq: v(7),
            steal: v(8),
        })
    }
}

#[cfg(target_os = "linux")]
fn read_stat() -> Option<(CpuTimes, Vec<CpuTimes>)> {
    let content = fs::read_to_string("/proc/stat").ok()?;
    let mut total = None;
    let mut per_core = Vec::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.first() {
            Some(&"cpu") => total = CpuTimes::parse(&fields),
            Some(tag) if tag.starts_with("cpu") => {
                if let Some(t) = CpuTimes::parse(&fields) {
                    per_core.push(t);
                }
            }
            _ => {}
        }
    }
    Some((total?, per_core))
}

#[cfg(not(target_os = "linux"))]
fn read_stat() -> Option<(CpuTimes, Vec<CpuTimes>)> {
    None
}

fn usage_pct(prev: CpuTimes, cur: CpuTimes) -> Option<f64> {
    let total_delta = cur.total().saturating_sub(prev.total());
    if total_delta == 0 {
        return None;
    }
    let idle_delta = cur.idle_total().saturating_sub(prev.idle_total());
    let busy_delta = total_delta.saturating_sub(idle_delta);
    Some((busy_delta as f64 / total_delta as f64 * 100.0).clamp(0.0, 100.0))
}

/// Overall CPU utilization, `/proc/stat` "cpu" aggregate line on Linux.
/// Windows/macOS fall back to `sysinfo`'s cross-platform refresh, still
/// honoring the "need two samples" first-call contract via [`DeltaClock`].
pub struct CpuUsageCollector {
    clock: DeltaClock,
    prev: Option<CpuTimes>,
    #[cfg(not(target_os = "linux"))]
    sys: sysinfo::System,
}

impl CpuUsageCollector {
    pub fn new() -> Self {
        Self {
            clock: DeltaClock::new(),
            prev: None,
            #[cfg(not(target_os = "linux"))]
            sys: sysinfo::System::new(),
        }
    }

    #[cfg(target_os = "linux")]
    pub fn sample(&mut self) -> Option<Sample> {
        let now = Instant::now();
        let accepted = self.clock.tick(now);
        let (total, _) = read_stat()?;
        let prev = self.prev.replace(total);
        let _ = accepted?;
        let pct = usage_pct(prev?, total)?;
        Some(Sample::new(pct, "%", "CPU Usage"))
    }

    #[cfg(not(target_os = "linux"))]
    pub fn sample(&mut self) -> Option<Sample> {
        use sysinfo::CpuRefreshKind;
        let now = Instant::now();
        let accepted = self.clock.tick(now);
        self.sys.refresh_cpu_specifics(CpuRefreshKind::everything());
        let pct = self.sys.global_cpu_info().cpu_usage() as f64;
        accepted?;
        Some(Sample::new(pct.clamp(0.0, 100.0), "%", "CPU Usage"))
    }
}

impl Default for CpuUsageCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Busiest single core's utilization (per-core `/proc/stat` lines, max of
/// per-core deltas).
pub struct CpuMaxCoreCollector {
    clock: DeltaClock,
    prev: Option<Vec<CpuTimes>>,
    #[cfg(not(target_os = "linux"))]
    sys: sysinfo::System,
}

impl CpuMaxCoreCollector {
    pub fn new() -> Self {
        Self {
            clock: DeltaClock::new(),
            prev: None,
            #[cfg(not(target_os = "linux"))]
            sys: sysinfo::System::new(),
        }
    }

    #[cfg(target_os = "linux")]
    pub fn sample(&mut self) -> Option<Sample> {
        let now = Instant::now();
        let accepted = self.clock.tick(now);
        let (_, cores) = read_stat()?;
        let prev = self.prev.replace(cores.clone());
        accepted?;
        let prev = prev?;
        if prev.len() != cores.len() {
            return None;
        }
        let max = prev
            .iter()
            .zip(cores.iter())
            .filter_map(|(p, c)| usage_pct(*p, *c))
            .fold(0.0_f64, f64::max);
        Some(Sample::new(max, "%", "CPU Max Core"))
    }

    #[cfg(not(target_os = "linux"))]
    pub fn sample(&mut self) -> Option<Sample> {
        use sysinfo::CpuRefreshKind;
        let now = Instant::now();
        let accepted = self.clock.tick(now);
        self.sys.refresh_cpu_specifics(CpuRefreshKind::everything());
        let max = self
            .sys
            .cpus()
            .iter()
            .map(|c| c.cpu_usage() as f64)
            .fold(0.0_f64, f64::max);
        accepted?;
        Some(Sample::new(max.clamp(0.0, 100.0), "%", "CPU Max Core"))
    }
}

impl Default for CpuMaxCoreCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_pct_handles_equal_totals() {
        let t = CpuTimes { idle: 100, ..Default::default() };
        assert_eq!(usage_pct(t, t), None);
    }

    #[test]
    fn usage_pct_all_busy() {
        let prev = CpuTimes::default();
        let cur = CpuTimes { user: 100, ..Default::default() };
        assert_eq!(usage_pct(prev, cur), Some(100.0));
    }

    #[test]
    fn first_sample_is_none() {
        let mut c = CpuUsageCollector::new();
        // On a fresh collector the very first sample always has no prior
        // reading to diff against, matching the `/proc/stat` delta contract
        // regardless of platform.
        if cfg!(target_os = "linux") {
            assert!(c.sample().is_none());
        }
    }
}
