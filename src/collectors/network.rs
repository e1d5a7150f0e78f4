use std::fs;
use std::time::Instant;

use super::DeltaClock;

const MB: f64 = 1024.0 * 1024.0;

/// Aggregate rx/tx bytes across every non-loopback interface, from
/// `/proc/net/dev` (two header lines, then `iface: rx_bytes ... tx_bytes ...`
/// with rx fields at offset 1 and tx fields at offset 9 after the interface
/// name).
#[cfg(target_os = "linux")]
fn read_net_dev() -> Option<(u64, u64)> {
    let content = fs::read_to_string("/proc/net/dev").ok()?;
    let mut rx_bytes = 0u64;
    let mut tx_bytes = 0u64;
    for line in content.lines().skip(2) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 17 {
            continue;
        }
        let iface = fields[0].trim_end_matches(':');
        if iface == "lo" {
            continue;
        }
        rx_bytes += fields[1].parse::<u64>().unwrap_or(0);
        tx_bytes += fields[9].parse::<u64>().unwrap_or(0);
    }
    Some((rx_bytes, tx_bytes))
}

#[cfg(not(target_os = "linux"))]
fn read_net_dev() -> Option<(u64, u64)> {
    None
}

/// Network Rx/Tx bandwidth, `/proc/net/dev` aggregate on Linux. Off Linux
/// this reports `None`; spec §4.4's `GetIfTable2` alternative is out of
/// scope without the full `windows` networking surface built out.
pub struct NetworkBandwidthCollector {
    clock: DeltaClock,
    prev: Option<(u64, u64)>,
}

impl NetworkBandwidthCollector {
    pub fn new() -> Self {
        Self {
            clock: DeltaClock::new(),
            prev: None,
        }
    }

    /// Returns `(rx_mb_s, tx_mb_s)`.
    pub fn sample(&mut self) -> Option<(f64, f64)> {
        let now = Instant::now();
        let elapsed = self.clock.tick(now);
        let cur = read_net_dev()?;
        let prev = self.prev.replace(cur);
        let elapsed = elapsed?;
        let (prev_rx, prev_tx) = prev?;
        let rx = cur.0.saturating_sub(prev_rx);
        let tx = cur.1.saturating_sub(prev_tx);
        Some((rx as f64 / MB / elapsed, tx as f64 / MB / elapsed))
    }
}

impl Default for NetworkBandwidthCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_is_none() {
        let mut c = NetworkBandwidthCollector::new();
        if cfg!(target_os = "linux") {
            assert!(c.sample().is_none());
        }
    }
}
