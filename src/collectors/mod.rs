//! Stateful OS-level samplers (spec §4.4): CPU, RAM, disk and network
//! counters. Each collector caches its previous reading and the previous
//! sample's timestamp so that rate collectors (CPU, disk, network) can
//! report a delta; the first call on a fresh collector always returns
//! `None` because there is nothing to subtract from yet.

mod cpu;
mod disk;
mod network;
mod ram;

pub use cpu::{CpuMaxCoreCollector, CpuUsageCollector};
pub use disk::DiskBandwidthCollector;
pub use network::NetworkBandwidthCollector;
pub use ram::{RamReading, RamUsageCollector};

use std::time::{Duration, Instant};

/// Minimum interval between two samples of a delta-based collector. Shorter
/// intervals are rejected (return `None`) to avoid dividing by a near-zero
/// elapsed time and reporting nonsensical spikes.
const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// Shared bookkeeping for "previous cumulative counter + previous instant"
/// delta collectors. `elapsed_since(now)` returns `None` (reject) when the
/// interval since the last accepted sample is below [`MIN_SAMPLE_INTERVAL`].
struct DeltaClock {
    last: Option<Instant>,
}

impl DeltaClock {
    fn new() -> Self {
        Self { last: None }
    }

    /// Returns the elapsed seconds since the last accepted sample and
    /// advances the clock, or `None` if there was no previous sample or the
    /// interval was too short to trust.
    fn tick(&mut self, now: Instant) -> Option<f64> {
        let elapsed = match self.last {
            None => {
                self.last = Some(now);
                return None;
            }
            Some(prev) => now.duration_since(prev),
        };
        if elapsed < MIN_SAMPLE_INTERVAL {
            return None;
        }
        self.last = Some(now);
        Some(elapsed.as_secs_f64())
    }
}
