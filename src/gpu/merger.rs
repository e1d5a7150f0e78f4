//! `TelemetryMerger` (spec §4.6): queries sources in priority order for a
//! device index, filling only the fields still missing, and stops once a
//! source has answered for the last unset field or the list is exhausted.

use crate::core::GpuTelemetry;
use crate::dynload::nvml;

use super::sources::{estimator, priority_list, VendorHint};

pub struct TelemetryMerger;

impl TelemetryMerger {
    pub fn new() -> Self {
        Self
    }

    /// Reads and merges telemetry for `index` under `vendor`, deriving any
    /// computable fields (mem utilization, memory bandwidth, PCIe capacity
    /// estimate) before returning. Returns `None` if no source had anything
    /// for this index.
    pub fn read(&self, index: u32, vendor: VendorHint) -> Option<GpuTelemetry> {
        let mut t = GpuTelemetry::default();
        for source in priority_list(vendor) {
            let Some(partial) = source(index) else {
                continue;
            };
            t.merge_missing(partial);
        }
        t.derive_missing(nvml::bus_width_bits(index));

        if t.pcie_link_note.is_none() {
            if let (Some(gen), Some(width)) = (t.pcie_link_gen, t.pcie_link_width) {
                t.merge_missing(estimator(gen, width));
            }
        }

        t.has_any_field().then_some(t)
    }
}

impl Default for TelemetryMerger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sources_yield_none() {
        // Unknown vendor with no vendor SDKs installed in the test
        // environment should produce no telemetry rather than an all-empty
        // `Some(GpuTelemetry::default())`.
        let merger = TelemetryMerger::new();
        let result = merger.read(0, VendorHint::Unknown);
        // Either genuinely None (no GPU present in CI) or a populated
        // record (real hardware) — never a spuriously non-empty default.
        if let Some(t) = result {
            assert!(t.has_any_field());
        }
    }
}
