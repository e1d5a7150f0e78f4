use serde::{Deserialize, Serialize};

/// Throughput over the last sampling interval, in decimal MB (not MiB).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PcieThroughput {
    pub rx_mbps: f64,
    pub tx_mbps: f64,
}

/// Negotiated PCIe link speed/width. Zero values mean unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcieLink {
    pub generation: u32,
    pub width: u32,
}

/// Per-device telemetry record. Every scalar is optional because any given
/// source may not expose it; the merger fills in as many fields as it can
/// from a priority-ordered list of sources (see `gpu::merger`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuTelemetry {
    pub util_pct: Option<f64>,
    pub mem_util_pct: Option<f64>,
    pub vram_used_gib: Option<f64>,
    pub vram_total_gib: Option<f64>,
    pub watts: Option<f64>,
    pub temp_c: Option<f64>,
    pub pstate: Option<String>,
    pub gpu_clock_mhz: Option<u32>,
    pub mem_clock_mhz: Option<u32>,
    pub mem_transfer_rate_mhz: Option<u32>,
    pub encoder_util_pct: Option<f64>,
    pub decoder_util_pct: Option<f64>,
    pub pcie_link_width: Option<u32>,
    pub pcie_link_gen: Option<u32>,
    pub pcie_link_note: Option<String>,
    pub max_mem_bandwidth_gbps: Option<f64>,
    /// Instantaneous VRAM read+write bandwidth, decimal MB/s. Only a few
    /// sources (IGCL) expose this directly; most leave it `None`.
    pub vram_bandwidth_mbps: Option<f64>,
    /// Source tag: "nvml", "adlx", "igcl", "d3dkmt", "dxgi", "pdh",
    /// "amdgpu-sysfs", "rocm-smi", "pcie-cap", ...
    pub source: Option<String>,
}

impl GpuTelemetry {
    pub fn has_any_field(&self) -> bool {
        self.util_pct.is_some()
            || self.mem_util_pct.is_some()
            || self.vram_used_gib.is_some()
            || self.vram_total_gib.is_some()
            || self.watts.is_some()
            || self.temp_c.is_some()
            || self.pstate.is_some()
            || self.gpu_clock_mhz.is_some()
            || self.mem_clock_mhz.is_some()
            || self.mem_transfer_rate_mhz.is_some()
            || self.encoder_util_pct.is_some()
            || self.decoder_util_pct.is_some()
            || self.pcie_link_width.is_some()
            || self.pcie_link_gen.is_some()
    }

    /// Fill only the fields that are still `None` in `self` from `other`,
    /// and remember the first contributor's source tag.
    pub fn merge_missing(&mut self, other: GpuTelemetry) {
        macro_rules! fill {
            ($field:ident) => {
                if self.$field.is_none() {
                    self.$field = other.$field.clone();
                }
            };
        }
        if self.source.is_none() {
            self.source = other.source.clone();
        }
        fill!(util_pct);
        fill!(mem_util_pct);
        fill!(vram_used_gib);
        fill!(vram_total_gib);
        fill!(watts);
        fill!(temp_c);
        fill!(pstate);
        fill!(gpu_clock_mhz);
        fill!(mem_clock_mhz);
        fill!(mem_transfer_rate_mhz);
        fill!(encoder_util_pct);
        fill!(decoder_util_pct);
        fill!(pcie_link_width);
        fill!(pcie_link_gen);
        fill!(pcie_link_note);
        fill!(max_mem_bandwidth_gbps);
        fill!(vram_bandwidth_mbps);
    }

    /// Fill derived fields that can be computed from what's already present:
    /// memory utilization from VRAM used/total, and max memory bandwidth
    /// from clock + bus width (see spec §4.5).
    pub fn derive_missing(&mut self, mem_bus_width_bits: Option<u32>) {
        if self.mem_util_pct.is_none() {
            if let (Some(used), Some(total)) = (self.vram_used_gib, self.vram_total_gib) {
                if total > 0.0 {
                    self.mem_util_pct = Some((used / total * 100.0).clamp(0.0, 100.0));
                }
            }
        }

        if self.max_mem_bandwidth_gbps.is_none() {
            if let Some(width) = mem_bus_width_bits {
                if let Some(transfer_rate) = self.mem_transfer_rate_mhz {
                    if transfer_rate > 0 {
                        self.max_mem_bandwidth_gbps =
                            Some(transfer_rate as f64 * (width as f64 / 8.0) / 1000.0);
                    }
                } else if let Some(mem_clock) = self.mem_clock_mhz {
                    if mem_clock > 0 {
                        self.max_mem_bandwidth_gbps =
                            Some(mem_clock as f64 * (width as f64 / 8.0) * 2.0 / 1000.0);
                    }
                }
            }
        }
    }
}

/// Estimated PCIe link capacity, MB/s per lane (decimal MB, Gen 1-5),
/// converted to the same MB/s convention other fields use.
pub fn pcie_estimated_cap_mbps(generation: u32, width: u32) -> f64 {
    let per_lane_mb_s: f64 = match generation {
        1 => 250.0,
        2 => 500.0,
        3 => 984.615,
        4 => 1969.231,
        5 => 3938.462,
        _ => return 0.0,
    };
    per_lane_mb_s * width as f64 / 1.048_576
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_mem_util_from_vram() {
        let mut t = GpuTelemetry {
            vram_used_gib: Some(4.0),
            vram_total_gib: Some(8.0),
            ..Default::default()
        };
        t.derive_missing(None);
        assert_eq!(t.mem_util_pct, Some(50.0));
    }

    #[test]
    fn derive_mem_util_clamped() {
        let mut t = GpuTelemetry {
            vram_used_gib: Some(9.0),
            vram_total_gib: Some(8.0),
            ..Default::default()
        };
        t.derive_missing(None);
        assert_eq!(t.mem_util_pct, Some(100.0));
    }

    #[test]
    fn merge_missing_fills_only_absent_fields() {
        let mut a = GpuTelemetry {
            util_pct: Some(10.0),
            source: Some("nvml".into()),
            ..Default::default()
        };
        let b = GpuTelemetry {
            util_pct: Some(99.0),
            watts: Some(120.0),
            source: Some("rocm-smi".into()),
            ..Default::default()
        };
        a.merge_missing(b);
        assert_eq!(a.util_pct, Some(10.0));
        assert_eq!(a.watts, Some(120.0));
        assert_eq!(a.source.as_deref(), Some("nvml"));
    }

    #[test]
    fn estimated_cap_monotonic_in_width() {
        for gen in 1..=5u32 {
            let w1 = pcie_estimated_cap_mbps(gen, 4);
            let w2 = pcie_estimated_cap_mbps(gen, 16);
            assert!(w1 <= w2);
        }
    }
}
