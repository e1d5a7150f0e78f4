//! Priority-ordered GPU telemetry sources (spec §4.5). Each source is a
//! plain `fn(u32) -> Option<GpuTelemetry>`; the merger in [`super::merger`]
//! walks them in order for a device index, stopping once every field is
//! filled.

use crate::core::GpuTelemetry;
use crate::dynload::{adlx, igcl, nvml, rocm_smi};
use std::fs;

/// Windows-only sources (spec §4.5 items 7-10): attempted regardless of
/// vendor hint since they answer from DXGI/D3DKMT/PDH rather than a vendor
/// SDK, and report "unavailable" (`None`) on non-Windows or when the
/// underlying adapter/counter isn't present.
const WINDOWS_FALLBACKS: &[SourceFn] = &[
    windows_pdh::read_telemetry,
    windows_d3dkmt::read_telemetry,
    windows_dxgi::read_telemetry,
    windows_pcie_setupapi::read_telemetry,
];

/// Coarse vendor hint used to skip sources that can never apply, so a
/// machine with only an NVIDIA GPU never pays the cost of probing AMD/Intel
/// sysfs trees on every sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorHint {
    Nvidia,
    Amd,
    Intel,
    Unknown,
}

pub type SourceFn = fn(u32) -> Option<GpuTelemetry>;

/// Returns the ordered list of sources to try for a given vendor hint.
/// `Unknown` tries everything, in spec-mandated priority order.
pub fn priority_list(vendor: VendorHint) -> Vec<SourceFn> {
    let mut list = match vendor {
        VendorHint::Nvidia => vec![nvml::read_telemetry],
        VendorHint::Amd => vec![
            adlx::read_telemetry,
            rocm_smi::read_telemetry,
            amd_sysfs::read_telemetry,
        ],
        VendorHint::Intel => vec![igcl::read_telemetry, intel_sysfs::read_telemetry],
        VendorHint::Unknown => vec![
            nvml::read_telemetry,
            adlx::read_telemetry,
            igcl::read_telemetry,
            rocm_smi::read_telemetry,
            amd_sysfs::read_telemetry,
            intel_sysfs::read_telemetry,
        ],
    };
    list.extend_from_slice(WINDOWS_FALLBACKS);
    list
}

/// AMD sysfs fallback (`/sys/class/drm/card*/device/`): busy %, VRAM bytes,
/// hwmon temp/power, performance level. Used when neither ADLX nor ROCm-SMI
/// answered for this index.
mod amd_sysfs {
    use super::*;

    fn card_dir(index: u32) -> String {
        format!("/sys/class/drm/card{index}/device")
    }

    fn read_u64(path: &str) -> Option<u64> {
        fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    fn hwmon_dir(device_dir: &str) -> Option<std::path::PathBuf> {
        let hwmon_root = format!("{device_dir}/hwmon");
        let mut entries = fs::read_dir(hwmon_root).ok()?;
        entries.next()?.ok().map(|e| e.path())
    }

    pub fn read_telemetry(index: u32) -> Option<GpuTelemetry> {
        #[cfg(not(target_os = "linux"))]
        {
            let _ = index;
            return None;
        }
        #[cfg(target_os = "linux")]
        {
            let dir = card_dir(index);
            if !std::path::Path::new(&dir).exists() {
                return None;
            }

            let mut t = GpuTelemetry {
                source: Some("amd-sysfs".to_string()),
                ..Default::default()
            };

            if let Some(busy) = read_u64(&format!("{dir}/gpu_busy_percent")) {
                t.util_pct = Some(busy as f64);
            }
            if let Some(used) = read_u64(&format!("{dir}/mem_info_vram_used")) {
                t.vram_used_gib = Some(used as f64 / (1024.0 * 1024.0 * 1024.0));
            }
            if let Some(total) = read_u64(&format!("{dir}/mem_info_vram_total")) {
                t.vram_total_gib = Some(total as f64 / (1024.0 * 1024.0 * 1024.0));
            }
            if let Some(level) = fs::read_to_string(format!("{dir}/power_dpm_force_performance_level"))
                .ok()
            {
                t.pstate = Some(level.trim().to_string());
            }

            if let Some(hwmon) = hwmon_dir(&dir) {
                if let Some(temp_mc) = read_u64(hwmon.join("temp1_input").to_str().unwrap_or("")) {
                    t.temp_c = Some(temp_mc as f64 / 1000.0);
                }
                if let Some(power_uw) = read_u64(hwmon.join("power1_average").to_str().unwrap_or(""))
                {
                    t.watts = Some(power_uw as f64 / 1_000_000.0);
                }
            }

            t.derive_missing(None);
            t.has_any_field().then_some(t)
        }
    }
}

/// Intel sysfs fallback (`gt_busy_percent`, `mem_info_vram_*`, hwmon).
mod intel_sysfs {
    use super::*;

    fn card_dir(index: u32) -> String {
        format!("/sys/class/drm/card{index}/device")
    }

    fn read_u64(path: &str) -> Option<u64> {
        fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    pub fn read_telemetry(index: u32) -> Option<GpuTelemetry> {
        #[cfg(not(target_os = "linux"))]
        {
            let _ = index;
            return None;
        }
        #[cfg(target_os = "linux")]
        {
            let dir = card_dir(index);
            if !std::path::Path::new(&dir).exists() {
                return None;
            }

            let mut t = GpuTelemetry {
                source: Some("intel-sysfs".to_string()),
                ..Default::default()
            };

            if let Some(busy) = read_u64(&format!("{dir}/gt_busy_percent")) {
                t.util_pct = Some(busy as f64);
            }
            if let Some(used) = read_u64(&format!("{dir}/mem_info_vram_used")) {
                t.vram_used_gib = Some(used as f64 / (1024.0 * 1024.0 * 1024.0));
            }
            if let Some(total) = read_u64(&format!("{dir}/mem_info_vram_total")) {
                t.vram_total_gib = Some(total as f64 / (1024.0 * 1024.0 * 1024.0));
            }

            t.derive_missing(None);
            t.has_any_field().then_some(t)
        }
    }
}

/// Windows per-adapter GPU engine utilization via PDH (spec §4.5 item 7):
/// expands `\GPU Engine(*)\Utilization Percentage` and sums the instances
/// whose name embeds this adapter's LUID.
mod windows_pdh {
    use super::*;
    use crate::dynload::dxgi;

    #[cfg(target_os = "windows")]
    fn probe(luid_high: i32, luid_low: u32) -> Option<f64> {
        use windows::core::{PCWSTR, PWSTR};
        use windows::Win32::System::Performance::{
            PdhAddEnglishCounterW, PdhCloseQuery, PdhCollectQueryData, PdhExpandWildCardPathW,
            PdhGetFormattedCounterValue, PdhOpenQueryW, HCOUNTER, HQUERY, PDH_FMT_COUNTERVALUE,
            PDH_FMT_DOUBLE,
        };

        fn wide(s: &str) -> Vec<u16> {
            s.encode_utf16().chain(std::iter::once(0)).collect()
        }

        let needle = format!("luid_0x{luid_high:08X}_0x{luid_low:08X}").to_lowercase();

        // SAFETY: every handle opened below is closed before returning on
        // every path; output buffers are sized from the query's own
        // self-reported length.
        unsafe {
            let wildcard = wide(r"\GPU Engine(*)\Utilization Percentage");
            let mut buf_size: u32 = 0;
            let _ = PdhExpandWildCardPathW(
                PCWSTR::null(),
                PCWSTR(wildcard.as_ptr()),
                PWSTR(std::ptr::null_mut()),
                &mut buf_size,
                0,
            );
            if buf_size == 0 {
                return None;
            }
            let mut buf = vec![0u16; buf_size as usize];
            if PdhExpandWildCardPathW(
                PCWSTR::null(),
                PCWSTR(wildcard.as_ptr()),
                PWSTR(buf.as_mut_ptr()),
                &mut buf_size,
                0,
            ) != 0
            {
                return None;
            }

            let paths: Vec<String> = buf
                .split(|&c| c == 0)
                .filter(|s| !s.is_empty())
                .map(String::from_utf16_lossy)
                .collect();
            let matching: Vec<&String> = paths
                .iter()
                .filter(|p| p.to_lowercase().contains(&needle))
                .collect();
            if matching.is_empty() {
                return None;
            }

            let mut query = HQUERY::default();
            if PdhOpenQueryW(PCWSTR::null(), 0, &mut query) != 0 {
                return None;
            }

            let mut counters = Vec::new();
            for path in &matching {
                let wpath = wide(path);
                let mut counter = HCOUNTER::default();
                if PdhAddEnglishCounterW(query, PCWSTR(wpath.as_ptr()), 0, &mut counter) == 0 {
                    counters.push(counter);
                }
            }
            if counters.is_empty() || PdhCollectQueryData(query) != 0 {
                let _ = PdhCloseQuery(query);
                return None;
            }

            let mut total = 0.0;
            for counter in counters {
                let mut value = PDH_FMT_COUNTERVALUE::default();
                if PdhGetFormattedCounterValue(counter, PDH_FMT_DOUBLE, None, &mut value) == 0 {
                    total += value.Anonymous.doubleValue;
                }
            }
            let _ = PdhCloseQuery(query);
            Some(total.clamp(0.0, 100.0))
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn probe(_luid_high: i32, _luid_low: u32) -> Option<f64> {
        None
    }

    pub fn read_telemetry(index: u32) -> Option<GpuTelemetry> {
        let adapter = dxgi::adapter_at(index)?;
        let util = probe(adapter.luid_high, adapter.luid_low)?;
        Some(GpuTelemetry {
            util_pct: Some(util),
            source: Some("pdh".to_string()),
            ..Default::default()
        })
    }
}

/// Windows D3DKMT fallback (spec §4.5 item 8): VRAM budget/usage, perf-data
/// temperature/memory clock, and node utilization for whatever adapter DXGI
/// reports at this index, independent of vendor.
mod windows_d3dkmt {
    use super::*;
    use crate::dynload::{d3dkmt, dxgi};

    pub fn read_telemetry(index: u32) -> Option<GpuTelemetry> {
        let adapter = dxgi::adapter_at(index)?;
        let luid = d3dkmt::Luid {
            low_part: adapter.luid_low,
            high_part: adapter.luid_high,
        };
        let packed = (adapter.luid_low as u64) | ((adapter.luid_high as u64) << 32);

        let mut t = GpuTelemetry {
            source: Some("d3dkmt".to_string()),
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
        }
        t.util_pct = d3dkmt::node_util_pct(packed);

        t.has_any_field().then_some(t)
    }
}

/// DXGI adapter-description fallback (spec §4.5 item 9): only dedicated
/// VRAM size, but works for any adapter DXGI can see with no driver-vendor
/// SDK at all.
mod windows_dxgi {
    use super::*;
    use crate::dynload::dxgi;

    pub fn read_telemetry(index: u32) -> Option<GpuTelemetry> {
        let adapter = dxgi::adapter_at(index)?;
        if adapter.dedicated_vram_bytes == 0 {
            return None;
        }
        Some(GpuTelemetry {
            vram_total_gib: Some(adapter.dedicated_vram_bytes as f64 / (1024.0 * 1024.0 * 1024.0)),
            source: Some("dxgi".to_string()),
            ..Default::default()
        })
    }
}

/// SetupAPI PCIe-link fallback (spec §4.5 item 10): current link
/// speed/width read from the display device's hardware property store,
/// matched to the DXGI adapter by vendor/device ID.
mod windows_pcie_setupapi {
    use super::*;
    use crate::dynload::dxgi;

    #[cfg(target_os = "windows")]
    fn probe(vendor_id: u32, device_id: u32) -> Option<(u32, u32)> {
        use windows::core::GUID;
        use windows::Win32::Devices::DeviceAndDriverInstallation::{
            SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInfo, SetupDiGetClassDevsW,
            SetupDiGetDevicePropertyW, DIGCF_PRESENT, SP_DEVINFO_DATA,
        };
        use windows::Win32::Devices::Properties::{DEVPKEY_Device_HardwareIds, DEVPROPKEY};
        use windows::Win32::Foundation::DEVPROPTYPE;

        // Custom DEVPROPKEYs this project has used for current/max PCIe
        // link speed+width since its native telemetry tooling.
        const LINK_GUID: GUID = GUID::from_values(
            0x3AB2_2E31,
            0x8264,
            0x4B4E,
            [0x9A, 0xF5, 0xA8, 0xD2, 0xD8, 0xE3, 0x3E, 0x62],
        );
        const PKEY_CURRENT_LINK_SPEED: DEVPROPKEY = DEVPROPKEY {
            fmtid: LINK_GUID,
            pid: 9,
        };
        const PKEY_CURRENT_LINK_WIDTH: DEVPROPKEY = DEVPROPKEY {
            fmtid: LINK_GUID,
            pid: 10,
        };
        const GUID_DEVCLASS_DISPLAY: GUID = GUID::from_values(
            0x4D36_E968,
            0xE325,
            0x11CE,
            [0xBF, 0xC1, 0x08, 0x00, 0x2B, 0xE1, 0x03, 0x18],
        );

        let needle = format!("VEN_{vendor_id:04X}&DEV_{device_id:04X}");

        // SAFETY: the device info set is destroyed on every return path;
        // property buffers are fixed-size stack locals.
        unsafe {
            let set = SetupDiGetClassDevsW(Some(&GUID_DEVCLASS_DISPLAY), None, None, DIGCF_PRESENT)
                .ok()?;

            let mut result = None;
            let mut index = 0u32;
            loop {
                let mut data = SP_DEVINFO_DATA {
                    cbSize: std::mem::size_of::<SP_DEVINFO_DATA>() as u32,
                    ..Default::default()
                };
                if SetupDiEnumDeviceInfo(set, index, &mut data).is_err() {
                    break;
                }
                index += 1;

                let mut hwid_buf = [0u16; 256];
                let mut prop_type = DEVPROPTYPE(0);
                let hwid_ok = SetupDiGetDevicePropertyW(
                    set,
                    &data,
                    &DEVPKEY_Device_HardwareIds,
                    &mut prop_type,
                    Some(std::slice::from_raw_parts_mut(
                        hwid_buf.as_mut_ptr() as *mut u8,
                        hwid_buf.len() * 2,
                    )),
                    None,
                    0,
                )
                .is_ok();
                if !hwid_ok {
                    continue;
                }
                let hwid = String::from_utf16_lossy(&hwid_buf);
                if !hwid.to_uppercase().contains(&needle) {
                    continue;
                }

                let mut speed_buf = [0u8; 4];
                let mut width_buf = [0u8; 4];
                let speed_ok = SetupDiGetDevicePropertyW(
                    set,
                    &data,
                    &PKEY_CURRENT_LINK_SPEED,
                    &mut prop_type,
                    Some(&mut speed_buf),
                    None,
                    0,
                )
                .is_ok();
                let width_ok = SetupDiGetDevicePropertyW(
                    set,
                    &data,
                    &PKEY_CURRENT_LINK_WIDTH,
                    &mut prop_type,
                    Some(&mut width_buf),
                    None,
                    0,
                )
                .is_ok();
                if speed_ok && width_ok {
                    result = Some((
                        u32::from_ne_bytes(speed_buf),
                        u32::from_ne_bytes(width_buf),
                    ));
                }
                break;
            }

            let _ = SetupDiDestroyDeviceInfoList(set);
            result
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn probe(_vendor_id: u32, _device_id: u32) -> Option<(u32, u32)> {
        None
    }

    pub fn read_telemetry(index: u32) -> Option<GpuTelemetry> {
        let adapter = dxgi::adapter_at(index)?;
        let (gen, width) = probe(adapter.vendor_id, adapter.device_id)?;
        Some(GpuTelemetry {
            pcie_link_gen: Some(gen),
            pcie_link_width: Some(width),
            source: Some("setupapi-pcie".to_string()),
            ..Default::default()
        })
    }
}

/// Last-resort capacity estimate (spec §4.5 item 11): when throughput is
/// unknown but link generation/width are, estimate peak bandwidth from the
/// PCIe spec's per-lane transfer rate table.
pub fn estimator(generation: u32, width: u32) -> GpuTelemetry {
    GpuTelemetry {
        pcie_link_gen: Some(generation),
        pcie_link_width: Some(width),
        max_mem_bandwidth_gbps: None,
        pcie_link_note: Some(format!(
            "{:.1} MB/s (estimated cap)",
            crate::core::gpu_telemetry::pcie_estimated_cap_mbps(generation, width)
        )),
        source: Some("pcie-cap".to_string()),
        ..Default::default()
    }
}
