//! ROCm SMI bindings (AMD, Linux) — utilization, VRAM, temperature, power and
//! PCIe throughput per device, matching the function table shown in
//! community AMD GPU collectors (ROCm SMI's stable C ABI).

use once_cell::sync::OnceCell;
use std::ffi::{c_char, CStr};

#[cfg(target_os = "linux")]
const CANDIDATES: &[&str] = &[
    "librocm_smi64.so.1",
    "librocm_smi64.so",
    "librocm_smi64.so.6",
    "librocm_smi64.so.5",
];
#[cfg(not(target_os = "linux"))]
const CANDIDATES: &[&str] = &[];

const RSMI_STATUS_SUCCESS: i32 = 0;
const RSMI_MEM_TYPE_VRAM: u32 = 0;
const RSMI_TEMP_CURRENT: u32 = 0;

pub struct Api {
    _lib: libloading::Library,
    init: unsafe extern "C" fn(u64) -> i32,
    num_monitor_devices: unsafe extern "C" fn(*mut u32) -> i32,
    dev_name_get: unsafe extern "C" fn(u32, *mut c_char, usize) -> i32,
    dev_busy_percent_get: unsafe extern "C" fn(u32, *mut u32) -> i32,
    dev_memory_busy_percent_get: Option<unsafe extern "C" fn(u32, *mut u32) -> i32>,
    dev_memory_total_get: unsafe extern "C" fn(u32, u32, *mut u64) -> i32,
    dev_memory_usage_get: unsafe extern "C" fn(u32, u32, *mut u64) -> i32,
    dev_temp_metric_get: unsafe extern "C" fn(u32, u32, u32, *mut i64) -> i32,
    dev_power_ave_get: unsafe extern "C" fn(u32, u32, *mut u64) -> i32,
    dev_pci_throughput_get:
        Option<unsafe extern "C" fn(u32, *mut u64, *mut u64, *mut u64) -> i32>,
    dev_perf_level_get: Option<unsafe extern "C" fn(u32, *mut u32) -> i32>,
}

// SAFETY: see dynload::nvml::Api.
unsafe impl Send for Api {}
unsafe impl Sync for Api {}

static API: OnceCell<Result<Api, String>> = OnceCell::new();

fn load() -> Result<Api, String> {
    let lib = super::open_first(CANDIDATES)?;
    // SAFETY: symbol names/signatures match ROCm SMI's public C ABI.
    unsafe {
        let api = Api {
            init: super::required_symbol(&lib, b"rsmi_init\0")?,
            num_monitor_devices: super::required_symbol(&lib, b"rsmi_num_monitor_devices\0")?,
            dev_name_get: super::required_symbol(&lib, b"rsmi_dev_name_get\0")?,
            dev_busy_percent_get: super::required_symbol(&lib, b"rsmi_dev_busy_percent_get\0")?,
            dev_memory_busy_percent_get: super::optional_symbol(
                &lib,
                b"rsmi_dev_memory_busy_percent_get\0",
            ),
            dev_memory_total_get: super::required_symbol(&lib, b"rsmi_dev_memory_total_get\0")?,
            dev_memory_usage_get: super::required_symbol(&lib, b"rsmi_dev_memory_usage_get\0")?,
            dev_temp_metric_get: super::required_symbol(&lib, b"rsmi_dev_temp_metric_get\0")?,
            dev_power_ave_get: super::required_symbol(&lib, b"rsmi_dev_power_ave_get\0")?,
            dev_pci_throughput_get: super::optional_symbol(
                &lib,
                b"rsmi_dev_pci_throughput_get\0",
            ),
            dev_perf_level_get: super::optional_symbol(&lib, b"rsmi_dev_perf_level_get\0"),
            _lib: lib,
        };
        if (api.init)(0) != RSMI_STATUS_SUCCESS {
            return Err("rsmi_init failed".to_string());
        }
        Ok(api)
    }
}

pub fn api() -> Option<&'static Api> {
    API.get_or_init(load).as_ref().ok()
}

pub fn device_count() -> u32 {
    let Some(api) = api() else { return 0 };
    let mut count = 0u32;
    // SAFETY: count is a valid &mut u32 for the duration of the call.
    unsafe {
        if (api.num_monitor_devices)(&mut count) == RSMI_STATUS_SUCCESS {
            count
        } else {
            0
        }
    }
}

use crate::core::GpuTelemetry;

pub fn read_telemetry(index: u32) -> Option<GpuTelemetry> {
    let api = api()?;
    let mut t = GpuTelemetry {
        source: Some("rocm-smi".to_string()),
        ..Default::default()
    };

    // SAFETY: every pointer is a valid stack local for the duration of its
    // call; index is caller-verified < device_count().
    unsafe {
        let mut util = 0u32;
        if (api.dev_busy_percent_get)(index, &mut util) == RSMI_STATUS_SUCCESS {
            t.util_pct = Some(util as f64);
        }

        if let Some(f) = api.dev_memory_busy_percent_get {
            let mut mem_util = 0u32;
            if f(index, &mut mem_util) == RSMI_STATUS_SUCCESS {
                t.mem_util_pct = Some(mem_util as f64);
            }
        }

        let mut total = 0u64;
        if (api.dev_memory_total_get)(index, RSMI_MEM_TYPE_VRAM, &mut total) == RSMI_STATUS_SUCCESS
        {
            t.vram_total_gib = Some(total as f64 / (1024.0 * 1024.0 * 1024.0));
        }
        let mut used = 0u64;
        if (api.dev_memory_usage_get)(index, RSMI_MEM_TYPE_VRAM, &mut used) == RSMI_STATUS_SUCCESS
        {
            t.vram_used_gib = Some(used as f64 / (1024.0 * 1024.0 * 1024.0));
        }

        let mut temp_mc = 0i64;
        if (api.dev_temp_metric_get)(index, 0, RSMI_TEMP_CURRENT, &mut temp_mc)
            == RSMI_STATUS_SUCCESS
        {
            t.temp_c = Some(temp_mc as f64 / 1000.0);
        }

        let mut power_uw = 0u64;
        if (api.dev_power_ave_get)(index, 0, &mut power_uw) == RSMI_STATUS_SUCCESS {
            t.watts = Some(power_uw as f64 / 1_000_000.0);
        }

        if let Some(f) = api.dev_pci_throughput_get {
            let mut sent = 0u64;
            let mut received = 0u64;
            let mut max_pkt = 0u64;
            if f(index, &mut sent, &mut received, &mut max_pkt) == RSMI_STATUS_SUCCESS {
                t.pcie_link_note = Some(format!("sent={sent}B/s recv={received}B/s"));
            }
        }

        if let Some(f) = api.dev_perf_level_get {
            let mut level = 0u32;
            if f(index, &mut level) == RSMI_STATUS_SUCCESS {
                t.pstate = Some(format!("perf{level}"));
            }
        }
    }

    t.derive_missing(None);
    t.has_any_field().then_some(t)
}

pub fn device_name(index: u32) -> Option<String> {
    let api = api()?;
    let mut buf = [0 as c_char; 256];
    // SAFETY: buf length matches the passed length argument.
    unsafe {
        if (api.dev_name_get)(index, buf.as_mut_ptr(), buf.len()) == RSMI_STATUS_SUCCESS {
            Some(CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned())
        } else {
            None
        }
    }
}
