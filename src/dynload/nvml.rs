//! NVIDIA Management Library bindings.
//!
//! All telemetry-reading calls go through `safe_call::safe_call_with_timeout`
//! because NVML has been observed to hang inside the driver on some
//! platforms; a hung call must not freeze the UI thread.

use once_cell::sync::OnceCell;
use std::ffi::{c_char, c_int, c_uint, CStr};
use std::os::raw::c_void;

use crate::core::GpuTelemetry;
use crate::safe_call::{safe_call_with_timeout, NVML_CALL_TIMEOUT};

use super::{open_first, optional_symbol, required_symbol};

#[cfg(target_os = "linux")]
const CANDIDATES: &[&str] = &["libnvidia-ml.so.1", "libnvidia-ml.so"];
#[cfg(target_os = "windows")]
const CANDIDATES: &[&str] = &["nvml.dll"];
#[cfg(not(any(target_os = "linux", target_os = "windows")))]
const CANDIDATES: &[&str] = &[];

type NvmlReturn = c_int;
const NVML_SUCCESS: NvmlReturn = 0;

type NvmlDevice = *mut c_void;

#[repr(C)]
#[derive(Clone, Copy)]
struct NvmlUtilization {
    gpu: c_uint,
    memory: c_uint,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct NvmlMemory {
    total: u64,
    free: u64,
    used: u64,
}

pub struct Api {
    _lib: libloading::Library,
    init_v2: unsafe extern "C" fn() -> NvmlReturn,
    shutdown: unsafe extern "C" fn() -> NvmlReturn,
    device_get_count_v2: unsafe extern "C" fn(*mut c_uint) -> NvmlReturn,
    device_get_handle_by_index_v2: unsafe extern "C" fn(c_uint, *mut NvmlDevice) -> NvmlReturn,
    device_get_name: unsafe extern "C" fn(NvmlDevice, *mut c_char, c_uint) -> NvmlReturn,
    device_get_utilization_rates:
        unsafe extern "C" fn(NvmlDevice, *mut NvmlUtilization) -> NvmlReturn,
    device_get_memory_info: unsafe extern "C" fn(NvmlDevice, *mut NvmlMemory) -> NvmlReturn,
    device_get_power_usage: unsafe extern "C" fn(NvmlDevice, *mut c_uint) -> NvmlReturn,
    device_get_power_management_limit: Option<unsafe extern "C" fn(NvmlDevice, *mut c_uint) -> NvmlReturn>,
    device_get_temperature: unsafe extern "C" fn(NvmlDevice, c_uint, *mut c_uint) -> NvmlReturn,
    device_get_performance_state: unsafe extern "C" fn(NvmlDevice, *mut c_int) -> NvmlReturn,
    device_get_clock_info: unsafe extern "C" fn(NvmlDevice, c_uint, *mut c_uint) -> NvmlReturn,
    device_get_encoder_utilization:
        Option<unsafe extern "C" fn(NvmlDevice, *mut c_uint, *mut c_uint) -> NvmlReturn>,
    device_get_decoder_utilization:
        Option<unsafe extern "C" fn(NvmlDevice, *mut c_uint, *mut c_uint) -> NvmlReturn>,
    device_get_curr_pcie_link_generation:
        Option<unsafe extern "C" fn(NvmlDevice, *mut c_uint) -> NvmlReturn>,
    device_get_curr_pcie_link_width:
        Option<unsafe extern "C" fn(NvmlDevice, *mut c_uint) -> NvmlReturn>,
    device_get_pcie_throughput:
        Option<unsafe extern "C" fn(NvmlDevice, c_uint, *mut c_uint) -> NvmlReturn>,
    device_get_memory_bus_width: Option<unsafe extern "C" fn(NvmlDevice, *mut c_uint) -> NvmlReturn>,
    error_string: unsafe extern "C" fn(NvmlReturn) -> *const c_char,
    system_get_driver_version: Option<unsafe extern "C" fn(*mut c_char, c_uint) -> NvmlReturn>,
    system_get_nvml_version: Option<unsafe extern "C" fn(*mut c_char, c_uint) -> NvmlReturn>,
}

// SAFETY: Api is a table of C function pointers plus a kept-alive library
// handle; every call site passes a valid NvmlDevice obtained from this same
// Api. No interior mutability.
unsafe impl Send for Api {}
unsafe impl Sync for Api {}

const NVML_TEMPERATURE_GPU: c_uint = 0;
const NVML_CLOCK_GRAPHICS: c_uint = 0;
const NVML_CLOCK_MEM: c_uint = 2;
const NVML_PCIE_UTIL_TX_BYTES: c_uint = 0;
const NVML_PCIE_UTIL_RX_BYTES: c_uint = 1;

static API: OnceCell<Result<Api, String>> = OnceCell::new();

fn load() -> Result<Api, String> {
    let lib = open_first(CANDIDATES)?;
    // SAFETY: symbol names/signatures match the NVML public ABI.
    unsafe {
        let init_v2 = required_symbol(&lib, b"nvmlInit_v2\0")?;
        let shutdown = required_symbol(&lib, b"nvmlShutdown\0")?;
        let device_get_count_v2 = required_symbol(&lib, b"nvmlDeviceGetCount_v2\0")?;
        let device_get_handle_by_index_v2 =
            required_symbol(&lib, b"nvmlDeviceGetHandleByIndex_v2\0")?;
        let device_get_name = required_symbol(&lib, b"nvmlDeviceGetName\0")?;
        let device_get_utilization_rates =
            required_symbol(&lib, b"nvmlDeviceGetUtilizationRates\0")?;
        let device_get_memory_info = required_symbol(&lib, b"nvmlDeviceGetMemoryInfo\0")?;
        let device_get_power_usage = required_symbol(&lib, b"nvmlDeviceGetPowerUsage\0")?;
        let device_get_power_management_limit =
            optional_symbol(&lib, b"nvmlDeviceGetPowerManagementLimit\0");
        let device_get_temperature = required_symbol(&lib, b"nvmlDeviceGetTemperature\0")?;
        let device_get_performance_state = required_symbol(&lib, b"nvmlDeviceGetPerformanceState\0")?;
        let device_get_clock_info = required_symbol(&lib, b"nvmlDeviceGetClockInfo\0")?;
        let device_get_encoder_utilization =
            optional_symbol(&lib, b"nvmlDeviceGetEncoderUtilization\0");
        let device_get_decoder_utilization =
            optional_symbol(&lib, b"nvmlDeviceGetDecoderUtilization\0");
        let device_get_curr_pcie_link_generation =
            optional_symbol(&lib, b"nvmlDeviceGetCurrPcieLinkGeneration\0");
        let device_get_curr_pcie_link_width =
            optional_symbol(&lib, b"nvmlDeviceGetCurrPcieLinkWidth\0");
        let device_get_pcie_throughput = optional_symbol(&lib, b"nvmlDeviceGetPcieThroughput\0");
        let device_get_memory_bus_width =
            optional_symbol(&lib, b"nvmlDeviceGetMemoryBusWidth\0");
        let error_string = required_symbol(&lib, b"nvmlErrorString\0")?;
        let system_get_driver_version = optional_symbol(&lib, b"nvmlSystemGetDriverVersion\0");
        let system_get_nvml_version = optional_symbol(&lib, b"nvmlSystemGetNVMLVersion\0");

        let api = Api {
            _lib: lib,
            init_v2,
            shutdown,
            device_get_count_v2,
            device_get_handle_by_index_v2,
            device_get_name,
            device_get_utilization_rates,
            device_get_memory_info,
            device_get_power_usage,
            device_get_power_management_limit,
            device_get_temperature,
            device_get_performance_state,
            device_get_clock_info,
            device_get_encoder_utilization,
            device_get_decoder_utilization,
            device_get_curr_pcie_link_generation,
            device_get_curr_pcie_link_width,
            device_get_pcie_throughput,
            device_get_memory_bus_width,
            error_string,
            system_get_driver_version,
            system_get_nvml_version,
        };

        if (api.init_v2)() != NVML_SUCCESS {
            return Err("nvmlInit_v2 failed".to_string());
        }

        let _ = shutdown; // kept alive for process-exit cleanup; NVML stays initialized for the process lifetime (see spec: DynLoader handles are never unloaded).
        Ok(api)
    }
}

/// Process-global, lazily-initialized. Returns `None` if the library is
/// missing or init failed; the reason is cached and not retried.
pub fn api() -> Option<&'static Api> {
    API.get_or_init(load).as_ref().ok()
}

pub fn err_to_string(api: &Api, code: NvmlReturn) -> String {
    // SAFETY: nvmlErrorString returns a static, null-terminated C string.
    unsafe {
        let ptr = (api.error_string)(code);
        if ptr.is_null() {
            format!("NVML error {code}")
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }
}

fn device_name(api: &Api, dev: NvmlDevice) -> Option<String> {
    let mut buf = [0 as c_char; 96];
    // SAFETY: buf is 96 bytes, matches the declared length argument.
    unsafe {
        if (api.device_get_name)(dev, buf.as_mut_ptr(), buf.len() as c_uint) == NVML_SUCCESS {
            Some(CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned())
        } else {
            None
        }
    }
}

/// POD message copied over the SafeCall fork boundary (Unix) — no heap
/// pointers, fixed-size string buffer.
#[repr(C)]
#[derive(Clone, Copy)]
struct TelemetryMsg {
    has: u8,
    util_pct: f64,
    mem_util_pct: f64,
    mem_used_gib: f64,
    mem_total_gib: f64,
    watts: f64,
    temp_c: f64,
    pstate: [u8; 16],
    encoder_util_pct: f64,
    decoder_util_pct: f64,
    gpu_clock_mhz: u32,
    mem_clock_mhz: u32,
    pcie_gen: u32,
    pcie_width: u32,
    has_encoder: u8,
    has_decoder: u8,
    has_pcie: u8,
}

impl Default for TelemetryMsg {
    fn default() -> Self {
        // SAFETY: all-zero is a valid bit pattern for this POD struct.
        unsafe { std::mem::zeroed() }
    }
}

pub fn device_count() -> Option<u32> {
    let api = api()?;
    let api_ptr = api as *const Api as usize;
    safe_call_with_timeout(NVML_CALL_TIMEOUT, move || {
        let api = unsafe { &*(api_ptr as *const Api) };
        let mut count: c_uint = 0;
        // SAFETY: count is a valid &mut c_uint for the duration of the call.
        let rc = unsafe { (api.device_get_count_v2)(&mut count) };
        if rc == NVML_SUCCESS {
            count
        } else {
            0
        }
    })
}

/// Reads telemetry for one GPU index. Runs under SafeCall so a wedged driver
/// can't hang the caller.
pub fn read_telemetry(index: u32) -> Option<GpuTelemetry> {
    let api = api()?;
    let api_ptr = api as *const Api as usize;
    let msg: TelemetryMsg = safe_call_with_timeout(NVML_CALL_TIMEOUT, move || {
        let api = unsafe { &*(api_ptr as *const Api) };
        read_telemetry_inner(api, index)
    })?;

    if msg.has == 0 {
        return None;
    }

    let pstate_str = {
        let end = msg.pstate.iter().position(|&b| b == 0).unwrap_or(msg.pstate.len());
        String::from_utf8_lossy(&msg.pstate[..end]).into_owned()
    };

    Some(GpuTelemetry {
        util_pct: Some(msg.util_pct),
        mem_util_pct: Some(msg.mem_util_pct),
        vram_used_gib: Some(msg.mem_used_gib),
        vram_total_gib: Some(msg.mem_total_gib),
        watts: Some(msg.watts),
        temp_c: Some(msg.temp_c),
        pstate: Some(pstate_str),
        gpu_clock_mhz: Some(msg.gpu_clock_mhz),
        mem_clock_mhz: Some(msg.mem_clock_mhz),
        mem_transfer_rate_mhz: None,
        encoder_util_pct: (msg.has_encoder != 0).then_some(msg.encoder_util_pct),
        decoder_util_pct: (msg.has_decoder != 0).then_some(msg.decoder_util_pct),
        pcie_link_width: (msg.has_pcie != 0).then_some(msg.pcie_width),
        pcie_link_gen: (msg.has_pcie != 0).then_some(msg.pcie_gen),
        pcie_link_note: None,
        max_mem_bandwidth_gbps: None,
        source: Some("nvml".to_string()),
    })
}

fn read_telemetry_inner(api: &Api, index: u32) -> TelemetryMsg {
    let mut msg = TelemetryMsg::default();
    // SAFETY: every pointer below is a valid stack local for the duration
    // of its call; handle comes from a successful GetHandleByIndex.
    unsafe {
        let mut dev: NvmlDevice = std::ptr::null_mut();
        if (api.device_get_handle_by_index_v2)(index, &mut dev) != NVML_SUCCESS {
            return msg;
        }

        let mut util = NvmlUtilization { gpu: 0, memory: 0 };
        if (api.device_get_utilization_rates)(dev, &mut util) == NVML_SUCCESS {
            msg.util_pct = util.gpu as f64;
            msg.mem_util_pct = util.memory as f64;
        }

        let mut mem = NvmlMemory { total: 0, free: 0, used: 0 };
        if (api.device_get_memory_info)(dev, &mut mem) == NVML_SUCCESS {
            msg.mem_used_gib = mem.used as f64 / (1024.0 * 1024.0 * 1024.0);
            msg.mem_total_gib = mem.total as f64 / (1024.0 * 1024.0 * 1024.0);
        }

        let mut power_mw: c_uint = 0;
        if (api.device_get_power_usage)(dev, &mut power_mw) == NVML_SUCCESS {
            msg.watts = power_mw as f64 / 1000.0;
        }

        let mut temp: c_uint = 0;
        if (api.device_get_temperature)(dev, NVML_TEMPERATURE_GPU, &mut temp) == NVML_SUCCESS {
            msg.temp_c = temp as f64;
        }

        let mut pstate: c_int = 0;
        if (api.device_get_performance_state)(dev, &mut pstate) == NVML_SUCCESS {
            let s = format!("P{pstate}");
            let bytes = s.as_bytes();
            let n = bytes.len().min(msg.pstate.len() - 1);
            msg.pstate[..n].copy_from_slice(&bytes[..n]);
        }

        let mut gclk: c_uint = 0;
        if (api.device_get_clock_info)(dev, NVML_CLOCK_GRAPHICS, &mut gclk) == NVML_SUCCESS {
            msg.gpu_clock_mhz = gclk;
        }
        let mut mclk: c_uint = 0;
        if (api.device_get_clock_info)(dev, NVML_CLOCK_MEM, &mut mclk) == NVML_SUCCESS {
            msg.mem_clock_mhz = mclk;
        }

        if let Some(f) = api.device_get_encoder_utilization {
            let mut val: c_uint = 0;
            let mut sample_period: c_uint = 0;
            if f(dev, &mut val, &mut sample_period) == NVML_SUCCESS {
                msg.encoder_util_pct = val as f64;
                msg.has_encoder = 1;
            }
        }
        if let Some(f) = api.device_get_decoder_utilization {
            let mut val: c_uint = 0;
            let mut sample_period: c_uint = 0;
            if f(dev, &mut val, &mut sample_period) == NVML_SUCCESS {
                msg.decoder_util_pct = val as f64;
                msg.has_decoder = 1;
            }
        }

        if let (Some(gen_f), Some(width_f)) = (
            api.device_get_curr_pcie_link_generation,
            api.device_get_curr_pcie_link_width,
        ) {
            let mut gen: c_uint = 0;
            let mut width: c_uint = 0;
            if gen_f(dev, &mut gen) == NVML_SUCCESS && width_f(dev, &mut width) == NVML_SUCCESS {
                msg.pcie_gen = gen;
                msg.pcie_width = width;
                msg.has_pcie = 1;
            }
        }

        msg.has = 1;
    }
    msg
}

/// Memory bus width in bits, used to derive `max_mem_bandwidth_gbps` from
/// clock speed (spec §4.5). `None` if NVML is unavailable or the driver
/// doesn't export `nvmlDeviceGetMemoryBusWidth`.
pub fn bus_width_bits(index: u32) -> Option<u32> {
    let api = api()?;
    api.device_get_memory_bus_width?;
    let api_ptr = api as *const Api as usize;
    safe_call_with_timeout(NVML_CALL_TIMEOUT, move || {
        let api = unsafe { &*(api_ptr as *const Api) };
        let f = api.device_get_memory_bus_width?;
        let mut dev: NvmlDevice = std::ptr::null_mut();
        // SAFETY: dev is a valid out-param; width is a valid stack local.
        unsafe {
            if (api.device_get_handle_by_index_v2)(index, &mut dev) != NVML_SUCCESS {
                return None;
            }
            let mut width: c_uint = 0;
            if f(dev, &mut width) == NVML_SUCCESS {
                Some(width)
            } else {
                None
            }
        }
    })
    .flatten()
}

/// Aggregate PCIe RX/TX throughput across all devices, via NVML's own
/// counters (KB/s -> MB/s decimal). Returns `None` if unsupported.
pub fn pcie_throughput_all() -> Option<(f64, f64)> {
    let api = api()?;
    let count = device_count()?;
    let api_ptr = api as *const Api as usize;
    safe_call_with_timeout(NVML_CALL_TIMEOUT, move || {
        let api = unsafe { &*(api_ptr as *const Api) };
        let f = api.device_get_pcie_throughput?;
        let mut rx_total = 0u32;
        let mut tx_total = 0u32;
        for i in 0..count {
            // SAFETY: dev handle obtained fresh per index; pointers are
            // valid stack locals.
            unsafe {
                let mut dev: NvmlDevice = std::ptr::null_mut();
                if (api.device_get_handle_by_index_v2)(i, &mut dev) != NVML_SUCCESS {
                    continue;
                }
                let mut rx: c_uint = 0;
                let mut tx: c_uint = 0;
                if f(dev, NVML_PCIE_UTIL_RX_BYTES, &mut rx) == NVML_SUCCESS {
                    rx_total += rx;
                }
                if f(dev, NVML_PCIE_UTIL_TX_BYTES, &mut tx) == NVML_SUCCESS {
                    tx_total += tx;
                }
            }
        }
        Some((rx_total as f64 / 1000.0, tx_total as f64 / 1000.0))
    })?
}

pub fn device_display_name(index: u32) -> Option<String> {
    let api = api()?;
    let api_ptr = api as *const Api as usize;
    safe_call_with_timeout(NVML_CALL_TIMEOUT, move || -> NameMsg {
        let api = unsafe { &*(api_ptr as *const Api) };
        let mut out = NameMsg::default();
        unsafe {
            let mut dev: NvmlDevice = std::ptr::null_mut();
            if (api.device_get_handle_by_index_v2)(index, &mut dev) == NVML_SUCCESS {
                if let Some(name) = device_name(api, dev) {
                    let bytes = name.as_bytes();
                    let n = bytes.len().min(out.buf.len() - 1);
                    out.buf[..n].copy_from_slice(&bytes[..n]);
                    out.has = 1;
                }
            }
        }
        out
    })
    .and_then(|m| {
        if m.has == 0 {
            return None;
        }
        let end = m.buf.iter().position(|&b| b == 0).unwrap_or(m.buf.len());
        Some(String::from_utf8_lossy(&m.buf[..end]).into_owned())
    })
}

#[repr(C)]
#[derive(Clone, Copy)]
struct NameMsg {
    has: u8,
    buf: [u8; 96],
}

impl Default for NameMsg {
    fn default() -> Self {
        // SAFETY: all-zero is valid for this POD struct.
        unsafe { std::mem::zeroed() }
    }
}

pub fn driver_version() -> Option<String> {
    let api = api()?;
    let mut buf = [0 as c_char; 80];
    let f = api.system_get_driver_version?;
    // SAFETY: buf length matches the passed length argument.
    unsafe {
        if f(buf.as_mut_ptr(), buf.len() as c_uint) == NVML_SUCCESS {
            Some(CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned())
        } else {
            None
        }
    }
}

pub fn nvml_version() -> Option<String> {
    let api = api()?;
    let mut buf = [0 as c_char; 80];
    let f = api.system_get_nvml_version?;
    // SAFETY: buf length matches the passed length argument.
    unsafe {
        if f(buf.as_mut_ptr(), buf.len() as c_uint) == NVML_SUCCESS {
            Some(CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned())
        } else {
            None
        }
    }
}
