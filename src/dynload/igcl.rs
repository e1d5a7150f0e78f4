//! Intel IGCL (Intel Graphics Control Library) bindings (Windows only). IGCL
//! exposes a C ABI (`ctlInit`, `ctlEnumerateDevices`, `ctlGetDeviceProperties`,
//! telemetry via `ctlPowerTelemetryGet`, with `ctlPciGetState` plus
//! temperature/frequency domain enumeration as fallbacks when power
//! telemetry doesn't carry a field).

use crate::core::GpuTelemetry;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::c_void;

#[cfg(target_os = "windows")]
const CANDIDATES: &[&str] = &["igcl.dll", "ControlLib.dll"];
#[cfg(not(target_os = "windows"))]
const CANDIDATES: &[&str] = &[];

pub type CtlResult = i32;
pub const CTL_RESULT_SUCCESS: CtlResult = 0;

type CtlApiHandle = *mut c_void;
type CtlDeviceAdapterHandle = *mut c_void;
type CtlTempHandle = *mut c_void;
type CtlFreqHandle = *mut c_void;

const CTL_FREQ_DOMAIN_GPU: u32 = 0;
const CTL_FREQ_DOMAIN_MEMORY: u32 = 1;
const CTL_FAN_COUNT: usize = 5;

#[repr(C)]
#[derive(Clone, Copy)]
struct CtlInitArgs {
    size: u32,
    version: u32,
    app_version: u32,
    flags: u32,
    application_uid: [u8; 16],
}

#[repr(C)]
#[derive(Clone, Copy)]
struct CtlDeviceAdapterProperties {
    size: u32,
    version: u32,
    pci_vendor_id: u32,
    pci_device_id: u32,
    rev_id: u32,
    pci_subsys_id: u32,
    name: [u8; 100],
}

impl Default for CtlDeviceAdapterProperties {
    fn default() -> Self {
        // SAFETY: all-zero is a valid bit pattern for this POD struct.
        unsafe { std::mem::zeroed() }
    }
}

/// Tagged-union telemetry item (`ctl_oc_telemetry_item_t`): `type_` selects
/// which arm of `value` IGCL populated, `b_supported` gates whether the
/// field means anything at all.
#[repr(C)]
#[derive(Clone, Copy)]
union CtlTelemetryValue {
    data_i64: i64,
    data_u64: u64,
    data_f64: f64,
    data_f32: f32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct CtlTelemetryItem {
    b_supported: u8,
    _pad: [u8; 3],
    type_: u32,
    units: u32,
    value: CtlTelemetryValue,
}

impl CtlTelemetryItem {
    fn as_f64(&self) -> Option<f64> {
        if self.b_supported == 0 {
            return None;
        }
        // SAFETY: `type_` is the tag IGCL wrote alongside `value`; each arm
        // below reads exactly the arm that tag designates.
        unsafe {
            match self.type_ {
                0 => Some(self.value.data_i64 as i8 as f64),
                1 => Some(self.value.data_u64 as u8 as f64),
                2 => Some(self.value.data_i64 as i16 as f64),
                3 => Some(self.value.data_u64 as u16 as f64),
                4 => Some(self.value.data_i64 as i32 as f64),
                5 => Some(self.value.data_u64 as u32 as f64),
                6 => Some(self.value.data_i64 as f64),
                7 => Some(self.value.data_u64 as f64),
                8 => Some(self.value.data_f32 as f64),
                9 => Some(self.value.data_f64),
                _ => None,
            }
        }
    }
}

impl Default for CtlTelemetryItem {
    fn default() -> Self {
        // SAFETY: all-zero means bSupported = 0, i.e. "not supported".
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
struct CtlPowerTelemetry {
    size: u32,
    version: u32,
    time_stamp: CtlTelemetryItem,
    gpu_energy_counter: CtlTelemetryItem,
    gpu_current_temperature: CtlTelemetryItem,
    global_activity_counter: CtlTelemetryItem,
    media_activity_counter: CtlTelemetryItem,
    gpu_current_clock_frequency: CtlTelemetryItem,
    vram_current_temperature: CtlTelemetryItem,
    vram_read_bandwidth: CtlTelemetryItem,
    vram_write_bandwidth: CtlTelemetryItem,
    vram_read_bandwidth_counter: CtlTelemetryItem,
    vram_write_bandwidth_counter: CtlTelemetryItem,
    fan_speed: [CtlTelemetryItem; CTL_FAN_COUNT],
    gpu_power_limited: u8,
    gpu_temperature_limited: u8,
    gpu_current_limited: u8,
    gpu_voltage_limited: u8,
    gpu_utilization_limited: u8,
}

impl Default for CtlPowerTelemetry {
    fn default() -> Self {
        // SAFETY: every telemetry item defaults to bSupported = 0 and every
        // limiting flag defaults to 0 (not limited) under an all-zero
        // bit pattern.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct CtlPciSpeed {
    gen: i32,
    width: i32,
    max_bandwidth: i64,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct CtlPciState {
    size: u32,
    version: u32,
    speed: CtlPciSpeed,
    max_speed: CtlPciSpeed,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct CtlFreqProperties {
    size: u32,
    version: u32,
    domain_type: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct CtlFreqState {
    size: u32,
    version: u32,
    actual: f64,
    request: f64,
}

pub struct Api {
    _lib: libloading::Library,
    handle: CtlApiHandle,
    close: unsafe extern "C" fn(CtlApiHandle) -> CtlResult,
    enumerate_devices:
        unsafe extern "C" fn(CtlApiHandle, *mut u32, *mut CtlDeviceAdapterHandle) -> CtlResult,
    get_device_properties:
        unsafe extern "C" fn(CtlDeviceAdapterHandle, *mut CtlDeviceAdapterProperties) -> CtlResult,
    power_telemetry_get:
        unsafe extern "C" fn(CtlDeviceAdapterHandle, *mut CtlPowerTelemetry) -> CtlResult,
    pci_get_state:
        Option<unsafe extern "C" fn(CtlDeviceAdapterHandle, *mut CtlPciState) -> CtlResult>,
    enum_temperature_sensors: Option<
        unsafe extern "C" fn(CtlDeviceAdapterHandle, *mut u32, *mut CtlTempHandle) -> CtlResult,
    >,
    temperature_get_state: Option<unsafe extern "C" fn(CtlTempHandle, *mut f64) -> CtlResult>,
    enum_frequency_domains: Option<
        unsafe extern "C" fn(CtlDeviceAdapterHandle, *mut u32, *mut CtlFreqHandle) -> CtlResult,
    >,
    frequency_get_properties:
        Option<unsafe extern "C" fn(CtlFreqHandle, *mut CtlFreqProperties) -> CtlResult>,
    frequency_get_state: Option<unsafe extern "C" fn(CtlFreqHandle, *mut CtlFreqState) -> CtlResult>,
}

// SAFETY: see dynload::nvml::Api. `handle` is an opaque pointer IGCL itself
// manages; every call site borrows `&'static Api` so no two threads mutate
// it concurrently beyond what IGCL's own internals already serialize.
unsafe impl Send for Api {}
unsafe impl Sync for Api {}

static API: OnceCell<Result<Api, String>> = OnceCell::new();

struct IgclSample {
    last_timestamp_s: f64,
    last_gpu_energy_j: f64,
    last_global_activity_s: f64,
    last_vram_read_bw_bytes: f64,
    last_vram_write_bw_bytes: f64,
}

impl Default for IgclSample {
    fn default() -> Self {
        Self {
            last_timestamp_s: -1.0,
            last_gpu_energy_j: -1.0,
            last_global_activity_s: -1.0,
            last_vram_read_bw_bytes: -1.0,
            last_vram_write_bw_bytes: -1.0,
        }
    }
}

/// Per-device previous-sample cache so util%/power/VRAM-bandwidth can be
/// derived from counter deltas across ticks (spec §4.5 item 3), keyed by
/// the device index the caller asked for.
static SAMPLES: Lazy<Mutex<HashMap<u32, IgclSample>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn load() -> Result<Api, String> {
    let lib = super::open_first(CANDIDATES)?;
    // SAFETY: symbol names/signatures match Intel's published IGCL headers.
    unsafe {
        let init: unsafe extern "C" fn(*mut CtlInitArgs, *mut CtlApiHandle) -> CtlResult =
            super::required_symbol(&lib, b"ctlInit\0")?;
        let close = super::required_symbol(&lib, b"ctlClose\0")?;
        let enumerate_devices = super::required_symbol(&lib, b"ctlEnumerateDevices\0")?;
        let get_device_properties = super::required_symbol(&lib, b"ctlGetDeviceProperties\0")?;
        let power_telemetry_get = super::required_symbol(&lib, b"ctlPowerTelemetryGet\0")?;
        let pci_get_state = super::optional_symbol(&lib, b"ctlPciGetState\0");
        let enum_temperature_sensors =
            super::optional_symbol(&lib, b"ctlEnumTemperatureSensors\0");
        let temperature_get_state = super::optional_symbol(&lib, b"ctlTemperatureGetState\0");
        let enum_frequency_domains = super::optional_symbol(&lib, b"ctlEnumFrequencyDomains\0");
        let frequency_get_properties =
            super::optional_symbol(&lib, b"ctlFrequencyGetProperties\0");
        let frequency_get_state = super::optional_symbol(&lib, b"ctlFrequencyGetState\0");

        let mut init_args = CtlInitArgs {
            size: std::mem::size_of::<CtlInitArgs>() as u32,
            version: 0,
            app_version: 0,
            flags: 0,
            application_uid: [0; 16],
        };
        let mut handle: CtlApiHandle = std::ptr::null_mut();
        if init(&mut init_args, &mut handle) != CTL_RESULT_SUCCESS || handle.is_null() {
            return Err("ctlInit failed".to_string());
        }

        Ok(Api {
            _lib: lib,
            handle,
            close,
            enumerate_devices,
            get_device_properties,
            power_telemetry_get,
            pci_get_state,
            enum_temperature_sensors,
            temperature_get_state,
            enum_frequency_domains,
            frequency_get_properties,
            frequency_get_state,
        })
    }
}

pub fn api() -> Option<&'static Api> {
    API.get_or_init(load).as_ref().ok()
}

pub fn is_available() -> bool {
    api().is_some()
}

fn device_handle(api: &Api, index: u32) -> Option<CtlDeviceAdapterHandle> {
    let mut count: u32 = 0;
    // SAFETY: null data pointer with a valid count pointer is the documented
    // two-call "get the count first" idiom for ctlEnumerateDevices.
    unsafe {
        if (api.enumerate_devices)(api.handle, &mut count, std::ptr::null_mut())
            != CTL_RESULT_SUCCESS
            || count == 0
        {
            return None;
        }
    }
    let mut handles = vec![std::ptr::null_mut::<c_void>(); count as usize];
    // SAFETY: handles is sized to the count the prior call reported.
    unsafe {
        if (api.enumerate_devices)(api.handle, &mut count, handles.as_mut_ptr())
            != CTL_RESULT_SUCCESS
        {
            return None;
        }
    }
    handles.get(index as usize).copied()
}

fn read_temperature_fallback(api: &Api, handle: CtlDeviceAdapterHandle) -> Option<f64> {
    let enum_f = api.enum_temperature_sensors?;
    let state_f = api.temperature_get_state?;
    let mut count: u32 = 0;
    // SAFETY: two-call enumerate idiom, same as device_handle.
    unsafe {
        if enum_f(handle, &mut count, std::ptr::null_mut()) != CTL_RESULT_SUCCESS || count == 0 {
            return None;
        }
        let mut sensors = vec![std::ptr::null_mut::<c_void>(); count as usize];
        if enum_f(handle, &mut count, sensors.as_mut_ptr()) != CTL_RESULT_SUCCESS {
            return None;
        }
        let mut max_temp = -1.0f64;
        for sensor in sensors {
            let mut t = 0.0f64;
            if state_f(sensor, &mut t) == CTL_RESULT_SUCCESS && t > max_temp {
                max_temp = t;
            }
        }
        (max_temp >= 0.0).then_some(max_temp)
    }
}

fn read_frequency_fallback(api: &Api, handle: CtlDeviceAdapterHandle, domain: u32) -> Option<f64> {
    let enum_f = api.enum_frequency_domains?;
    let props_f = api.frequency_get_properties?;
    let state_f = api.frequency_get_state?;
    let mut count: u32 = 0;
    // SAFETY: two-call enumerate idiom, same as device_handle.
    unsafe {
        if enum_f(handle, &mut count, std::ptr::null_mut()) != CTL_RESULT_SUCCESS || count == 0 {
            return None;
        }
        let mut domains = vec![std::ptr::null_mut::<c_void>(); count as usize];
        if enum_f(handle, &mut count, domains.as_mut_ptr()) != CTL_RESULT_SUCCESS {
            return None;
        }
        for freq_domain in domains {
            let mut props = CtlFreqProperties {
                size: std::mem::size_of::<CtlFreqProperties>() as u32,
                version: 0,
                domain_type: u32::MAX,
            };
            if props_f(freq_domain, &mut props) != CTL_RESULT_SUCCESS || props.domain_type != domain
            {
                continue;
            }
            let mut state = CtlFreqState {
                size: std::mem::size_of::<CtlFreqState>() as u32,
                version: 0,
                actual: -1.0,
                request: -1.0,
            };
            if state_f(freq_domain, &mut state) != CTL_RESULT_SUCCESS {
                continue;
            }
            if state.actual >= 0.0 {
                return Some(state.actual);
            }
            if state.request >= 0.0 {
                return Some(state.request);
            }
        }
    }
    None
}

/// Reads telemetry for the IGCL device at `index`: the enumerate -> device
/// properties -> power telemetry handshake, with PCI link state and
/// temperature/frequency-domain fallbacks when power telemetry doesn't
/// supply a field. Utilization and power are derived from counter deltas
/// against the previous sample (spec §4.5 item 3); off Windows (and when
/// no IGCL is installed) this always reports nothing so callers fall
/// through to the next source in priority order.
pub fn read_telemetry(index: u32) -> Option<GpuTelemetry> {
    let api = api()?;
    let handle = device_handle(api, index)?;

    let mut props = CtlDeviceAdapterProperties {
        size: std::mem::size_of::<CtlDeviceAdapterProperties>() as u32,
        version: 2,
        ..Default::default()
    };
    // SAFETY: props is sized/versioned per the struct above.
    let props_ok = unsafe { (api.get_device_properties)(handle, &mut props) } == CTL_RESULT_SUCCESS;
    if props_ok && props.pci_vendor_id != 0 && props.pci_vendor_id != 0x8086 {
        return None;
    }

    let mut power = CtlPowerTelemetry {
        size: std::mem::size_of::<CtlPowerTelemetry>() as u32,
        version: 1,
        ..Default::default()
    };
    // SAFETY: power is sized/versioned per the struct above.
    let power_ok = unsafe { (api.power_telemetry_get)(handle, &mut power) } == CTL_RESULT_SUCCESS;

    let mut out = GpuTelemetry {
        source: Some("igcl".to_string()),
        ..Default::default()
    };

    if power_ok {
        if let Some(temp) = power.gpu_current_temperature.as_f64() {
            out.temp_c = Some(temp);
        }
        if let Some(clock) = power.gpu_current_clock_frequency.as_f64() {
            out.gpu_clock_mhz = Some(clock.max(0.0) as u32);
        }

        let ts = power.time_stamp.as_f64();
        let energy = power.gpu_energy_counter.as_f64();
        let activity = power.global_activity_counter.as_f64();
        let vram_read_bw = power.vram_read_bandwidth.as_f64();
        let vram_write_bw = power.vram_write_bandwidth.as_f64();
        let vram_read_ctr = power.vram_read_bandwidth_counter.as_f64();
        let vram_write_ctr = power.vram_write_bandwidth_counter.as_f64();

        let mut samples = SAMPLES.lock();
        let sample = samples.entry(index).or_default();

        if let (Some(ts), Some(energy)) = (ts, energy) {
            if sample.last_timestamp_s >= 0.0 && sample.last_gpu_energy_j >= 0.0 {
                let dt = ts - sample.last_timestamp_s;
                let de = energy - sample.last_gpu_energy_j;
                if dt > 0.0 && de >= 0.0 {
                    out.watts = Some(de / dt);
                }
            }
        }

        if let (Some(ts), Some(activity)) = (ts, activity) {
            if sample.last_timestamp_s >= 0.0 && sample.last_global_activity_s >= 0.0 {
                let dt = ts - sample.last_timestamp_s;
                let da = activity - sample.last_global_activity_s;
                if dt > 0.0 && da >= 0.0 {
                    out.util_pct = Some((da / dt * 100.0).clamp(0.0, 100.0));
                }
            }
        }

        out.vram_bandwidth_mbps = match (vram_read_bw, vram_write_bw) {
            (Some(r), Some(w)) => Some(r + w),
            _ => {
                if let (Some(ts), Some(rc), Some(wc)) = (ts, vram_read_ctr, vram_write_ctr) {
                    if sample.last_timestamp_s >= 0.0
                        && sample.last_vram_read_bw_bytes >= 0.0
                        && sample.last_vram_write_bw_bytes >= 0.0
                    {
                        let dt = ts - sample.last_timestamp_s;
                        let dr = rc - sample.last_vram_read_bw_bytes;
                        let dw = wc - sample.last_vram_write_bw_bytes;
                        if dt > 0.0 && dr >= 0.0 && dw >= 0.0 {
                            Some(((dr + dw) / dt) / (1024.0 * 1024.0))
                        } else {
                            None
                        }
                    } else {
                        None
                    }
                } else {
                    None
                }
            }
        };

        // Throttle-state string, priority power > thermal > current > voltage
        // > utilization; no flag set leaves `pstate` unset.
        out.pstate = if power.gpu_power_limited != 0 {
            Some("PWR".to_string())
        } else if power.gpu_temperature_limited != 0 {
            Some("TMP".to_string())
        } else if power.gpu_current_limited != 0 {
            Some("CUR".to_string())
        } else if power.gpu_voltage_limited != 0 {
            Some("VLT".to_string())
        } else if power.gpu_utilization_limited != 0 {
            Some("IDLE".to_string())
        } else {
            None
        };

        if let Some(v) = ts {
            sample.last_timestamp_s = v;
        }
        if let Some(v) = energy {
            sample.last_gpu_energy_j = v;
        }
        if let Some(v) = activity {
            sample.last_global_activity_s = v;
        }
        if let Some(v) = vram_read_ctr {
            sample.last_vram_read_bw_bytes = v;
        }
        if let Some(v) = vram_write_ctr {
            sample.last_vram_write_bw_bytes = v;
        }
    }

    if out.temp_c.is_none() {
        out.temp_c = read_temperature_fallback(api, handle);
    }
    if out.gpu_clock_mhz.is_none() {
        if let Some(f) = read_frequency_fallback(api, handle, CTL_FREQ_DOMAIN_GPU) {
            out.gpu_clock_mhz = Some(f.max(0.0) as u32);
        }
    }
    if out.mem_clock_mhz.is_none() {
        if let Some(f) = read_frequency_fallback(api, handle, CTL_FREQ_DOMAIN_MEMORY) {
            out.mem_clock_mhz = Some(f.max(0.0) as u32);
        }
    }

    if let Some(f) = api.pci_get_state {
        let mut state = CtlPciState {
            size: std::mem::size_of::<CtlPciState>() as u32,
            version: 0,
            ..Default::default()
        };
        // SAFETY: state is sized/versioned per the struct above.
        if unsafe { f(handle, &mut state) } == CTL_RESULT_SUCCESS {
            if state.speed.width > 0 {
                out.pcie_link_width = Some(state.speed.width as u32);
            }
            if state.speed.gen > 0 {
                out.pcie_link_gen = Some(state.speed.gen as u32);
            }
        }
    }

    let _ = api.close; // kept alive for process-exit cleanup; IGCL stays initialized for the process lifetime.

    out.has_any_field().then_some(out)
}
