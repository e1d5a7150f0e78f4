//! D3DKMT bindings (Windows only) — the undocumented NT GDI thunks
//! (`D3DKMTOpenAdapterFromLuid`, `D3DKMTQueryVideoMemoryInfo`,
//! `D3DKMTQueryAdapterInfo`, `D3DKMTQueryStatistics`), loaded from
//! `gdi32.dll`. Used as a last-resort VRAM/perf/utilization source on
//! Windows when no vendor SDK is present.

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::c_void;

#[cfg(target_os = "windows")]
const CANDIDATES: &[&str] = &["gdi32.dll"];
#[cfg(not(target_os = "windows"))]
const CANDIDATES: &[&str] = &[];

pub type NtStatus = i32;
pub const STATUS_SUCCESS: NtStatus = 0;

/// Mirrors `LUID` (two 32-bit halves); adapters are identified this way
/// throughout DXGI/D3DKMT.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Luid {
    pub low_part: u32,
    pub high_part: i32,
}

#[repr(C)]
struct OpenAdapterFromLuid {
    adapter_luid: Luid,
    adapter_handle: u32,
}

#[repr(C)]
struct CloseAdapter {
    adapter_handle: u32,
}

const MEMORY_SEGMENT_GROUP_LOCAL: u32 = 0;

#[repr(C)]
struct QueryVideoMemoryInfo {
    adapter_handle: u32,
    node_ordinal: u32,
    memory_segment_group: u32,
    budget: u64,
    current_usage: u64,
    available_for_reservation: u64,
    current_reservation: u64,
}

#[repr(C)]
struct QueryAdapterInfo {
    adapter_handle: u32,
    query_type: u32,
    private_driver_data: *mut c_void,
    private_driver_data_size: u32,
}

const KMTQAITYPE_ADAPTERPERFDATA: u32 = 62;

/// `D3DKMT_ADAPTER_PERFDATA`, pulled via `KMTQAITYPE_ADAPTERPERFDATA`.
/// 8-byte aligned per the real struct's `D3DKMT_ALIGN64` fields.
#[repr(C, align(8))]
#[derive(Clone, Copy)]
pub struct AdapterPerfData {
    pub physical_adapter_index: u32,
    _padding: u32,
    pub memory_frequency: u64,
    pub max_memory_frequency: u64,
    pub max_memory_frequency_oc: u64,
    pub memory_bandwidth: u64,
    pub pcie_bandwidth: u64,
    pub fan_rpm: u32,
    /// Tenths of percent of TDP, *except* some drivers report milliwatts
    /// instead; callers should treat values > 1000 as milliwatts.
    pub power: u32,
    /// Tenths of a degree Celsius.
    pub temperature: u32,
    pub power_state_override: u8,
}

impl Default for AdapterPerfData {
    fn default() -> Self {
        // SAFETY: all-zero is a valid bit pattern for this POD struct.
        unsafe { std::mem::zeroed() }
    }
}

const QUERYSTATISTICS_NODE: u32 = 5;

/// `D3DKMT_QUERYSTATISTICS_NODE_INFORMATION`'s `GlobalInformation` arm: a
/// cumulative node-busy counter in 100ns units, matched against the
/// previous sample to derive a utilization percentage.
#[repr(C)]
#[derive(Clone, Copy)]
struct QueryStatisticsNodeResult {
    node_id: u32,
    _pad: u32,
    running_time_100ns: i64,
    context_switch: u32,
    _pad2: u32,
    // The real QUERY_RESULT union also carries larger ADAPTER/SEGMENT/
    // SEGMENT_GROUP arms; reserve enough room that the driver thunk never
    // writes past this buffer.
    _reserved: [u8; 192],
}

impl Default for QueryStatisticsNodeResult {
    fn default() -> Self {
        // SAFETY: all-zero is a valid bit pattern for this POD struct.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
struct QueryStatistics {
    query_type: u32,
    _pad: u32,
    adapter_luid: Luid,
    process_handle: *mut c_void,
    result: QueryStatisticsNodeResult,
}

pub struct Api {
    _lib: libloading::Library,
    open_adapter_from_luid: unsafe extern "C" fn(*mut OpenAdapterFromLuid) -> NtStatus,
    close_adapter: unsafe extern "C" fn(*mut CloseAdapter) -> NtStatus,
    query_video_memory_info: unsafe extern "C" fn(*mut QueryVideoMemoryInfo) -> NtStatus,
    query_adapter_info: unsafe extern "C" fn(*mut QueryAdapterInfo) -> NtStatus,
    query_statistics: unsafe extern "C" fn(*mut QueryStatistics) -> NtStatus,
}

// SAFETY: see dynload::nvml::Api.
unsafe impl Send for Api {}
unsafe impl Sync for Api {}

static API: OnceCell<Result<Api, String>> = OnceCell::new();

struct PrevNodeSample {
    running_time_100ns: i64,
    sampled_at: std::time::Instant,
}

static NODE_SAMPLES: Lazy<Mutex<HashMap<Luid, PrevNodeSample>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn load() -> Result<Api, String> {
    let lib = super::open_first(CANDIDATES)?;
    // SAFETY: symbol names/signatures match the documented NtGdi D3DKMT
    // thunks exported by gdi32.dll since Windows Vista.
    unsafe {
        Ok(Api {
            open_adapter_from_luid: super::required_symbol(&lib, b"D3DKMTOpenAdapterFromLuid\0")?,
            close_adapter: super::required_symbol(&lib, b"D3DKMTCloseAdapter\0")?,
            query_video_memory_info: super::required_symbol(
                &lib,
                b"D3DKMTQueryVideoMemoryInfo\0",
            )?,
            query_adapter_info: super::required_symbol(&lib, b"D3DKMTQueryAdapterInfo\0")?,
            query_statistics: super::required_symbol(&lib, b"D3DKMTQueryStatistics\0")?,
            _lib: lib,
        })
    }
}

pub fn api() -> Option<&'static Api> {
    API.get_or_init(load).as_ref().ok()
}

pub fn is_available() -> bool {
    api().is_some()
}

struct OpenedAdapter<'a> {
    api: &'a Api,
    handle: u32,
}

impl Drop for OpenedAdapter<'_> {
    fn drop(&mut self) {
        let mut close = CloseAdapter {
            adapter_handle: self.handle,
        };
        // SAFETY: handle came from a successful OpenAdapterFromLuid above.
        unsafe {
            let _ = (self.api.close_adapter)(&mut close);
        }
    }
}

fn open_adapter(api: &Api, luid: Luid) -> Option<OpenedAdapter<'_>> {
    let mut open = OpenAdapterFromLuid {
        adapter_luid: luid,
        adapter_handle: 0,
    };
    // SAFETY: open is a valid stack local the thunk fills in on success.
    let status = unsafe { (api.open_adapter_from_luid)(&mut open) };
    (status == STATUS_SUCCESS).then_some(OpenedAdapter {
        api,
        handle: open.adapter_handle,
    })
}

/// Local video memory budget/current usage in bytes for the adapter with
/// this LUID, via `D3DKMTQueryVideoMemoryInfo`.
pub fn query_video_memory(luid: Luid) -> Option<(u64, u64)> {
    let api = api()?;
    let adapter = open_adapter(api, luid)?;

    let mut q = QueryVideoMemoryInfo {
        adapter_handle: adapter.handle,
        node_ordinal: 0,
        memory_segment_group: MEMORY_SEGMENT_GROUP_LOCAL,
        budget: 0,
        current_usage: 0,
        available_for_reservation: 0,
        current_reservation: 0,
    };
    // SAFETY: q is a valid stack local the thunk fills in on success.
    let status = unsafe { (api.query_video_memory_info)(&mut q) };
    (status == STATUS_SUCCESS).then_some((q.budget, q.current_usage))
}

/// `D3DKMT_ADAPTER_PERFDATA` for the adapter with this LUID (temp, power,
/// fan, memory frequency/bandwidth, PCIe bandwidth).
pub fn query_adapter_perf_data(luid: Luid) -> Option<AdapterPerfData> {
    let api = api()?;
    let adapter = open_adapter(api, luid)?;

    let mut perf = AdapterPerfData::default();
    let mut q = QueryAdapterInfo {
        adapter_handle: adapter.handle,
        query_type: KMTQAITYPE_ADAPTERPERFDATA,
        private_driver_data: &mut perf as *mut AdapterPerfData as *mut c_void,
        private_driver_data_size: std::mem::size_of::<AdapterPerfData>() as u32,
    };
    // SAFETY: q.private_driver_data points at perf, sized exactly to it.
    let status = unsafe { (api.query_adapter_info)(&mut q) };
    (status == STATUS_SUCCESS).then_some(perf)
}

/// GPU-node engine utilization via `D3DKMTQueryStatistics`: the node's
/// cumulative busy time is sampled and compared against the previous
/// sample for this LUID to produce a percentage, the same delta-based
/// approach as `dynload::igcl`. `None` until a second sample is available
/// or the adapter/driver doesn't support the query.
pub fn node_util_pct(adapter_luid_packed: u64) -> Option<f64> {
    let api = api()?;
    let luid = Luid {
        low_part: adapter_luid_packed as u32,
        high_part: (adapter_luid_packed >> 32) as i32,
    };
    let adapter = open_adapter(api, luid)?;

    let mut q = QueryStatistics {
        query_type: QUERYSTATISTICS_NODE,
        _pad: 0,
        adapter_luid: luid,
        process_handle: std::ptr::null_mut(),
        result: QueryStatisticsNodeResult {
            node_id: 0,
            ..Default::default()
        },
    };
    // SAFETY: q is a valid stack local the thunk fills `result` into on
    // success.
    let status = unsafe { (api.query_statistics)(&mut q) };
    if status != STATUS_SUCCESS {
        return None;
    }

    let now = std::time::Instant::now();
    let mut samples = NODE_SAMPLES.lock();
    let prev = samples.insert(
        luid,
        PrevNodeSample {
            running_time_100ns: q.result.running_time_100ns,
            sampled_at: now,
        },
    );

    let prev = prev?;
    let dt = now.saturating_duration_since(prev.sampled_at).as_secs_f64();
    if dt <= 0.0 {
        return None;
    }
    let d_running_100ns = q.result.running_time_100ns - prev.running_time_100ns;
    if d_running_100ns < 0 {
        return None;
    }
    let busy_seconds = d_running_100ns as f64 / 10_000_000.0;
    Some((busy_seconds / dt * 100.0).clamp(0.0, 100.0))
}
