//! `GpuSampler` (spec §4.7): a 500ms background thread that snapshots every
//! GPU's telemetry plus aggregate PCIe throughput into a mutex-guarded cache,
//! so the UI thread never blocks on a vendor SDK call.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::core::GpuTelemetry;
use crate::dynload::nvml;

use super::merger::TelemetryMerger;
use super::sources::VendorHint;

const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

struct SamplerState {
    gpus: Vec<Option<GpuTelemetry>>,
    pcie: Option<(f64, f64)>,
}

/// Memoized Windows PCIe counter support flag: the first failed probe sets
/// this so the cost is never paid again and the UI can permanently hide
/// PCIe rows, matching spec §4.7.
static WINDOWS_PCIE_UNSUPPORTED: AtomicBool = AtomicBool::new(false);

#[cfg(target_os = "windows")]
fn probe_windows_pcie_counters() -> Option<(f64, f64)> {
    use windows::core::PCWSTR;
    use windows::Win32::System::Performance::{
        PdhAddEnglishCounterW, PdhCloseQuery, PdhCollectQueryData, PdhGetFormattedCounterValue,
        PdhOpenQueryW, HCOUNTER, HQUERY, PDH_FMT_COUNTERVALUE, PDH_FMT_DOUBLE,
    };

    fn wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    // SAFETY: every handle below is opened, checked, and closed in this
    // function; output buffers are valid stack locals sized to what each
    // PDH call documents.
    unsafe {
        let mut query = HQUERY::default();
        if PdhOpenQueryW(PCWSTR::null(), 0, &mut query) != 0 {
            return None;
        }

        let rx_path = wide(r"\GPU Engine(*)\Bytes Received/sec");
        let tx_path = wide(r"\GPU Engine(*)\Bytes Sent/sec");
        let mut rx_counter = HCOUNTER::default();
        let mut tx_counter = HCOUNTER::default();

        let rx_added = PdhAddEnglishCounterW(query, PCWSTR(rx_path.as_ptr()), 0, &mut rx_counter) == 0;
        let tx_added = PdhAddEnglishCounterW(query, PCWSTR(tx_path.as_ptr()), 0, &mut tx_counter) == 0;

        if !rx_added || !tx_added || PdhCollectQueryData(query) != 0 {
            let _ = PdhCloseQuery(query);
            return None;
        }

        let mut rx_value = PDH_FMT_COUNTERVALUE::default();
        let mut tx_value = PDH_FMT_COUNTERVALUE::default();
        let rx_ok = PdhGetFormattedCounterValue(rx_counter, PDH_FMT_DOUBLE, None, &mut rx_value) == 0;
        let tx_ok = PdhGetFormattedCounterValue(tx_counter, PDH_FMT_DOUBLE, None, &mut tx_value) == 0;

        let _ = PdhCloseQuery(query);

        if rx_ok && tx_ok {
            Some((
                rx_value.Anonymous.doubleValue / 1_000_000.0,
                tx_value.Anonymous.doubleValue / 1_000_000.0,
            ))
        } else {
            None
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn probe_windows_pcie_counters() -> Option<(f64, f64)> {
    None
}

/// Probes `\GPU Engine(*)\Bytes {Received,Sent}/sec` via PDH; only the first
/// genuinely failed probe (no matching counter, query error) latches
/// [`WINDOWS_PCIE_UNSUPPORTED`] so later ticks skip the syscalls entirely.
fn windows_pcie_throughput() -> Option<(f64, f64)> {
    if cfg!(not(target_os = "windows")) {
        return None;
    }
    if std::env::var_os("AI_Z_DISABLE_PDH").is_some() {
        return None;
    }
    if WINDOWS_PCIE_UNSUPPORTED.load(Ordering::Relaxed) {
        return None;
    }
    match probe_windows_pcie_counters() {
        Some(v) => Some(v),
        None => {
            WINDOWS_PCIE_UNSUPPORTED.store(true, Ordering::Relaxed);
            None
        }
    }
}

pub struct GpuSampler {
    state: Arc<Mutex<SamplerState>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl GpuSampler {
    /// Spawns the background thread unless `AI_Z_DISABLE_GPU_SAMPLER` is set,
    /// in which case the sampler holds empty state and the caller is
    /// expected to sample inline via [`TelemetryMerger`] instead.
    pub fn spawn(gpu_count: u32, vendor: VendorHint) -> Self {
        let state = Arc::new(Mutex::new(SamplerState {
            gpus: vec![None; gpu_count as usize],
            pcie: None,
        }));
        let stop = Arc::new(AtomicBool::new(false));

        if std::env::var_os("AI_Z_DISABLE_GPU_SAMPLER").is_some() {
            return Self {
                state,
                stop,
                handle: None,
            };
        }

        let thread_state = Arc::clone(&state);
        let thread_stop = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("gpu-sampler".to_string())
            .spawn(move || {
                let merger = TelemetryMerger::new();
                while !thread_stop.load(Ordering::Relaxed) {
                    let next: Vec<Option<GpuTelemetry>> =
                        (0..gpu_count).map(|i| merger.read(i, vendor)).collect();
                    let next_pcie = nvml::pcie_throughput_all().or_else(windows_pcie_throughput);

                    {
                        let mut guard = thread_state.lock();
                        guard.gpus = next;
                        guard.pcie = next_pcie;
                    }

                    std::thread::sleep(SAMPLE_INTERVAL);
                }
            })
            .expect("failed to spawn gpu-sampler thread");

        Self {
            state,
            stop,
            handle: Some(handle),
        }
    }

    /// Copies the latest snapshot into the caller's buffers under the mutex.
    pub fn snapshot(&self, out_gpus: &mut Vec<Option<GpuTelemetry>>, out_pcie: &mut Option<(f64, f64)>) {
        let guard = self.state.lock();
        out_gpus.clone_from(&guard.gpus);
        *out_pcie = guard.pcie;
    }

    /// `true` when the background thread is disabled and the caller must
    /// sample inline on the UI thread.
    pub fn is_inline(&self) -> bool {
        self.handle.is_none()
    }
}

impl Drop for GpuSampler {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
