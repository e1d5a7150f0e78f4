//! DXGI adapter enumeration (Windows only), shared by the ADLX reduced
//! subset and the Windows PDH/D3DKMT/SetupAPI telemetry sources: gives each
//! a stable device index -> LUID/vendor/device-id/VRAM-size mapping without
//! depending on any vendor SDK.

pub struct AdapterInfo {
    pub luid_low: u32,
    pub luid_high: i32,
    pub vendor_id: u32,
    pub device_id: u32,
    pub dedicated_vram_bytes: u64,
    pub description: String,
}

#[cfg(target_os = "windows")]
pub fn enumerate() -> Vec<AdapterInfo> {
    use windows::Win32::Graphics::Dxgi::{CreateDXGIFactory1, IDXGIFactory1, DXGI_ADAPTER_FLAG_SOFTWARE};

    let mut out = Vec::new();
    // SAFETY: CreateDXGIFactory1/EnumAdapters1/GetDesc1 are standard DXGI
    // enumeration calls; every failure is handled by stopping enumeration,
    // never by panicking.
    unsafe {
        let factory: windows::core::Result<IDXGIFactory1> = CreateDXGIFactory1();
        let Ok(factory) = factory else {
            return out;
        };

        let mut index = 0u32;
        loop {
            let Ok(adapter) = factory.EnumAdapters1(index) else {
                break;
            };
            index += 1;

            let Ok(desc) = adapter.GetDesc1() else {
                continue;
            };
            if (desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32) != 0 {
                continue;
            }

            let nul = desc.Description.iter().position(|&c| c == 0).unwrap_or(desc.Description.len());
            out.push(AdapterInfo {
                luid_low: desc.AdapterLuid.LowPart,
                luid_high: desc.AdapterLuid.HighPart,
                vendor_id: desc.VendorId,
                device_id: desc.DeviceId,
                dedicated_vram_bytes: desc.DedicatedVideoMemory as u64,
                description: String::from_utf16_lossy(&desc.Description[..nul]),
            });
        }
    }
    out
}

#[cfg(not(target_os = "windows"))]
pub fn enumerate() -> Vec<AdapterInfo> {
    Vec::new()
}

/// The `index`-th non-software adapter in enumeration order — the same
/// indexing scheme `GpuTelemetrySources` uses everywhere else.
pub fn adapter_at(index: u32) -> Option<AdapterInfo> {
    enumerate().into_iter().nth(index as usize)
}
