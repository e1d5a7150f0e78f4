use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NpuVendor {
    Intel,
    Amd,
    Unknown,
}

impl std::fmt::Display for NpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NpuVendor::Intel => write!(f, "Intel"),
            NpuVendor::Amd => write!(f, "AMD"),
            NpuVendor::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Static identity of a detected NPU device, produced once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpuDeviceInfo {
    pub vendor: NpuVendor,
    pub vendor_id: u32,
    pub device_id: u32,
    pub name: String,
    pub driver_version: String,
    pub peak_tops: Option<f64>,
    pub detail_lines: Vec<String>,
}
