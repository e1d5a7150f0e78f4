pub mod gpu_telemetry;
pub mod hardware_info;
pub mod npu;
pub mod sample;
pub mod timeline;

pub use gpu_telemetry::{GpuTelemetry, PcieLink, PcieThroughput};
pub use hardware_info::HardwareInfo;
pub use npu::{NpuDeviceInfo, NpuVendor};
pub use sample::Sample;
pub use timeline::Timeline;
