use serde::{Deserialize, Serialize};

/// Immutable static hardware identity, produced exactly once by
/// `hardware_probe::BootHardwareProbe` and consumed by the TUI and the
/// snapshot emitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub os_pretty_name: String,
    pub kernel_version: String,
    pub cpu_model: String,
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub l1_cache_kib: Option<u64>,
    pub l2_cache_kib: Option<u64>,
    pub l3_cache_kib: Option<u64>,
    pub cpu_isa_features: Vec<String>,
    pub ram_summary: String,
    pub gpu_detail_lines: Vec<String>,
    pub nic_lines: Vec<String>,
    pub disk_lines: Vec<String>,
    pub cuda_driver_version: Option<String>,
    pub nvml_version: Option<String>,
    pub rocm_version: Option<String>,
    pub opencl_version: Option<String>,
    pub vulkan_version: Option<String>,
}

impl HardwareInfo {
    /// Render as a flat list of "key: value" lines, the form consumed by the
    /// header panel and the HTML bench report.
    pub fn display_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!("OS: {}", self.os_pretty_name));
        lines.push(format!("Kernel: {}", self.kernel_version));
        lines.push(format!(
            "CPU: {} ({} cores / {} threads)",
            self.cpu_model, self.physical_cores, self.logical_cores
        ));
        if !self.cpu_isa_features.is_empty() {
            lines.push(format!("ISA: {}", self.cpu_isa_features.join(" ")));
        }
        lines.push(format!("RAM: {}", self.ram_summary));
        lines.extend(self.gpu_detail_lines.iter().cloned());
        lines.extend(self.nic_lines.iter().cloned());
        lines.extend(self.disk_lines.iter().cloned());
        if let Some(v) = &self.cuda_driver_version {
            lines.push(format!("CUDA driver: {v}"));
        }
        if let Some(v) = &self.nvml_version {
            lines.push(format!("NVML: {v}"));
        }
        if let Some(v) = &self.rocm_version {
            lines.push(format!("ROCm: {v}"));
        }
        if let Some(v) = &self.opencl_version {
            lines.push(format!("OpenCL: {v}"));
        }
        if let Some(v) = &self.vulkan_version {
            lines.push(format!("Vulkan: {v}"));
        }
        lines
    }
}
