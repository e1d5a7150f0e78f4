//! JSON device snapshot (spec §6), grounded in
//! `original_source/src/aiz/snapshot/snapshot.cpp`. Implemented with
//! `serde_json::{Map, Value}` so optional fields are naturally *omitted*
//! rather than serialized as `null`, matching spec and the original's
//! hand-rolled `ObjectBuilder::addOptionalString`.

use serde_json::{Map, Value};

use crate::collectors::{CpuUsageCollector, DiskBandwidthCollector, NetworkBandwidthCollector, RamUsageCollector};
use crate::core::HardwareInfo;
use crate::gpu::merger::TelemetryMerger;
use crate::gpu::sources::VendorHint;
use crate::npu_probe::probe_npu_devices;

fn format_percent(pct: f64) -> String {
    format!("{pct:.0}%")
}

fn format_mhz(mhz: u32) -> String {
    format!("{mhz}MHz")
}

fn format_celsius(temp: f64) -> String {
    format!("{temp:.0}C")
}

fn format_watts(watts: f64) -> String {
    format!("{watts:.0}W")
}

fn format_gib(gib: f64) -> String {
    format!("{gib:.1}GiB")
}

fn format_bandwidth(value: f64, unit: &str) -> String {
    format!("{value:.1} {unit}")
}

/// `YYYY-MM-DDTHH:MM:SSZ`. No `chrono`/`time` dependency: the teacher has
/// neither, and a UTC broken-down-time conversion from `SystemTime` is a few
/// lines of arithmetic (days-since-epoch -> y/m/d via the civil_from_days
/// algorithm), not worth a new crate for one call site.
pub fn current_timestamp() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_unix_timestamp(now.as_secs())
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn format_unix_timestamp(epoch_secs: u64) -> String {
    let days = (epoch_secs / 86400) as i64;
    let secs_of_day = epoch_secs % 86400;
    let (year, month, day) = civil_from_days(days);
    let hour = secs_of_day / 3600;
    let minute = (secs_of_day % 3600) / 60;
    let second = secs_of_day % 60;
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z")
}

fn new_device(device_type: &str, device_name: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("device_type".to_string(), Value::String(device_type.to_string()));
    map.insert("device_name".to_string(), Value::String(device_name.to_string()));
    map
}

fn put_opt(map: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        map.insert(key.to_string(), Value::String(v));
    }
}

/// One pass over every telemetry source: GPU, CPU, RAM, NPU, disk, network.
/// Mirrors `captureSystemSnapshot`'s device ordering exactly. Bandwidth
/// collectors are constructed fresh each call (matching the `static` local
/// collectors in the original, which persist for the process's lifetime),
/// so the very first call of a process never reports disk/network bandwidth
/// — the same "first sample is None" contract the collectors themselves
/// document.
pub fn capture_system_snapshot(hw: &HardwareInfo, gpu_count: u32, vendor: VendorHint) -> Value {
    let mut devices = Vec::new();

    let merger = TelemetryMerger::new();
    for i in 0..gpu_count {
        let Some(gpu) = merger.read(i, vendor) else { continue };
        let name = crate::dynload::nvml::device_display_name(i).unwrap_or_else(|| format!("GPU{i}"));
        let mut dev = new_device("gpu", &name);

        put_opt(&mut dev, "gpu_clock", gpu.gpu_clock_mhz.map(format_mhz));
        put_opt(&mut dev, "mem_clock", gpu.mem_clock_mhz.map(format_mhz));
        put_opt(&mut dev, "temp", gpu.temp_c.map(format_celsius));
        put_opt(&mut dev, "power_draw", gpu.watts.map(format_watts));
        put_opt(&mut dev, "gpu_util", gpu.util_pct.map(format_percent));
        if let (Some(used), Some(total)) = (gpu.vram_used_gib, gpu.vram_total_gib) {
            put_opt(&mut dev, "vram_used", Some(format_gib(used)));
            put_opt(&mut dev, "vram_total", Some(format_gib(total)));
            if total > 0.0 {
                put_opt(&mut dev, "mem_util", Some(format_percent((used / total * 100.0).clamp(0.0, 100.0))));
            }
        }

        devices.push(Value::Object(dev));
    }

    {
        let mut cpu_collector = CpuUsageCollector::new();
        let cpu_sample = cpu_collector.sample();
        let mut dev = new_device("cpu", if hw.cpu_model.is_empty() { "CPU" } else { &hw.cpu_model });
        put_opt(&mut dev, "cpu_util", cpu_sample.map(|s| format_percent(s.value)));
        if hw.logical_cores > 0 {
            put_opt(&mut dev, "core_count", Some(hw.logical_cores.to_string()));
        }
        devices.push(Value::Object(dev));
    }

    {
        let mut ram_collector = RamUsageCollector::new();
        if let Some(ram) = ram_collector.sample() {
            let mut dev = new_device("ram", "System Memory");
            put_opt(&mut dev, "ram_used", Some(format_gib(ram.used_gib)));
            put_opt(&mut dev, "ram_total", Some(format_gib(ram.total_gib)));
            put_opt(&mut dev, "ram_util", Some(format_percent(ram.used_pct)));
            devices.push(Value::Object(dev));
        }
    }

    for npu in probe_npu_devices() {
        let mut dev = new_device("npu", &npu.name);
        put_opt(&mut dev, "npu_vendor", Some(npu.vendor.to_string()));
        put_opt(&mut dev, "peak_tops", npu.peak_tops.map(|t| format!("{t:.1} TOPS")));
        if !npu.driver_version.is_empty() {
            put_opt(&mut dev, "driver_version", Some(npu.driver_version.clone()));
        }
        devices.push(Value::Object(dev));
    }

    {
        let mut disk_read = DiskBandwidthCollector::new();
        let mut disk_write = DiskBandwidthCollector::new();
        let read_sample = disk_read.sample().map(|(r, _)| r);
        let write_sample = disk_write.sample().map(|(_, w)| w);
        if read_sample.is_some() || write_sample.is_some() {
            let mut dev = new_device("disk", "Disk I/O");
            put_opt(&mut dev, "read_bw", read_sample.map(|v| format_bandwidth(v, "MB/s")));
            put_opt(&mut dev, "write_bw", write_sample.map(|v| format_bandwidth(v, "MB/s")));
            devices.push(Value::Object(dev));
        }
    }

    {
        let mut net = NetworkBandwidthCollector::new();
        if let Some((rx, tx)) = net.sample() {
            let mut dev = new_device("network", "Network I/O");
            put_opt(&mut dev, "rx_bw", Some(format_bandwidth(rx, "MB/s")));
            put_opt(&mut dev, "tx_bw", Some(format_bandwidth(tx, "MB/s")));
            devices.push(Value::Object(dev));
        }
    }

    let mut root = Map::new();
    root.insert("timestamp".to_string(), Value::String(current_timestamp()));
    root.insert("devices".to_string(), Value::Array(devices));
    Value::Object(root)
}

pub fn snapshot_to_json(snapshot: &Value) -> String {
    serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string())
}

pub fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

/// Runs `--snapshot --snapshot-loop`: primes the delta collectors with one
/// discarded sample (bandwidth collectors need two samples before they
/// report anything), then clears the screen and emits JSON every
/// `interval_ms` until `running` goes false (the `main.rs` Ctrl+C handler
/// flips it).
pub fn run_snapshot_loop(
    hw: &HardwareInfo,
    gpu_count: u32,
    vendor: VendorHint,
    interval_ms: u32,
    running: &std::sync::atomic::AtomicBool,
) {
    let _ = capture_system_snapshot(hw, gpu_count, vendor);
    std::thread::sleep(std::time::Duration::from_millis(100));

    while running.load(std::sync::atomic::Ordering::Relaxed) {
        clear_screen();
        let snapshot = capture_system_snapshot(hw, gpu_count, vendor);
        println!("{}", snapshot_to_json(&snapshot));

        let mut remaining = interval_ms;
        while remaining > 0 && running.load(std::sync::atomic::Ordering::Relaxed) {
            let step = remaining.min(100);
            std::thread::sleep(std::time::Duration::from_millis(step as u64));
            remaining -= step;
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_matches_iso8601_utc_shape() {
        // 2024-01-01T00:00:00Z
        assert_eq!(format_unix_timestamp(1_704_067_200), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn snapshot_without_gpus_has_cpu_and_ram_but_no_gpu_entries() {
        let hw = HardwareInfo { cpu_model: "Test CPU".to_string(), logical_cores: 8, ..Default::default() };
        let snapshot = capture_system_snapshot(&hw, 0, VendorHint::Unknown);
        let json = snapshot_to_json(&snapshot);

        assert!(json.contains("\"device_type\":\"cpu\""));
        assert!(!json.contains("\"device_type\":\"gpu\""));
        assert!(!json.contains("fan_speed"));
    }

    #[test]
    fn format_helpers_match_spec_unit_suffixes() {
        assert_eq!(format_percent(45.2), "45%");
        assert_eq!(format_mhz(1800), "1800MHz");
        assert_eq!(format_celsius(65.4), "65C");
        assert_eq!(format_watts(250.1), "250W");
        assert_eq!(format_gib(4.0), "4.0GiB");
        assert_eq!(format_bandwidth(120.0, "MB/s"), "120.0 MB/s");
    }
}
