//! Shared PCIe bandwidth recipe (spec §4.9): 256 MiB host↔device copy,
//! warmup then timed, reported as decimal GB/s. Each backend (CUDA, OpenCL,
//! Vulkan) supplies its own copy/timing primitives through [`PcieBackend`];
//! the timing and reporting logic here is shared so the three bench structs
//! only differ in their `PcieBackend` impl.

pub const TRANSFER_BYTES: usize = 256 * 1024 * 1024;
const WARMUP_COPIES: u32 = 2;
const TIMED_COPIES: u32 = 10;

pub enum Direction {
    HostToDevice,
    DeviceToHost,
}

/// Backend-specific primitives needed to time one direction of a PCIe copy.
/// Implementors own their device/stream setup and teardown.
pub trait PcieBackend {
    /// Runs `copies` async copies of `TRANSFER_BYTES` in `direction`,
    /// synchronizes, and returns elapsed seconds.
    fn timed_copies(&self, direction: Direction, copies: u32) -> Result<f64, String>;
}

fn gb_per_sec(bytes: usize, copies: u32, elapsed_seconds: f64) -> Result<f64, String> {
    if elapsed_seconds <= 0.0 {
        return Err("non-positive elapsed time measuring PCIe copy".to_string());
    }
    Ok(bytes as f64 * copies as f64 / elapsed_seconds / 1e9)
}

/// Runs the shared warmup+timed recipe for one direction, returning GB/s.
pub fn bench_direction(backend: &dyn PcieBackend, direction: Direction) -> Result<f64, String> {
    backend.timed_copies(
        match direction {
            Direction::HostToDevice => Direction::HostToDevice,
            Direction::DeviceToHost => Direction::DeviceToHost,
        },
        WARMUP_COPIES,
    )?;
    let elapsed = backend.timed_copies(
        match direction {
            Direction::HostToDevice => Direction::HostToDevice,
            Direction::DeviceToHost => Direction::DeviceToHost,
        },
        TIMED_COPIES,
    )?;
    gb_per_sec(TRANSFER_BYTES, TIMED_COPIES, elapsed)
}

/// Runs both directions and formats the aggregate `"RX: x GB/s, TX: y
/// GB/s"` two-line report used by the per-GPU aggregate PCIe bench.
pub fn bench_aggregate(backend: &dyn PcieBackend) -> Result<String, String> {
    let rx = bench_direction(backend, Direction::DeviceToHost)?;
    let tx = bench_direction(backend, Direction::HostToDevice)?;
    Ok(format!("RX: {rx:.2} GB/s\nTX: {tx:.2} GB/s"))
}
