use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Telemetry collection paths never propagate these — a missing reading is
/// represented as `None`/absent fields instead (see `core::gpu_telemetry`).
/// This type is used at the edges: config I/O, CLI parsing, benchmark
/// execution and diagnostics.
#[derive(Error, Debug)]
pub enum AizError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("vendor library unavailable: {0}")]
    VendorUnavailable(String),

    #[error("vendor call failed: {0}")]
    VendorCall(String),

    #[error("device allocation failed: {0}")]
    DeviceAlloc(String),

    #[error("benchmark failed: {0}")]
    Benchmark(String),

    #[error("unsupported snapshot format: {0}")]
    UnsupportedFormat(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AizError>;
