//! Multi-source GPU telemetry: priority-ordered vendor sources, the merger
//! that combines them into one record per device, and the background
//! sampler that keeps a cache fresh without blocking the UI thread.

pub mod merger;
pub mod sampler;
pub mod sources;

pub use merger::TelemetryMerger;
pub use sampler::GpuSampler;
pub use sources::VendorHint;
