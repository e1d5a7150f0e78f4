//! ai-z: an interactive terminal hardware telemetry and GPU benchmark tool.
//!
//! The binary crate (`src/main.rs`) is a thin CLI dispatcher; everything
//! that matters lives here as a library so it can be unit-tested without a
//! terminal. See `DESIGN.md` for the grounding ledger and `SPEC_FULL.md` for
//! the full functional spec this crate implements.

pub mod bench;
pub mod cli;
pub mod collectors;
pub mod config;
pub mod core;
pub mod dynload;
pub mod error;
pub mod gpu;
pub mod hardware_probe;
pub mod i18n;
pub mod npu_probe;
pub mod safe_call;
pub mod snapshot;
pub mod tui;

pub use error::{AizError, Result};
