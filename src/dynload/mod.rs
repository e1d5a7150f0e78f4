//! Cross-platform shared-library open + symbol resolution.
//!
//! Each vendor module (`nvml`, `cuda`, `opencl`, `vulkan`, `rocm_smi`,
//! `adlx`, `igcl`, `ort`, `d3dkmt`) exposes a plain-value `Api` struct of
//! function pointers plus an `api() -> Option<&'static Api>` accessor that
//! lazily tries a list of candidate library names, resolves every required
//! symbol, and caches the failure reason so later calls don't retry. Loading
//! never panics.

pub mod adlx;
pub mod cuda;
pub mod d3dkmt;
pub mod dxgi;
pub mod igcl;
pub mod nvml;
pub mod opencl;
pub mod ort;
pub mod rocm_smi;
pub mod vulkan;

use libloading::Library;

/// Tries each candidate name in order, returning the first library that
/// opens successfully. Candidate lists are platform-specific (`.so`, `.so.N`
/// on Unix; `.dll` on Windows) and are supplied by each vendor module.
pub fn open_first(candidates: &[&str]) -> Result<Library, String> {
    let mut last_err = String::new();
    for name in candidates {
        // SAFETY: dlopen/LoadLibrary of an external, untrusted-but-expected
        // system library; failure is handled, not a panic.
        match unsafe { Library::new(name) } {
            Ok(lib) => return Ok(lib),
            Err(e) => last_err = format!("{name}: {e}"),
        }
    }
    Err(if last_err.is_empty() {
        "no candidate library names supplied".to_string()
    } else {
        format!("no candidate library could be loaded ({last_err})")
    })
}

/// Resolves a required symbol; failure should abort the whole Api build.
///
/// # Safety
/// Caller must ensure `T` is the correct ABI-compatible function pointer
/// type for `name` in `lib`.
pub unsafe fn required_symbol<T: Copy>(lib: &Library, name: &[u8]) -> Result<T, String> {
    lib.get::<T>(name)
        .map(|sym| *sym)
        .map_err(|e| format!("missing required symbol {}: {e}", String::from_utf8_lossy(name)))
}

/// Resolves an optional symbol; absence is not an error.
///
/// # Safety
/// Same contract as `required_symbol`.
pub unsafe fn optional_symbol<T: Copy>(lib: &Library, name: &[u8]) -> Option<T> {
    lib.get::<T>(name).ok().map(|sym| *sym)
}
