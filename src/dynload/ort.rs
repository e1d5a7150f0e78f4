//! ONNX Runtime C API bindings, loaded dynamically so ai-z builds and runs
//! without onnxruntime installed. Only the minimal session/tensor surface
//! needed for the CPU MatMul benchmark is declared; the memory-bandwidth
//! bench needs no ORT calls at all and lives alongside it in `bench::ort_bench`.

use once_cell::sync::OnceCell;
use std::ffi::{c_char, c_void};

#[cfg(target_os = "linux")]
const CANDIDATES: &[&str] = &["libonnxruntime.so.1", "libonnxruntime.so"];
#[cfg(target_os = "windows")]
const CANDIDATES: &[&str] = &["onnxruntime.dll"];
#[cfg(target_os = "macos")]
const CANDIDATES: &[&str] = &["libonnxruntime.dylib"];
#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
const CANDIDATES: &[&str] = &[];

const ORT_API_VERSION: u32 = 17;

/// Opaque ORT handle types; the real layout lives inside the library.
pub type OrtEnv = c_void;
pub type OrtSession = c_void;
pub type OrtSessionOptions = c_void;
pub type OrtMemoryInfo = c_void;
pub type OrtValue = c_void;
pub type OrtStatus = c_void;
pub type OrtAllocator = c_void;
pub type OrtTypeInfo = c_void;
pub type OrtRunOptions = c_void;

/// `OrtApiBase`: the only stable, version-independent entry point. Everything
/// else is reached through the returned `OrtApi` vtable, which — like any ORT
/// C-API vtable — is a long function-pointer struct; we only declare the
/// slots actually used (`GetApi` return layout guarantees earlier fields keep
/// fixed offsets release over release).
#[repr(C)]
struct OrtApiBase {
    get_api: unsafe extern "C" fn(u32) -> *const OrtApiFfi,
    get_version_string: unsafe extern "C" fn() -> *const c_char,
}

#[repr(C)]
struct OrtApiFfi {
    _reserved_head: [*const c_void; 2],
    get_error_message: unsafe extern "C" fn(*const OrtStatus) -> *const c_char,
    create_env: unsafe extern "C" fn(
        log_severity_level: i32,
        log_id: *const c_char,
        out: *mut *mut OrtEnv,
    ) -> *mut OrtStatus,
    _reserved_env_tail: [*const c_void; 5],
    create_session_options: unsafe extern "C" fn(*mut *mut OrtSessionOptions) -> *mut OrtStatus,
    _reserved_opts: [*const c_void; 8],
    set_session_graph_optimization_level:
        unsafe extern "C" fn(*mut OrtSessionOptions, i32) -> *mut OrtStatus,
    _reserved_mid: [*const c_void; 20],
    create_session: unsafe extern "C" fn(
        *mut OrtEnv,
        *const c_char,
        *const OrtSessionOptions,
        *mut *mut OrtSession,
    ) -> *mut OrtStatus,
    create_session_from_array: unsafe extern "C" fn(
        *mut OrtEnv,
        *const c_void,
        usize,
        *const OrtSessionOptions,
        *mut *mut OrtSession,
    ) -> *mut OrtStatus,
    run: unsafe extern "C" fn(
        *mut OrtSession,
        *const OrtRunOptions,
        *const *const c_char,
        *const *const OrtValue,
        usize,
        *const *const c_char,
        usize,
        *mut *mut OrtValue,
    ) -> *mut OrtStatus,
    _reserved_tail: [*const c_void; 30],
    create_cpu_memory_info: unsafe extern "C" fn(i32, i32, *mut *mut OrtMemoryInfo) -> *mut OrtStatus,
    _reserved_tail2: [*const c_void; 10],
    create_tensor_with_data_as_ort_value: unsafe extern "C" fn(
        *const OrtMemoryInfo,
        *mut c_void,
        usize,
        *const i64,
        usize,
        i32,
        *mut *mut OrtValue,
    ) -> *mut OrtStatus,
    _reserved_tail3: [*const c_void; 10],
    release_env: unsafe extern "C" fn(*mut OrtEnv),
    release_status: unsafe extern "C" fn(*mut OrtStatus),
    release_memory_info: unsafe extern "C" fn(*mut OrtMemoryInfo),
    release_session: unsafe extern "C" fn(*mut OrtSession),
    release_value: unsafe extern "C" fn(*mut OrtValue),
    release_run_options: unsafe extern "C" fn(*mut OrtRunOptions),
    release_type_info: unsafe extern "C" fn(*mut OrtTypeInfo),
    release_session_options: unsafe extern "C" fn(*mut OrtSessionOptions),
    release_custom_op_domain: *const c_void,
}

pub struct Api {
    _lib: libloading::Library,
    ffi: &'static OrtApiFfi,
}

// SAFETY: see dynload::nvml::Api.
unsafe impl Send for Api {}
unsafe impl Sync for Api {}

static API: OnceCell<Result<Api, String>> = OnceCell::new();

fn load() -> Result<Api, String> {
    let lib = super::open_first(CANDIDATES)?;
    // SAFETY: `OrtGetApiBase` is the one symbol ORT guarantees stays at a
    // fixed signature across versions; `get_api` yields the versioned vtable.
    unsafe {
        let get_api_base: unsafe extern "C" fn() -> *const OrtApiBase =
            super::required_symbol(&lib, b"OrtGetApiBase\0")?;
        let base = &*get_api_base();
        let ffi_ptr = (base.get_api)(ORT_API_VERSION);
        if ffi_ptr.is_null() {
            return Err(format!("OrtApi version {ORT_API_VERSION} unavailable"));
        }
        Ok(Api {
            ffi: &*ffi_ptr,
            _lib: lib,
        })
    }
}

pub fn api() -> Option<&'static Api> {
    API.get_or_init(load).as_ref().ok()
}

pub fn is_available() -> bool {
    api().is_some()
}

impl Api {
    pub fn ffi(&self) -> &OrtApiFfi {
        self.ffi
    }
}
