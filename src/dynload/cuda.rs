//! CUDA driver API bindings (`cuInit`, `cuMemAlloc`, `cuLaunchKernel`, ...).
//!
//! Minimal surface: only what the PCIe bandwidth and compute benchmarks need.
//! Intentionally avoids the CUDA headers/SDK so ai-z builds without the CUDA
//! toolkit installed — symbol signatures are declared locally, matching
//! `original_source/include/aiz/dyn/cuda.h`.

use once_cell::sync::OnceCell;
use std::ffi::{c_char, c_int, c_uint, c_void, CStr};

#[cfg(target_os = "linux")]
const CANDIDATES: &[&str] = &["libcuda.so.1", "libcuda.so"];
#[cfg(target_os = "windows")]
const CANDIDATES: &[&str] = &["nvcuda.dll"];
#[cfg(not(any(target_os = "linux", target_os = "windows")))]
const CANDIDATES: &[&str] = &[];

pub type CUresult = c_int;
pub type CUdevice = c_int;
pub type CUcontext = *mut c_void;
pub type CUmodule = *mut c_void;
pub type CUfunction = *mut c_void;
pub type CUstream = *mut c_void;
pub type CUevent = *mut c_void;
pub type CUdeviceptr = u64;
pub type CUjitOption = c_int;

pub const CUDA_SUCCESS: CUresult = 0;
pub const CU_EVENT_DEFAULT: c_uint = 0x0;
pub const CU_STREAM_DEFAULT: c_uint = 0x0;
pub const CU_MEMHOSTALLOC_PORTABLE: c_uint = 0x1;

pub const CU_JIT_ERROR_LOG_BUFFER: CUjitOption = 5;
pub const CU_JIT_ERROR_LOG_BUFFER_SIZE_BYTES: CUjitOption = 6;

pub struct Api {
    _lib: libloading::Library,
    pub cu_init: unsafe extern "C" fn(c_uint) -> CUresult,
    pub cu_driver_get_version: unsafe extern "C" fn(*mut c_int) -> CUresult,
    pub cu_device_get_count: unsafe extern "C" fn(*mut c_int) -> CUresult,
    pub cu_device_get: unsafe extern "C" fn(*mut CUdevice, c_int) -> CUresult,
    pub cu_device_get_name: unsafe extern "C" fn(*mut c_char, c_int, CUdevice) -> CUresult,
    pub cu_ctx_create_v2: unsafe extern "C" fn(*mut CUcontext, c_uint, CUdevice) -> CUresult,
    pub cu_ctx_destroy_v2: unsafe extern "C" fn(CUcontext) -> CUresult,
    pub cu_stream_create: unsafe extern "C" fn(*mut CUstream, c_uint) -> CUresult,
    pub cu_stream_destroy_v2: unsafe extern "C" fn(CUstream) -> CUresult,
    pub cu_stream_synchronize: unsafe extern "C" fn(CUstream) -> CUresult,
    pub cu_mem_alloc_v2: unsafe extern "C" fn(*mut CUdeviceptr, usize) -> CUresult,
    pub cu_mem_free_v2: unsafe extern "C" fn(CUdeviceptr) -> CUresult,
    pub cu_mem_host_alloc: unsafe extern "C" fn(*mut *mut c_void, usize, c_uint) -> CUresult,
    pub cu_mem_free_host: unsafe extern "C" fn(*mut c_void) -> CUresult,
    pub cu_memcpy_htod_async_v2:
        unsafe extern "C" fn(CUdeviceptr, *const c_void, usize, CUstream) -> CUresult,
    pub cu_memcpy_dtoh_async_v2:
        unsafe extern "C" fn(*mut c_void, CUdeviceptr, usize, CUstream) -> CUresult,
    pub cu_event_create: unsafe extern "C" fn(*mut CUevent, c_uint) -> CUresult,
    pub cu_event_destroy_v2: unsafe extern "C" fn(CUevent) -> CUresult,
    pub cu_event_record: unsafe extern "C" fn(CUevent, CUstream) -> CUresult,
    pub cu_event_synchronize: unsafe extern "C" fn(CUevent) -> CUresult,
    pub cu_event_elapsed_time: unsafe extern "C" fn(*mut f32, CUevent, CUevent) -> CUresult,
    pub cu_module_load_data_ex: unsafe extern "C" fn(
        *mut CUmodule,
        *const c_void,
        c_uint,
        *mut CUjitOption,
        *mut *mut c_void,
    ) -> CUresult,
    pub cu_module_unload: unsafe extern "C" fn(CUmodule) -> CUresult,
    pub cu_module_get_function:
        unsafe extern "C" fn(*mut CUfunction, CUmodule, *const c_char) -> CUresult,
    #[allow(clippy::type_complexity)]
    pub cu_launch_kernel: unsafe extern "C" fn(
        CUfunction,
        c_uint,
        c_uint,
        c_uint,
        c_uint,
        c_uint,
        c_uint,
        c_uint,
        CUstream,
        *mut *mut c_void,
        *mut *mut c_void,
    ) -> CUresult,
    cu_get_error_string: Option<unsafe extern "C" fn(CUresult, *mut *const c_char) -> CUresult>,
}

// SAFETY: see dynload::nvml::Api.
unsafe impl Send for Api {}
unsafe impl Sync for Api {}

static API: OnceCell<Result<Api, String>> = OnceCell::new();

fn load() -> Result<Api, String> {
    let lib = super::open_first(CANDIDATES)?;
    // SAFETY: symbol names/signatures match the CUDA driver API ABI.
    unsafe {
        let api = Api {
            cu_init: super::required_symbol(&lib, b"cuInit\0")?,
            cu_driver_get_version: super::required_symbol(&lib, b"cuDriverGetVersion\0")?,
            cu_device_get_count: super::required_symbol(&lib, b"cuDeviceGetCount\0")?,
            cu_device_get: super::required_symbol(&lib, b"cuDeviceGet\0")?,
            cu_device_get_name: super::required_symbol(&lib, b"cuDeviceGetName\0")?,
            cu_ctx_create_v2: super::required_symbol(&lib, b"cuCtxCreate_v2\0")?,
            cu_ctx_destroy_v2: super::required_symbol(&lib, b"cuCtxDestroy_v2\0")?,
            cu_stream_create: super::required_symbol(&lib, b"cuStreamCreate\0")?,
            cu_stream_destroy_v2: super::required_symbol(&lib, b"cuStreamDestroy_v2\0")?,
            cu_stream_synchronize: super::required_symbol(&lib, b"cuStreamSynchronize\0")?,
            cu_mem_alloc_v2: super::required_symbol(&lib, b"cuMemAlloc_v2\0")?,
            cu_mem_free_v2: super::required_symbol(&lib, b"cuMemFree_v2\0")?,
            cu_mem_host_alloc: super::required_symbol(&lib, b"cuMemHostAlloc\0")?,
            cu_mem_free_host: super::required_symbol(&lib, b"cuMemFreeHost\0")?,
            cu_memcpy_htod_async_v2: super::required_symbol(&lib, b"cuMemcpyHtoDAsync_v2\0")?,
            cu_memcpy_dtoh_async_v2: super::required_symbol(&lib, b"cuMemcpyDtoHAsync_v2\0")?,
            cu_event_create: super::required_symbol(&lib, b"cuEventCreate\0")?,
            cu_event_destroy_v2: super::required_symbol(&lib, b"cuEventDestroy_v2\0")?,
            cu_event_record: super::required_symbol(&lib, b"cuEventRecord\0")?,
            cu_event_synchronize: super::required_symbol(&lib, b"cuEventSynchronize\0")?,
            cu_event_elapsed_time: super::required_symbol(&lib, b"cuEventElapsedTime\0")?,
            cu_module_load_data_ex: super::required_symbol(&lib, b"cuModuleLoadDataEx\0")?,
            cu_module_unload: super::required_symbol(&lib, b"cuModuleUnload\0")?,
            cu_module_get_function: super::required_symbol(&lib, b"cuModuleGetFunction\0")?,
            cu_launch_kernel: super::required_symbol(&lib, b"cuLaunchKernel\0")?,
            cu_get_error_string: super::optional_symbol(&lib, b"cuGetErrorString\0"),
            _lib: lib,
        };

        if (api.cu_init)(0) != CUDA_SUCCESS {
            return Err("cuInit failed".to_string());
        }
        Ok(api)
    }
}

pub fn api() -> Option<&'static Api> {
    API.get_or_init(load).as_ref().ok()
}

pub fn err_to_string(api: &Api, code: CUresult) -> String {
    if let Some(f) = api.cu_get_error_string {
        let mut ptr: *const c_char = std::ptr::null();
        // SAFETY: f writes a static, null-terminated string pointer on
        // success; ptr stays null otherwise.
        unsafe {
            if f(code, &mut ptr) == CUDA_SUCCESS && !ptr.is_null() {
                return CStr::from_ptr(ptr).to_string_lossy().into_owned();
            }
        }
    }
    format!("CUDA error {code}")
}

pub fn driver_version() -> Option<String> {
    let api = api()?;
    let mut v: c_int = 0;
    // SAFETY: v is a valid &mut c_int for the duration of the call.
    unsafe {
        if (api.cu_driver_get_version)(&mut v) == CUDA_SUCCESS {
            Some(format!("{}.{}", v / 1000, (v % 1000) / 10))
        } else {
            None
        }
    }
}

pub fn device_count() -> Option<u32> {
    let api = api()?;
    let mut n: c_int = 0;
    // SAFETY: n is a valid &mut c_int for the duration of the call.
    unsafe {
        if (api.cu_device_get_count)(&mut n) == CUDA_SUCCESS {
            Some(n.max(0) as u32)
        } else {
            None
        }
    }
}
