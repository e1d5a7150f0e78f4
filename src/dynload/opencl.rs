//! OpenCL ICD loader bindings — platform/device enumeration, buffer and
//! program/kernel calls needed by the PCIe bandwidth and FP32 compute
//! benchmarks.

use once_cell::sync::OnceCell;
use std::ffi::{c_char, c_int, c_void};

#[cfg(target_os = "linux")]
const CANDIDATES: &[&str] = &["libOpenCL.so.1", "libOpenCL.so"];
#[cfg(target_os = "windows")]
const CANDIDATES: &[&str] = &["OpenCL.dll"];
#[cfg(not(any(target_os = "linux", target_os = "windows")))]
const CANDIDATES: &[&str] = &[];

pub type ClInt = c_int;
pub type ClUint = u32;
pub type ClPlatformId = *mut c_void;
pub type ClDeviceId = *mut c_void;
pub type ClContext = *mut c_void;
pub type ClCommandQueue = *mut c_void;
pub type ClMem = *mut c_void;
pub type ClProgram = *mut c_void;
pub type ClKernel = *mut c_void;
pub type ClEvent = *mut c_void;

pub const CL_SUCCESS: ClInt = 0;
pub const CL_DEVICE_TYPE_GPU: u64 = 1 << 2;
pub const CL_MEM_READ_WRITE: u64 = 1 << 0;
pub const CL_QUEUE_PROFILING_ENABLE: u64 = 1 << 1;
pub const CL_PROFILING_COMMAND_START: u32 = 0x1282;
pub const CL_PROFILING_COMMAND_END: u32 = 0x1283;

pub struct Api {
    _lib: libloading::Library,
    pub get_platform_ids:
        unsafe extern "C" fn(ClUint, *mut ClPlatformId, *mut ClUint) -> ClInt,
    pub get_device_ids: unsafe extern "C" fn(
        ClPlatformId,
        u64,
        ClUint,
        *mut ClDeviceId,
        *mut ClUint,
    ) -> ClInt,
    pub get_device_info:
        unsafe extern "C" fn(ClDeviceId, u32, usize, *mut c_void, *mut usize) -> ClInt,
    pub create_context: unsafe extern "C" fn(
        *const isize,
        ClUint,
        *const ClDeviceId,
        Option<unsafe extern "C" fn()>,
        *mut c_void,
        *mut ClInt,
    ) -> ClContext,
    pub create_command_queue:
        unsafe extern "C" fn(ClContext, ClDeviceId, u64, *mut ClInt) -> ClCommandQueue,
    pub create_buffer:
        unsafe extern "C" fn(ClContext, u64, usize, *mut c_void, *mut ClInt) -> ClMem,
    pub create_program_with_source: unsafe extern "C" fn(
        ClContext,
        ClUint,
        *const *const c_char,
        *const usize,
        *mut ClInt,
    ) -> ClProgram,
    pub build_program: unsafe extern "C" fn(
        ClProgram,
        ClUint,
        *const ClDeviceId,
        *const c_char,
        Option<unsafe extern "C" fn()>,
        *mut c_void,
    ) -> ClInt,
    pub create_kernel: unsafe extern "C" fn(ClProgram, *const c_char, *mut ClInt) -> ClKernel,
    pub set_kernel_arg:
        unsafe extern "C" fn(ClKernel, ClUint, usize, *const c_void) -> ClInt,
    pub enqueue_write_buffer: unsafe extern "C" fn(
        ClCommandQueue,
        ClMem,
        u32,
        usize,
        usize,
        *const c_void,
        ClUint,
        *const ClEvent,
        *mut ClEvent,
    ) -> ClInt,
    pub enqueue_read_buffer: unsafe extern "C" fn(
        ClCommandQueue,
        ClMem,
        u32,
        usize,
        usize,
        *mut c_void,
        ClUint,
        *const ClEvent,
        *mut ClEvent,
    ) -> ClInt,
    pub enqueue_nd_range_kernel: unsafe extern "C" fn(
        ClCommandQueue,
        ClKernel,
        ClUint,
        *const usize,
        *const usize,
        *const usize,
        ClUint,
        *const ClEvent,
        *mut ClEvent,
    ) -> ClInt,
    pub finish: unsafe extern "C" fn(ClCommandQueue) -> ClInt,
    pub wait_for_events: unsafe extern "C" fn(ClUint, *const ClEvent) -> ClInt,
    pub get_event_profiling_info:
        unsafe extern "C" fn(ClEvent, u32, usize, *mut c_void, *mut usize) -> ClInt,
    pub release_mem_object: unsafe extern "C" fn(ClMem) -> ClInt,
    pub release_kernel: unsafe extern "C" fn(ClKernel) -> ClInt,
    pub release_program: unsafe extern "C" fn(ClProgram) -> ClInt,
    pub release_command_queue: unsafe extern "C" fn(ClCommandQueue) -> ClInt,
    pub release_context: unsafe extern "C" fn(ClContext) -> ClInt,
    pub release_event: unsafe extern "C" fn(ClEvent) -> ClInt,
}

// SAFETY: see dynload::nvml::Api.
unsafe impl Send for Api {}
unsafe impl Sync for Api {}

static API: OnceCell<Result<Api, String>> = OnceCell::new();

fn load() -> Result<Api, String> {
    let lib = super::open_first(CANDIDATES)?;
    // SAFETY: symbol names/signatures match the Khronos OpenCL ICD ABI.
    unsafe {
        Ok(Api {
            get_platform_ids: super::required_symbol(&lib, b"clGetPlatformIDs\0")?,
            get_device_ids: super::required_symbol(&lib, b"clGetDeviceIDs\0")?,
            get_device_info: super::required_symbol(&lib, b"clGetDeviceInfo\0")?,
            create_context: super::required_symbol(&lib, b"clCreateContext\0")?,
            create_command_queue: super::required_symbol(&lib, b"clCreateCommandQueue\0")?,
            create_buffer: super::required_symbol(&lib, b"clCreateBuffer\0")?,
            create_program_with_source: super::required_symbol(
                &lib,
                b"clCreateProgramWithSource\0",
            )?,
            build_program: super::required_symbol(&lib, b"clBuildProgram\0")?,
            create_kernel: super::required_symbol(&lib, b"clCreateKernel\0")?,
            set_kernel_arg: super::required_symbol(&lib, b"clSetKernelArg\0")?,
            enqueue_write_buffer: super::required_symbol(&lib, b"clEnqueueWriteBuffer\0")?,
            enqueue_read_buffer: super::required_symbol(&lib, b"clEnqueueReadBuffer\0")?,
            enqueue_nd_range_kernel: super::required_symbol(&lib, b"clEnqueueNDRangeKernel\0")?,
            finish: super::required_symbol(&lib, b"clFinish\0")?,
            wait_for_events: super::required_symbol(&lib, b"clWaitForEvents\0")?,
            get_event_profiling_info: super::required_symbol(
                &lib,
                b"clGetEventProfilingInfo\0",
            )?,
            release_mem_object: super::required_symbol(&lib, b"clReleaseMemObject\0")?,
            release_kernel: super::required_symbol(&lib, b"clReleaseKernel\0")?,
            release_program: super::required_symbol(&lib, b"clReleaseProgram\0")?,
            release_command_queue: super::required_symbol(&lib, b"clReleaseCommandQueue\0")?,
            release_context: super::required_symbol(&lib, b"clReleaseContext\0")?,
            release_event: super::required_symbol(&lib, b"clReleaseEvent\0")?,
            _lib: lib,
        })
    }
}

pub fn api() -> Option<&'static Api> {
    API.get_or_init(load).as_ref().ok()
}

pub fn err_to_string(code: ClInt) -> String {
    format!("OpenCL error {code}")
}
