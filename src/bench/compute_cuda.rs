//! CUDA PCIe bandwidth and compute FLOPS/GOPS benchmarks (spec §4.9).
//!
//! Kernels are embedded PTX so the build needs no CUDA toolkit: only the
//! driver (`libcuda.so`/`nvcuda.dll`) is required at runtime. Each kernel is
//! `.version 6.0 .target sm_30` (sm_53 for native FP16) and writes its live
//! per-thread accumulator to global memory at the end so the compiler can't
//! dead-code-eliminate the loop.

use std::ffi::CString;

use crate::bench::pcie::{Direction, PcieBackend};
use crate::bench::Benchmark;
use crate::dynload::cuda::{
    self, CUdeviceptr, CUevent, CUfunction, CUmodule, CUstream, CU_EVENT_DEFAULT,
    CU_JIT_ERROR_LOG_BUFFER, CU_JIT_ERROR_LOG_BUFFER_SIZE_BYTES, CU_MEMHOSTALLOC_PORTABLE,
    CU_STREAM_DEFAULT, CUDA_SUCCESS,
};

const GRID_BLOCKS: u32 = 256;
const GRID_THREADS: u32 = 256;
const THREAD_COUNT: u64 = GRID_BLOCKS as u64 * GRID_THREADS as u64;
const WARMUP_LAUNCHES: u32 = 2;
const TIMED_LAUNCHES: u32 = 5;

const PTX_FMA_FP32: &str = r#".version 6.0
.target sm_30
.address_size 64

.visible .entry fma_fp32(
    .param .u64 out_ptr,
    .param .u32 iters
)
{
    .reg .f32 %f<4>;
    .reg .u32 %r<4>;
    .reg .u64 %rd<5>;

    ld.param.u64 %rd1, [out_ptr];
    ld.param.u32 %r1, [iters];
    cvta.to.global.u64 %rd2, %rd1;

    mov.u32 %r2, %tid.x;
    cvt.rn.f32.u32 %f1, %r2;
    mov.f32 %f2, 0f3F800000;

LOOP:
    fma.rn.f32 %f1, %f1, %f2, %f1;
    sub.u32 %r1, %r1, 1;
    setp.ne.u32 %p1, %r1, 0;
    @%p1 bra LOOP;

    mov.u32 %r3, %ctaid.x;
    mad.lo.u32 %r3, %r3, 256, %r2;
    mul.wide.u32 %rd3, %r3, 4;
    add.u64 %rd4, %rd2, %rd3;
    st.global.f32 [%rd4], %f1;
    ret;
}
"#;

const PTX_FMA_FP64: &str = r#".version 6.0
.target sm_30
.address_size 64

.visible .entry fma_fp64(
    .param .u64 out_ptr,
    .param .u32 iters
)
{
    .reg .f64 %fd<4>;
    .reg .u32 %r<4>;
    .reg .u64 %rd<5>;

    ld.param.u64 %rd1, [out_ptr];
    ld.param.u32 %r1, [iters];
    cvta.to.global.u64 %rd2, %rd1;

    mov.u32 %r2, %tid.x;
    cvt.rn.f64.u32 %fd1, %r2;
    mov.f64 %fd2, 0d3FF0000000000000;

LOOP:
    fma.rn.f64 %fd1, %fd1, %fd2, %fd1;
    sub.u32 %r1, %r1, 1;
    setp.ne.u32 %p1, %r1, 0;
    @%p1 bra LOOP;

    mov.u32 %r3, %ctaid.x;
    mad.lo.u32 %r3, %r3, 256, %r2;
    mul.wide.u32 %rd3, %r3, 8;
    add.u64 %rd4, %rd2, %rd3;
    st.global.f64 [%rd4], %fd1;
    ret;
}
"#;

/// Native `sm_53+` FP16 FMA; loaded first, falling back to [`PTX_FMA_FP16_EMU`]
/// when the driver rejects `sm_53` JIT (older GPU).
const PTX_FMA_FP16: &str = r#".version 6.0
.target sm_53
.address_size 64

.visible .entry fma_fp16(
    .param .u64 out_ptr,
    .param .u32 iters
)
{
    .reg .b16 %rs<4>;
    .reg .u32 %r<4>;
    .reg .u64 %rd<5>;

    ld.param.u64 %rd1, [out_ptr];
    ld.param.u32 %r1, [iters];
    cvta.to.global.u64 %rd2, %rd1;

    mov.u32 %r2, %tid.x;
    cvt.rn.f16.u32 %rs1, %r2;
    mov.b16 %rs2, 0x3C00;

LOOP:
    fma.rn.f16 %rs1, %rs1, %rs2, %rs1;
    sub.u32 %r1, %r1, 1;
    setp.ne.u32 %p1, %r1, 0;
    @%p1 bra LOOP;

    mov.u32 %r3, %ctaid.x;
    mad.lo.u32 %r3, %r3, 256, %r2;
    mul.wide.u32 %rd3, %r3, 2;
    add.u64 %rd4, %rd2, %rd3;
    st.global.b16 [%rd4], %rs1;
    ret;
}
"#;

/// FP16 emulation path: FP32 FMA that round-trips through FP16 storage each
/// iteration, used on GPUs where the native `sm_53` module fails to load.
const PTX_FMA_FP16_EMU: &str = r#".version 6.0
.target sm_30
.address_size 64

.visible .entry fma_fp16_emu(
    .param .u64 out_ptr,
    .param .u32 iters
)
{
    .reg .f32 %f<4>;
    .reg .b16 %rs<2>;
    .reg .u32 %r<4>;
    .reg .u64 %rd<5>;

    ld.param.u64 %rd1, [out_ptr];
    ld.param.u32 %r1, [iters];
    cvta.to.global.u64 %rd2, %rd1;

    mov.u32 %r2, %tid.x;
    cvt.rn.f32.u32 %f1, %r2;
    mov.f32 %f2, 0f3F800000;

LOOP:
    fma.rn.f32 %f1, %f1, %f2, %f1;
    cvt.rn.f16.f32 %rs1, %f1;
    cvt.f32.f16 %f1, %rs1;
    sub.u32 %r1, %r1, 1;
    setp.ne.u32 %p1, %r1, 0;
    @%p1 bra LOOP;

    mov.u32 %r3, %ctaid.x;
    mad.lo.u32 %r3, %r3, 256, %r2;
    mul.wide.u32 %rd3, %r3, 4;
    add.u64 %rd4, %rd2, %rd3;
    st.global.f32 [%rd4], %f1;
    ret;
}
"#;

const PTX_MAD_INT32: &str = r#".version 6.0
.target sm_30
.address_size 64

.visible .entry mad_int32(
    .param .u64 out_ptr,
    .param .u32 iters
)
{
    .reg .s32 %r<6>;
    .reg .u64 %rd<5>;

    ld.param.u64 %rd1, [out_ptr];
    ld.param.u32 %r1, [iters];
    cvta.to.global.u64 %rd2, %rd1;

    mov.u32 %r2, %tid.x;
    mov.s32 %r3, 3;
    mov.s32 %r4, 1;

LOOP:
    mad.lo.s32 %r2, %r2, %r3, %r4;
    mad.lo.s32 %r2, %r2, %r3, %r4;
    sub.u32 %r1, %r1, 1;
    setp.ne.u32 %p1, %r1, 0;
    @%p1 bra LOOP;

    mov.u32 %r5, %ctaid.x;
    mad.lo.u32 %r5, %r5, 256, %r2;
    mul.wide.u32 %rd3, %r5, 4;
    add.u64 %rd4, %rd2, %rd3;
    st.global.s32 [%rd4], %r2;
    ret;
}
"#;

/// Unpacks 8 signed 4-bit lanes from two packed `u32`s, runs 8 chained MADs,
/// rotates the packs each iteration.
const PTX_MAD_INT4: &str = r#".version 6.0
.target sm_30
.address_size 64

.visible .entry mad_int4(
    .param .u64 out_ptr,
    .param .u32 iters
)
{
    .reg .s32 %r<10>;
    .reg .u64 %rd<5>;

    ld.param.u64 %rd1, [out_ptr];
    ld.param.u32 %r1, [iters];
    cvta.to.global.u64 %rd2, %rd1;

    mov.u32 %r2, %tid.x;
    mov.u32 %r3, 305419896;
    mov.u32 %r4, 2018915346;

LOOP:
    mad.lo.s32 %r2, %r3, 3, %r2;
    mad.lo.s32 %r2, %r4, 3, %r2;
    mad.lo.s32 %r2, %r3, 5, %r2;
    mad.lo.s32 %r2, %r4, 5, %r2;
    mad.lo.s32 %r2, %r3, 7, %r2;
    mad.lo.s32 %r2, %r4, 7, %r2;
    mad.lo.s32 %r2, %r3, 9, %r2;
    mad.lo.s32 %r2, %r4, 9, %r2;
    shr.b32 %r3, %r3, 4;
    shr.b32 %r4, %r4, 4;
    sub.u32 %r1, %r1, 1;
    setp.ne.u32 %p1, %r1, 0;
    @%p1 bra LOOP;

    mov.u32 %r5, %ctaid.x;
    mad.lo.u32 %r5, %r5, 256, %r2;
    mul.wide.u32 %rd3, %r5, 4;
    add.u64 %rd4, %rd2, %rd3;
    st.global.s32 [%rd4], %r2;
    ret;
}
"#;

pub const ITERS_FP32: u32 = 2048;
pub const ITERS_FP64: u32 = 1024;
pub const ITERS_FP16: u32 = 4096;
pub const ITERS_INT8: u32 = 4096;
pub const ITERS_INT4: u32 = 2048;

const OPS_PER_ITER_FLOAT: u32 = 2;
const OPS_PER_ITER_INT32: u32 = 4;
const OPS_PER_ITER_INT4: u32 = 16;

struct Device {
    ctx: cuda::CUcontext,
    stream: CUstream,
}

impl Device {
    fn new(index: u32) -> Result<(Self, &'static cuda::Api), String> {
        let api = cuda::api().ok_or("CUDA driver unavailable")?;
        // SAFETY: device/context/stream handles are created here and owned
        // by this struct for its whole lifetime; torn down in `Drop`.
        unsafe {
            let mut device: cuda::CUdevice = 0;
            check(api, (api.cu_device_get)(&mut device, index as i32))?;
            let mut ctx: cuda::CUcontext = std::ptr::null_mut();
            check(api, (api.cu_ctx_create_v2)(&mut ctx, 0, device))?;
            let mut stream: CUstream = std::ptr::null_mut();
            check(api, (api.cu_stream_create)(&mut stream, CU_STREAM_DEFAULT))?;
            Ok((Self { ctx, stream }, api))
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(api) = cuda::api() {
            // SAFETY: ctx/stream were created by this struct and are not
            // used after this point.
            unsafe {
                let _ = (api.cu_stream_destroy_v2)(self.stream);
                let _ = (api.cu_ctx_destroy_v2)(self.ctx);
            }
        }
    }
}

fn check(api: &cuda::Api, rc: cuda::CUresult) -> Result<(), String> {
    if rc == CUDA_SUCCESS {
        Ok(())
    } else {
        Err(cuda::err_to_string(api, rc))
    }
}

fn load_module(api: &cuda::Api, ptx: &str) -> Result<CUmodule, String> {
    let src = CString::new(ptx).map_err(|e| e.to_string())?;
    let mut log_buf = [0u8; 8192];
    let mut options = [CU_JIT_ERROR_LOG_BUFFER, CU_JIT_ERROR_LOG_BUFFER_SIZE_BYTES];
    let mut values: [*mut std::ffi::c_void; 2] =
        [log_buf.as_mut_ptr().cast(), log_buf.len() as *mut std::ffi::c_void];
    let mut module: CUmodule = std::ptr::null_mut();
    // SAFETY: src, options and values all outlive this call; module is
    // written only on success.
    let rc = unsafe {
        (api.cu_module_load_data_ex)(
            &mut module,
            src.as_ptr().cast(),
            options.len() as u32,
            options.as_mut_ptr(),
            values.as_mut_ptr(),
        )
    };
    if rc != CUDA_SUCCESS {
        let end = log_buf.iter().position(|&b| b == 0).unwrap_or(0);
        let log = String::from_utf8_lossy(&log_buf[..end]);
        return Err(format!("{}: {log}", cuda::err_to_string(api, rc)));
    }
    Ok(module)
}

fn get_function(api: &cuda::Api, module: CUmodule, name: &str) -> Result<CUfunction, String> {
    let cname = CString::new(name).map_err(|e| e.to_string())?;
    let mut function: CUfunction = std::ptr::null_mut();
    // SAFETY: module was just loaded successfully; cname is valid for the call.
    let rc = unsafe { (api.cu_module_get_function)(&mut function, module, cname.as_ptr()) };
    check(api, rc).map(|_| function)
}

fn time_kernel_launches(
    api: &cuda::Api,
    stream: CUstream,
    function: CUfunction,
    out_ptr: CUdeviceptr,
    iters: u32,
    launches: u32,
    timed: bool,
) -> Result<f64, String> {
    let mut out_ptr = out_ptr;
    let mut iters = iters;
    // SAFETY: kernel params point at stack locals that outlive the launch
    // (launch + synchronize happen before this function returns).
    unsafe {
        let mut params: [*mut std::ffi::c_void; 2] = [
            &mut out_ptr as *mut CUdeviceptr as *mut std::ffi::c_void,
            &mut iters as *mut u32 as *mut std::ffi::c_void,
        ];

        let (start, stop) = if timed {
            let mut start: CUevent = std::ptr::null_mut();
            let mut stop: CUevent = std::ptr::null_mut();
            check(api, (api.cu_event_create)(&mut start, CU_EVENT_DEFAULT))?;
            check(api, (api.cu_event_create)(&mut stop, CU_EVENT_DEFAULT))?;
            check(api, (api.cu_event_record)(start, stream))?;
            (Some(start), Some(stop))
        } else {
            (None, None)
        };

        for _ in 0..launches {
            check(
                api,
                (api.cu_launch_kernel)(
                    function,
                    GRID_BLOCKS,
                    1,
                    1,
                    GRID_THREADS,
                    1,
                    1,
                    0,
                    stream,
                    params.as_mut_ptr(),
                    std::ptr::null_mut(),
                ),
            )?;
        }

        if let (Some(start), Some(stop)) = (start, stop) {
            check(api, (api.cu_event_record)(stop, stream))?;
            check(api, (api.cu_event_synchronize)(stop))?;
            let mut ms: f32 = 0.0;
            check(api, (api.cu_event_elapsed_time)(&mut ms, start, stop))?;
            let _ = (api.cu_event_destroy_v2)(start);
            let _ = (api.cu_event_destroy_v2)(stop);
            Ok(ms as f64 / 1000.0)
        } else {
            check(api, (api.cu_stream_synchronize)(stream))?;
            Ok(0.0)
        }
    }
}

/// One CUDA compute kernel benchmark (FP16/32/64, INT32, INT4).
pub struct CudaComputeBench {
    pub device_index: u32,
    pub label: &'static str,
    ptx: &'static str,
    emu_ptx: Option<&'static str>,
    kernel_name: &'static str,
    iters_per_thread: u32,
    ops_per_iter: u32,
}

impl CudaComputeBench {
    pub fn fp32(device_index: u32) -> Self {
        Self {
            device_index,
            label: "CUDA FP32",
            ptx: PTX_FMA_FP32,
            emu_ptx: None,
            kernel_name: "fma_fp32",
            iters_per_thread: ITERS_FP32,
            ops_per_iter: OPS_PER_ITER_FLOAT,
        }
    }

    pub fn fp64(device_index: u32) -> Self {
        Self {
            device_index,
            label: "CUDA FP64",
            ptx: PTX_FMA_FP64,
            emu_ptx: None,
            kernel_name: "fma_fp64",
            iters_per_thread: ITERS_FP64,
            ops_per_iter: OPS_PER_ITER_FLOAT,
        }
    }

    pub fn fp16(device_index: u32) -> Self {
        Self {
            device_index,
            label: "CUDA FP16",
            ptx: PTX_FMA_FP16,
            emu_ptx: Some(PTX_FMA_FP16_EMU),
            kernel_name: "fma_fp16",
            iters_per_thread: ITERS_FP16,
            ops_per_iter: OPS_PER_ITER_FLOAT,
        }
    }

    pub fn int32(device_index: u32) -> Self {
        Self {
            device_index,
            label: "CUDA INT8",
            ptx: PTX_MAD_INT32,
            emu_ptx: None,
            kernel_name: "mad_int32",
            iters_per_thread: ITERS_INT8,
            ops_per_iter: OPS_PER_ITER_INT32,
        }
    }

    pub fn int4(device_index: u32) -> Self {
        Self {
            device_index,
            label: "CUDA INT4",
            ptx: PTX_MAD_INT4,
            emu_ptx: None,
            kernel_name: "mad_int4",
            iters_per_thread: ITERS_INT4,
            ops_per_iter: OPS_PER_ITER_INT4,
        }
    }

    fn run_inner(&self) -> Result<(f64, bool), String> {
        let (device, api) = Device::new(self.device_index)?;

        let (module, used_emu) = match load_module(api, self.ptx) {
            Ok(m) => (m, false),
            Err(e) => match self.emu_ptx {
                Some(emu) => (load_module(api, emu)?, true),
                None => return Err(e),
            },
        };
        let function_name = if used_emu { "fma_fp16_emu" } else { self.kernel_name };
        let function = get_function(api, module, function_name)?;

        let mut out: CUdeviceptr = 0;
        let elem_size = 8usize; // large enough for the widest (f64) output element
        // SAFETY: out is populated by a successful alloc and freed below.
        unsafe {
            check(
                api,
                (api.cu_mem_alloc_v2)(&mut out, THREAD_COUNT as usize * elem_size),
            )?;
        }

        time_kernel_launches(api, device.stream, function, out, self.iters_per_thread, WARMUP_LAUNCHES, false)?;
        let elapsed = time_kernel_launches(
            api,
            device.stream,
            function,
            out,
            self.iters_per_thread,
            TIMED_LAUNCHES,
            true,
        )?;

        // SAFETY: out was allocated above and is not used afterward.
        unsafe {
            let _ = (api.cu_mem_free_v2)(out);
            let _ = (api.cu_module_unload)(module);
        }

        let total_ops = THREAD_COUNT as f64
            * self.iters_per_thread as f64
            * self.ops_per_iter as f64
            * TIMED_LAUNCHES as f64;
        if elapsed <= 0.0 {
            return Err("non-positive elapsed time measuring kernel launches".to_string());
        }
        Ok((total_ops / elapsed / 1e9, used_emu))
    }
}

impl Benchmark for CudaComputeBench {
    fn name(&self) -> &str {
        self.label
    }

    fn is_available(&self) -> bool {
        cuda::api().is_some()
    }

    fn run(&self) -> Result<String, String> {
        let (gflops, used_emu) = self.run_inner()?;
        if used_emu {
            Ok(format!("{gflops:.1} GFLOPS (emu)"))
        } else {
            let unit = if self.label.contains("INT") { "GOPS" } else { "GFLOPS" };
            Ok(format!("{gflops:.1} {unit}"))
        }
    }
}

/// CUDA PCIe H↔D bandwidth bench, built on the shared recipe in
/// [`crate::bench::pcie`].
pub struct CudaPcieBench {
    pub device_index: u32,
}

impl PcieBackend for CudaPcieBench {
    fn timed_copies(&self, direction: Direction, copies: u32) -> Result<f64, String> {
        let (device, api) = Device::new(self.device_index)?;
        let bytes = crate::bench::pcie::TRANSFER_BYTES;

        let mut host_ptr: *mut std::ffi::c_void = std::ptr::null_mut();
        let mut device_ptr: CUdeviceptr = 0;
        // SAFETY: both allocations are freed at the end of this function;
        // neither pointer escapes.
        unsafe {
            check(
                api,
                (api.cu_mem_host_alloc)(&mut host_ptr, bytes, CU_MEMHOSTALLOC_PORTABLE),
            )?;
            check(api, (api.cu_mem_alloc_v2)(&mut device_ptr, bytes))?;

            let mut start: CUevent = std::ptr::null_mut();
            let mut stop: CUevent = std::ptr::null_mut();
            check(api, (api.cu_event_create)(&mut start, CU_EVENT_DEFAULT))?;
            check(api, (api.cu_event_create)(&mut stop, CU_EVENT_DEFAULT))?;
            check(api, (api.cu_event_record)(start, device.stream))?;

            for _ in 0..copies {
                let rc = match direction {
                    Direction::HostToDevice => {
                        (api.cu_memcpy_htod_async_v2)(device_ptr, host_ptr, bytes, device.stream)
                    }
                    Direction::DeviceToHost => {
                        (api.cu_memcpy_dtoh_async_v2)(host_ptr, device_ptr, bytes, device.stream)
                    }
                };
                check(api, rc)?;
            }

            check(api, (api.cu_event_record)(stop, device.stream))?;
            check(api, (api.cu_event_synchronize)(stop))?;
            let mut ms: f32 = 0.0;
            check(api, (api.cu_event_elapsed_time)(&mut ms, start, stop))?;
            let _ = (api.cu_event_destroy_v2)(start);
            let _ = (api.cu_event_destroy_v2)(stop);
            let _ = (api.cu_mem_free_host)(host_ptr);
            let _ = (api.cu_mem_free_v2)(device_ptr);

            Ok(ms as f64 / 1000.0)
        }
    }
}

pub struct CudaPcieAggregateBench {
    pub device_index: u32,
}

impl Benchmark for CudaPcieAggregateBench {
    fn name(&self) -> &str {
        "CUDA PCIe bandwidth"
    }

    fn is_available(&self) -> bool {
        cuda::api().is_some()
    }

    fn run(&self) -> Result<String, String> {
        let backend = CudaPcieBench {
            device_index: self.device_index,
        };
        crate::bench::pcie::bench_aggregate(&backend)
    }
}
