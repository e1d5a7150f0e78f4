//! OpenCL PCIe bandwidth and FP32 compute benchmarks (spec §4.9).

use std::ffi::CString;

use crate::bench::pcie::{Direction, PcieBackend};
use crate::bench::Benchmark;
use crate::dynload::opencl::{
    self, ClCommandQueue, ClContext, ClDeviceId, ClMem, ClPlatformId, CL_DEVICE_TYPE_GPU,
    CL_MEM_READ_WRITE, CL_PROFILING_COMMAND_END, CL_PROFILING_COMMAND_START,
    CL_QUEUE_PROFILING_ENABLE, CL_SUCCESS,
};

const WORK_ITEMS: usize = 1_048_576;
const ITERS: u32 = 4096;
const WARMUP_LAUNCHES: u32 = 2;
const TIMED_LAUNCHES: u32 = 5;
const OPS_PER_ITER: u32 = 2;

const KERNEL_SRC: &str = r#"
__kernel void fma_fp32(__global float* out, const int iters) {
    int gid = get_global_id(0);
    float acc = (float)gid;
    for (int i = 0; i < iters; ++i) {
        acc = fma(acc, 1.0000001f, acc);
    }
    out[gid] = acc;
}
"#;

struct Device {
    context: ClContext,
    queue: ClCommandQueue,
    device_id: ClDeviceId,
}

impl Device {
    fn new(index: u32) -> Result<(Self, &'static opencl::Api), String> {
        let api = opencl::api().ok_or("OpenCL ICD unavailable")?;
        // SAFETY: every out-param below is a valid stack local for the
        // duration of its call; handles are torn down in `Drop`.
        unsafe {
            let mut platform: ClPlatformId = std::ptr::null_mut();
            let mut n_platforms: u32 = 0;
            check((api.get_platform_ids)(1, &mut platform, &mut n_platforms))?;
            if n_platforms == 0 {
                return Err("no OpenCL platforms found".to_string());
            }

            let mut devices = vec![std::ptr::null_mut(); (index as usize) + 1];
            let mut n_devices: u32 = 0;
            check((api.get_device_ids)(
                platform,
                CL_DEVICE_TYPE_GPU,
                devices.len() as u32,
                devices.as_mut_ptr(),
                &mut n_devices,
            ))?;
            if n_devices <= index {
                return Err(format!("no OpenCL GPU device at index {index}"));
            }
            let device_id = devices[index as usize];

            let mut err = 0i32;
            let context = (api.create_context)(
                std::ptr::null(),
                1,
                &device_id,
                None,
                std::ptr::null_mut(),
                &mut err,
            );
            check(err)?;

            let queue = (api.create_command_queue)(
                context,
                device_id,
                CL_QUEUE_PROFILING_ENABLE,
                &mut err,
            );
            check(err)?;

            Ok((
                Self {
                    context,
                    queue,
                    device_id,
                },
                api,
            ))
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(api) = opencl::api() {
            // SAFETY: context/queue were created by this struct and are not
            // used after this point.
            unsafe {
                let _ = (api.release_command_queue)(self.queue);
                let _ = (api.release_context)(self.context);
            }
        }
    }
}

fn check(code: i32) -> Result<(), String> {
    if code == CL_SUCCESS {
        Ok(())
    } else {
        Err(opencl::err_to_string(code))
    }
}

fn event_elapsed_seconds(api: &opencl::Api, event: opencl::ClEvent) -> Result<f64, String> {
    let mut start_ns: u64 = 0;
    let mut end_ns: u64 = 0;
    // SAFETY: event is a completed, valid profiling-enabled event.
    unsafe {
        check((api.get_event_profiling_info)(
            event,
            CL_PROFILING_COMMAND_START,
            std::mem::size_of::<u64>(),
            (&mut start_ns as *mut u64).cast(),
            std::ptr::null_mut(),
        ))?;
        check((api.get_event_profiling_info)(
            event,
            CL_PROFILING_COMMAND_END,
            std::mem::size_of::<u64>(),
            (&mut end_ns as *mut u64).cast(),
            std::ptr::null_mut(),
        ))?;
    }
    Ok((end_ns.saturating_sub(start_ns)) as f64 / 1e9)
}

pub struct OpenClComputeBench {
    pub device_index: u32,
}

impl OpenClComputeBench {
    fn run_inner(&self) -> Result<f64, String> {
        let (device, api) = Device::new(self.device_index)?;

        let src_ptr = CString::new(KERNEL_SRC).map_err(|e| e.to_string())?;
        let src_ptr_raw = src_ptr.as_ptr();
        let mut err = 0i32;
        // SAFETY: src pointer and its length are consistent; program/kernel
        // handles are released at the end of the function.
        unsafe {
            let program =
                (api.create_program_with_source)(device.context, 1, &src_ptr_raw, std::ptr::null(), &mut err);
            check(err)?;
            let build_name = CString::new("-cl-fast-relaxed-math").unwrap();
            let build_rc =
                (api.build_program)(program, 1, &device.device_id, build_name.as_ptr(), None, std::ptr::null_mut());
            check(build_rc)?;

            let kernel_name = CString::new("fma_fp32").unwrap();
            let kernel = (api.create_kernel)(program, kernel_name.as_ptr(), &mut err);
            check(err)?;

            let out_buf = (api.create_buffer)(
                device.context,
                CL_MEM_READ_WRITE,
                WORK_ITEMS * std::mem::size_of::<f32>(),
                std::ptr::null_mut(),
                &mut err,
            );
            check(err)?;

            let iters: i32 = ITERS as i32;
            check((api.set_kernel_arg)(
                kernel,
                0,
                std::mem::size_of::<ClMem>(),
                (&out_buf as *const ClMem).cast(),
            ))?;
            check((api.set_kernel_arg)(
                kernel,
                1,
                std::mem::size_of::<i32>(),
                (&iters as *const i32).cast(),
            ))?;

            let global_size = [WORK_ITEMS];
            for _ in 0..WARMUP_LAUNCHES {
                check((api.enqueue_nd_range_kernel)(
                    device.queue,
                    kernel,
                    1,
                    std::ptr::null(),
                    global_size.as_ptr(),
                    std::ptr::null(),
                    0,
                    std::ptr::null(),
                    std::ptr::null_mut(),
                ))?;
            }
            check((api.finish)(device.queue))?;

            let mut total_seconds = 0.0;
            for _ in 0..TIMED_LAUNCHES {
                let mut event: opencl::ClEvent = std::ptr::null_mut();
                check((api.enqueue_nd_range_kernel)(
                    device.queue,
                    kernel,
                    1,
                    std::ptr::null(),
                    global_size.as_ptr(),
                    std::ptr::null(),
                    0,
                    std::ptr::null(),
                    &mut event,
                ))?;
                check((api.wait_for_events)(1, &event))?;
                total_seconds += event_elapsed_seconds(api, event)?;
                let _ = (api.release_event)(event);
            }

            let _ = (api.release_mem_object)(out_buf);
            let _ = (api.release_kernel)(kernel);
            let _ = (api.release_program)(program);

            if total_seconds <= 0.0 {
                return Err("non-positive elapsed time measuring OpenCL kernel".to_string());
            }
            let total_ops = WORK_ITEMS as f64 * ITERS as f64 * OPS_PER_ITER as f64 * TIMED_LAUNCHES as f64;
            Ok(total_ops / total_seconds / 1e9)
        }
    }
}

impl Benchmark for OpenClComputeBench {
    fn name(&self) -> &str {
        "OpenCL FLOPS FP32"
    }

    fn is_available(&self) -> bool {
        opencl::api().is_some()
    }

    fn run(&self) -> Result<String, String> {
        let gflops = self.run_inner()?;
        Ok(format!("{gflops:.1} GFLOPS"))
    }
}

/// OpenCL PCIe H↔D bandwidth via the shared recipe in [`crate::bench::pcie`].
pub struct OpenClPcieBench {
    pub device_index: u32,
}

impl PcieBackend for OpenClPcieBench {
    fn timed_copies(&self, direction: Direction, copies: u32) -> Result<f64, String> {
        let (device, api) = Device::new(self.device_index)?;
        let bytes = crate::bench::pcie::TRANSFER_BYTES;
        let host_buf = vec![0u8; bytes];

        // SAFETY: buffer and event handles are released before returning.
        unsafe {
            let mut err = 0i32;
            let device_buf = (api.create_buffer)(
                device.context,
                CL_MEM_READ_WRITE,
                bytes,
                std::ptr::null_mut(),
                &mut err,
            );
            check(err)?;

            let mut total_seconds = 0.0;
            for _ in 0..copies {
                let mut event: opencl::ClEvent = std::ptr::null_mut();
                let rc = match direction {
                    Direction::HostToDevice => (api.enqueue_write_buffer)(
                        device.queue,
                        device_buf,
                        0,
                        0,
                        bytes,
                        host_buf.as_ptr().cast(),
                        0,
                        std::ptr::null(),
                        &mut event,
                    ),
                    Direction::DeviceToHost => (api.enqueue_read_buffer)(
                        device.queue,
                        device_buf,
                        0,
                        0,
                        bytes,
                        host_buf.as_ptr() as *mut std::ffi::c_void,
                        0,
                        std::ptr::null(),
                        &mut event,
                    ),
                };
                check(rc)?;
                check((api.wait_for_events)(1, &event))?;
                total_seconds += event_elapsed_seconds(api, event)?;
                let _ = (api.release_event)(event);
            }

            let _ = (api.release_mem_object)(device_buf);
            Ok(total_seconds)
        }
    }
}

pub struct OpenClPcieAggregateBench {
    pub device_index: u32,
}

impl Benchmark for OpenClPcieAggregateBench {
    fn name(&self) -> &str {
        "OpenCL PCIe bandwidth"
    }

    fn is_available(&self) -> bool {
        opencl::api().is_some()
    }

    fn run(&self) -> Result<String, String> {
        let backend = OpenClPcieBench {
            device_index: self.device_index,
        };
        crate::bench::pcie::bench_aggregate(&backend)
    }
}
