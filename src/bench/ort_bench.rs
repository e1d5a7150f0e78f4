//! ONNX Runtime CPU benchmarks (spec §4.9): a dynamic-shape MatMul GFLOPS
//! bench driven through the minimal ORT C API surface in `dynload::ort`, and
//! a memory-bandwidth bench that needs no ORT calls at all.

use std::ffi::CString;
use std::os::raw::c_void;
use std::time::Instant;

use super::Benchmark;
use crate::dynload::ort::{self, OrtEnv, OrtMemoryInfo, OrtSession, OrtSessionOptions, OrtValue};

const MATMUL_N: i64 = 512;
const MATMUL_ITERS: u32 = 20;
const MEM_BW_BYTES: usize = 256 * 1024 * 1024;
const MEM_BW_PASSES: u32 = 10;

/// ORT log severity "warning" (3) so session construction noise doesn't
/// reach stderr and corrupt a TUI frame (spec §4.9).
const ORT_LOGGING_LEVEL_WARNING: i32 = 2;
const ORT_GRAPH_OPT_ALL: i32 = 99;
const ORT_TENSOR_ELEMENT_DATA_TYPE_FLOAT: i32 = 1;

/// Minimal ONNX graph: `Y = MatMul(A, B)` with dynamic-shape `[N, N]` float
/// inputs/output. Built as raw protobuf bytes so no onnx/protobuf crate is
/// needed — the bytes are handed straight to `CreateSessionFromArray`.
fn matmul_onnx_model(n: i64) -> Vec<u8> {
    onnx_min::matmul_graph(n)
}

/// Tiny hand-rolled protobuf encoder for exactly the ModelProto shape ORT
/// needs to run a single MatMul node. Not a general ONNX writer.
mod onnx_min {
    fn varint(out: &mut Vec<u8>, mut v: u64) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
    }

    fn tag(out: &mut Vec<u8>, field: u32, wire_type: u32) {
        varint(out, ((field as u64) << 3) | wire_type as u64);
    }

    fn len_delim(out: &mut Vec<u8>, field: u32, bytes: &[u8]) {
        tag(out, field, 2);
        varint(out, bytes.len() as u64);
        out.extend_from_slice(bytes);
    }

    fn string_field(out: &mut Vec<u8>, field: u32, s: &str) {
        len_delim(out, field, s.as_bytes());
    }

    fn value_info(name: &str, dim: i64) -> Vec<u8> {
        // TensorShapeProto.Dimension { dim_value: dim }
        let mut dim_proto = Vec::new();
        tag(&mut dim_proto, 1, 0);
        varint(&mut dim_proto, dim as u64);

        let mut shape = Vec::new();
        len_delim(&mut shape, 1, &dim_proto);
        len_delim(&mut shape, 1, &dim_proto);

        // TypeProto.Tensor { elem_type: FLOAT, shape }
        let mut tensor_type = Vec::new();
        tag(&mut tensor_type, 1, 0);
        varint(&mut tensor_type, 1); // FLOAT
        len_delim(&mut tensor_type, 2, &shape);

        let mut type_proto = Vec::new();
        len_delim(&mut type_proto, 1, &tensor_type);

        let mut vi = Vec::new();
        string_field(&mut vi, 1, name);
        len_delim(&mut vi, 2, &type_proto);
        vi
    }

    /// Builds a `ModelProto` with a single-node `GraphProto` computing
    /// `Y = MatMul(A, B)`, both `[n, n]` float32 inputs.
    pub fn matmul_graph(n: i64) -> Vec<u8> {
        // NodeProto { input: "A", input: "B", output: "Y", op_type: "MatMul" }
        let mut node = Vec::new();
        string_field(&mut node, 1, "A");
        string_field(&mut node, 1, "B");
        string_field(&mut node, 2, "Y");
        string_field(&mut node, 4, "MatMul");

        // GraphProto
        let mut graph = Vec::new();
        len_delim(&mut graph, 1, &node);
        string_field(&mut graph, 2, "matmul_graph");
        len_delim(&mut graph, 11, &value_info("A", n));
        len_delim(&mut graph, 11, &value_info("B", n));
        len_delim(&mut graph, 12, &value_info("Y", n));

        // ModelProto
        let mut model = Vec::new();
        tag(&mut model, 1, 0);
        varint(&mut model, 7); // ir_version
        len_delim(&mut model, 7, &graph);
        let mut opset = Vec::new();
        tag(&mut opset, 2, 0);
        varint(&mut opset, 13);
        len_delim(&mut model, 8, &opset);
        model
    }
}

struct OrtSessionGuard<'a> {
    api: &'a ort::Api,
    env: *mut OrtEnv,
    session: *mut OrtSession,
}

impl<'a> Drop for OrtSessionGuard<'a> {
    fn drop(&mut self) {
        // SAFETY: both handles were created by this struct's constructor and
        // are not used after this point.
        unsafe {
            if !self.session.is_null() {
                (self.api.ffi().release_session)(self.session);
            }
            if !self.env.is_null() {
                (self.api.ffi().release_env)(self.env);
            }
        }
    }
}

fn check(api: &ort::Api, status: *mut ort::OrtStatus, context: &str) -> Result<(), String> {
    if status.is_null() {
        return Ok(());
    }
    // SAFETY: a non-null status is a live OrtStatus handle owned by this
    // call; GetErrorMessage borrows it and ReleaseStatus frees it once.
    unsafe {
        let msg_ptr = (api.ffi().get_error_message)(status);
        let msg = if msg_ptr.is_null() {
            "unknown ORT error".to_string()
        } else {
            std::ffi::CStr::from_ptr(msg_ptr).to_string_lossy().into_owned()
        };
        (api.ffi().release_status)(status);
        Err(format!("{context}: {msg}"))
    }
}

fn build_session(api: &ort::Api, model_bytes: &[u8]) -> Result<OrtSessionGuard<'_>, String> {
    // SAFETY: each out-pointer is written by ORT on success and the guard
    // takes ownership of every non-null handle for cleanup.
    unsafe {
        let mut env: *mut OrtEnv = std::ptr::null_mut();
        let log_id = CString::new("ai-z").unwrap();
        check(
            api,
            (api.ffi().create_env)(ORT_LOGGING_LEVEL_WARNING, log_id.as_ptr(), &mut env),
            "CreateEnv",
        )?;

        let mut opts: *mut OrtSessionOptions = std::ptr::null_mut();
        check(api, (api.ffi().create_session_options)(&mut opts), "CreateSessionOptions")?;
        check(
            api,
            (api.ffi().set_session_graph_optimization_level)(opts, ORT_GRAPH_OPT_ALL),
            "SetSessionGraphOptimizationLevel",
        )?;

        let mut session: *mut OrtSession = std::ptr::null_mut();
        let rc = (api.ffi().create_session_from_array)(
            env,
            model_bytes.as_ptr().cast(),
            model_bytes.len(),
            opts,
            &mut session,
        );
        (api.ffi().release_session_options)(opts);
        check(api, rc, "CreateSessionFromArray")?;

        Ok(OrtSessionGuard { api, env, session })
    }
}

fn make_input_tensor<'a>(
    api: &ort::Api,
    mem_info: *const OrtMemoryInfo,
    data: &'a mut [f32],
    n: i64,
) -> Result<*mut OrtValue, String> {
    let shape = [n, n];
    let mut value: *mut OrtValue = std::ptr::null_mut();
    // SAFETY: `data` outlives the tensor handle for the duration of this
    // benchmark's `run()` call; ORT borrows it without copying.
    unsafe {
        check(
            api,
            (api.ffi().create_tensor_with_data_as_ort_value)(
                mem_info,
                data.as_mut_ptr().cast::<c_void>(),
                data.len() * std::mem::size_of::<f32>(),
                shape.as_ptr(),
                shape.len(),
                ORT_TENSOR_ELEMENT_DATA_TYPE_FLOAT,
                &mut value,
            ),
            "CreateTensorWithDataAsOrtValue",
        )?;
    }
    Ok(value)
}

/// CPU MatMul GFLOPS benchmark: `N=512`, 20 timed runs after one warmup run,
/// `2*N^3*iters / elapsed / 1e9` GFLOPS (spec §4.9).
pub struct OrtMatMulBench;

impl OrtMatMulBench {
    fn run_inner(&self) -> Result<f64, String> {
        let api = ort::api().ok_or_else(|| "ONNX Runtime not available".to_string())?;
        let model = matmul_onnx_model(MATMUL_N);
        let session = build_session(api, &model)?;

        let n = (MATMUL_N * MATMUL_N) as usize;
        let mut a = vec![1.0f32; n];
        let mut b = vec![1.0f32; n];

        // SAFETY: mem_info is released before returning; the handle does
        // not escape this function.
        let mut mem_info: *mut OrtMemoryInfo = std::ptr::null_mut();
        unsafe {
            check(
                api,
                (api.ffi().create_cpu_memory_info)(0, 0, &mut mem_info),
                "CreateCpuMemoryInfo",
            )?;
        }

        let input_a = make_input_tensor(api, mem_info.cast_const(), &mut a, MATMUL_N)?;
        let input_b = make_input_tensor(api, mem_info.cast_const(), &mut b, MATMUL_N)?;

        let name_a = CString::new("A").unwrap();
        let name_b = CString::new("B").unwrap();
        let name_y = CString::new("Y").unwrap();
        let input_names = [name_a.as_ptr(), name_b.as_ptr()];
        let output_names = [name_y.as_ptr()];
        let inputs = [input_a as *const OrtValue, input_b as *const OrtValue];

        let run_once = |session_ptr: *mut OrtSession| -> Result<(), String> {
            let mut output: *mut OrtValue = std::ptr::null_mut();
            // SAFETY: all pointers above remain valid for this call; the
            // output handle is released immediately after.
            unsafe {
                let status = (api.ffi().run)(
                    session_ptr,
                    std::ptr::null(),
                    input_names.as_ptr(),
                    inputs.as_ptr(),
                    inputs.len(),
                    output_names.as_ptr(),
                    output_names.len(),
                    &mut output,
                );
                check(api, status, "Run")?;
                if !output.is_null() {
                    (api.ffi().release_value)(output);
                }
            }
            Ok(())
        };

        run_once(session.session)?;

        let start = Instant::now();
        for _ in 0..MATMUL_ITERS {
            run_once(session.session)?;
        }
        let elapsed = start.elapsed().as_secs_f64();

        // SAFETY: both tensors wrap still-live buffers released here.
        unsafe {
            (api.ffi().release_value)(input_a);
            (api.ffi().release_value)(input_b);
            (api.ffi().release_memory_info)(mem_info);
        }

        if elapsed <= 0.0 {
            return Err("non-positive elapsed time measuring ONNX MatMul".to_string());
        }
        let total_flops = 2.0 * (MATMUL_N as f64).powi(3) * MATMUL_ITERS as f64;
        Ok(total_flops / elapsed / 1e9)
    }
}

impl Benchmark for OrtMatMulBench {
    fn name(&self) -> &str {
        "ONNX FP32 MatMul"
    }

    fn is_available(&self) -> bool {
        ort::is_available()
    }

    fn run(&self) -> Result<String, String> {
        let gflops = self.run_inner()?;
        Ok(format!("{gflops:.1} GFLOPS"))
    }
}

/// CPU memory-bandwidth benchmark: 256 MiB `f32` buffer, 10 summing passes,
/// `bytes * iters / elapsed / 1e9` GB/s. Needs no ORT session at all.
pub struct OrtMemoryBandwidthBench;

impl OrtMemoryBandwidthBench {
    fn run_inner(&self) -> f64 {
        let elems = MEM_BW_BYTES / std::mem::size_of::<f32>();
        let buf = vec![1.0f32; elems];

        let start = Instant::now();
        let mut acc = 0.0f64;
        for _ in 0..MEM_BW_PASSES {
            let mut pass_sum = 0.0f64;
            for &v in &buf {
                pass_sum += v as f64;
            }
            acc += pass_sum;
        }
        let elapsed = start.elapsed().as_secs_f64().max(f64::MIN_POSITIVE);
        // Keep the accumulator live so the loop above can't be folded away.
        std::hint::black_box(acc);

        (MEM_BW_BYTES as f64 * MEM_BW_PASSES as f64) / elapsed / 1e9
    }
}

impl Benchmark for OrtMemoryBandwidthBench {
    fn name(&self) -> &str {
        "ONNX Memory BW"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn run(&self) -> Result<String, String> {
        Ok(format!("{:.1} GB/s", self.run_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_bandwidth_bench_is_always_available() {
        let bench = OrtMemoryBandwidthBench;
        assert!(bench.is_available());
    }

    #[test]
    fn matmul_graph_encodes_nonempty_bytes() {
        let bytes = matmul_onnx_model(8);
        assert!(!bytes.is_empty());
    }
}
