//! Compiles the embedded GLSL compute shader used by the Vulkan FLOPS
//! benchmark (spec §4.9) to SPIR-V at build time, so the binary never shells
//! out to `glslc` at runtime and never ships raw SPIR-V words by hand.

const FP32_FMA_COMPUTE_GLSL: &str = r#"#version 450
layout(local_size_x = 256) in;
layout(std430, binding = 0) buffer OutBuf { float data[]; };
const uint ITERS = 4096u;
void main() {
    uint gid = gl_GlobalInvocationID.x;
    float acc = float(gid);
    for (uint i = 0u; i < ITERS; ++i) {
        acc = fma(acc, 1.0000001, acc);
    }
    data[gid] = acc;
}
"#;

fn main() {
    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR not set by cargo");
    let out_path = std::path::Path::new(&out_dir).join("fp32_compute.spv");

    let compiler = shaderc::Compiler::new().expect("failed to initialize shaderc");
    let mut options = shaderc::CompileOptions::new().expect("failed to initialize shaderc options");
    options.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let artifact = compiler
        .compile_into_spirv(
            FP32_FMA_COMPUTE_GLSL,
            shaderc::ShaderKind::Compute,
            "fp32_compute.comp",
            "main",
            Some(&options),
        )
        .expect("failed to compile embedded compute shader to SPIR-V");

    std::fs::write(&out_path, artifact.as_binary_u8()).expect("failed to write compiled SPIR-V");

    println!("cargo:rerun-if-changed=build.rs");
}
