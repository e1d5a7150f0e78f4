//! `BenchRunner` (spec §4.8): builds the device-grouped row table in the
//! spec-mandated order, runs one row (or every row, via the "Run All"
//! sentinel at index 0) on a single dedicated worker thread, and renders
//! the static HTML report.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use super::compute_cuda::{CudaComputeBench, CudaPcieAggregateBench};
use super::compute_opencl::{OpenClComputeBench, OpenClPcieAggregateBench};
use super::compute_vulkan::{VulkanComputeBench, VulkanPcieAggregateBench};
use super::ort_bench::{OrtMatMulBench, OrtMemoryBandwidthBench};
use super::{render_html, report_path, BenchReport, BenchRow, Benchmark, Row};
use crate::core::HardwareInfo;
use crate::dynload::{cuda, nvml, vulkan};

/// Best-effort GPU count: the highest device count any compiled-in backend
/// reports, so the row table covers every GPU regardless of which backend
/// ends up answering telemetry/benchmarks for it.
pub fn detect_gpu_count() -> u32 {
    let cuda_n = cuda::device_count().unwrap_or(0);
    let nvml_n = nvml::device_count().unwrap_or(0);
    let vk_n = vulkan::physical_device_count().unwrap_or(0);
    cuda_n.max(nvml_n).max(vk_n)
}

fn gpu_display_name(index: u32) -> String {
    nvml::device_display_name(index).unwrap_or_else(|| format!("GPU{index}"))
}

/// Per-GPU benchmark rows in spec §4.8's mandated order.
fn gpu_rows(index: u32) -> Vec<BenchRow> {
    vec![
        BenchRow::bench(Box::new(CudaPcieAggregateBench { device_index: index })),
        BenchRow::bench(Box::new(VulkanPcieAggregateBench { device_index: index })),
        BenchRow::bench(Box::new(OpenClPcieAggregateBench { device_index: index })),
        BenchRow::bench(Box::new(VulkanComputeBench { device_index: index })),
        BenchRow::bench(Box::new(OpenClComputeBench { device_index: index })),
        BenchRow::bench(Box::new(CudaComputeBench::fp16(index))),
        BenchRow::bench(Box::new(CudaComputeBench::fp32(index))),
        BenchRow::bench(Box::new(CudaComputeBench::fp64(index))),
        BenchRow::bench(Box::new(CudaComputeBench::int4(index))),
        BenchRow::bench(Box::new(CudaComputeBench::int32(index))),
    ]
}

/// CPU rows: only emitted once (for "CPU0"), not once per GPU — spec §9
/// treats the source's `if (gi == 0)` guard as intentional, not an
/// accidental omission.
fn cpu_rows() -> Vec<BenchRow> {
    vec![
        BenchRow::bench(Box::new(OrtMatMulBench)),
        BenchRow::bench(Box::new(OrtMemoryBandwidthBench)),
    ]
}

struct WorkerState {
    running: bool,
    running_bench_index: Option<usize>,
    results: Vec<String>,
    /// Benchmarks a finished worker hands back so `reap_finished_worker`
    /// can put them back into their row (they were moved out at
    /// activation time so the worker thread could own them).
    returned_benches: Vec<(usize, Box<dyn Benchmark>)>,
}

/// Owns the live row table and the mutex-guarded state a background worker
/// publishes to. Row 0 is the synthetic "Run All" header; real rows start
/// at index 1, matching spec §4.8's activation rule.
pub struct BenchRunner {
    rows: Vec<BenchRow>,
    state: Arc<Mutex<WorkerState>>,
    worker: Option<JoinHandle<()>>,
    cpu_name: String,
}

impl BenchRunner {
    /// Builds the full row table: a `"Run All"` header, then one
    /// `"GPU<i> - <name>"` group per detected GPU, then a single `"CPU0 -
    /// <name>"` group.
    pub fn new(gpu_count: u32, cpu_name: impl Into<String>) -> Self {
        let cpu_name = cpu_name.into();
        let mut rows = vec![BenchRow::header("Run All")];
        for i in 0..gpu_count {
            rows.push(BenchRow::header(format!("GPU{i} - {}", gpu_display_name(i))));
            rows.extend(gpu_rows(i));
        }
        rows.push(BenchRow::header(format!("CPU0 - {cpu_name}")));
        rows.extend(cpu_rows());

        let results = vec![String::new(); rows.len()];
        Self {
            rows,
            state: Arc::new(Mutex::new(WorkerState {
                running: false,
                running_bench_index: None,
                results,
                returned_benches: Vec::new(),
            })),
            worker: None,
            cpu_name,
        }
    }

    pub fn rows(&self) -> &[BenchRow] {
        &self.rows
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Row currently executing, if any (`None` once the worker finishes).
    pub fn running_bench_index(&self) -> Option<usize> {
        self.state.lock().unwrap().running_bench_index
    }

    pub fn result(&self, index: usize) -> String {
        self.state
            .lock()
            .unwrap()
            .results
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// Joins a finished worker thread and moves its benchmarks back into
    /// their rows. Safe to call even if no worker has run yet.
    pub fn reap_finished_worker(&mut self) {
        let Some(handle) = &self.worker else { return };
        if !handle.is_finished() {
            return;
        }
        let _ = self.worker.take().unwrap().join();
        let mut guard = self.state.lock().unwrap();
        for (i, bench) in guard.returned_benches.drain(..) {
            self.rows[i].bench = Some(bench);
        }
    }

    /// Blocks until any in-flight worker finishes, then reaps it.
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        let mut guard = self.state.lock().unwrap();
        for (i, bench) in guard.returned_benches.drain(..) {
            self.rows[i].bench = Some(bench);
        }
    }

    /// Activates `row_index`: row 0 runs every non-header row sequentially,
    /// any other row runs only itself. Re-activation while a worker is
    /// already running is ignored (spec §4.8).
    pub fn activate(&mut self, row_index: usize) {
        self.reap_finished_worker();
        if self.is_running() || self.worker.is_some() {
            return;
        }
        if row_index >= self.rows.len() {
            return;
        }

        let targets: Vec<usize> = if row_index == 0 {
            (0..self.rows.len())
                .filter(|&i| !self.rows[i].is_header)
                .collect()
        } else if self.rows[row_index].is_header {
            return;
        } else {
            vec![row_index]
        };

        let mut owned: Vec<(usize, Box<dyn Benchmark>)> = Vec::new();
        for i in targets {
            if let Some(bench) = self.rows[i].bench.take() {
                owned.push((i, bench));
            }
        }
        if owned.is_empty() {
            return;
        }

        let state = Arc::clone(&self.state);
        {
            let mut guard = state.lock().unwrap();
            guard.running = true;
            guard.running_bench_index = Some(owned[0].0);
        }

        let handle = std::thread::Builder::new()
            .name("bench-worker".to_string())
            .spawn(move || {
                let mut finished = Vec::with_capacity(owned.len());
                for (i, bench) in owned {
                    {
                        let mut guard = state.lock().unwrap();
                        guard.running_bench_index = Some(i);
                    }
                    let result = if bench.is_available() {
                        bench.run().unwrap_or_else(|e| e)
                    } else {
                        "Not built with this vendor SDK".to_string()
                    };
                    {
                        let mut guard = state.lock().unwrap();
                        if i < guard.results.len() {
                            guard.results[i] = result;
                        }
                    }
                    finished.push((i, bench));
                }
                let mut guard = state.lock().unwrap();
                guard.running = false;
                guard.running_bench_index = None;
                guard.returned_benches.extend(finished);
            })
            .expect("failed to spawn bench-worker thread");

        self.worker = Some(handle);
    }

    /// Builds the static report: runs every benchmark synchronously (no
    /// worker thread — this is the `--bench-report` CLI path, which blocks
    /// the whole process anyway) and renders HTML.
    pub fn run_all_and_report(&mut self, hw: &HardwareInfo, timestamp: &str) -> BenchReport {
        self.join();
        let mut results = vec![String::new(); self.rows.len()];
        for (i, row) in self.rows.iter().enumerate() {
            if let Some(bench) = &row.bench {
                results[i] = if bench.is_available() {
                    bench.run().unwrap_or_else(|e| e)
                } else {
                    "Not built with this vendor SDK".to_string()
                };
            }
        }
        {
            let mut guard = self.state.lock().unwrap();
            guard.results = results.clone();
        }

        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| Row {
                title: row.title.clone(),
                is_header: row.is_header,
                result: results[i].clone(),
            })
            .collect();

        BenchReport {
            path: report_path(timestamp),
            rows,
            hardware_lines: hw.display_lines(),
        }
    }

    pub fn cpu_name(&self) -> &str {
        &self.cpu_name
    }
}

/// Writes `report`'s rendered HTML to `report.path`.
pub fn write_report(report: &BenchReport) -> std::io::Result<()> {
    std::fs::write(&report.path, render_html(report))
}

impl Drop for BenchRunner {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubBench {
        result: Result<&'static str, &'static str>,
    }

    impl Benchmark for StubBench {
        fn name(&self) -> &str {
            "Stub"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn run(&self) -> Result<String, String> {
            match self.result {
                Ok(s) => Ok(s.to_string()),
                Err(e) => Err(e.to_string()),
            }
        }
    }

    fn push_stub(runner: &mut BenchRunner, result: Result<&'static str, &'static str>) -> usize {
        runner.rows.push(BenchRow::bench(Box::new(StubBench { result })));
        runner.state.lock().unwrap().results.push(String::new());
        runner.rows.len() - 1
    }

    #[test]
    fn activate_single_row_publishes_result_and_clears_running_flag() {
        let mut runner = BenchRunner::new(0, "Test CPU");
        let stub_index = push_stub(&mut runner, Ok("12.34 GFLOPS"));

        runner.activate(stub_index);
        for _ in 0..200 {
            if !runner.is_running() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        runner.reap_finished_worker();

        assert!(!runner.is_running());
        assert_eq!(runner.result(stub_index), "12.34 GFLOPS");
        assert_eq!(runner.running_bench_index(), None);
        assert!(runner.rows[stub_index].bench.is_some());
    }

    #[test]
    fn reactivation_while_running_is_ignored() {
        let mut runner = BenchRunner::new(0, "Test CPU");
        let stub_index = push_stub(&mut runner, Err("boom"));

        runner.activate(stub_index);
        let was_running = runner.is_running();
        runner.activate(stub_index); // should be a no-op: worker already in flight
        runner.join();

        assert!(was_running || runner.result(stub_index) == "boom");
        assert_eq!(runner.result(stub_index), "boom");
    }

    #[test]
    fn row_table_orders_gpu_then_cpu_groups() {
        let runner = BenchRunner::new(1, "Test CPU");
        let titles: Vec<&str> = runner.rows().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles[0], "Run All");
        assert!(titles[1].starts_with("GPU0 - "));
        let cpu_header_idx = titles.iter().position(|t| t.starts_with("CPU0 - ")).unwrap();
        assert_eq!(titles[cpu_header_idx + 1], "ONNX FP32 MatMul");
        assert_eq!(titles[cpu_header_idx + 2], "ONNX Memory BW");
    }
}
