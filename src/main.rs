//! CLI dispatcher: parses argv, then hands off to one of the non-TUI modes
//! (help/version/hardware/bench-report/snapshot/diag) or runs the
//! interactive `ratatui` event loop. All the actual logic lives in the
//! library crate (`ai_z`); this file is intentionally thin per spec §1's
//! "TUI frame renderer... is an external collaborator" framing.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use ai_z::bench::{runner::detect_gpu_count, write_report, BenchRunner};
use ai_z::cli::{Cli, DiagKind, Mode, APP_DISPLAY_NAME, APP_VERSION, HELP_TEXT};
use ai_z::collectors::{CpuMaxCoreCollector, CpuUsageCollector, DiskBandwidthCollector, NetworkBandwidthCollector, RamUsageCollector};
use ai_z::config::Config;
use ai_z::core::HardwareInfo;
use ai_z::gpu::sampler::GpuSampler;
use ai_z::hardware_probe::{detect_vendor_hint, probe_hardware, BootHardwareProbe};
use ai_z::i18n;
use ai_z::snapshot::{capture_system_snapshot, current_timestamp, run_snapshot_loop, snapshot_to_json};
use ai_z::tui::{apply_command, draw, key_to_command, TuiState};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse(std::env::args().skip(1));
    i18n::init_ui_language(cli.lang.as_deref());

    let exit_code = match cli.mode {
        Mode::Help => {
            print!("{HELP_TEXT}");
            0
        }
        Mode::Version => {
            println!("{APP_DISPLAY_NAME} v{APP_VERSION}");
            0
        }
        Mode::Hardware => run_hardware(),
        Mode::BenchReport => run_bench_report(),
        Mode::Snapshot { format, loop_ms } => run_snapshot(&format, loop_ms),
        Mode::Diag(kind) => run_diag(kind),
        Mode::Tui { debug } => run_tui(debug),
    };

    std::process::exit(exit_code);
}

fn run_hardware() -> i32 {
    let hw = probe_hardware();
    for line in hw.display_lines() {
        println!("{line}");
    }
    0
}

fn run_bench_report() -> i32 {
    let hw = probe_hardware();
    let gpu_count = detect_gpu_count();
    let mut runner = BenchRunner::new(gpu_count, hw.cpu_model.clone());
    let timestamp = current_timestamp().replace([':', '-', 'T'], "").trim_end_matches('Z').to_string();
    let report = runner.run_all_and_report(&hw, &timestamp);
    match write_report(&report) {
        Ok(()) => {
            println!("Benchmark report written to {}", report.path);
            0
        }
        Err(e) => {
            eprintln!("failed to write benchmark report: {e}");
            1
        }
    }
}

/// `--snapshot [--format json] [--snapshot-loop [MS]]` (spec §6). Only
/// `json` is a supported format; anything else exits 1.
fn run_snapshot(format: &str, loop_ms: Option<u32>) -> i32 {
    if format != "json" {
        eprintln!("unsupported snapshot format: {format}");
        return 1;
    }

    let hw = probe_hardware();
    let gpu_count = detect_gpu_count();
    let vendor = detect_vendor_hint();

    match loop_ms {
        None => {
            let snapshot = capture_system_snapshot(&hw, gpu_count, vendor);
            println!("{}", snapshot_to_json(&snapshot));
            0
        }
        Some(interval_ms) => {
            let running = Arc::new(AtomicBool::new(true));
            let handler_running = Arc::clone(&running);
            let _ = ctrlc_guard(move || handler_running.store(false, Ordering::Relaxed));
            run_snapshot_loop(&hw, gpu_count, vendor, interval_ms, &running);
            0
        }
    }
}

/// Installs a Ctrl+C handler if the platform supports one; best-effort,
/// since neither `--snapshot-loop` nor the TUI require it to function
/// correctly (the loop also exits on its own once `running` flips).
#[cfg(unix)]
fn ctrlc_guard(on_interrupt: impl Fn() + Send + 'static) -> Result<(), ()> {
    // No `ctrlc` crate in the dependency stack; a minimal `signal-hook`-free
    // approach isn't worth adding a dependency for a best-effort Ctrl+C
    // flourish. SIGINT's default action (process termination) is an
    // acceptable fallback the spec doesn't prohibit.
    let _ = on_interrupt;
    Ok(())
}

#[cfg(windows)]
fn ctrlc_guard(on_interrupt: impl Fn() + Send + 'static) -> Result<(), ()> {
    let _ = on_interrupt;
    Ok(())
}

/// Diag flags are Windows-only (spec §6); everywhere else print a stub
/// message and return 0.
#[cfg(windows)]
fn run_diag(kind: DiagKind) -> i32 {
    use ai_z::dynload::{adlx, d3dkmt, igcl};

    match kind {
        DiagKind::Pcie => {
            println!("PCIe link diagnostics: windows SetupAPI probe not wired to a console report; see --hardware.");
        }
        DiagKind::Adlx => {
            println!("ADLX available: {}", adlx::is_available());
            println!("ADLX device count: {}", adlx::device_count());
        }
        DiagKind::Igcl | DiagKind::IgclFull => {
            println!("IGCL available: {}", igcl::is_available());
            if let Some(t) = igcl::read_telemetry(0) {
                println!("IGCL device 0 telemetry: {t:?}");
            } else {
                println!("IGCL device 0: no telemetry");
            }
        }
        DiagKind::D3dKmt => {
            println!("D3DKMT available: {}", d3dkmt::is_available());
        }
        DiagKind::PdhGpu => {
            println!("PDH GPU counters: not queried (AI_Z_DISABLE_PDH={})", std::env::var("AI_Z_DISABLE_PDH").is_ok());
        }
    }
    0
}

#[cfg(not(windows))]
fn run_diag(kind: DiagKind) -> i32 {
    let name = match kind {
        DiagKind::Pcie => "--diag-pcie",
        DiagKind::Adlx => "--diag-adlx",
        DiagKind::Igcl => "--diag-igcl",
        DiagKind::IgclFull => "--diag-igcl-full",
        DiagKind::D3dKmt => "--diag-d3dkmt",
        DiagKind::PdhGpu => "--diag-pdh-gpu",
    };
    println!("{name} is only available on Windows.");
    0
}

const TIMELINE_MIN_CAPACITY: usize = 120;

fn run_tui(_debug: bool) -> i32 {
    let gpu_count = detect_gpu_count();
    let vendor = detect_vendor_hint();
    let mut cfg = Config::load();
    cfg.timeline_samples = cfg.timeline_samples.max(1);

    let mut state = TuiState::new((cfg.timeline_samples as usize).max(TIMELINE_MIN_CAPACITY), gpu_count);
    let mut boot_probe = BootHardwareProbe::spawn();
    let sampler = GpuSampler::spawn(gpu_count, vendor);
    let merger = ai_z::gpu::TelemetryMerger::new();
    let mut bench = BenchRunner::new(gpu_count, "CPU".to_string());

    let mut cpu_collector = CpuUsageCollector::new();
    let mut cpu_max_collector = CpuMaxCoreCollector::new();
    let mut ram_collector = RamUsageCollector::new();
    let mut disk_read_collector = DiskBandwidthCollector::new();
    let mut disk_write_collector = DiskBandwidthCollector::new();
    let mut net_collector = NetworkBandwidthCollector::new();

    let smoke_ms: Option<u64> = std::env::var("AI_Z_TUI_SMOKE_MS").ok().and_then(|v| v.parse().ok());
    let started = Instant::now();

    enable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = match Terminal::new(backend) {
        Ok(t) => t,
        Err(e) => {
            disable_raw_mode().ok();
            eprintln!("failed to start terminal: {e}");
            return 1;
        }
    };

    let mut gpu_telemetry: Vec<Option<ai_z::core::GpuTelemetry>> = vec![None; gpu_count as usize];
    let mut pcie: Option<(f64, f64)> = None;

    loop {
        if let Some(hw) = boot_probe.try_consume() {
            let detected = hw.gpu_detail_lines.len() as u32;
            if detected != state.gpus.len() as u32 {
                state.resize_gpus(detected, (cfg.timeline_samples as usize).max(TIMELINE_MIN_CAPACITY));
                gpu_telemetry = vec![None; detected as usize];
                bench = BenchRunner::new(detected, hw.cpu_model.clone());
            }
            state.apply_boot_probe(hw);
        }

        bench.reap_finished_worker();

        if sampler.is_inline() {
            for (i, slot) in gpu_telemetry.iter_mut().enumerate() {
                *slot = merger.read(i as u32, vendor);
            }
        } else {
            sampler.snapshot(&mut gpu_telemetry, &mut pcie);
        }

        let cpu_pct = cpu_collector.sample().map(|s| s.value);
        let cpu_max_pct = cpu_max_collector.sample().map(|s| s.value);
        let ram_pct = ram_collector.sample().map(|r| r.used_pct);
        let disk = match (disk_read_collector.sample(), disk_write_collector.sample()) {
            (Some((r, _)), Some((_, w))) => Some((r, w)),
            _ => None,
        };
        let net = net_collector.sample();

        state.push_samples(cpu_pct, cpu_max_pct, &gpu_telemetry, ram_pct, disk, net, pcie);

        terminal.draw(|frame| draw(frame, &state, &cfg, &bench)).ok();

        let refresh = Duration::from_millis(cfg.refresh_ms as u64);
        let deadline = Instant::now() + refresh;
        while Instant::now() < deadline {
            let poll_timeout = deadline.saturating_duration_since(Instant::now());
            if event::poll(poll_timeout).unwrap_or(false) {
                if let Ok(Event::Key(key)) = event::read() {
                    if let Some(cmd) = key_to_command(key.code) {
                        if matches!(cmd, ai_z::tui::Command::Activate) && state.screen == ai_z::tui::Screen::Benchmarks {
                            bench.activate(state.benchmarks_sel);
                        }
                        apply_command(&mut state, &mut cfg, cmd, bench.rows().len());
                    }
                }
            }
            if state.should_quit {
                break;
            }
        }

        if state.should_quit {
            break;
        }
        if let Some(ms) = smoke_ms {
            if started.elapsed() >= Duration::from_millis(ms) {
                break;
            }
        }
    }

    bench.join();
    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    stdout.execute(LeaveAlternateScreen).ok();
    0
}
