//! End-to-end scenarios from spec §8, exercised against the public library
//! API rather than internals. Tests here that mutate process-global state
//! (`XDG_CONFIG_HOME`) share `ENV_MUTEX` so they can't interleave with each
//! other even under `cargo test`'s default multi-threaded runner — grounded
//! in `other_examples/muyuanjin-ffui/src-tauri/src/test_support.rs`'s
//! `env_lock`/`EnvVarGuard` pattern.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use rstest::rstest;

use ai_z::config::Config;
use ai_z::core::HardwareInfo;
use ai_z::gpu::sources::VendorHint;
use ai_z::safe_call::safe_call_with_timeout;
use ai_z::snapshot::{capture_system_snapshot, snapshot_to_json};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct XdgConfigHomeGuard {
    _lock: std::sync::MutexGuard<'static, ()>,
    prev: Option<std::ffi::OsString>,
    _dir: tempfile::TempDir,
}

impl XdgConfigHomeGuard {
    fn new() -> Self {
        let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let prev = std::env::var_os("XDG_CONFIG_HOME");
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", dir.path());
        Self { _lock: lock, prev, _dir: dir }
    }
}

impl Drop for XdgConfigHomeGuard {
    fn drop(&mut self) {
        match self.prev.take() {
            Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
}

/// Scenario 1: default config round-trip against an empty temp config dir.
#[test]
fn default_config_round_trip() {
    let _guard = XdgConfigHomeGuard::new();

    let cfg = Config::load();
    assert!(cfg.show_cpu);
    assert_eq!(cfg.refresh_ms, 500);

    cfg.save().unwrap();
    let text = std::fs::read_to_string(ai_z::config::config_path()).unwrap();
    assert!(text.contains("showCpu=true"));
    assert!(text.contains("refreshMs=500"));
    assert!(text.contains("timelineGraphStyle=braille"));
}

/// Scenario 2: writing the legacy `showDisk=false` key flips both
/// directions but leaves the Bars toggles untouched.
#[rstest]
#[case("showDisk=false\n", false, false, false)]
#[case("showDisk=true\n", true, true, true)]
fn legacy_disk_toggle_cascades_to_both_directions(
    #[case] contents: &str,
    #[case] expect_disk: bool,
    #[case] expect_read: bool,
    #[case] expect_write: bool,
) {
    let _guard = XdgConfigHomeGuard::new();
    let path = ai_z::config::config_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();

    let cfg = Config::load();
    assert_eq!(cfg.show_disk, expect_disk);
    assert_eq!(cfg.show_disk_read, expect_read);
    assert_eq!(cfg.show_disk_write, expect_write);
    assert!(cfg.show_disk_read_bars);
    assert!(cfg.show_disk_write_bars);
}

/// Scenario 4: with no GPUs and no NVML, the snapshot has `cpu`/`ram`
/// entries, no `gpu` entry, and omits fields that were never measured.
#[test]
fn snapshot_without_gpus_omits_gpu_and_unmeasured_fields() {
    let hw = HardwareInfo {
        cpu_model: "Test CPU".to_string(),
        logical_cores: 8,
        ..Default::default()
    };
    let snapshot = capture_system_snapshot(&hw, 0, VendorHint::Unknown);
    let json = snapshot_to_json(&snapshot);

    assert!(json.contains("\"device_type\":\"cpu\""));
    assert!(json.contains("\"device_type\":\"ram\""));
    assert!(!json.contains("\"device_type\":\"gpu\""));
    assert!(!json.contains("fan_speed"));
}

/// Scenario 5: a SafeCall-wrapped closure that hangs past its deadline
/// returns `None` well within a second, standing in for "NVML timeout is
/// non-fatal" — the mechanism under test is exactly the one `dynload::nvml`
/// wraps every call in, just without a real vendor library to sleep inside.
#[test]
fn safe_call_timeout_returns_promptly_on_a_hung_closure() {
    let start = Instant::now();
    let result = safe_call_with_timeout(Duration::from_millis(200), || {
        std::thread::sleep(Duration::from_secs(2));
        1u32
    });
    assert_eq!(result, None);
    assert!(start.elapsed() < Duration::from_secs(1));
}

/// Scenario 3 (Timeline ring) and scenario 6 (benchmark harness) are
/// exercised as unit tests alongside `Timeline` and `BenchRunner`
/// themselves (`core::timeline`, `bench::runner`), since they need no
/// process-global state and read better next to the code they pin down.
#[test]
fn config_default_and_loaded_agree_when_no_file_exists() {
    let _guard = XdgConfigHomeGuard::new();
    let c1 = Config::default();
    let c2 = Config::load();
    assert_eq!(c1, c2);
}
