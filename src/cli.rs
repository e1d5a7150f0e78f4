//! Hand-rolled CLI flag parsing (spec §6), grounded in
//! `original_source/src/aiz/app.cpp`'s `hasFlag`/`flagValue` control flow.
//! No `clap`: the flag set is small, positional-argument-free, and the
//! teacher carries no CLI-parsing crate either — a manual `match` loop is
//! the idiomatic choice here (see SPEC_FULL.md §6).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagKind {
    Pcie,
    Adlx,
    Igcl,
    IgclFull,
    D3dKmt,
    PdhGpu,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Tui { debug: bool },
    Hardware,
    BenchReport,
    Snapshot { format: String, loop_ms: Option<u32> },
    Diag(DiagKind),
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
    pub mode: Mode,
    pub lang: Option<String>,
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Matches `--flag value`, `--flag=value`, and the bare `--flag` (value
/// absent) cases `app.cpp`'s `flagValue` distinguishes.
fn flag_value(args: &[String], flag: &str) -> Option<Option<String>> {
    for (i, a) in args.iter().enumerate() {
        if a == flag {
            return Some(args.get(i + 1).cloned());
        }
        if let Some(eq) = a.strip_prefix(flag) {
            if let Some(v) = eq.strip_prefix('=') {
                return Some(Some(v.to_string()));
            }
        }
    }
    None
}

/// Parses `--snapshot-loop`'s optional millisecond argument: missing value
/// defaults to 500, below-10 values clamp to 10, unparsable values fall back
/// to 500 (spec §6).
fn parse_snapshot_loop_ms(raw: Option<Option<String>>) -> u32 {
    match raw {
        None => 500,
        Some(None) => 500,
        Some(Some(v)) if v.is_empty() => 500,
        Some(Some(v)) => match v.parse::<i64>() {
            Ok(n) if n < 10 => 10,
            Ok(n) => n.min(u32::MAX as i64) as u32,
            Err(_) => 500,
        },
    }
}

impl Cli {
    /// Parses `args` (program name excluded, i.e. `std::env::args().skip(1)`).
    /// Flag precedence mirrors `App::run`'s `if` chain exactly: help,
    /// version, snapshot, diag-*, hardware, bench-report, then the TUI.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let args: Vec<String> = args.into_iter().collect();
        let lang = flag_value(&args, "--lang").flatten();

        let mode = if has_flag(&args, "--help") || has_flag(&args, "-h") {
            Mode::Help
        } else if has_flag(&args, "--version") {
            Mode::Version
        } else if has_flag(&args, "--snapshot") {
            let format = flag_value(&args, "--format").flatten().unwrap_or_else(|| "json".to_string());
            let loop_ms = if has_flag(&args, "--snapshot-loop") {
                Some(parse_snapshot_loop_ms(flag_value(&args, "--snapshot-loop")))
            } else {
                None
            };
            Mode::Snapshot { format, loop_ms }
        } else if has_flag(&args, "--diag-pcie") {
            Mode::Diag(DiagKind::Pcie)
        } else if has_flag(&args, "--diag-adlx") {
            Mode::Diag(DiagKind::Adlx)
        } else if has_flag(&args, "--diag-igcl-full") {
            Mode::Diag(DiagKind::IgclFull)
        } else if has_flag(&args, "--diag-igcl") {
            Mode::Diag(DiagKind::Igcl)
        } else if has_flag(&args, "--diag-d3dkmt") {
            Mode::Diag(DiagKind::D3dKmt)
        } else if has_flag(&args, "--diag-pdh-gpu") {
            Mode::Diag(DiagKind::PdhGpu)
        } else if has_flag(&args, "--hardware") {
            Mode::Hardware
        } else if has_flag(&args, "--bench-report") {
            Mode::BenchReport
        } else {
            Mode::Tui { debug: has_flag(&args, "--debug") }
        };

        Self { mode, lang }
    }
}

pub const HELP_TEXT: &str = "\
AI-Z performance timelines (CPU/GPU/Disk/PCIe) and benchmarks

Usage:
  ai-z [--debug] [--help|-h] [--version] [--hardware] [--bench-report] [--lang <tag>]
  ai-z --snapshot [--format json] [--snapshot-loop [MS]]

Options:
  --debug      Run with synthetic/fake timelines
  --help, -h   Show this help and exit
  --version    Print version and exit
  --hardware   Print hardware info and exit (no TUI)
  --bench-report  Run all benchmarks and write an HTML report
  --snapshot   Print JSON snapshot of all device telemetry and exit
  --format FMT Output format for snapshot: json (default: json)
  --snapshot-loop [MS]  Continuous snapshot loop (default: 500ms interval)
  --diag-pcie  Print Windows PCIe link diagnostics and exit (Windows)
  --diag-adlx  Print AMD ADLX diagnostics and exit (Windows)
  --diag-igcl  Print Intel IGCL diagnostics and exit (Windows)
  --diag-igcl-full  Print detailed Intel IGCL diagnostics (Windows)
  --diag-d3dkmt  Print D3DKMT VRAM diagnostics (Windows)
  --diag-pdh-gpu  Print PDH GPU memory diagnostics (Windows)
  --lang TAG   UI language (en, zh-CN). Also reads AI_Z_LANG / LANG\n";

pub const APP_DISPLAY_NAME: &str = "AI-Z";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_WEBSITE: &str = "https://github.com/ai-z/ai-z";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_flags_defaults_to_tui() {
        assert_eq!(parse(&[]).mode, Mode::Tui { debug: false });
    }

    #[test]
    fn debug_flag_sets_tui_debug_mode() {
        assert_eq!(parse(&["--debug"]).mode, Mode::Tui { debug: true });
    }

    #[test]
    fn help_takes_priority_over_everything() {
        assert_eq!(parse(&["--help", "--version"]).mode, Mode::Help);
        assert_eq!(parse(&["-h"]).mode, Mode::Help);
    }

    #[test]
    fn snapshot_defaults_to_json_and_no_loop() {
        assert_eq!(
            parse(&["--snapshot"]).mode,
            Mode::Snapshot { format: "json".to_string(), loop_ms: None }
        );
    }

    #[test]
    fn snapshot_loop_without_value_defaults_to_500() {
        assert_eq!(
            parse(&["--snapshot", "--snapshot-loop"]).mode,
            Mode::Snapshot { format: "json".to_string(), loop_ms: Some(500) }
        );
    }

    #[test]
    fn snapshot_loop_clamps_small_values_to_10() {
        assert_eq!(
            parse(&["--snapshot", "--snapshot-loop", "1"]).mode,
            Mode::Snapshot { format: "json".to_string(), loop_ms: Some(10) }
        );
    }

    #[test]
    fn snapshot_loop_invalid_value_falls_back_to_500() {
        assert_eq!(
            parse(&["--snapshot", "--snapshot-loop", "notanumber"]).mode,
            Mode::Snapshot { format: "json".to_string(), loop_ms: Some(500) }
        );
    }

    #[test]
    fn format_flag_is_respected() {
        assert_eq!(
            parse(&["--snapshot", "--format", "yaml"]).mode,
            Mode::Snapshot { format: "yaml".to_string(), loop_ms: None }
        );
    }

    #[test]
    fn diag_igcl_full_is_distinguished_from_igcl() {
        assert_eq!(parse(&["--diag-igcl-full"]).mode, Mode::Diag(DiagKind::IgclFull));
        assert_eq!(parse(&["--diag-igcl"]).mode, Mode::Diag(DiagKind::Igcl));
    }

    #[test]
    fn lang_flag_accepts_equals_and_space_forms() {
        assert_eq!(parse(&["--lang", "zh-CN"]).lang, Some("zh-CN".to_string()));
        assert_eq!(parse(&["--lang=zh-CN"]).lang, Some("zh-CN".to_string()));
    }

    #[test]
    fn hardware_and_bench_report_modes() {
        assert_eq!(parse(&["--hardware"]).mode, Mode::Hardware);
        assert_eq!(parse(&["--bench-report"]).mode, Mode::BenchReport);
    }
}
