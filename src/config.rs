//! Flat `key=value` INI config file (spec §6), grounded line-for-line on
//! `original_source/src/aiz/config/config.cpp`. This replaces the teacher's
//! nested `config`-crate/TOML `AppConfig` — the wire format here is
//! spec-mandated, not a style choice (see DESIGN.md).

use std::fmt;
use std::path::PathBuf;

use directories::ProjectDirs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineAgg {
    Max,
    Avg,
}

impl TimelineAgg {
    fn parse(v: &str, fallback: Self) -> Self {
        match v.to_lowercase().as_str() {
            "max" | "peak" | "highest" => TimelineAgg::Max,
            "avg" | "average" | "mean" => TimelineAgg::Avg,
            _ => fallback,
        }
    }
}

impl fmt::Display for TimelineAgg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimelineAgg::Max => "max",
            TimelineAgg::Avg => "avg",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricNameColor {
    Cyan,
    White,
    Green,
    Yellow,
}

impl MetricNameColor {
    fn parse(v: &str, fallback: Self) -> Self {
        match v.to_lowercase().as_str() {
            "cyan" | "lightblue" | "light-blue" | "light blue" => MetricNameColor::Cyan,
            "white" | "gray" | "grey" => MetricNameColor::White,
            "green" => MetricNameColor::Green,
            "yellow" | "amber" => MetricNameColor::Yellow,
            _ => fallback,
        }
    }
}

impl fmt::Display for MetricNameColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetricNameColor::Cyan => "cyan",
            MetricNameColor::White => "white",
            MetricNameColor::Green => "green",
            MetricNameColor::Yellow => "yellow",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineGraphStyle {
    Block,
    Braille,
    Smooth,
}

impl TimelineGraphStyle {
    fn parse(v: &str, fallback: Self) -> Self {
        match v.to_lowercase().as_str() {
            "block" | "blocks" | "classic" => TimelineGraphStyle::Block,
            "braille" | "dots" | "highres" => TimelineGraphStyle::Braille,
            "smooth" | "halfblock" | "half-block" => TimelineGraphStyle::Smooth,
            _ => fallback,
        }
    }
}

impl fmt::Display for TimelineGraphStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimelineGraphStyle::Block => "block",
            TimelineGraphStyle::Braille => "braille",
            TimelineGraphStyle::Smooth => "smooth",
        })
    }
}

fn parse_bool(v: &str, fallback: bool) -> bool {
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => fallback,
    }
}

/// Clamps `refreshMs` to the `[200, 5000]` window the `+`/`-` TUI keys
/// operate within (spec §6). `Config::load` does not clamp on its own —
/// only the interactive adjustment path does, matching the original.
pub fn clamp_refresh_ms(ms: u32) -> u32 {
    ms.clamp(200, 5000)
}

macro_rules! show_toggles {
    ($($field:ident),* $(,)?) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct Config {
            $(pub $field: bool,)*
            pub refresh_ms: u32,
            pub timeline_samples: u32,
            pub show_peak_values: bool,
            pub peak_window_sec: u32,
            pub timeline_agg: TimelineAgg,
            pub timeline_graph_style: TimelineGraphStyle,
            pub metric_name_color: MetricNameColor,
        }
    };
}

show_toggles!(
    show_cpu,
    show_cpu_hot,
    show_gpu,
    show_gpu_mem,
    show_gpu_clock,
    show_gpu_mem_clock,
    show_gpu_enc,
    show_gpu_dec,
    show_disk,
    show_disk_read,
    show_disk_write,
    show_net_rx,
    show_net_tx,
    show_pcie_rx,
    show_pcie_tx,
    show_ram,
    show_vram,
    show_cpu_bars,
    show_cpu_hot_bars,
    show_gpu_bars,
    show_gpu_mem_bars,
    show_gpu_clock_bars,
    show_gpu_mem_clock_bars,
    show_gpu_enc_bars,
    show_gpu_dec_bars,
    show_disk_read_bars,
    show_disk_write_bars,
    show_net_rx_bars,
    show_net_tx_bars,
    show_pcie_rx_bars,
    show_pcie_tx_bars,
    show_ram_bars,
    show_vram_bars,
);

impl Default for Config {
    fn default() -> Self {
        Self {
            show_cpu: true,
            show_cpu_hot: true,
            show_gpu: true,
            show_gpu_mem: true,
            show_gpu_clock: true,
            show_gpu_mem_clock: true,
            show_gpu_enc: true,
            show_gpu_dec: true,
            show_disk: true,
            show_disk_read: true,
            show_disk_write: true,
            show_net_rx: true,
            show_net_tx: true,
            show_pcie_rx: true,
            show_pcie_tx: true,
            show_ram: true,
            show_vram: true,
            show_cpu_bars: true,
            show_cpu_hot_bars: true,
            show_gpu_bars: true,
            show_gpu_mem_bars: true,
            show_gpu_clock_bars: true,
            show_gpu_mem_clock_bars: true,
            show_gpu_enc_bars: true,
            show_gpu_dec_bars: true,
            show_disk_read_bars: true,
            show_disk_write_bars: true,
            show_net_rx_bars: true,
            show_net_tx_bars: true,
            show_pcie_rx_bars: true,
            show_pcie_tx_bars: true,
            show_ram_bars: true,
            show_vram_bars: true,
            refresh_ms: 500,
            timeline_samples: 120,
            show_peak_values: false,
            peak_window_sec: 10,
            timeline_agg: TimelineAgg::Max,
            timeline_graph_style: TimelineGraphStyle::Braille,
            metric_name_color: MetricNameColor::Cyan,
        }
    }
}

/// Directory holding `config.ini`. Uses `directories::ProjectDirs`, which
/// already honours `XDG_CONFIG_HOME` on Unix and `%APPDATA%` on Windows —
/// the exact override spec §6 names.
fn config_dir() -> PathBuf {
    ProjectDirs::from("", "", "ai-z")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.ini")
}

impl Config {
    /// Reads `config.ini`, falling back to `Default` for any key that is
    /// absent, unparsable, or if the file itself does not exist. Missing
    /// file is not an error — a first run has nothing to read yet.
    pub fn load() -> Self {
        let mut cfg = Self::default();
        let Ok(text) = std::fs::read_to_string(config_path()) else {
            return cfg;
        };
        Self::apply_text(&mut cfg, &text);
        cfg
    }

    fn apply_text(cfg: &mut Self, text: &str) {
        let mut saw_cpu_hot = false;
        let mut saw_cpu_hot_bars = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let val = val.trim();

            match key {
                "showCpu" => {
                    cfg.show_cpu = parse_bool(val, cfg.show_cpu);
                    if !saw_cpu_hot {
                        cfg.show_cpu_hot = cfg.show_cpu;
                    }
                }
                "showCpuHot" => {
                    cfg.show_cpu_hot = parse_bool(val, cfg.show_cpu_hot);
                    saw_cpu_hot = true;
                }
                "showGpu" => cfg.show_gpu = parse_bool(val, cfg.show_gpu),
                "showGpuMem" => cfg.show_gpu_mem = parse_bool(val, cfg.show_gpu_mem),
                "showGpuClock" => cfg.show_gpu_clock = parse_bool(val, cfg.show_gpu_clock),
                "showGpuMemClock" => cfg.show_gpu_mem_clock = parse_bool(val, cfg.show_gpu_mem_clock),
                "showGpuEnc" => cfg.show_gpu_enc = parse_bool(val, cfg.show_gpu_enc),
                "showGpuDec" => cfg.show_gpu_dec = parse_bool(val, cfg.show_gpu_dec),
                "showDisk" => {
                    let v = parse_bool(val, cfg.show_disk);
                    cfg.show_disk = v;
                    cfg.show_disk_read = v;
                    cfg.show_disk_write = v;
                }
                "showDiskRead" => cfg.show_disk_read = parse_bool(val, cfg.show_disk_read),
                "showDiskWrite" => cfg.show_disk_write = parse_bool(val, cfg.show_disk_write),
                "showNet" => {
                    let v = parse_bool(val, true);
                    cfg.show_net_rx = v;
                    cfg.show_net_tx = v;
                }
                "showNetRx" => cfg.show_net_rx = parse_bool(val, cfg.show_net_rx),
                "showNetTx" => cfg.show_net_tx = parse_bool(val, cfg.show_net_tx),
                "showPcie" => {
                    let v = parse_bool(val, true);
                    cfg.show_pcie_rx = v;
                    cfg.show_pcie_tx = v;
                }
                "showPcieRx" => cfg.show_pcie_rx = parse_bool(val, cfg.show_pcie_rx),
                "showPcieTx" => cfg.show_pcie_tx = parse_bool(val, cfg.show_pcie_tx),
                "showRam" => cfg.show_ram = parse_bool(val, cfg.show_ram),
                "showVram" => cfg.show_vram = parse_bool(val, cfg.show_vram),

                "showCpuBars" => {
                    cfg.show_cpu_bars = parse_bool(val, cfg.show_cpu_bars);
                    if !saw_cpu_hot_bars {
                        cfg.show_cpu_hot_bars = cfg.show_cpu_bars;
                    }
                }
                "showCpuHotBars" => {
                    cfg.show_cpu_hot_bars = parse_bool(val, cfg.show_cpu_hot_bars);
                    saw_cpu_hot_bars = true;
                }
                "showGpuBars" => cfg.show_gpu_bars = parse_bool(val, cfg.show_gpu_bars),
                "showGpuMemBars" => cfg.show_gpu_mem_bars = parse_bool(val, cfg.show_gpu_mem_bars),
                "showGpuClockBars" => cfg.show_gpu_clock_bars = parse_bool(val, cfg.show_gpu_clock_bars),
                "showGpuMemClockBars" => {
                    cfg.show_gpu_mem_clock_bars = parse_bool(val, cfg.show_gpu_mem_clock_bars)
                }
                "showGpuEncBars" => cfg.show_gpu_enc_bars = parse_bool(val, cfg.show_gpu_enc_bars),
                "showGpuDecBars" => cfg.show_gpu_dec_bars = parse_bool(val, cfg.show_gpu_dec_bars),
                "showDiskReadBars" => cfg.show_disk_read_bars = parse_bool(val, cfg.show_disk_read_bars),
                "showDiskWriteBars" => cfg.show_disk_write_bars = parse_bool(val, cfg.show_disk_write_bars),
                "showNetRxBars" => cfg.show_net_rx_bars = parse_bool(val, cfg.show_net_rx_bars),
                "showNetTxBars" => cfg.show_net_tx_bars = parse_bool(val, cfg.show_net_tx_bars),
                "showPcieRxBars" => cfg.show_pcie_rx_bars = parse_bool(val, cfg.show_pcie_rx_bars),
                "showPcieTxBars" => cfg.show_pcie_tx_bars = parse_bool(val, cfg.show_pcie_tx_bars),
                "showRamBars" => cfg.show_ram_bars = parse_bool(val, cfg.show_ram_bars),
                "showVramBars" => cfg.show_vram_bars = parse_bool(val, cfg.show_vram_bars),

                "refreshMs" => {
                    if let Ok(n) = val.parse() {
                        cfg.refresh_ms = n;
                    }
                }
                "timelineSamples" => {
                    if let Ok(n) = val.parse() {
                        cfg.timeline_samples = n;
                    }
                }
                "showPeakValues" => cfg.show_peak_values = parse_bool(val, cfg.show_peak_values),
                "peakWindowSec" => {
                    if let Ok(n) = val.parse() {
                        cfg.peak_window_sec = n;
                    }
                }
                "timelineAgg" => cfg.timeline_agg = TimelineAgg::parse(val, cfg.timeline_agg),
                "timelineGraphStyle" => {
                    cfg.timeline_graph_style = TimelineGraphStyle::parse(val, cfg.timeline_graph_style)
                }
                "metricNameColor" => cfg.metric_name_color = MetricNameColor::parse(val, cfg.metric_name_color),
                _ => {}
            }
        }
    }

    /// Writes `config.ini`, creating the config directory if needed. Only
    /// per-direction keys are emitted — the legacy `showDisk`/`showNet`/
    /// `showPcie` keys are read-only compatibility shims.
    pub fn save(&self) -> std::io::Result<()> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut out = String::from("# ai-z config\n");
        macro_rules! bool_line {
            ($key:literal, $field:expr) => {
                out.push_str(&format!("{}={}\n", $key, $field));
            };
        }
        bool_line!("showCpu", self.show_cpu);
        bool_line!("showCpuHot", self.show_cpu_hot);
        bool_line!("showGpu", self.show_gpu);
        bool_line!("showGpuMem", self.show_gpu_mem);
        bool_line!("showGpuClock", self.show_gpu_clock);
        bool_line!("showGpuMemClock", self.show_gpu_mem_clock);
        bool_line!("showGpuEnc", self.show_gpu_enc);
        bool_line!("showGpuDec", self.show_gpu_dec);
        bool_line!("showDiskRead", self.show_disk_read);
        bool_line!("showDiskWrite", self.show_disk_write);
        bool_line!("showNetRx", self.show_net_rx);
        bool_line!("showNetTx", self.show_net_tx);
        bool_line!("showPcieRx", self.show_pcie_rx);
        bool_line!("showPcieTx", self.show_pcie_tx);
        bool_line!("showRam", self.show_ram);
        bool_line!("showVram", self.show_vram);

        bool_line!("showCpuBars", self.show_cpu_bars);
        bool_line!("showCpuHotBars", self.show_cpu_hot_bars);
        bool_line!("showGpuBars", self.show_gpu_bars);
        bool_line!("showGpuMemBars", self.show_gpu_mem_bars);
        bool_line!("showGpuClockBars", self.show_gpu_clock_bars);
        bool_line!("showGpuMemClockBars", self.show_gpu_mem_clock_bars);
        bool_line!("showGpuEncBars", self.show_gpu_enc_bars);
        bool_line!("showGpuDecBars", self.show_gpu_dec_bars);
        bool_line!("showDiskReadBars", self.show_disk_read_bars);
        bool_line!("showDiskWriteBars", self.show_disk_write_bars);
        bool_line!("showNetRxBars", self.show_net_rx_bars);
        bool_line!("showNetTxBars", self.show_net_tx_bars);
        bool_line!("showPcieRxBars", self.show_pcie_rx_bars);
        bool_line!("showPcieTxBars", self.show_pcie_tx_bars);
        bool_line!("showRamBars", self.show_ram_bars);
        bool_line!("showVramBars", self.show_vram_bars);

        out.push_str(&format!("refreshMs={}\n", self.refresh_ms));
        out.push_str(&format!("timelineSamples={}\n", self.timeline_samples));
        bool_line!("showPeakValues", self.show_peak_values);
        out.push_str(&format!("peakWindowSec={}\n", self.peak_window_sec));
        out.push_str(&format!("timelineAgg={}\n", self.timeline_agg));
        out.push_str(&format!("timelineGraphStyle={}\n", self.timeline_graph_style));
        out.push_str(&format!("metricNameColor={}\n", self.metric_name_color));

        std::fs::write(&path, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Config {
        let mut cfg = Config::default();
        Config::apply_text(&mut cfg, text);
        cfg
    }

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::default();
        assert!(cfg.show_cpu);
        assert_eq!(cfg.refresh_ms, 500);
        assert_eq!(cfg.timeline_samples, 120);
        assert!(!cfg.show_peak_values);
        assert_eq!(cfg.peak_window_sec, 10);
        assert_eq!(cfg.timeline_agg, TimelineAgg::Max);
        assert_eq!(cfg.timeline_graph_style, TimelineGraphStyle::Braille);
        assert_eq!(cfg.metric_name_color, MetricNameColor::Cyan);
    }

    #[test]
    fn legacy_show_disk_toggle_sets_both_directions() {
        let cfg = parse("showDisk=false\n");
        assert!(!cfg.show_disk);
        assert!(!cfg.show_disk_read);
        assert!(!cfg.show_disk_write);
        assert!(cfg.show_disk_read_bars);
        assert!(cfg.show_disk_write_bars);
    }

    #[test]
    fn explicit_cpu_hot_overrides_cpu_fanout() {
        let cfg = parse("showCpu=false\nshowCpuHot=true\n");
        assert!(!cfg.show_cpu);
        assert!(cfg.show_cpu_hot);
    }

    #[test]
    fn cpu_hot_inherits_cpu_when_not_set_explicitly() {
        let cfg = parse("showCpu=false\n");
        assert!(!cfg.show_cpu);
        assert!(!cfg.show_cpu_hot);
    }

    #[test]
    fn bool_parsing_accepts_documented_synonyms() {
        assert!(parse_bool("yes", false));
        assert!(parse_bool("On", false));
        assert!(!parse_bool("no", true));
        assert!(!parse_bool("Off", true));
        assert!(parse_bool("garbage", true));
    }

    #[test]
    fn timeline_agg_accepts_synonyms() {
        assert_eq!(TimelineAgg::parse("peak", TimelineAgg::Avg), TimelineAgg::Max);
        assert_eq!(TimelineAgg::parse("mean", TimelineAgg::Max), TimelineAgg::Avg);
        assert_eq!(TimelineAgg::parse("nonsense", TimelineAgg::Max), TimelineAgg::Max);
    }

    #[test]
    fn refresh_ms_clamped_to_window() {
        assert_eq!(clamp_refresh_ms(50), 200);
        assert_eq!(clamp_refresh_ms(9000), 5000);
        assert_eq!(clamp_refresh_ms(1000), 1000);
    }

    #[test]
    fn save_then_load_roundtrips_through_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", dir.path());

        let cfg = Config::default();
        cfg.save().unwrap();
        let loaded = Config::load();
        assert_eq!(cfg, loaded);

        let text = std::fs::read_to_string(config_path()).unwrap();
        assert!(text.contains("showCpu=true"));
        assert!(text.contains("refreshMs=500"));
        assert!(text.contains("timelineGraphStyle=braille"));

        std::env::remove_var("XDG_CONFIG_HOME");
    }
}
