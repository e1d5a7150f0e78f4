//! `TuiState` (spec §3's "core-relevant subset") and the `Command`/`Screen`
//! enums it's driven by, grounded in `original_source/src/aiz/tui/tui_core.cpp`'s
//! `Screen`, `Command` and `applyCommand` — the config-toggle table in
//! particular is a direct port of `kConfigToggleItems`/`kConfigToggleItemsBars`.

use crate::config::{Config, MetricNameColor, TimelineGraphStyle};
use crate::core::{GpuTelemetry, HardwareInfo, Timeline};
use crate::i18n::{self, MsgId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Timelines,
    Minimal,
    Help,
    Hardware,
    Benchmarks,
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineView {
    Timelines,
    Bars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    NavHelp,
    NavHardware,
    NavBenchmarks,
    NavConfig,
    NavMinimal,
    Back,
    Up,
    Down,
    Left,
    Right,
    Toggle,
    Defaults,
    Save,
    Activate,
    ViewTimelines,
    ViewBars,
    ViewMinimal,
    IncreaseRefresh,
    DecreaseRefresh,
}

/// Every Timeline this build tracks for a single GPU: util/VRAM/clocks/codec
/// load. Spec §5's push order (`per-GPU util, VRAM, clocks, enc/dec`) is
/// mirrored by [`TuiState::push_samples`].
pub struct GpuTimelines {
    pub name: String,
    pub util: Timeline,
    pub mem_util: Timeline,
    pub gpu_clock: Timeline,
    pub mem_clock: Timeline,
    pub encoder: Timeline,
    pub decoder: Timeline,
    pub latest: GpuTelemetry,
}

impl GpuTimelines {
    fn new(name: String, capacity: usize) -> Self {
        Self {
            name,
            util: Timeline::new(capacity),
            mem_util: Timeline::new(capacity),
            gpu_clock: Timeline::new(capacity),
            mem_clock: Timeline::new(capacity),
            encoder: Timeline::new(capacity),
            decoder: Timeline::new(capacity),
            latest: GpuTelemetry::default(),
        }
    }
}

/// Number of per-metric toggle rows in the config screen (spec: 16, one per
/// show/showBars pair), matching `kConfigToggleItems.size()`.
pub const CONFIG_TOGGLE_COUNT: usize = 16;
/// Toggle rows plus the 7 read-only/misc rows (`configItemCount()`).
pub const CONFIG_ITEM_COUNT: usize = CONFIG_TOGGLE_COUNT + 7;

const CONFIG_PEAK_TOGGLE_ROW: usize = CONFIG_TOGGLE_COUNT + 2;
const CONFIG_PEAK_WINDOW_ROW: usize = CONFIG_TOGGLE_COUNT + 3;
const CONFIG_METRIC_COLOR_ROW: usize = CONFIG_TOGGLE_COUNT + 5;
const CONFIG_GRAPH_STYLE_ROW: usize = CONFIG_TOGGLE_COUNT + 6;

/// Read-only counterpart of [`config_toggle_field`], for rendering.
pub fn config_toggle_value(cfg: &Config, index: usize, bars: bool) -> bool {
    match (index, bars) {
        (0, false) => cfg.show_cpu,
        (0, true) => cfg.show_cpu_bars,
        (1, false) => cfg.show_cpu_hot,
        (1, true) => cfg.show_cpu_hot_bars,
        (2, false) => cfg.show_ram,
        (2, true) => cfg.show_ram_bars,
        (3, false) => cfg.show_gpu,
        (3, true) => cfg.show_gpu_bars,
        (4, false) => cfg.show_gpu_mem,
        (4, true) => cfg.show_gpu_mem_bars,
        (5, false) => cfg.show_vram,
        (5, true) => cfg.show_vram_bars,
        (6, false) => cfg.show_gpu_clock,
        (6, true) => cfg.show_gpu_clock_bars,
        (7, false) => cfg.show_gpu_mem_clock,
        (7, true) => cfg.show_gpu_mem_clock_bars,
        (8, false) => cfg.show_gpu_enc,
        (8, true) => cfg.show_gpu_enc_bars,
        (9, false) => cfg.show_gpu_dec,
        (9, true) => cfg.show_gpu_dec_bars,
        (10, false) => cfg.show_pcie_rx,
        (10, true) => cfg.show_pcie_rx_bars,
        (11, false) => cfg.show_pcie_tx,
        (11, true) => cfg.show_pcie_tx_bars,
        (12, false) => cfg.show_disk_read,
        (12, true) => cfg.show_disk_read_bars,
        (13, false) => cfg.show_disk_write,
        (13, true) => cfg.show_disk_write_bars,
        (14, false) => cfg.show_net_rx,
        (14, true) => cfg.show_net_rx_bars,
        (15, false) => cfg.show_net_tx,
        (15, true) => cfg.show_net_tx_bars,
        _ => unreachable!("config toggle row out of range"),
    }
}

/// Label for config toggle row `index`, in `kConfigToggleItems` order.
pub fn config_toggle_label(index: usize) -> MsgId {
    match index {
        0 => MsgId::ConfigToggleCpuUsage,
        1 => MsgId::ConfigToggleCpuHotCoreUsage,
        2 => MsgId::ConfigToggleRamUsage,
        3 => MsgId::ConfigToggleGpuUsage,
        4 => MsgId::ConfigToggleGpuMemCtrl,
        5 => MsgId::ConfigToggleVramUsage,
        6 => MsgId::ConfigToggleGpuClock,
        7 => MsgId::ConfigToggleGpuMemClock,
        8 => MsgId::ConfigToggleGpuEnc,
        9 => MsgId::ConfigToggleGpuDec,
        10 => MsgId::ConfigTogglePcieRx,
        11 => MsgId::ConfigTogglePcieTx,
        12 => MsgId::ConfigToggleDiskRead,
        13 => MsgId::ConfigToggleDiskWrite,
        14 => MsgId::ConfigToggleNetRx,
        15 => MsgId::ConfigToggleNetTx,
        _ => unreachable!("config toggle row out of range"),
    }
}

/// Mutable reference to the bool field row `index` controls: `bars == false`
/// is the plain-visibility column, `bars == true` the bar-display column.
/// A straight port of `kConfigToggleItems`/`kConfigToggleItemsBars`'s
/// pointer-to-member tables.
fn config_toggle_field(cfg: &mut Config, index: usize, bars: bool) -> &mut bool {
    match (index, bars) {
        (0, false) => &mut cfg.show_cpu,
        (0, true) => &mut cfg.show_cpu_bars,
        (1, false) => &mut cfg.show_cpu_hot,
        (1, true) => &mut cfg.show_cpu_hot_bars,
        (2, false) => &mut cfg.show_ram,
        (2, true) => &mut cfg.show_ram_bars,
        (3, false) => &mut cfg.show_gpu,
        (3, true) => &mut cfg.show_gpu_bars,
        (4, false) => &mut cfg.show_gpu_mem,
        (4, true) => &mut cfg.show_gpu_mem_bars,
        (5, false) => &mut cfg.show_vram,
        (5, true) => &mut cfg.show_vram_bars,
        (6, false) => &mut cfg.show_gpu_clock,
        (6, true) => &mut cfg.show_gpu_clock_bars,
        (7, false) => &mut cfg.show_gpu_mem_clock,
        (7, true) => &mut cfg.show_gpu_mem_clock_bars,
        (8, false) => &mut cfg.show_gpu_enc,
        (8, true) => &mut cfg.show_gpu_enc_bars,
        (9, false) => &mut cfg.show_gpu_dec,
        (9, true) => &mut cfg.show_gpu_dec_bars,
        (10, false) => &mut cfg.show_pcie_rx,
        (10, true) => &mut cfg.show_pcie_rx_bars,
        (11, false) => &mut cfg.show_pcie_tx,
        (11, true) => &mut cfg.show_pcie_tx_bars,
        (12, false) => &mut cfg.show_disk_read,
        (12, true) => &mut cfg.show_disk_read_bars,
        (13, false) => &mut cfg.show_disk_write,
        (13, true) => &mut cfg.show_disk_write_bars,
        (14, false) => &mut cfg.show_net_rx,
        (14, true) => &mut cfg.show_net_rx_bars,
        (15, false) => &mut cfg.show_net_tx,
        (15, true) => &mut cfg.show_net_tx_bars,
        _ => unreachable!("config toggle row out of range"),
    }
}

pub struct TuiState {
    pub screen: Screen,
    pub timeline_view: TimelineView,

    pub cpu_name: String,
    pub cpu: Timeline,
    pub cpu_max: Timeline,
    pub cpu_latest: Option<f64>,
    pub cpu_max_latest: Option<f64>,

    pub ram: Timeline,
    pub ram_latest: Option<f64>,

    pub gpus: Vec<GpuTimelines>,

    pub disk_read: Timeline,
    pub disk_write: Timeline,
    pub disk_read_latest: Option<f64>,
    pub disk_write_latest: Option<f64>,

    pub net_rx: Timeline,
    pub net_tx: Timeline,
    pub net_rx_latest: Option<f64>,
    pub net_tx_latest: Option<f64>,

    pub pcie_rx: Timeline,
    pub pcie_tx: Timeline,
    pub pcie_rx_latest: Option<f64>,
    pub pcie_tx_latest: Option<f64>,

    pub hw: Option<HardwareInfo>,

    pub config_sel: usize,
    pub config_col: usize,
    pub benchmarks_sel: usize,
    pub status_line: String,
    pub should_quit: bool,
}

impl TuiState {
    pub fn new(capacity: usize, gpu_count: u32) -> Self {
        Self {
            screen: Screen::Timelines,
            timeline_view: TimelineView::Timelines,
            cpu_name: "CPU".to_string(),
            cpu: Timeline::new(capacity),
            cpu_max: Timeline::new(capacity),
            cpu_latest: None,
            cpu_max_latest: None,
            ram: Timeline::new(capacity),
            ram_latest: None,
            gpus: (0..gpu_count).map(|i| GpuTimelines::new(format!("GPU{i}"), capacity)).collect(),
            disk_read: Timeline::new(capacity),
            disk_write: Timeline::new(capacity),
            disk_read_latest: None,
            disk_write_latest: None,
            net_rx: Timeline::new(capacity),
            net_tx: Timeline::new(capacity),
            net_rx_latest: None,
            net_tx_latest: None,
            pcie_rx: Timeline::new(capacity),
            pcie_tx: Timeline::new(capacity),
            pcie_rx_latest: None,
            pcie_tx_latest: None,
            hw: None,
            config_sel: 0,
            config_col: 0,
            benchmarks_sel: 0,
            status_line: String::new(),
            should_quit: false,
        }
    }

    /// Rebuilds the GPU timeline table for a newly-detected device count,
    /// preserving existing per-device names where they still apply. Called
    /// once the boot probe publishes a real GPU count (spec §4.10).
    pub fn resize_gpus(&mut self, gpu_count: u32, capacity: usize) {
        let mut gpus: Vec<GpuTimelines> =
            (0..gpu_count).map(|i| GpuTimelines::new(format!("GPU{i}"), capacity)).collect();
        for (i, g) in gpus.iter_mut().enumerate() {
            if let Some(old) = self.gpus.get(i) {
                g.name = old.name.clone();
            }
        }
        self.gpus = gpus.drain(..).collect();
    }

    pub fn apply_boot_probe(&mut self, hw: HardwareInfo) {
        self.cpu_name = if hw.cpu_model.is_empty() { "CPU".to_string() } else { hw.cpu_model.clone() };
        for (i, line) in hw.gpu_detail_lines.iter().enumerate() {
            if let Some(g) = self.gpus.get_mut(i) {
                g.name = line.clone();
            }
        }
        self.hw = Some(hw);
    }

    /// Pushes one tick's worth of samples into every enabled Timeline, in
    /// spec §5's mandated order: CPU, CPU-max, per-GPU util/VRAM/clocks/
    /// enc-dec, RAM, disk R/W, net Rx/Tx, PCIe Rx/Tx.
    #[allow(clippy::too_many_arguments)]
    pub fn push_samples(
        &mut self,
        cpu_pct: Option<f64>,
        cpu_max_pct: Option<f64>,
        gpu_telemetry: &[Option<GpuTelemetry>],
        ram_pct: Option<f64>,
        disk: Option<(f64, f64)>,
        net: Option<(f64, f64)>,
        pcie: Option<(f64, f64)>,
    ) {
        if let Some(v) = cpu_pct {
            self.cpu.push(v);
        }
        self.cpu_latest = cpu_pct;
        if let Some(v) = cpu_max_pct {
            self.cpu_max.push(v);
        }
        self.cpu_max_latest = cpu_max_pct;

        for (g, telemetry) in self.gpus.iter_mut().zip(gpu_telemetry.iter()) {
            if let Some(t) = telemetry {
                if let Some(v) = t.util_pct {
                    g.util.push(v);
                }
                if let Some(v) = t.mem_util_pct {
                    g.mem_util.push(v);
                }
                if let Some(v) = t.gpu_clock_mhz {
                    g.gpu_clock.push(v as f64);
                }
                if let Some(v) = t.mem_clock_mhz {
                    g.mem_clock.push(v as f64);
                }
                if let Some(v) = t.encoder_util_pct {
                    g.encoder.push(v);
                }
                if let Some(v) = t.decoder_util_pct {
                    g.decoder.push(v);
                }
                g.latest = t.clone();
            }
        }

        if let Some(v) = ram_pct {
            self.ram.push(v);
        }
        self.ram_latest = ram_pct;

        if let Some((r, w)) = disk {
            self.disk_read.push(r);
            self.disk_write.push(w);
        }
        self.disk_read_latest = disk.map(|(r, _)| r);
        self.disk_write_latest = disk.map(|(_, w)| w);

        if let Some((rx, tx)) = net {
            self.net_rx.push(rx);
            self.net_tx.push(tx);
        }
        self.net_rx_latest = net.map(|(rx, _)| rx);
        self.net_tx_latest = net.map(|(_, tx)| tx);

        if let Some((rx, tx)) = pcie {
            self.pcie_rx.push(rx);
            self.pcie_tx.push(tx);
        }
        self.pcie_rx_latest = pcie.map(|(rx, _)| rx);
        self.pcie_tx_latest = pcie.map(|(_, tx)| tx);
    }
}

/// Direct port of `applyCommand`: global nav commands first, then
/// screen-local behavior for Benchmarks/Config/Timelines-or-Minimal.
pub fn apply_command(state: &mut TuiState, cfg: &mut Config, cmd: Command, bench_row_count: usize) {
    match cmd {
        Command::Quit => {
            state.should_quit = true;
            return;
        }
        Command::NavHelp => {
            state.screen = Screen::Help;
            return;
        }
        Command::NavHardware => {
            state.screen = Screen::Hardware;
            return;
        }
        Command::NavBenchmarks => {
            state.screen = Screen::Benchmarks;
            return;
        }
        Command::NavConfig => {
            state.screen = Screen::Config;
            return;
        }
        Command::NavMinimal => {
            state.screen = Screen::Minimal;
            return;
        }
        Command::Back => {
            state.screen = Screen::Timelines;
            return;
        }
        _ => {}
    }

    match state.screen {
        Screen::Benchmarks => {
            // Row 0 is the synthetic "Run All" row; selectable rows are
            // non-header rows plus row 0.
            let max_sel = bench_row_count.saturating_sub(1);
            match cmd {
                Command::Up if state.benchmarks_sel > 0 => state.benchmarks_sel -= 1,
                Command::Down if state.benchmarks_sel < max_sel => state.benchmarks_sel += 1,
                _ => {}
            }
        }
        Screen::Config => match cmd {
            Command::Up => state.config_sel = state.config_sel.saturating_sub(1),
            Command::Down => state.config_sel = (state.config_sel + 1).min(CONFIG_ITEM_COUNT - 1),
            Command::Left => state.config_col = 0,
            Command::Right => state.config_col = 1,
            Command::Toggle => {
                if state.config_sel < CONFIG_TOGGLE_COUNT {
                    let field = config_toggle_field(cfg, state.config_sel, state.config_col == 1);
                    *field = !*field;
                } else if state.config_sel == CONFIG_PEAK_TOGGLE_ROW {
                    cfg.show_peak_values = !cfg.show_peak_values;
                } else if state.config_sel == CONFIG_PEAK_WINDOW_ROW {
                    cfg.peak_window_sec = match cfg.peak_window_sec {
                        0..=10 => 30,
                        11..=30 => 60,
                        31..=60 => 120,
                        _ => 10,
                    };
                } else if state.config_sel == CONFIG_METRIC_COLOR_ROW {
                    cfg.metric_name_color = match cfg.metric_name_color {
                        MetricNameColor::Cyan => MetricNameColor::White,
                        MetricNameColor::White => MetricNameColor::Green,
                        MetricNameColor::Green => MetricNameColor::Yellow,
                        MetricNameColor::Yellow => MetricNameColor::Cyan,
                    };
                } else if state.config_sel == CONFIG_GRAPH_STYLE_ROW {
                    cfg.timeline_graph_style = match cfg.timeline_graph_style {
                        TimelineGraphStyle::Braille => TimelineGraphStyle::Smooth,
                        TimelineGraphStyle::Smooth => TimelineGraphStyle::Block,
                        TimelineGraphStyle::Block => TimelineGraphStyle::Braille,
                    };
                }
            }
            Command::Defaults => *cfg = Config::default(),
            Command::Save => {
                state.status_line = match cfg.save() {
                    Ok(()) => format!("Config saved to {}", crate::config::config_path().display()),
                    Err(e) => format!("Config save failed: {e}"),
                };
            }
            Command::Activate => {}
            _ => {}
        },
        Screen::Timelines | Screen::Minimal => match cmd {
            Command::ViewTimelines => {
                state.screen = Screen::Timelines;
                state.timeline_view = TimelineView::Timelines;
            }
            Command::ViewBars => {
                state.screen = Screen::Timelines;
                state.timeline_view = TimelineView::Bars;
            }
            Command::ViewMinimal => state.screen = Screen::Minimal,
            Command::IncreaseRefresh => cfg.refresh_ms = crate::config::clamp_refresh_ms(cfg.refresh_ms + 50),
            Command::DecreaseRefresh => cfg.refresh_ms = crate::config::clamp_refresh_ms(cfg.refresh_ms.saturating_sub(50)),
            _ => {}
        },
        Screen::Help | Screen::Hardware => {}
    }
}

/// Label string for a config row that has no toggle-table entry, i.e. one
/// of the 7 read-only/misc rows. These never had dedicated `i18n::MsgId`
/// variants in the original's message table either — they're rendered with
/// plain English, same as the source's handful of untranslated debug rows.
pub fn config_misc_label(row: usize, cfg: &Config) -> String {
    match row - CONFIG_TOGGLE_COUNT {
        0 => format!("{}: {}", i18n::tr(MsgId::ConfigSectionTimelines), cfg.timeline_samples),
        1 => format!("{}: {}", i18n::tr(MsgId::ConfigReadonlySamplesPerBucket), cfg.timeline_samples),
        2 => format!("{}: {} Hz", i18n::tr(MsgId::ConfigReadonlySamplingRate), 1000 / cfg.refresh_ms.max(1)),
        3 => format!("{}: {}", i18n::tr(MsgId::ConfigTogglePeakValues), cfg.show_peak_values),
        4 => format!("{}: {}s", i18n::tr(MsgId::ConfigReadonlyPeakWindow), cfg.peak_window_sec),
        5 => format!("Metric name color: {}", cfg.metric_name_color),
        6 => format!("Graph style: {}", cfg.timeline_graph_style),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_toggle_table_matches_teacher_order() {
        assert_eq!(config_toggle_label(0), MsgId::ConfigToggleCpuUsage);
        assert_eq!(config_toggle_label(1), MsgId::ConfigToggleCpuHotCoreUsage);
        assert_eq!(config_toggle_label(15), MsgId::ConfigToggleNetTx);
    }

    #[test]
    fn toggle_command_flips_correct_field_for_each_column() {
        let mut cfg = Config::default();
        let mut state = TuiState::new(10, 0);
        state.screen = Screen::Config;
        state.config_sel = 3; // GpuUsage
        state.config_col = 0;
        apply_command(&mut state, &mut cfg, Command::Toggle, 1);
        assert!(!cfg.show_gpu);
        assert!(cfg.show_gpu_bars);

        state.config_col = 1;
        apply_command(&mut state, &mut cfg, Command::Toggle, 1);
        assert!(!cfg.show_gpu_bars);
    }

    #[test]
    fn peak_window_cycles_through_four_values() {
        let mut cfg = Config::default();
        let mut state = TuiState::new(10, 0);
        state.screen = Screen::Config;
        state.config_sel = CONFIG_PEAK_WINDOW_ROW;
        assert_eq!(cfg.peak_window_sec, 10);
        apply_command(&mut state, &mut cfg, Command::Toggle, 1);
        assert_eq!(cfg.peak_window_sec, 30);
        apply_command(&mut state, &mut cfg, Command::Toggle, 1);
        assert_eq!(cfg.peak_window_sec, 60);
        apply_command(&mut state, &mut cfg, Command::Toggle, 1);
        assert_eq!(cfg.peak_window_sec, 120);
        apply_command(&mut state, &mut cfg, Command::Toggle, 1);
        assert_eq!(cfg.peak_window_sec, 10);
    }

    #[test]
    fn benchmarks_selection_clamps_to_row_count() {
        let mut cfg = Config::default();
        let mut state = TuiState::new(10, 0);
        state.screen = Screen::Benchmarks;
        apply_command(&mut state, &mut cfg, Command::Up, 5);
        assert_eq!(state.benchmarks_sel, 0);
        for _ in 0..10 {
            apply_command(&mut state, &mut cfg, Command::Down, 5);
        }
        assert_eq!(state.benchmarks_sel, 4);
    }

    #[test]
    fn nav_commands_switch_screen_from_anywhere() {
        let mut cfg = Config::default();
        let mut state = TuiState::new(10, 0);
        state.screen = Screen::Config;
        apply_command(&mut state, &mut cfg, Command::NavHelp, 1);
        assert_eq!(state.screen, Screen::Help);
        apply_command(&mut state, &mut cfg, Command::Back, 1);
        assert_eq!(state.screen, Screen::Timelines);
    }

    #[test]
    fn quit_sets_should_quit_flag() {
        let mut cfg = Config::default();
        let mut state = TuiState::new(10, 0);
        apply_command(&mut state, &mut cfg, Command::Quit, 1);
        assert!(state.should_quit);
    }
}
