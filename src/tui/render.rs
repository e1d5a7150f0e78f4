//! Frame rendering, grounded in `ratatui`'s `Paragraph`/`Sparkline`/`Gauge`
//! widgets the way `other_examples/.../vadv-rpglot/.../tui/widgets/summary`
//! composes a multi-panel text layout: fixed header/footer chrome plus a
//! `Layout::split` body, with each screen a free function taking `&mut
//! Frame` + the state it needs.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Sparkline};
use ratatui::Frame;

use crate::bench::BenchRunner;
use crate::cli::{APP_DISPLAY_NAME, APP_VERSION};
use crate::config::{Config, MetricNameColor};

use super::state::{
    config_misc_label, config_toggle_label, config_toggle_value, Screen, TimelineView, TuiState, CONFIG_ITEM_COUNT,
    CONFIG_TOGGLE_COUNT,
};

fn metric_color(c: MetricNameColor) -> Color {
    match c {
        MetricNameColor::Cyan => Color::Cyan,
        MetricNameColor::White => Color::White,
        MetricNameColor::Green => Color::Green,
        MetricNameColor::Yellow => Color::Yellow,
    }
}

pub fn draw(frame: &mut Frame, state: &TuiState, cfg: &Config, bench: &BenchRunner) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1), Constraint::Length(1)])
        .split(frame.size());

    render_header(frame, chunks[0], state);

    match state.screen {
        Screen::Timelines | Screen::Minimal => render_metrics(frame, chunks[1], state, cfg),
        Screen::Help => render_help(frame, chunks[1]),
        Screen::Hardware => render_hardware(frame, chunks[1], state),
        Screen::Benchmarks => render_benchmarks(frame, chunks[1], state, bench),
        Screen::Config => render_config(frame, chunks[1], state, cfg),
    }

    render_footer(frame, chunks[2], state);
}

fn render_header(frame: &mut Frame, area: Rect, state: &TuiState) {
    let name = if state.cpu_name.is_empty() { "detecting CPU..." } else { state.cpu_name.as_str() };
    let gpu_summary = if state.gpus.is_empty() {
        "no GPU detected".to_string()
    } else {
        state.gpus.iter().map(|g| g.name.as_str()).collect::<Vec<_>>().join(", ")
    };
    let title = format!("{APP_DISPLAY_NAME} v{APP_VERSION} | {name} | {gpu_summary}");
    frame.render_widget(Paragraph::new(title).style(Style::default().add_modifier(Modifier::BOLD)), area);
}

fn render_footer(frame: &mut Frame, area: Rect, state: &TuiState) {
    let hotkeys = "H:Help  W:Hardware  B:Benchmarks  C:Config  T:Timelines  R:Bars  M:Minimal  +/-:Rate  Q:Quit";
    let line = if state.status_line.is_empty() {
        hotkeys.to_string()
    } else {
        format!("{}  |  {}", state.status_line, hotkeys)
    };
    frame.render_widget(Paragraph::new(line).style(Style::default().fg(Color::DarkGray)), area);
}

struct MetricRow<'a> {
    label: &'a str,
    values: Vec<f64>,
    latest: Option<f64>,
    max: f64,
}

fn push_row<'a>(rows: &mut Vec<MetricRow<'a>>, enabled: bool, label: &'a str, timeline: &crate::core::Timeline, latest: Option<f64>) {
    if !enabled {
        return;
    }
    rows.push(MetricRow { label, values: timeline.values(), latest, max: timeline.max_last(usize::MAX).max(1.0) });
}

/// Builds the row list honoring every `cfg.show_*` toggle, in spec §5's
/// Timeline push order (CPU, GPU util/VRAM/clocks/enc-dec, RAM, disk, net,
/// PCIe).
fn build_metric_rows<'a>(state: &'a TuiState, cfg: &Config) -> Vec<MetricRow<'a>> {
    let mut rows = Vec::new();
    push_row(&mut rows, cfg.show_cpu, "CPU", &state.cpu, state.cpu_latest);
    push_row(&mut rows, cfg.show_cpu_hot, "CPU (hottest core)", &state.cpu_max, state.cpu_max_latest);

    for g in &state.gpus {
        push_row(&mut rows, cfg.show_gpu, "GPU util", &g.util, g.latest.util_pct);
        push_row(&mut rows, cfg.show_gpu_mem, "GPU mem ctrl", &g.mem_util, g.latest.mem_util_pct);
        push_row(&mut rows, cfg.show_gpu_clock, "GPU clock", &g.gpu_clock, g.latest.gpu_clock_mhz.map(|v| v as f64));
        push_row(&mut rows, cfg.show_gpu_mem_clock, "GPU mem clock", &g.mem_clock, g.latest.mem_clock_mhz.map(|v| v as f64));
        push_row(&mut rows, cfg.show_gpu_enc, "GPU encoder", &g.encoder, g.latest.encoder_util_pct);
        push_row(&mut rows, cfg.show_gpu_dec, "GPU decoder", &g.decoder, g.latest.decoder_util_pct);
    }

    push_row(&mut rows, cfg.show_ram, "RAM", &state.ram, state.ram_latest);
    push_row(&mut rows, cfg.show_disk_read, "Disk read", &state.disk_read, state.disk_read_latest);
    push_row(&mut rows, cfg.show_disk_write, "Disk write", &state.disk_write, state.disk_write_latest);
    push_row(&mut rows, cfg.show_net_rx, "Net Rx", &state.net_rx, state.net_rx_latest);
    push_row(&mut rows, cfg.show_net_tx, "Net Tx", &state.net_tx, state.net_tx_latest);
    push_row(&mut rows, cfg.show_pcie_rx, "PCIe Rx", &state.pcie_rx, state.pcie_rx_latest);
    push_row(&mut rows, cfg.show_pcie_tx, "PCIe Tx", &state.pcie_tx, state.pcie_tx_latest);
    rows
}

fn render_metrics(frame: &mut Frame, area: Rect, state: &TuiState, cfg: &Config) {
    let rows = build_metric_rows(state, cfg);
    if rows.is_empty() {
        frame.render_widget(Paragraph::new(crate::i18n::tr(crate::i18n::MsgId::TimelinesNoneEnabled)), area);
        return;
    }

    let constraints: Vec<Constraint> = rows.iter().map(|_| Constraint::Length(3)).collect();
    let chunks = Layout::default().direction(Direction::Vertical).constraints(constraints).split(area);
    let color = metric_color(cfg.metric_name_color);

    for (row, chunk) in rows.iter().zip(chunks.iter()) {
        let value_str = row.latest.map(|v| format!("{v:.1}")).unwrap_or_else(|| "--".to_string());
        let title = format!("{}: {value_str}", row.label);
        let block = Block::default().borders(Borders::ALL).title(Span::styled(title, Style::default().fg(color)));

        match state.timeline_view {
            TimelineView::Timelines => {
                let data: Vec<u64> = row.values.iter().map(|v| v.max(0.0) as u64).collect();
                let sparkline = Sparkline::default().block(block).data(&data).max(row.max.max(1.0) as u64).style(Style::default().fg(color));
                frame.render_widget(sparkline, *chunk);
            }
            TimelineView::Bars => {
                let ratio = row.latest.map(|v| (v / row.max).clamp(0.0, 1.0)).unwrap_or(0.0);
                let gauge = Gauge::default().block(block).gauge_style(Style::default().fg(color)).ratio(ratio);
                frame.render_widget(gauge, *chunk);
            }
        }
    }
}

fn render_help(frame: &mut Frame, area: Rect) {
    let lines: Vec<Line> = crate::cli::HELP_TEXT.lines().map(Line::from).collect();
    frame.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help")), area);
}

fn render_hardware(frame: &mut Frame, area: Rect, state: &TuiState) {
    let lines: Vec<Line> = match &state.hw {
        Some(hw) => hw.display_lines().into_iter().map(Line::from).collect(),
        None => vec![Line::from("Probing hardware...")],
    };
    frame.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Hardware")), area);
}

fn render_benchmarks(frame: &mut Frame, area: Rect, state: &TuiState, bench: &BenchRunner) {
    let mut lines = Vec::new();
    lines.push(Line::from(if state.benchmarks_sel == 0 {
        Span::styled("> Run All", Style::default().add_modifier(Modifier::REVERSED))
    } else {
        Span::raw("  Run All")
    }));

    for (i, row) in bench.rows().iter().enumerate() {
        let selected = state.benchmarks_sel == i + 1;
        let text = if row.is_header {
            format!("-- {} --", row.title)
        } else {
            let result = bench.result(i);
            let result = if result.is_empty() { &row.result } else { &result };
            format!("{}  {}", row.title, result)
        };
        let style = if row.is_header {
            Style::default().add_modifier(Modifier::BOLD)
        } else if selected {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        let prefix = if selected && !row.is_header { "> " } else { "  " };
        lines.push(Line::from(Span::styled(format!("{prefix}{text}"), style)));
    }

    if bench.is_running() {
        lines.push(Line::from("Running..."));
    }

    frame.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Benchmarks")), area);
}

fn render_config(frame: &mut Frame, area: Rect, state: &TuiState, cfg: &Config) {
    let mut lines = Vec::new();
    for i in 0..CONFIG_TOGGLE_COUNT {
        let label = crate::i18n::tr(config_toggle_label(i));
        let col0 = config_toggle_value(cfg, i, false);
        let col1 = config_toggle_value(cfg, i, true);
        let selected = state.config_sel == i;
        let marker = if selected { ">" } else { " " };
        let col_marker = |is_col: usize| if selected && state.config_col == is_col { "*" } else { " " };
        let text = format!(
            "{marker} {label:<28} [{}{}] Show  [{}{}] Bars",
            col_marker(0),
            if col0 { "x" } else { " " },
            col_marker(1),
            if col1 { "x" } else { " " },
        );
        let style = if selected { Style::default().add_modifier(Modifier::REVERSED) } else { Style::default() };
        lines.push(Line::from(Span::styled(text, style)));
    }

    lines.push(Line::from(""));
    for row in CONFIG_TOGGLE_COUNT..CONFIG_ITEM_COUNT {
        let selected = state.config_sel == row;
        let marker = if selected { "> " } else { "  " };
        let style = if selected { Style::default().add_modifier(Modifier::REVERSED) } else { Style::default() };
        lines.push(Line::from(Span::styled(format!("{marker}{}", config_misc_label(row, cfg)), style)));
    }

    lines.push(Line::from(""));
    lines.push(Line::from("Space: toggle  D: defaults  S: save"));

    frame.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Config")), area);
}
