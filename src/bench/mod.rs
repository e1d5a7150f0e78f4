//! Benchmark subsystem (spec §4.8–4.9): PCIe bandwidth and compute FLOPS/GOPS
//! benchmarks per GPU backend, an ONNX Runtime CPU matmul/memory-bandwidth
//! pair, a runner that sequences them, and an HTML report writer.

pub mod compute_cuda;
pub mod compute_opencl;
pub mod compute_vulkan;
pub mod ort_bench;
pub mod pcie;
pub mod runner;


pub use runner::BenchRunner;

use std::fmt::Write as _;

/// A single runnable benchmark. `run` returns the human-readable result
/// string (e.g. `"123.4 GFLOPS"`) or an error message; both are rendered
/// verbatim to the UI per spec §7's "benchmark failures propagate to the
/// result string" policy.
pub trait Benchmark: Send {
    fn name(&self) -> &str;
    fn is_available(&self) -> bool;
    fn run(&self) -> Result<String, String>;
}

/// One row in the live `BenchRunner` table: either a device header (no
/// benchmark attached) or a benchmark with its last-run result.
pub struct BenchRow {
    pub title: String,
    pub is_header: bool,
    pub bench: Option<Box<dyn Benchmark>>,
    pub result: String,
}

impl BenchRow {
    pub fn header(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            is_header: true,
            bench: None,
            result: String::new(),
        }
    }

    pub fn bench(bench: Box<dyn Benchmark>) -> Self {
        Self {
            title: bench.name().to_string(),
            is_header: false,
            bench: Some(bench),
            result: String::new(),
        }
    }
}

/// A finalized row for the static HTML report — no live benchmark object,
/// just the title/result pair the report template needs.
#[derive(Debug, Clone)]
pub struct Row {
    pub title: String,
    pub is_header: bool,
    pub result: String,
}

#[derive(Debug, Clone)]
pub struct BenchReport {
    pub path: String,
    pub rows: Vec<Row>,
    pub hardware_lines: Vec<String>,
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Composes the static HTML document: hardware lines up top, then one
/// section per row, headers rendered as `<h2>` and benchmark rows as
/// `<p><strong>title</strong>: result</p>` with result newlines converted to
/// `<br/>` (spec §4.8).
pub fn render_html(report: &BenchReport) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>ai-z benchmark report</title></head><body>\n");
    html.push_str("<h1>ai-z benchmark report</h1>\n<pre>\n");
    for line in &report.hardware_lines {
        let _ = writeln!(html, "{}", escape_html(line));
    }
    html.push_str("</pre>\n");
    for row in &report.rows {
        if row.is_header {
            let _ = writeln!(html, "<h2>{}</h2>", escape_html(&row.title));
        } else {
            let result_html = escape_html(&row.result).replace('\n', "<br/>");
            let _ = writeln!(
                html,
                "<p><strong>{}</strong>: {}</p>",
                escape_html(&row.title),
                result_html
            );
        }
    }
    html.push_str("</body></html>\n");
    html
}

/// `$HOME/ai-z-bench-YYYYMMDD-HHMMSS.html`, falling back to `.` if `HOME` is
/// unset (spec §4.8). `timestamp` is supplied by the caller so this stays
/// free of a `SystemTime::now()` call.
pub fn report_path(timestamp: &str) -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/ai-z-bench-{timestamp}.html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_and_breaks_lines() {
        let report = BenchReport {
            path: "/tmp/x.html".to_string(),
            rows: vec![Row {
                title: "GPU0 <test>".to_string(),
                is_header: false,
                result: "line1\nline2 & more".to_string(),
            }],
            hardware_lines: vec![],
        };
        let html = render_html(&report);
        assert!(html.contains("&lt;test&gt;"));
        assert!(html.contains("line1<br/>line2 &amp; more"));
    }
}
