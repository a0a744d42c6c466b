//! Terminal dashboard for the CLI

use super::present::{Overview, RiskEmphasis};
use super::Report;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[90m";
const BAR_WIDTH: usize = 30;

/// Render the report as a block of text. `color` toggles ANSI escapes.
pub fn render(report: &Report, color: bool) -> String {
    let o = Overview::from_report(report);
    let paint = |code: &'static str| if color { code } else { "" };
    let reset = paint(RESET);

    let mut out = String::new();
    out.push_str(&format!("{}{}{}\n", paint(BOLD), o.filename, reset));
    out.push_str(&format!("{}\n", "─".repeat(70)));

    let marker = match o.emphasis {
        RiskEmphasis::Alert => "✗",
        RiskEmphasis::Caution => "?",
        RiskEmphasis::Neutral => "✓",
    };
    out.push_str(&format!(
        "{}{} Risk {:>3}/100  [{}]{}\n",
        paint(o.emphasis.ansi()),
        marker,
        o.score,
        o.level,
        reset
    ));
    for reason in &o.reasons {
        out.push_str(&format!("    - {}\n", reason));
    }

    out.push_str(&format!("\n{}Protocols{} ({} frames)\n", paint(BOLD), reset, o.total_count));
    for p in &o.protocols {
        let filled = ((p.percent / 100.0) * BAR_WIDTH as f64).round() as usize;
        out.push_str(&format!(
            "  {:<10} {:<width$} {:>8}  {:>5.1}%\n",
            truncate(&p.protocol, 10),
            "█".repeat(filled.min(BAR_WIDTH)),
            p.frames,
            p.percent,
            width = BAR_WIDTH
        ));
    }

    out.push_str(&format!("\n{}Top talkers{}\n", paint(BOLD), reset));
    if o.talkers.is_empty() {
        out.push_str(&format!("  {}no host conversation data{}\n", paint(DIM), reset));
    } else {
        for t in &o.talkers {
            out.push_str(&format!(
                "  {:<18} -> {:<18} {:>12}  {:>7} pkts\n",
                t.src, t.dst, t.size, t.total_packets
            ));
        }
    }

    out
}

/// Verbatim protocol hierarchy, dimmed
pub fn render_hierarchy(report: &Report, color: bool) -> String {
    if color {
        format!("{}{}{}", DIM, report.protocol_hierarchy, RESET)
    } else {
        report.protocol_hierarchy.clone()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
