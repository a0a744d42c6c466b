//! Standalone HTML snapshot of a report
//!
//! Renders the same panels as the live dashboard (risk card, protocol bars,
//! top talkers, hierarchy) into one self-contained page with no scripts, so
//! it can be archived next to the capture.

use super::present::Overview;
use super::Report;
use std::io::{self, Write};

pub fn write<W: Write>(writer: &mut W, report: &Report) -> io::Result<()> {
    let overview = Overview::from_report(report);
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    let reasons = if overview.reasons.is_empty() {
        r#"<li class="dim">No findings reported.</li>"#.to_string()
    } else {
        overview
            .reasons
            .iter()
            .map(|r| format!("<li>{}</li>", html_escape(r)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let bars: String = overview
        .protocols
        .iter()
        .map(|p| {
            format!(
                r#"<div class="bar-row"><span class="bar-label">{}</span><div class="bar-track"><div class="bar-fill" style="width: {:.1}%; background: {}"></div></div><span class="bar-count">{}</span></div>"#,
                html_escape(&p.protocol),
                p.percent,
                p.color,
                p.frames
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let talkers = if overview.talkers.is_empty() {
        r#"<tr><td colspan="4" class="dim">No host conversation data available.</td></tr>"#
            .to_string()
    } else {
        overview
            .talkers
            .iter()
            .map(|t| {
                format!(
                    r#"<tr><td class="mono">{}</td><td class="mono">{}</td><td>{}</td><td>{}</td></tr>"#,
                    html_escape(&t.src),
                    html_escape(&t.dst),
                    t.size,
                    t.total_packets
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    write!(writer, r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Forensic Report - {filename}</title>
    <style>
        :root {{
            --bg: #0d1117;
            --card: #161b22;
            --border: #30363d;
            --text: #e6edf3;
            --dim: #7d8590;
            --accent: #3b82f6;
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Noto Sans', Helvetica, Arial, sans-serif;
            background: var(--bg);
            color: var(--text);
            line-height: 1.5;
        }}
        .container {{ max-width: 1200px; margin: 0 auto; padding: 2rem; }}
        .header {{
            margin-bottom: 2rem;
            padding-bottom: 1rem;
            border-bottom: 1px solid var(--border);
        }}
        .logo {{ font-size: 2rem; font-weight: 800; color: var(--accent); }}
        .subtitle {{ color: var(--dim); }}
        .grid {{ display: grid; grid-template-columns: 320px 1fr; gap: 1.5rem; margin-bottom: 1.5rem; }}
        .card {{
            background: var(--card);
            border: 1px solid var(--border);
            border-radius: 12px;
            padding: 1.5rem;
        }}
        .card-title {{ font-size: 1rem; font-weight: 600; margin-bottom: 1rem; color: var(--dim); }}
        .score {{ font-size: 4rem; font-weight: 700; line-height: 1; color: {risk_color}; }}
        .level {{
            display: inline-block;
            margin-top: 0.75rem;
            padding: 0.25rem 0.75rem;
            border-radius: 20px;
            font-size: 0.75rem;
            font-weight: 600;
            text-transform: uppercase;
            color: {risk_color};
            border: 1px solid {risk_color};
        }}
        .level.alert {{ background: rgba(239,68,68,0.15); }}
        ul {{ margin-top: 1rem; padding-left: 1.25rem; }}
        .bar-row {{ display: flex; align-items: center; gap: 0.75rem; margin-bottom: 0.5rem; }}
        .bar-label {{ width: 90px; font-family: 'SF Mono', monospace; font-size: 0.85rem; }}
        .bar-track {{ flex: 1; height: 10px; background: rgba(255,255,255,0.08); border-radius: 5px; overflow: hidden; }}
        .bar-fill {{ height: 100%; border-radius: 5px; }}
        .bar-count {{ width: 70px; text-align: right; color: var(--dim); font-size: 0.85rem; }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ padding: 0.75rem 1rem; text-align: left; border-bottom: 1px solid var(--border); }}
        th {{ font-size: 0.75rem; text-transform: uppercase; letter-spacing: 0.05em; color: var(--dim); }}
        pre {{ font-family: 'SF Mono', monospace; font-size: 0.8rem; white-space: pre; overflow-x: auto; color: var(--dim); }}
        .mono {{ font-family: 'SF Mono', monospace; font-size: 0.85rem; }}
        .dim {{ color: var(--dim); }}
        .footer {{ margin-top: 2rem; color: var(--dim); font-size: 0.875rem; text-align: center; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <div class="logo">PCAP Forensics</div>
            <div class="subtitle">{filename}</div>
        </div>

        <div class="grid">
            <div class="card">
                <div class="card-title">Risk Score</div>
                <div class="score">{score}</div>
                <div class="level {emphasis}">{level}</div>
                <ul>
{reasons}
                </ul>
            </div>
            <div class="card">
                <div class="card-title">Protocol Breakdown ({total} frames)</div>
{bars}
            </div>
        </div>

        <div class="card" style="margin-bottom: 1.5rem">
            <div class="card-title">Top Talkers</div>
            <table>
                <thead><tr><th>Source</th><th>Destination</th><th>Bytes</th><th>Packets</th></tr></thead>
                <tbody>
{talkers}
                </tbody>
            </table>
        </div>

        <div class="card">
            <div class="card-title">Protocol Hierarchy</div>
            <pre>{hierarchy}</pre>
        </div>

        <div class="footer">Generated {generated}</div>
    </div>
</body>
</html>
"#,
        filename = html_escape(&overview.filename),
        risk_color = overview.emphasis.color(),
        score = overview.score,
        emphasis = overview.emphasis.css_class(),
        level = overview.level,
        reasons = reasons,
        total = overview.total_count,
        bars = bars,
        talkers = talkers,
        hierarchy = html_escape(&overview.protocol_hierarchy),
        generated = generated,
    )?;

    Ok(())
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::capture_report;
    use crate::report::present::PALETTE;

    fn render(report: &Report) -> String {
        let mut out = Vec::new();
        write(&mut out, report).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_snapshot_contains_key_panels() {
        let html = render(&capture_report());
        assert!(html.contains("capture.pcap"));
        assert!(html.contains("Plaintext credentials observed"));
        assert!(html.contains("200.0 KB"));
        assert!(html.contains("Protocol Breakdown (150 frames)"));
        assert!(html.contains(r#"class="level alert""#));
    }

    #[test]
    fn test_bars_use_palette_in_order() {
        let html = render(&capture_report());
        let first = html.find(&format!("background: {}\"", PALETTE[0])).unwrap();
        let second = html.find(&format!("background: {}\"", PALETTE[1])).unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_backend_text_is_escaped() {
        let mut report = capture_report();
        report.risk.reasons = vec!["<script>alert(1)</script>".into()];
        report.protocol_hierarchy = "a < b & c".into();
        let html = render(&report);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_empty_talkers_placeholder() {
        let mut report = capture_report();
        report.top_talkers.clear();
        assert!(render(&report).contains("No host conversation data available."));
    }
}
