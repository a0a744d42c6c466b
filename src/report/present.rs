//! Display aggregates derived from a [`Report`]
//!
//! Everything here is a pure function of the report: no I/O, no mutation,
//! same answer on every call. The terminal renderer, the HTML snapshot and the
//! browser dashboard all read from these so the three views agree.

use super::{Report, RiskLevel};
use serde::Serialize;

/// Cyclic chart palette. Entry `i` of the protocol chart gets
/// `PALETTE[i % PALETTE.len()]`.
pub const PALETTE: [&str; 8] = [
    "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#ec4899", "#06b6d4", "#84cc16",
];

/// Sum of the count field across the protocol chart, saturating at
/// `u64::MAX`
pub fn total_count(report: &Report) -> u64 {
    report
        .protocols_chart
        .iter()
        .fold(0u64, |acc, p| acc.saturating_add(p.frames))
}

pub fn color_for_index(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// How loudly a risk tier is drawn. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskEmphasis {
    Alert,
    Caution,
    Neutral,
}

impl RiskEmphasis {
    pub fn for_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::High => RiskEmphasis::Alert,
            RiskLevel::Medium => RiskEmphasis::Caution,
            RiskLevel::Low => RiskEmphasis::Neutral,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            RiskEmphasis::Alert => "#ef4444",
            RiskEmphasis::Caution => "#f59e0b",
            RiskEmphasis::Neutral => "#10b981",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            RiskEmphasis::Alert => "alert",
            RiskEmphasis::Caution => "caution",
            RiskEmphasis::Neutral => "neutral",
        }
    }

    pub fn ansi(&self) -> &'static str {
        match self {
            RiskEmphasis::Alert => "\x1b[1;31m",
            RiskEmphasis::Caution => "\x1b[33m",
            RiskEmphasis::Neutral => "\x1b[32m",
        }
    }
}

/// Bytes as kilobytes with one decimal place, e.g. `2048` -> `2.0 KB`.
/// Halves round up (`1280` -> `1.3 KB`), matching the browser's `toFixed`.
pub fn format_kb(bytes: u64) -> String {
    let tenths = (bytes as f64 * 10.0 / 1024.0).round();
    format!("{:.1} KB", tenths / 10.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolSlice {
    pub protocol: String,
    pub frames: u64,
    pub color: &'static str,
    /// Share of the chart total, 0.0 when the total is zero
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TalkerRow {
    pub src: String,
    pub dst: String,
    pub total_bytes: u64,
    pub total_packets: u64,
    pub size: String,
}

/// Everything a view needs, computed once per render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub filename: String,
    pub score: u32,
    pub level: RiskLevel,
    pub emphasis: RiskEmphasis,
    pub reasons: Vec<String>,
    pub total_count: u64,
    pub protocols: Vec<ProtocolSlice>,
    pub talkers: Vec<TalkerRow>,
    pub protocol_hierarchy: String,
}

impl Overview {
    pub fn from_report(report: &Report) -> Self {
        let total = total_count(report);

        let protocols = report
            .protocols_chart
            .iter()
            .enumerate()
            .map(|(i, p)| ProtocolSlice {
                protocol: p.protocol.clone(),
                frames: p.frames,
                color: color_for_index(i),
                percent: if total == 0 {
                    0.0
                } else {
                    p.frames as f64 * 100.0 / total as f64
                },
            })
            .collect();

        let talkers = report
            .top_talkers
            .iter()
            .map(|t| TalkerRow {
                src: t.src.clone(),
                dst: t.dst.clone(),
                total_bytes: t.total_bytes,
                total_packets: t.total_packets,
                size: format_kb(t.total_bytes),
            })
            .collect();

        Overview {
            filename: report.filename.clone(),
            score: report.risk.score,
            level: report.risk.level,
            emphasis: RiskEmphasis::for_level(report.risk.level),
            reasons: report.risk.reasons.clone(),
            total_count: total,
            protocols,
            talkers,
            protocol_hierarchy: report.protocol_hierarchy.clone(),
        }
    }
}
