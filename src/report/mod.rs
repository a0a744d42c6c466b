//! The forensic report returned by the analysis service
//!
//! This module owns the one canonical shape of a report and the ingestion
//! step that produces it. Backends disagree on small details (the protocol
//! count is called `frames` by some and `packets` by others), so everything
//! goes through [`Report::from_json`], which normalizes and validates before
//! anything else in the crate sees the data.
//!
//! Output formatters live in submodules:
//!
//! - **HTML**: standalone snapshot of the dashboard view
//! - **JSON**: the canonical report, pretty printed
//! - **CSV**: protocol breakdown and top talkers for spreadsheets
//! - **text**: ANSI terminal dashboard used by the CLI
//!
//! # Usage
//!
//! ```ignore
//! use pcap_forensics::report;
//!
//! // Automatically picks format based on extension
//! report::generate("capture.html", &report)?;  // HTML
//! report::generate("capture.json", &report)?;  // JSON
//! report::generate("capture.csv", &report)?;   // CSV
//! ```

pub mod csv;
pub mod html;
pub mod json;
pub mod present;
pub mod text;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

/// Structured analysis result for one capture file.
///
/// Immutable once stored by a session; presentation code only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub filename: String,
    pub risk: Risk,
    pub protocols_chart: Vec<ProtocolCount>,
    /// Preformatted protocol hierarchy, displayed verbatim
    pub protocol_hierarchy: String,
    pub top_talkers: Vec<TopTalker>,
    /// Expert info block, passed back untouched on export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub score: u32,
    pub level: RiskLevel,
    pub reasons: Vec<String>,
}

/// Backend-assigned severity. The client displays it and never derives it
/// from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(alias = "low", alias = "LOW")]
    Low,
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "high", alias = "HIGH")]
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// One row of the protocol breakdown. Serialized with the count as `frames`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireProtocolCount")]
pub struct ProtocolCount {
    pub protocol: String,
    pub frames: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

/// Protocol row as it arrives on the wire, before the count is normalized.
#[derive(Deserialize)]
struct WireProtocolCount {
    protocol: String,
    frames: Option<u64>,
    packets: Option<u64>,
    bytes: Option<u64>,
}

impl TryFrom<WireProtocolCount> for ProtocolCount {
    type Error = String;

    fn try_from(wire: WireProtocolCount) -> std::result::Result<Self, Self::Error> {
        let frames = match (wire.frames, wire.packets) {
            (Some(frames), _) => frames,
            (None, Some(packets)) => packets,
            (None, None) => {
                return Err(format!(
                    "protocol '{}' has neither 'frames' nor 'packets'",
                    wire.protocol
                ))
            }
        };
        Ok(ProtocolCount {
            protocol: wire.protocol,
            frames,
            bytes: wire.bytes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTalker {
    pub src: String,
    pub dst: String,
    pub total_bytes: u64,
    pub total_packets: u64,
    /// Packets in the src -> dst direction, when the backend reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

impl Report {
    /// Decode and validate a report body received from the backend.
    pub fn from_json(body: &[u8]) -> Result<Report> {
        let report: Report = serde_json::from_slice(body)?;
        report.validate()?;
        Ok(report)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.filename.trim().is_empty() {
            return Err(Error::Malformed("empty filename".to_string()));
        }
        if self.risk.score > 100 {
            return Err(Error::Malformed(format!(
                "risk score {} outside 0-100",
                self.risk.score
            )));
        }
        Ok(())
    }
}

/// Write a snapshot in the format implied by the file extension
pub fn generate<P: AsRef<Path>>(path: P, report: &Report) -> io::Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut file = std::fs::File::create(path)?;

    match ext.as_str() {
        "html" | "htm" => html::write(&mut file, report),
        "json" => json::write(&mut file, report),
        _ => csv::write(&mut file, report),
    }
}
