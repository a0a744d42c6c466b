//! CSV snapshot for spreadsheets
//!
//! One table with a leading `section` column so protocol rows and talker rows
//! can share a file.

use super::Report;
use std::io::{self, Write};

pub fn write<W: Write>(writer: &mut W, report: &Report) -> io::Result<()> {
    writeln!(writer, "section,name,peer,count,bytes")?;

    for p in &report.protocols_chart {
        writeln!(
            writer,
            "protocol,{},,{},{}",
            escape(&p.protocol),
            p.frames,
            p.bytes.map(|b| b.to_string()).unwrap_or_default()
        )?;
    }

    for t in &report.top_talkers {
        writeln!(
            writer,
            "talker,{},{},{},{}",
            escape(&t.src),
            escape(&t.dst),
            t.total_packets,
            t.total_bytes
        )?;
    }

    Ok(())
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
