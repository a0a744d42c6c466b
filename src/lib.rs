//! PCAP Forensics - dashboard client for a remote capture analysis service
//!
//! Uploads a network capture to an analysis service, shows the forensic report
//! it sends back (risk score, protocol breakdown, top talkers, protocol
//! hierarchy) and asks the same service for a PDF rendering of that report.
//!
//! # Overview
//!
//! All packet decoding, risk scoring and document layout happen on the
//! service. This crate owns the workflow around it:
//!
//! 1. **Analysis session**: one upload at a time, tracked as
//!    Idle → InFlight → Succeeded/Failed, never overlapping.
//! 2. **Report ingestion**: the response is validated and normalized into a
//!    single [`Report`] shape before anything displays it.
//! 3. **Presentation**: totals, chart colors, risk emphasis and byte sizes,
//!    derived without touching the report.
//! 4. **Export session**: posts the report back, receives a PDF, and saves it
//!    as `Forensic_Report_<filename>.pdf`.
//!
//! # Quick Start
//!
//! ```no_run
//! use pcap_forensics::{CaptureFile, Config, DirectoryTarget, HttpBackend, Session, Status};
//!
//! let backend = HttpBackend::new(Config::default())?;
//! let capture = CaptureFile::load("capture.pcap")?;
//!
//! let mut session = Session::new();
//! if session.start_analysis(&backend, Some(&capture)) == Status::Succeeded {
//!     let report = session.report().unwrap();
//!     println!("Risk {}/100 ({})", report.risk.score, report.risk.level);
//!
//!     let mut downloads = DirectoryTarget::new(".");
//!     session.request_export(&backend, &mut downloads);
//! }
//! # Ok::<(), pcap_forensics::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`report`]: report model, ingestion, presentation and snapshot formats
//! - [`session`]: the analysis and export state machines
//! - [`client`]: HTTP access to the analysis service
//! - [`export`]: where exported documents go
//! - [`serve`]: the browser dashboard

pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod report;
pub mod serve;
pub mod session;

pub use client::{Backend, CaptureFile, Health, HttpBackend};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use export::{export_filename, DirectoryTarget, DownloadSlot, SaveTarget};
pub use report::present::{Overview, RiskEmphasis};
pub use report::{ProtocolCount, Report, Risk, RiskLevel, TopTalker};
pub use session::{Notice, Session, Status};
