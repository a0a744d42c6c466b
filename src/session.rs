//! Analysis and export sessions
//!
//! A [`Session`] is the client-side state for one user: which capture was
//! picked, where its analysis stands, the report it produced, and where the
//! PDF export of that report stands. Nothing here is persisted.
//!
//! # Two state machines
//!
//! ```text
//! analysis:  Idle ──begin──► InFlight ──complete──► Succeeded | Failed
//!                               ▲                          │
//!                               └──────────begin───────────┘
//!
//! export:    Idle ──begin──► InFlight ──complete──► Succeeded | Failed
//!            (only while analysis is Succeeded; reset to Idle by a new analysis)
//! ```
//!
//! Each operation is split in two halves so the same rules apply whether the
//! backend call is made inline (CLI) or on a worker thread (dashboard):
//! `begin_*` checks preconditions and hands out a [`Ticket`], `complete_*`
//! applies the outcome only if that ticket is still the current one. A
//! completion for a superseded request is dropped.

use crate::client::{Backend, CaptureFile};
use crate::error::{Error, Result};
use crate::export::{export_filename, SaveTarget};
use crate::report::Report;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

/// Identifies one outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Analysis,
    Export,
}

/// User-visible failure message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub operation: Operation,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Session {
    selected_file: Option<String>,
    analysis: Status,
    report: Option<Report>,
    export: Status,
    last_export: Option<String>,
    analysis_ticket: Option<Ticket>,
    export_ticket: Option<Ticket>,
    next_ticket: u64,
    notices: Vec<Notice>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_file(&self) -> Option<&str> {
        self.selected_file.as_deref()
    }

    pub fn analysis_status(&self) -> Status {
        self.analysis
    }

    pub fn export_status(&self) -> Status {
        self.export
    }

    /// The current report. Present only while analysis is `Succeeded`.
    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    /// Where the last successful export was saved
    pub fn last_export(&self) -> Option<&str> {
        self.last_export.as_deref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn can_start_analysis(&self) -> bool {
        self.analysis != Status::InFlight
    }

    pub fn can_export(&self) -> bool {
        self.analysis == Status::Succeeded && self.report.is_some() && self.export != Status::InFlight
    }

    // ------------------------------------------------------------------
    // Analysis
    // ------------------------------------------------------------------

    /// Start analysing `file`. Returns `None` (and changes nothing) when no
    /// file was given or an analysis is already in flight.
    pub fn begin_analysis(&mut self, file: Option<&CaptureFile>) -> Option<Ticket> {
        let file = match file {
            Some(f) => f,
            None => {
                debug!("analysis ignored: no file selected");
                return None;
            }
        };
        if !self.can_start_analysis() {
            debug!(file = %file.name, "analysis ignored: another one is in flight");
            return None;
        }

        let ticket = self.issue_ticket();
        self.selected_file = Some(file.name.clone());
        self.analysis = Status::InFlight;
        self.analysis_ticket = Some(ticket);
        self.report = None;

        // Any export belonged to the previous report.
        self.export = Status::Idle;
        self.export_ticket = None;
        self.last_export = None;

        info!(file = %file.name, "analysis started");
        Some(ticket)
    }

    /// Apply the outcome of the analysis identified by `ticket`. Returns
    /// whether it was applied.
    pub fn complete_analysis(&mut self, ticket: Ticket, outcome: Result<Report>) -> bool {
        if self.analysis_ticket != Some(ticket) {
            warn!(?ticket, "discarding stale analysis result");
            return false;
        }
        self.analysis_ticket = None;

        match outcome.and_then(|report| report.validate().map(|_| report)) {
            Ok(report) => {
                info!(
                    file = %report.filename,
                    score = report.risk.score,
                    level = %report.risk.level,
                    "analysis succeeded"
                );
                self.report = Some(report);
                self.analysis = Status::Succeeded;
            }
            Err(e) => {
                warn!(error = %e, "analysis failed");
                self.report = None;
                self.analysis = Status::Failed;
                self.notify(Operation::Analysis, &e);
            }
        }
        true
    }

    /// Run one analysis inline against `backend`.
    pub fn start_analysis(&mut self, backend: &dyn Backend, file: Option<&CaptureFile>) -> Status {
        if let (Some(ticket), Some(file)) = (self.begin_analysis(file), file) {
            let outcome = backend.analyze(file);
            self.complete_analysis(ticket, outcome);
        }
        self.analysis
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Start exporting the current report. Returns the ticket and the report
    /// body to send, or `None` when there is nothing to export or an export
    /// is already running.
    pub fn begin_export(&mut self) -> Option<(Ticket, Report)> {
        if !self.can_export() {
            debug!(analysis = ?self.analysis, export = ?self.export, "export ignored");
            return None;
        }
        let report = self.report.clone()?;

        let ticket = self.issue_ticket();
        self.export = Status::InFlight;
        self.export_ticket = Some(ticket);
        info!(file = %report.filename, "export started");
        Some((ticket, report))
    }

    /// Apply the outcome of the export identified by `ticket`, saving the
    /// document through `target` on success. Returns the saved location.
    pub fn complete_export(
        &mut self,
        ticket: Ticket,
        outcome: Result<Vec<u8>>,
        target: &mut dyn SaveTarget,
    ) -> Option<String> {
        if self.export_ticket != Some(ticket) {
            warn!(?ticket, "discarding stale export result");
            return None;
        }
        self.export_ticket = None;

        let name = match self.report.as_ref() {
            Some(report) => export_filename(report),
            None => {
                self.export = Status::Idle;
                return None;
            }
        };

        match outcome.and_then(|bytes| target.save(&bytes, &name)) {
            Ok(location) => {
                info!(%location, "export saved");
                self.export = Status::Succeeded;
                self.last_export = Some(location.clone());
                Some(location)
            }
            Err(e) => {
                warn!(error = %e, "export failed");
                self.export = Status::Failed;
                self.notify(Operation::Export, &e);
                None
            }
        }
    }

    /// Run one export inline against `backend`.
    pub fn request_export(&mut self, backend: &dyn Backend, target: &mut dyn SaveTarget) -> Status {
        if let Some((ticket, report)) = self.begin_export() {
            let outcome = backend.generate_report(&report);
            self.complete_export(ticket, outcome, target);
        }
        self.export
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    fn notify(&mut self, operation: Operation, error: &Error) {
        let message = match operation {
            Operation::Analysis => format!("Analysis failed: {}", error),
            Operation::Export => format!("Report export failed: {}", error),
        };
        self.notices.push(Notice { operation, message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Health;
    use crate::export::DownloadSlot;
    use crate::report::fixtures::capture_report;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    // ==========================================================================
    // TEST BACKEND
    // ==========================================================================
    //
    // Replays canned outcomes and records every call so tests can assert how
    // many requests a session actually issued.
    // ==========================================================================

    #[derive(Default)]
    struct ScriptedBackend {
        analyses: RefCell<VecDeque<Result<Report>>>,
        documents: RefCell<VecDeque<Result<Vec<u8>>>>,
        uploaded: RefCell<Vec<String>>,
        exported: RefCell<Vec<Report>>,
    }

    impl ScriptedBackend {
        fn analysis(self, outcome: Result<Report>) -> Self {
            self.analyses.borrow_mut().push_back(outcome);
            self
        }

        fn document(self, outcome: Result<Vec<u8>>) -> Self {
            self.documents.borrow_mut().push_back(outcome);
            self
        }
    }

    impl Backend for ScriptedBackend {
        fn analyze(&self, capture: &CaptureFile) -> Result<Report> {
            self.uploaded.borrow_mut().push(capture.name.clone());
            self.analyses
                .borrow_mut()
                .pop_front()
                .expect("unexpected analyze call")
        }

        fn generate_report(&self, report: &Report) -> Result<Vec<u8>> {
            self.exported.borrow_mut().push(report.clone());
            self.documents
                .borrow_mut()
                .pop_front()
                .expect("unexpected generate_report call")
        }

        fn health(&self) -> Result<Health> {
            Ok(Health { status: "healthy".into() })
        }
    }

    struct FailingTarget;

    impl SaveTarget for FailingTarget {
        fn save(&mut self, _bytes: &[u8], _name: &str) -> Result<String> {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    fn capture() -> CaptureFile {
        CaptureFile::new("capture.pcap", vec![0xd4, 0xc3, 0xb2, 0xa1]).unwrap()
    }

    fn server_error() -> Error {
        Error::Status {
            endpoint: "/analyze".into(),
            code: 500,
            detail: "Analysis failed: tshark not found".into(),
        }
    }

    // ==========================================================================
    // ANALYSIS STATE MACHINE
    // ==========================================================================

    #[test]
    fn test_fresh_session_is_idle() {
        let session = Session::new();
        assert_eq!(session.analysis_status(), Status::Idle);
        assert_eq!(session.export_status(), Status::Idle);
        assert!(session.report().is_none());
        assert!(session.selected_file().is_none());
    }

    #[test]
    fn test_no_file_is_a_noop() {
        let backend = ScriptedBackend::default();
        let mut session = Session::new();

        assert_eq!(session.start_analysis(&backend, None), Status::Idle);
        assert!(backend.uploaded.borrow().is_empty());
    }

    #[test]
    fn test_successful_analysis_stores_report() {
        let backend = ScriptedBackend::default().analysis(Ok(capture_report()));
        let mut session = Session::new();

        assert_eq!(session.start_analysis(&backend, Some(&capture())), Status::Succeeded);
        assert_eq!(session.report(), Some(&capture_report()));
        assert_eq!(session.selected_file(), Some("capture.pcap"));
        assert_eq!(*backend.uploaded.borrow(), vec!["capture.pcap"]);
        assert!(session.notices().is_empty());
    }

    #[test]
    fn test_in_flight_rejects_second_start() {
        let mut session = Session::new();
        let file = capture();

        let first = session.begin_analysis(Some(&file)).unwrap();
        assert_eq!(session.analysis_status(), Status::InFlight);
        assert!(session.begin_analysis(Some(&file)).is_none());

        // Inline variant issues no request either
        let backend = ScriptedBackend::default();
        assert_eq!(session.start_analysis(&backend, Some(&file)), Status::InFlight);
        assert!(backend.uploaded.borrow().is_empty());

        assert!(session.complete_analysis(first, Ok(capture_report())));
        assert!(session.begin_analysis(Some(&file)).is_some());
    }

    #[test]
    fn test_begin_clears_previous_report() {
        let mut session = Session::new();
        let file = capture();
        let t = session.begin_analysis(Some(&file)).unwrap();
        session.complete_analysis(t, Ok(capture_report()));
        assert!(session.report().is_some());

        session.begin_analysis(Some(&file)).unwrap();
        assert!(session.report().is_none());
        assert_eq!(session.analysis_status(), Status::InFlight);
    }

    #[test]
    fn test_failure_then_success() {
        let backend = ScriptedBackend::default()
            .analysis(Err(server_error()))
            .analysis(Ok(capture_report()));
        let mut session = Session::new();

        assert_eq!(session.start_analysis(&backend, Some(&capture())), Status::Failed);
        assert!(session.report().is_none());
        assert_eq!(session.notices().len(), 1);
        assert_eq!(session.notices()[0].operation, Operation::Analysis);
        assert!(session.notices()[0].message.contains("tshark not found"));

        // Retry is a fresh attempt from the Failed state
        assert_eq!(session.start_analysis(&backend, Some(&capture())), Status::Succeeded);
        assert!(session.report().is_some());
        assert_eq!(backend.uploaded.borrow().len(), 2);
    }

    #[test]
    fn test_malformed_report_fails_analysis() {
        let mut bad = capture_report();
        bad.risk.score = 250;
        let backend = ScriptedBackend::default().analysis(Ok(bad));
        let mut session = Session::new();

        assert_eq!(session.start_analysis(&backend, Some(&capture())), Status::Failed);
        assert!(session.report().is_none());
    }

    #[test]
    fn test_unknown_ticket_is_discarded() {
        let mut session = Session::new();
        let file = capture();
        let ticket = session.begin_analysis(Some(&file)).unwrap();
        assert!(session.complete_analysis(ticket, Err(server_error())));

        // Same ticket again: already resolved
        assert!(!session.complete_analysis(ticket, Ok(capture_report())));
        assert_eq!(session.analysis_status(), Status::Failed);
        assert!(session.report().is_none());
    }

    #[test]
    fn test_take_notices_drains() {
        let backend = ScriptedBackend::default().analysis(Err(server_error()));
        let mut session = Session::new();
        session.start_analysis(&backend, Some(&capture()));

        assert_eq!(session.take_notices().len(), 1);
        assert!(session.notices().is_empty());
    }

    // ==========================================================================
    // EXPORT STATE MACHINE
    // ==========================================================================

    fn analysed_session() -> Session {
        let backend = ScriptedBackend::default().analysis(Ok(capture_report()));
        let mut session = Session::new();
        session.start_analysis(&backend, Some(&capture()));
        session
    }

    #[test]
    fn test_export_without_report_is_a_noop() {
        let backend = ScriptedBackend::default();
        let mut slot = DownloadSlot::default();
        let mut session = Session::new();

        assert_eq!(session.request_export(&backend, &mut slot), Status::Idle);
        assert!(backend.exported.borrow().is_empty());
        assert!(!slot.is_ready());

        // Also refused after a failed analysis
        let failing = ScriptedBackend::default().analysis(Err(server_error()));
        session.start_analysis(&failing, Some(&capture()));
        assert!(session.begin_export().is_none());
    }

    #[test]
    fn test_export_sends_report_and_saves_named_document() {
        let backend = ScriptedBackend::default().document(Ok(b"%PDF-1.4 ...".to_vec()));
        let mut slot = DownloadSlot::default();
        let mut session = analysed_session();

        assert_eq!(session.request_export(&backend, &mut slot), Status::Succeeded);
        assert_eq!(*backend.exported.borrow(), vec![capture_report()]);

        let doc = slot.take().unwrap();
        assert_eq!(doc.name, "Forensic_Report_capture.pcap.pdf");
        assert_eq!(doc.bytes, b"%PDF-1.4 ...");
        assert_eq!(session.last_export(), Some(crate::export::DOWNLOAD_ROUTE));
    }

    #[test]
    fn test_export_failure_leaves_no_download() {
        let backend = ScriptedBackend::default().document(Err(Error::Status {
            endpoint: "/generate_report".into(),
            code: 500,
            detail: "boom".into(),
        }));
        let mut slot = DownloadSlot::default();
        let mut session = analysed_session();

        assert_eq!(session.request_export(&backend, &mut slot), Status::Failed);
        assert!(!slot.is_ready());
        assert_eq!(session.notices()[0].operation, Operation::Export);
        // The report itself is untouched
        assert_eq!(session.analysis_status(), Status::Succeeded);
        assert!(session.report().is_some());
    }

    #[test]
    fn test_save_failure_marks_export_failed() {
        let backend = ScriptedBackend::default().document(Ok(b"%PDF".to_vec()));
        let mut session = analysed_session();

        assert_eq!(session.request_export(&backend, &mut FailingTarget), Status::Failed);
        assert!(session.last_export().is_none());
    }

    #[test]
    fn test_export_can_be_repeated() {
        let backend = ScriptedBackend::default()
            .document(Err(server_error()))
            .document(Ok(b"%PDF".to_vec()));
        let mut slot = DownloadSlot::default();
        let mut session = analysed_session();

        assert_eq!(session.request_export(&backend, &mut slot), Status::Failed);
        assert_eq!(session.request_export(&backend, &mut slot), Status::Succeeded);
        assert_eq!(backend.exported.borrow().len(), 2);
    }

    #[test]
    fn test_concurrent_export_refused() {
        let mut session = analysed_session();
        assert!(session.begin_export().is_some());
        assert!(session.begin_export().is_none());
    }

    #[test]
    fn test_new_analysis_supersedes_running_export() {
        let mut session = analysed_session();
        let mut slot = DownloadSlot::default();
        let (export_ticket, _) = session.begin_export().unwrap();

        let file = capture();
        let analysis_ticket = session.begin_analysis(Some(&file)).unwrap();
        assert_eq!(session.export_status(), Status::Idle);

        // The old export finishing late must not touch the new session state
        assert!(session
            .complete_export(export_ticket, Ok(b"%PDF".to_vec()), &mut slot)
            .is_none());
        assert!(!slot.is_ready());
        assert_eq!(session.export_status(), Status::Idle);

        session.complete_analysis(analysis_ticket, Ok(capture_report()));
        assert!(session.can_export());
    }
}
