//! Browser dashboard
//!
//! `pcap-forensics serve` → starts server, opens browser, the page uploads a
//! capture, polls for the report, and can ask for the PDF.
//!
//! The request loop is the only owner of the [`Session`]. Calls to the
//! analysis service run on worker threads and report back over a channel;
//! the loop applies those outcomes between requests, so session state is only
//! ever written from one thread and the page stays responsive while a capture
//! is being analysed.

use crate::client::{Backend, CaptureFile, Health};
use crate::config::Config;
use crate::error::Result;
use crate::export::{Document, DownloadSlot};
use crate::report::present::Overview;
use crate::report::Report;
use crate::session::{Notice, Session, Status, Ticket};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, error, info, warn};

// Embed the UI directly in the binary
const UI_HTML: &str = include_str!("ui.html");

/// How long the loop waits for a request before checking on workers
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Largest capture accepted from the browser
pub const MAX_UPLOAD_BYTES: u64 = 512 * 1024 * 1024;

pub type SharedBackend = Arc<dyn Backend + Send + Sync>;

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }
}

impl ApiResponse<()> {
    fn failure(message: impl Into<String>) -> Self {
        Self { ok: false, data: None, error: Some(message.into()) }
    }
}

#[derive(Deserialize, Debug)]
pub struct UploadParams {
    pub name: String,
}

/// What the page renders from.
#[derive(Serialize, Debug)]
pub struct StateView {
    pub api_url: String,
    pub selected_file: Option<String>,
    pub analysis: Status,
    pub export: Status,
    pub report: Option<Report>,
    pub overview: Option<Overview>,
    pub download: Option<String>,
    pub health: HealthView,
    pub notices: Vec<Notice>,
}

/// Last known service health. Checks run off the loop, so a service that
/// accepts connections and never answers cannot stall the dashboard.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct HealthView {
    pub checking: bool,
    pub status: Option<String>,
    pub healthy: Option<bool>,
    pub error: Option<String>,
}

enum Completion {
    Analysis(Ticket, Result<Report>),
    Export(Ticket, Result<Vec<u8>>),
    Health(Result<Health>),
}

/// Response produced by the router, independent of the HTTP library.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub attachment: Option<String>,
}

impl Reply {
    fn json<T: Serialize>(status: u16, value: &T) -> Reply {
        let body = serde_json::to_vec(value).unwrap_or_else(|e| {
            format!(r#"{{"ok":false,"data":null,"error":"{}"}}"#, e).into_bytes()
        });
        Reply { status, content_type: "application/json", body, attachment: None }
    }

    fn html(body: String) -> Reply {
        Reply { status: 200, content_type: "text/html", body: body.into_bytes(), attachment: None }
    }

    fn not_found() -> Reply {
        Reply { status: 404, content_type: "text/plain", body: b"Not found".to_vec(), attachment: None }
    }

    fn document(doc: Document) -> Reply {
        Reply {
            status: 200,
            content_type: "application/pdf",
            body: doc.bytes,
            attachment: Some(doc.name),
        }
    }
}

pub struct Dashboard {
    session: Session,
    downloads: DownloadSlot,
    backend: SharedBackend,
    api_url: String,
    health: HealthView,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl Dashboard {
    pub fn new(backend: SharedBackend, api_url: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel();
        Dashboard {
            session: Session::new(),
            downloads: DownloadSlot::default(),
            backend,
            api_url: api_url.into(),
            health: HealthView::default(),
            tx,
            rx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Apply every finished worker result without blocking.
    pub fn drain_completions(&mut self) {
        while let Ok(done) = self.rx.try_recv() {
            self.apply(done);
        }
    }

    /// Block up to `timeout` for one worker result. Returns whether one
    /// arrived.
    pub fn wait_for_completion(&mut self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(done) => {
                self.apply(done);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn apply(&mut self, done: Completion) {
        match done {
            Completion::Analysis(ticket, outcome) => {
                self.session.complete_analysis(ticket, outcome);
            }
            Completion::Export(ticket, outcome) => {
                self.session.complete_export(ticket, outcome, &mut self.downloads);
            }
            Completion::Health(outcome) => {
                self.health = match outcome {
                    Ok(h) => HealthView {
                        checking: false,
                        healthy: Some(h.is_healthy()),
                        status: Some(h.status),
                        error: None,
                    },
                    Err(e) => {
                        warn!(error = %e, "health check failed");
                        HealthView {
                            checking: false,
                            healthy: Some(false),
                            status: None,
                            error: Some(e.to_string()),
                        }
                    }
                };
            }
        }
    }

    pub fn state(&mut self) -> StateView {
        StateView {
            api_url: self.api_url.clone(),
            selected_file: self.session.selected_file().map(str::to_string),
            analysis: self.session.analysis_status(),
            export: self.session.export_status(),
            report: self.session.report().cloned(),
            overview: self.session.report().map(Overview::from_report),
            download: self.downloads.pending_name().map(str::to_string),
            health: self.health.clone(),
            notices: self.session.take_notices(),
        }
    }

    /// Dispatch one request.
    pub fn route(&mut self, method: &Method, url: &str, body: Vec<u8>) -> Reply {
        let mut parts = url.splitn(2, '?');
        let path = parts.next().unwrap_or("/");
        let query = parts.next().unwrap_or("");

        match (method, path) {
            (&Method::Get, "/") => Reply::html(UI_HTML.to_string()),

            (&Method::Get, "/api/state") => {
                let state = self.state();
                Reply::json(200, &ApiResponse::success(state))
            }

            (&Method::Post, "/api/analyze") => self.analyze(query, body),

            (&Method::Post, "/api/export") => self.export(),

            (&Method::Get, "/api/download") => match self.downloads.take() {
                Some(doc) => {
                    info!(name = %doc.name, bytes = doc.bytes.len(), "serving document");
                    Reply::document(doc)
                }
                None => Reply::json(404, &ApiResponse::failure("no document waiting")),
            },

            (&Method::Get, "/api/health") => self.check_health(),

            _ => Reply::not_found(),
        }
    }

    fn analyze(&mut self, query: &str, body: Vec<u8>) -> Reply {
        let params = match serde_urlencoded::from_str::<UploadParams>(query) {
            Ok(p) => p,
            Err(_) => return Reply::json(400, &ApiResponse::failure("missing ?name= for the upload")),
        };
        let capture = match CaptureFile::new(params.name, body) {
            Ok(c) => c,
            Err(e) => return Reply::json(400, &ApiResponse::failure(e.to_string())),
        };

        let ticket = match self.session.begin_analysis(Some(&capture)) {
            Some(t) => t,
            None => {
                return Reply::json(409, &ApiResponse::failure("an analysis is already running"))
            }
        };
        // The parked document belonged to the previous report.
        self.downloads.clear();

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = backend.analyze(&capture);
            if tx.send(Completion::Analysis(ticket, outcome)).is_err() {
                debug!("dashboard gone, dropping analysis result");
            }
        });

        let state = self.state();
        Reply::json(202, &ApiResponse::success(state))
    }

    /// Kick off a health check unless one is outstanding and answer with the
    /// last known result. The outcome shows up in `/api/state`.
    fn check_health(&mut self) -> Reply {
        if !self.health.checking {
            self.health.checking = true;
            let backend = Arc::clone(&self.backend);
            let tx = self.tx.clone();
            thread::spawn(move || {
                let outcome = backend.health();
                if tx.send(Completion::Health(outcome)).is_err() {
                    debug!("dashboard gone, dropping health result");
                }
            });
        }
        Reply::json(202, &ApiResponse::success(self.health.clone()))
    }

    fn export(&mut self) -> Reply {
        let (ticket, report) = match self.session.begin_export() {
            Some(job) => job,
            None => {
                let reason = if self.session.report().is_none() {
                    "no report to export"
                } else {
                    "an export is already running"
                };
                return Reply::json(409, &ApiResponse::failure(reason));
            }
        };
        self.downloads.clear();

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = backend.generate_report(&report);
            if tx.send(Completion::Export(ticket, outcome)).is_err() {
                debug!("dashboard gone, dropping export result");
            }
        });

        let state = self.state();
        Reply::json(202, &ApiResponse::success(state))
    }
}

/// Start server, open browser, serve UI
pub fn start(port: u16, config: &Config, backend: SharedBackend, open_browser: bool) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    let url = format!("http://localhost:{}", port);

    eprintln!("\n\x1b[1;34mPCAP Forensics\x1b[0m");
    eprintln!("   {}", url);
    eprintln!("   Backend: {}\n", config.api_url);
    info!(%url, backend = %config.api_url, "dashboard listening");

    if open_browser {
        if let Err(e) = open::that(&url) {
            warn!(error = %e, "could not open browser");
        }
    }

    let mut dashboard = Dashboard::new(backend, config.api_url.clone());

    loop {
        dashboard.drain_completions();

        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => {
                if let Err(e) = handle_request(&mut dashboard, request) {
                    error!(error = %e, "request failed");
                }
            }
            Ok(None) => {}
            Err(e) => return Err(e),
        }
    }
}

fn handle_request(dashboard: &mut Dashboard, mut request: Request) -> std::io::Result<()> {
    let method = request.method().clone();
    let url = request.url().to_string();

    let mut body = Vec::new();
    if method == Method::Post {
        request
            .as_reader()
            .take(MAX_UPLOAD_BYTES + 1)
            .read_to_end(&mut body)?;
    }
    debug!(%method, %url, bytes = body.len(), "request");

    let reply = if body.len() as u64 > MAX_UPLOAD_BYTES {
        Reply::json(413, &ApiResponse::failure("capture too large"))
    } else {
        dashboard.route(&method, &url, body)
    };

    let mut response = with_header(
        Response::from_data(reply.body).with_status_code(reply.status),
        "Content-Type",
        reply.content_type,
    );
    if let Some(name) = reply.attachment {
        response = with_header(
            response,
            "Content-Disposition",
            &format!("attachment; filename=\"{}\"", header_safe(&name)),
        );
    }
    request.respond(response)
}

fn with_header<R: Read>(response: Response<R>, name: &str, value: &str) -> Response<R> {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

/// Header values must be plain ASCII without quotes
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"') || c == ' ' { c } else { '_' })
        .collect()
}
