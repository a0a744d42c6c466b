//! HTTP client for the remote analysis service
//!
//! The service does all the heavy lifting (tshark, risk heuristics, PDF
//! layout). This module only moves bytes:
//!
//! - `POST /analyze` with a multipart `file` field, answered by a report
//! - `POST /generate_report` with the report as JSON, answered by a PDF
//! - `GET /health`
//!
//! Sessions talk to the service through the [`Backend`] trait so tests and the
//! dashboard can swap in their own implementation.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::report::Report;
use reqwest::blocking::{multipart, Client, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Extensions the service accepts
pub const CAPTURE_EXTENSIONS: &[&str] = &["pcap", "pcapng"];

/// A capture file held in memory, ready to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl CaptureFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        if !is_capture_name(&name) {
            return Err(Error::InvalidCapture(format!(
                "{}: only .pcap and .pcapng files are accepted",
                name
            )));
        }
        if bytes.is_empty() {
            return Err(Error::InvalidCapture(format!("{} is empty", name)));
        }
        Ok(CaptureFile { name, bytes })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidCapture(format!("{}: no file name", path.display())))?
            .to_string();
        let bytes = std::fs::read(path)?;
        CaptureFile::new(name, bytes)
    }
}

pub fn is_capture_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| CAPTURE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// The remote collaborator, as seen by a session.
pub trait Backend {
    fn analyze(&self, capture: &CaptureFile) -> Result<Report>;
    fn generate_report(&self, report: &Report) -> Result<Vec<u8>>;
    fn health(&self) -> Result<Health>;
}

/// [`Backend`] over blocking HTTP.
pub struct HttpBackend {
    http: Client,
    config: Config,
}

impl HttpBackend {
    pub fn new(config: Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("pcap-forensics/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::transport(&config.api_url, e))?;
        Ok(HttpBackend { http, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Backend for HttpBackend {
    fn analyze(&self, capture: &CaptureFile) -> Result<Report> {
        const ENDPOINT: &str = "/analyze";
        info!(file = %capture.name, bytes = capture.bytes.len(), "uploading capture");

        let part = multipart::Part::bytes(capture.bytes.clone())
            .file_name(capture.name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| Error::transport(ENDPOINT, e))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.config.endpoint(ENDPOINT))
            .multipart(form)
            .send()
            .map_err(|e| Error::transport(ENDPOINT, e))?;
        let body = success_body(ENDPOINT, response)?;

        let report = Report::from_json(&body)?;
        debug!(
            score = report.risk.score,
            level = %report.risk.level,
            protocols = report.protocols_chart.len(),
            talkers = report.top_talkers.len(),
            "report received"
        );
        Ok(report)
    }

    fn generate_report(&self, report: &Report) -> Result<Vec<u8>> {
        const ENDPOINT: &str = "/generate_report";
        info!(file = %report.filename, "requesting document");

        let response = self
            .http
            .post(self.config.endpoint(ENDPOINT))
            .json(report)
            .send()
            .map_err(|e| Error::transport(ENDPOINT, e))?;
        let body = success_body(ENDPOINT, response)?;

        if body.is_empty() {
            return Err(Error::Malformed("document body is empty".to_string()));
        }
        debug!(bytes = body.len(), "document received");
        Ok(body)
    }

    fn health(&self) -> Result<Health> {
        const ENDPOINT: &str = "/health";
        let response = self
            .http
            .get(self.config.endpoint(ENDPOINT))
            .send()
            .map_err(|e| Error::transport(ENDPOINT, e))?;
        let body = success_body(ENDPOINT, response)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn success_body(endpoint: &str, response: Response) -> Result<Vec<u8>> {
    let status = response.status();
    let body = response
        .bytes()
        .map_err(|e| Error::transport(endpoint, e))?;

    if !status.is_success() {
        return Err(Error::Status {
            endpoint: endpoint.to_string(),
            code: status.as_u16(),
            detail: error_detail(&body),
        });
    }
    Ok(body.to_vec())
}

/// Pull a readable message out of an error body. The service reports errors
/// as `{"detail": "..."}`; anything else is shown trimmed.
fn error_detail(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct Detail {
        detail: serde_json::Value,
    }

    if let Ok(d) = serde_json::from_slice::<Detail>(body) {
        return match d.detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        "no details".to_string()
    } else {
        text.chars().take(200).collect()
    }
}
