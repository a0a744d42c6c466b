//! Handing an exported document to the user
//!
//! The service returns the PDF as an opaque byte payload. What "save it" means
//! depends on where we run: the CLI writes it into a directory, the dashboard
//! parks it until the browser fetches it. Both sit behind [`SaveTarget`].
//!
//! Whatever transient handle is used to materialize the download is released
//! once the save has been triggered: the CLI's staging file is removed on every
//! path that doesn't end in a rename, and the dashboard's parked document is
//! dropped as soon as it has been served once.

use crate::error::Result;
use crate::report::Report;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const EXPORT_PREFIX: &str = "Forensic_Report";
pub const EXPORT_EXTENSION: &str = "pdf";

/// `Forensic_Report_<filename>.pdf`
pub fn export_filename(report: &Report) -> String {
    let name: String = report
        .filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    format!("{}_{}.{}", EXPORT_PREFIX, name, EXPORT_EXTENSION)
}

/// A rendered document and the name it should be saved under.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The platform's save-file mechanism.
pub trait SaveTarget {
    /// Save `bytes` under `suggested_name`, returning where it went.
    fn save(&mut self, bytes: &[u8], suggested_name: &str) -> Result<String>;
}

/// Saves documents into a directory on disk.
pub struct DirectoryTarget {
    dir: PathBuf,
    open_after_save: bool,
}

impl DirectoryTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectoryTarget {
            dir: dir.into(),
            open_after_save: false,
        }
    }

    pub fn with_open_after_save(mut self, open: bool) -> Self {
        self.open_after_save = open;
        self
    }
}

impl SaveTarget for DirectoryTarget {
    fn save(&mut self, bytes: &[u8], suggested_name: &str) -> Result<String> {
        fs::create_dir_all(&self.dir)?;
        let dest = self.dir.join(suggested_name);

        let staged = StagedFile::write(&self.dir, suggested_name, bytes)?;
        staged.commit(&dest)?;
        debug!(path = %dest.display(), bytes = bytes.len(), "document saved");

        if self.open_after_save {
            if let Err(e) = open::that(&dest) {
                warn!(path = %dest.display(), error = %e, "could not open saved document");
            }
        }
        Ok(dest.display().to_string())
    }
}

/// Partially written download. Removed on drop unless committed.
struct StagedFile {
    path: PathBuf,
    committed: bool,
}

impl StagedFile {
    fn write(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<Self> {
        let staged = StagedFile {
            path: dir.join(format!(".{}.part", name)),
            committed: false,
        };
        fs::write(&staged.path, bytes)?;
        Ok(staged)
    }

    fn commit(mut self, dest: &Path) -> io::Result<()> {
        fs::rename(&self.path, dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Holds one document until the browser collects it.
#[derive(Debug, Default)]
pub struct DownloadSlot {
    pending: Option<Document>,
}

/// Where the dashboard serves the parked document from
pub const DOWNLOAD_ROUTE: &str = "/api/download";

impl DownloadSlot {
    pub fn is_ready(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_name(&self) -> Option<&str> {
        self.pending.as_ref().map(|d| d.name.as_str())
    }

    /// Hand the document out. The slot is empty afterwards.
    pub fn take(&mut self) -> Option<Document> {
        self.pending.take()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

impl SaveTarget for DownloadSlot {
    fn save(&mut self, bytes: &[u8], suggested_name: &str) -> Result<String> {
        self.pending = Some(Document {
            name: suggested_name.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(DOWNLOAD_ROUTE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::capture_report;

    #[test]
    fn test_export_filename() {
        assert_eq!(
            export_filename(&capture_report()),
            "Forensic_Report_capture.pcap.pdf"
        );
    }

    #[test]
    fn test_export_filename_strips_separators() {
        let mut report = capture_report();
        report.filename = "../uploads/evil.pcap".into();
        assert_eq!(
            export_filename(&report),
            "Forensic_Report_.._uploads_evil.pcap.pdf"
        );
    }

    #[test]
    fn test_directory_target_writes_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut target = DirectoryTarget::new(dir.path().join("out"));

        let location = target.save(b"%PDF-1.4", "Forensic_Report_a.pcap.pdf").unwrap();
        let saved = dir.path().join("out").join("Forensic_Report_a.pcap.pdf");
        assert_eq!(location, saved.display().to_string());
        assert_eq!(fs::read(&saved).unwrap(), b"%PDF-1.4");

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_uncommitted_staging_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::write(dir.path(), "x.pdf", b"abc").unwrap();
        let path = staged.path.clone();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_download_slot_hands_out_once() {
        let mut slot = DownloadSlot::default();
        assert!(!slot.is_ready());

        let location = slot.save(b"%PDF", "Forensic_Report_a.pcap.pdf").unwrap();
        assert_eq!(location, DOWNLOAD_ROUTE);
        assert_eq!(slot.pending_name(), Some("Forensic_Report_a.pcap.pdf"));

        let doc = slot.take().unwrap();
        assert_eq!(doc.bytes, b"%PDF");
        assert!(slot.take().is_none());
    }
}
