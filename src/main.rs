use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pcap_forensics::client::is_capture_name;
use pcap_forensics::config::{API_URL_ENV, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
use pcap_forensics::report::text;
use pcap_forensics::{
    Backend, CaptureFile, Config, DirectoryTarget, HttpBackend, RiskLevel, Session, Status,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "pcap-forensics")]
#[command(
    author,
    version,
    about = "Send network captures to a forensics service and review the risk report",
    after_help = "Exit status: 0 when every capture was analysed and none is high risk, \
2 when any report is high risk (even if other captures failed), \
1 when something failed and no report is high risk."
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Capture file or directory of captures (optional in GUI mode)
    path: Option<PathBuf>,

    /// Launch GUI file picker (auto-enabled when no path is given)
    #[arg(long)]
    gui: bool,

    /// Base URL of the analysis service
    #[arg(long, env = API_URL_ENV, default_value = DEFAULT_API_URL, global = true)]
    api_url: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout: u64,

    /// Request the PDF report for each successful analysis
    #[arg(short, long)]
    export: bool,

    /// Directory for exported PDFs
    #[arg(long, default_value = ".")]
    download_dir: PathBuf,

    /// Open each exported PDF after saving
    #[arg(long)]
    open: bool,

    /// Write a report snapshot (.html, .json, .csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also print the protocol hierarchy
    #[arg(long)]
    hierarchy: bool,

    /// Disable ANSI colors
    #[arg(long)]
    no_color: bool,

    /// Only show failures and the summary
    #[arg(short, long)]
    quiet: bool,

    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the browser dashboard
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3001")]
        port: u16,

        /// Don't open the browser
        #[arg(long)]
        no_open: bool,
    },

    /// Check that the analysis service is reachable
    Health,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::default()
        .with_api_url(args.api_url.clone())
        .with_timeout(Duration::from_secs(args.timeout))
        .with_download_dir(args.download_dir.clone())
        .with_open_after_save(args.open);

    let backend = match HttpBackend::new(config.clone()) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to set up HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    // Handle subcommands first
    if let Some(cmd) = args.command {
        match cmd {
            Command::Serve { port, no_open } => {
                if let Err(e) = pcap_forensics::serve::start(port, &config, Arc::new(backend), !no_open) {
                    eprintln!("Server error: {}", e);
                    std::process::exit(1);
                }
            }
            Command::Health => match backend.health() {
                Ok(h) if h.is_healthy() => println!("{}: {}", config.api_url, h.status),
                Ok(h) => {
                    println!("{}: {}", config.api_url, h.status);
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("{}: unreachable ({})", config.api_url, e);
                    std::process::exit(1);
                }
            },
        }
        return;
    }

    #[cfg(feature = "gui")]
    let path = if args.gui || args.path.is_none() {
        match pick_capture_gui() {
            Some(p) => p,
            None => {
                eprintln!("No capture selected.");
                std::process::exit(0);
            }
        }
    } else {
        args.path.clone().unwrap_or_default()
    };

    #[cfg(not(feature = "gui"))]
    let path = if let Some(p) = args.path.clone() {
        p
    } else {
        eprintln!("Usage: pcap-forensics <PATH>");
        eprintln!("Run 'pcap-forensics --help' for more options.");
        eprintln!("Note: GUI mode not available in this build.");
        std::process::exit(1);
    };

    let files = collect_captures(&path);
    if files.is_empty() {
        eprintln!("No capture files found (supported: pcap, pcapng)");
        std::process::exit(1);
    }

    let style = Style { color: !args.no_color };
    if !args.quiet {
        eprintln!("{}  {}", style.paint(BOLD, "PCAP Forensics"), backend.config().api_url);
        eprintln!("{}", "─".repeat(70));
        eprintln!("Found {} capture file(s)\n", files.len());
    }

    let mut session = Session::new();
    let mut downloads = DirectoryTarget::new(&config.download_dir).with_open_after_save(config.open_after_save);
    let mut failures = 0usize;
    let mut analyzed = 0usize;
    let mut high_risk = 0usize;

    for file in &files {
        let capture = match CaptureFile::load(file) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{}", style.paint(RED, &format!("✗ {}: {}", file.display(), e)));
                failures += 1;
                continue;
            }
        };

        let spinner = busy(&format!("Analyzing {}", capture.name), args.quiet);
        let status = session.start_analysis(&backend, Some(&capture));
        spinner.finish_and_clear();

        for notice in session.take_notices() {
            eprintln!("{}", style.paint(RED, &format!("✗ {}", notice.message)));
        }
        if status != Status::Succeeded {
            failures += 1;
            continue;
        }
        let report = match session.report() {
            Some(r) => r.clone(),
            None => continue,
        };

        analyzed += 1;
        if report.risk.level == RiskLevel::High {
            high_risk += 1;
        }

        if !args.quiet {
            println!("{}", text::render(&report, style.color));
            if args.hierarchy {
                println!("{}", text::render_hierarchy(&report, style.color));
            }
        }

        if let Some(ref output) = args.output {
            let target = snapshot_path(output, &report.filename, files.len() > 1);
            match pcap_forensics::report::generate(&target, &report) {
                Ok(()) => eprintln!(
                    "{}",
                    style.paint(GREEN, &format!("Snapshot saved: {}", target.display()))
                ),
                Err(e) => {
                    eprintln!("Failed to write snapshot: {}", e);
                    failures += 1;
                }
            }
        }

        if args.export {
            let spinner = busy("Generating PDF", args.quiet);
            let status = session.request_export(&backend, &mut downloads);
            spinner.finish_and_clear();

            for notice in session.take_notices() {
                eprintln!("{}", style.paint(RED, &format!("✗ {}", notice.message)));
            }
            match (status, session.last_export()) {
                (Status::Succeeded, Some(location)) => {
                    eprintln!("{}", style.paint(GREEN, &format!("PDF saved: {}", location)))
                }
                _ => failures += 1,
            }
        }
    }

    if !args.quiet || failures > 0 {
        eprintln!("\n{}", "─".repeat(70));
        eprintln!("{}", style.paint(BOLD, "Summary:"));
        eprintln!("  Analyzed:    {}", analyzed);
        eprintln!("  {}   {}", style.paint(RED, "High risk:"), high_risk);
        if failures > 0 {
            eprintln!("  {}    {}", style.paint(DIM, "Failures:"), failures);
        }
    }

    let code = exit_code(high_risk, failures);
    if code != 0 {
        std::process::exit(code);
    }
}

const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[90m";

/// ANSI styling for status lines, off under `--no-color`
struct Style {
    color: bool,
}

impl Style {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{}{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }
}

/// A high-risk report outranks failures elsewhere in the batch.
fn exit_code(high_risk: usize, failures: usize) -> i32 {
    if high_risk > 0 {
        2
    } else if failures > 0 {
        1
    } else {
        0
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn collect_captures(path: &Path) -> Vec<PathBuf> {
    if path.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_str().map(is_capture_name).unwrap_or(false))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        debug!(count = files.len(), dir = %path.display(), "captures found");
        files
    } else {
        vec![path.to_path_buf()]
    }
}

/// With several captures, `out.html` becomes `out_<capture>.html`.
fn snapshot_path(output: &Path, capture_name: &str, batch: bool) -> PathBuf {
    if !batch {
        return output.to_path_buf();
    }
    let stem = output.file_stem().and_then(|s| s.to_str()).unwrap_or("report");
    let name = match output.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, capture_name, ext),
        None => format!("{}_{}", stem, capture_name),
    };
    output.with_file_name(name)
}

fn busy(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    match ProgressStyle::default_spinner().template("{spinner:.green} {msg} {elapsed}") {
        Ok(style) => pb.set_style(style),
        Err(e) => warn!(error = %e, "bad spinner template"),
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(feature = "gui")]
fn pick_capture_gui() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Select capture to analyze")
        .add_filter("Capture files", &["pcap", "pcapng"])
        .pick_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_path_single_and_batch() {
        let out = Path::new("reports/out.html");
        assert_eq!(snapshot_path(out, "a.pcap", false), PathBuf::from("reports/out.html"));
        assert_eq!(
            snapshot_path(out, "a.pcap", true),
            PathBuf::from("reports/out_a.pcap.html")
        );
    }

    #[test]
    fn test_exit_code_precedence() {
        assert_eq!(exit_code(0, 0), 0);
        assert_eq!(exit_code(0, 3), 1);
        assert_eq!(exit_code(1, 0), 2);
        // High risk wins over failures in the same batch
        assert_eq!(exit_code(1, 3), 2);
    }

    #[test]
    fn test_style_respects_no_color() {
        let plain = Style { color: false };
        assert_eq!(plain.paint(RED, "✗ capture.pcap"), "✗ capture.pcap");

        let colored = Style { color: true };
        assert_eq!(colored.paint(RED, "x"), "\x1b[31mx\x1b[0m");
    }

    #[test]
    fn test_collect_captures_filters_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pcapng"), b"x").unwrap();
        std::fs::write(dir.path().join("a.pcap"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let files = collect_captures(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.pcap", "b.pcapng"]);
    }
}
