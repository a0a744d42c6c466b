//! Client configuration
//!
//! The only deployment-time setting the workflow depends on is where the
//! analysis service lives. The rest tunes the local side: request timeout and
//! where exported documents land.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Environment variable consulted when `--api-url` is not given
pub const API_URL_ENV: &str = "PCAP_FORENSICS_API";

/// Captures can take a while for tshark to chew through
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub timeout: Duration,
    pub download_dir: PathBuf,
    pub open_after_save: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            download_dir: PathBuf::from("."),
            open_after_save: false,
        }
    }
}

impl Config {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = normalize_base_url(&url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_open_after_save(mut self, open: bool) -> Self {
        self.open_after_save = open;
        self
    }

    /// Full URL for a backend path such as `/analyze`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_localhost() {
        let config = Config::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.endpoint("/analyze"), "http://localhost:8000/analyze");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = Config::default().with_api_url("https://forensics.example.net/api/");
        assert_eq!(
            config.endpoint("generate_report"),
            "https://forensics.example.net/api/generate_report"
        );
    }

    #[test]
    fn test_blank_url_falls_back_to_default() {
        let config = Config::default().with_api_url("   ");
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }
}
