use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Labscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tracing filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    "info,labscan=debug".to_string()
}

/// Report server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000),
            max_upload_bytes: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl ServerConfig {
    /// Read configuration from `LABSCAN_*` environment variables.
    /// Anything unset or unparseable falls back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("LABSCAN_ADDR") {
            match addr.parse() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(_) => tracing::warn!(%addr, "Ignoring unparseable LABSCAN_ADDR"),
            }
        }

        if let Ok(max) = std::env::var("LABSCAN_MAX_UPLOAD_BYTES") {
            match max.parse() {
                Ok(parsed) => config.max_upload_bytes = parsed,
                Err(_) => {
                    tracing::warn!(%max, "Ignoring unparseable LABSCAN_MAX_UPLOAD_BYTES")
                }
            }
        }

        config
    }
}

/// Directory holding Tesseract traineddata files.
/// `TESSDATA_PREFIX` wins when set; otherwise the Debian package layout.
pub fn tessdata_dir() -> PathBuf {
    std::env::var_os("TESSDATA_PREFIX")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/usr/share/tesseract-ocr/5/tessdata"))
}

/// OCR language string, e.g. "eng" or "eng+fra".
pub fn ocr_languages() -> String {
    std::env::var("LABSCAN_OCR_LANG").unwrap_or_else(|_| "eng".into())
}
