//! Relay configuration types

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default push interval between multipart parts
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_millis(2000);

/// Default upload body cap (2 MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

/// How `/stream` delivers the stored frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Long-lived `multipart/x-mixed-replace` response, one part per interval
    #[default]
    Push,
    /// Single image with `ETag` / `If-None-Match` revalidation
    Conditional,
    /// Single image, no cache negotiation
    Still,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Push => "push",
            DeliveryMode::Conditional => "conditional",
            DeliveryMode::Still => "still",
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" | "mjpeg" | "multipart" => Ok(DeliveryMode::Push),
            "conditional" | "etag" => Ok(DeliveryMode::Conditional),
            "still" | "plain" => Ok(DeliveryMode::Still),
            other => Err(format!(
                "unknown delivery mode '{other}' (expected push, conditional or still)"
            )),
        }
    }
}

/// Deployment environment; selects where TLS material is expected.
///
/// TLS itself is terminated outside the relay, the directory is only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvironmentMode {
    #[default]
    Local,
    Vm,
}

impl EnvironmentMode {
    /// Default certificate directory for this environment
    pub fn certificate_dir(&self) -> PathBuf {
        match self {
            EnvironmentMode::Local => PathBuf::from("./certs"),
            EnvironmentMode::Vm => PathBuf::from("/etc/framecast/certs"),
        }
    }
}

impl std::fmt::Display for EnvironmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentMode::Local => f.write_str("LOCAL"),
            EnvironmentMode::Vm => f.write_str("VM"),
        }
    }
}

impl FromStr for EnvironmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(EnvironmentMode::Local),
            "VM" => Ok(EnvironmentMode::Vm),
            other => Err(format!("unknown environment mode '{other}' (expected LOCAL or VM)")),
        }
    }
}

/// Web-facing relay settings
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Delivery mode for `/stream`
    pub mode: DeliveryMode,
    /// Interval between parts in push mode
    pub push_interval: Duration,
    /// Upload body cap in bytes
    pub max_upload_bytes: usize,
    /// Directory served under `/view` (not mounted when `None`)
    pub view_path: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::default(),
            push_interval: DEFAULT_PUSH_INTERVAL,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            view_path: None,
        }
    }
}
