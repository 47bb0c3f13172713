//! Framecast Server: relays the latest camera still to browsers
//!
//! Accepts JPEG uploads from the camera device on `/upload` and serves them to
//! basic-auth viewers on `/stream`, plus the static viewer page under `/view`.
//! TLS is terminated in front of the relay.
//!
//! ## Usage
//!
//! ```bash
//! # Credentials are required
//! export VIEWER_USERNAME=me VIEWER_PASSWORD=secret UPLOADER_API_KEY=device-key
//! framecast-server
//!
//! # Conditional-GET stills instead of the MJPEG push stream
//! FRAMECAST_DELIVERY_MODE=conditional framecast-server
//!
//! # Faster push interval, custom port
//! FRAMECAST_PUSH_INTERVAL_MS=500 FRAMECAST_PORT=8080 framecast-server
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use framecast::web::{self, WebState};
use framecast::{
    AuthGate, Credentials, DeliveryMode, EnvironmentMode, FrameStore, RelayConfig,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PUSH_INTERVAL,
};

/// Server configuration from environment
struct Config {
    credentials: Credentials,
    environment: EnvironmentMode,
    cert_dir: PathBuf,
    port: u16,
    relay: RelayConfig,
}

impl Config {
    fn from_env() -> Result<Self> {
        let credentials = Credentials {
            viewer_username: required("VIEWER_USERNAME")?,
            viewer_password: required("VIEWER_PASSWORD")?,
            uploader_api_key: required("UPLOADER_API_KEY")?,
        };

        let environment: EnvironmentMode = parsed("ENVIRONMENT_MODE")?.unwrap_or_default();

        let cert_dir = std::env::var("FRAMECAST_CERT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| environment.certificate_dir());

        let port: u16 = parsed("FRAMECAST_PORT")?.unwrap_or(8443);

        let mode: DeliveryMode = parsed("FRAMECAST_DELIVERY_MODE")?.unwrap_or_default();

        let push_interval = match parsed::<u64>("FRAMECAST_PUSH_INTERVAL_MS")? {
            Some(0) => bail!("FRAMECAST_PUSH_INTERVAL_MS must be greater than zero"),
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_PUSH_INTERVAL,
        };

        let max_upload_bytes: usize =
            parsed("FRAMECAST_MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let view_path = std::env::var("FRAMECAST_VIEW_PATH")
            .map(PathBuf::from)
            .ok()
            .or_else(|| {
                // Auto-detect: check common locations relative to the working directory
                let candidates = ["./public", "./apps/framecast-server/public"];
                candidates.iter().map(PathBuf::from).find(|p| p.exists())
            });

        Ok(Self {
            credentials,
            environment,
            cert_dir,
            port,
            relay: RelayConfig {
                mode,
                push_interval,
                max_upload_bytes,
                view_path,
            },
        })
    }
}

/// Read a variable that must be present and non-empty
fn required(name: &str) -> Result<String> {
    let value =
        std::env::var(name).with_context(|| format!("{name} environment variable not set"))?;
    if value.is_empty() {
        bail!("{name} must not be empty");
    }
    Ok(value)
}

/// Parse an optional variable; present-but-invalid is an error
fn parsed<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {name} '{raw}': {e}")),
        Err(_) => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    init_logging();

    let config = Config::from_env()?;

    info!("Framecast Server starting");
    info!("  Environment: {}", config.environment);
    info!("  Certificate dir: {:?} (TLS terminated upstream)", config.cert_dir);
    info!("  Port: {}", config.port);
    info!("  Delivery mode: {}", config.relay.mode);
    if config.relay.mode == DeliveryMode::Push {
        info!("  Push interval: {} ms", config.relay.push_interval.as_millis());
    }
    info!("  Upload limit: {} bytes", config.relay.max_upload_bytes);
    match config.relay.view_path {
        Some(ref path) => info!("  View path: {:?}", path),
        None => warn!("  View path: none (set FRAMECAST_VIEW_PATH to serve the viewer page)"),
    }

    let store = FrameStore::new();
    let gate = AuthGate::new(config.credentials);

    // Graceful shutdown
    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();

    let state = WebState::new(store, gate, config.relay, cancel.clone());

    // Spawn web server
    let web_state = Arc::clone(&state);
    let web_bind = SocketAddr::from(([0, 0, 0, 0], config.port));
    let web_cancel = cancel.clone();
    tracker.spawn(async move {
        if let Err(e) = web::start(web_bind, web_state).await {
            error!("Web server error: {}", e);
            web_cancel.cancel();
        }
        info!("Web server: stopped");
    });

    tracker.close();

    run_headless(state, cancel, tracker).await
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framecast=info,framecast_server=info,tower_http=info".into()),
        )
        .init();
}

/// Log stats periodically, shut down on Ctrl-C or web server failure
async fn run_headless(
    state: Arc<WebState>,
    cancel: CancellationToken,
    tracker: TaskTracker,
) -> Result<()> {
    info!("Waiting for uploads...");
    let mut stats_interval = interval(Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                cancel.cancel();
                break;
            }
            _ = cancel.cancelled() => break,
            _ = stats_interval.tick() => {
                let stats = state.stats.snapshot();
                let frame = match state.store.get() {
                    Some(frame) => format!(
                        "frame #{} ({} bytes, {}s old)",
                        frame.sequence,
                        frame.len(),
                        frame.received_at.elapsed().as_secs()
                    ),
                    None => "no frame yet".to_string(),
                };
                info!(
                    "Stats: {}, {} uploads ({} rejected), {} stills, {} not modified, {} push viewers",
                    frame, stats.uploads_accepted, stats.uploads_rejected,
                    stats.stills_served, stats.not_modified, stats.viewers_active
                );
            }
        }
    }

    if tokio::time::timeout(Duration::from_secs(5), tracker.wait()).await.is_err() {
        warn!("Shutdown timed out after 5s");
    }
    Ok(())
}
