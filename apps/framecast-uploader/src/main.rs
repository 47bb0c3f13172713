//! Framecast Uploader: stands in for the camera device
//!
//! Posts a JPEG file to a framecast relay's `/upload` endpoint on an interval.
//! The file is re-read before every upload, so a capture process can keep
//! overwriting it.
//!
//! ## Usage
//!
//! ```bash
//! export UPLOADER_API_KEY=device-key
//!
//! # Upload ./frame.jpg every 2 seconds to the local relay
//! framecast-uploader ./frame.jpg
//!
//! # One shot against a remote relay
//! FRAMECAST_UPLOAD_URL=https://cam.example.net/upload framecast-uploader ./frame.jpg --once
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Uploader configuration from environment/args
struct Config {
    url: String,
    api_key: String,
    interval: Duration,
    path: PathBuf,
    once: bool,
}

impl Config {
    fn from_env() -> Result<Self> {
        let url = std::env::var("FRAMECAST_UPLOAD_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8443/upload".to_string());

        let api_key = std::env::var("UPLOADER_API_KEY")
            .context("UPLOADER_API_KEY environment variable not set")?;

        let interval_ms: u64 = match std::env::var("FRAMECAST_UPLOAD_INTERVAL_MS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid FRAMECAST_UPLOAD_INTERVAL_MS '{raw}'"))?,
            Err(_) => 2000,
        };
        if interval_ms == 0 {
            bail!("FRAMECAST_UPLOAD_INTERVAL_MS must be greater than zero");
        }

        let args: Vec<String> = std::env::args().skip(1).collect();
        let once = args.iter().any(|arg| arg == "--once");
        let path = args
            .iter()
            .find(|arg| !arg.starts_with("--"))
            .map(PathBuf::from)
            .context("Usage: framecast-uploader <frame.jpg> [--once]")?;

        Ok(Self {
            url,
            api_key,
            interval: Duration::from_millis(interval_ms),
            path,
            once,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framecast_uploader=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;

    info!("Uploading {:?} to {}", config.path, config.url);

    if config.once {
        return upload(&client, &config).await;
    }

    info!("  Interval: {} ms", config.interval.as_millis());
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent = 0u64;
    let mut failed = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping: {} frames sent, {} failed", sent, failed);
                return Ok(());
            }
            _ = ticker.tick() => {
                match upload(&client, &config).await {
                    Ok(()) => sent += 1,
                    Err(e) => {
                        failed += 1;
                        warn!("Upload failed: {:#}", e);
                    }
                }
            }
        }
    }
}

/// Read the file and post it once
async fn upload(client: &reqwest::Client, config: &Config) -> Result<()> {
    let body = tokio::fs::read(&config.path)
        .await
        .with_context(|| format!("Failed to read {:?}", config.path))?;
    if body.is_empty() {
        bail!("{:?} is empty", config.path);
    }
    let len = body.len();

    client
        .post(&config.url)
        .bearer_auth(&config.api_key)
        .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
        .body(body)
        .send()
        .await
        .context("Failed to send frame")?
        .error_for_status()
        .context("Relay rejected frame")?;

    debug!(bytes = len, "Frame uploaded");
    Ok(())
}
