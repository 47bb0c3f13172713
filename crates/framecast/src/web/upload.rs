//! `POST /upload`: the device pushes a new JPEG still.
//!
//! The body cap is applied by the router (`DefaultBodyLimit`), so oversized
//! uploads are rejected with 413 before this handler runs.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use tracing::{debug, warn};

use super::WebState;
use crate::error::{RelayError, Result};
use crate::stats::AtomicRelayStats;

pub const UPLOAD_ACK: &str = "Frame received";

pub async fn upload(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str> {
    let result = accept(&state, &headers, body);
    if result.is_err() {
        AtomicRelayStats::incr(&state.stats.uploads_rejected);
    }
    result
}

fn accept(state: &WebState, headers: &HeaderMap, body: Bytes) -> Result<&'static str> {
    if !state.gate.uploader_authorized(headers) {
        warn!("Upload rejected: bad or missing API key");
        return Err(RelayError::UploaderUnauthorized);
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !is_jpeg(content_type) {
        debug!(content_type, "Upload rejected: not image/jpeg");
        return Err(RelayError::UnsupportedMediaType(if content_type.is_empty() {
            "none".to_string()
        } else {
            content_type.to_string()
        }));
    }

    if body.is_empty() {
        return Err(RelayError::EmptyFrame);
    }

    let frame = state.store.set(body);
    AtomicRelayStats::incr(&state.stats.uploads_accepted);
    debug!(
        sequence = frame.sequence,
        bytes = frame.len(),
        fingerprint = %frame.fingerprint,
        "Frame received"
    );
    Ok(UPLOAD_ACK)
}

/// `image/jpeg`, ignoring parameters and case
fn is_jpeg(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("image/jpeg"))
}
