//! `GET /stream`: serves the stored frame in the configured delivery mode.
//!
//! Viewer auth is enforced by the router's middleware before this runs.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::{mjpeg, WebState};
use crate::error::{RelayError, Result};
use crate::stats::AtomicRelayStats;
use crate::DeliveryMode;

const IMAGE_JPEG: &str = "image/jpeg";

pub async fn stream(State(state): State<Arc<WebState>>, headers: HeaderMap) -> Result<Response> {
    match state.config.mode {
        DeliveryMode::Push => push(&state),
        DeliveryMode::Conditional => conditional(&state, &headers),
        DeliveryMode::Still => still(&state),
    }
}

/// Long-lived multipart response; 404 if nothing has been uploaded yet.
fn push(state: &WebState) -> Result<Response> {
    if state.store.is_empty() {
        return Err(RelayError::NoFrameYet);
    }

    let body = mjpeg::push_stream(
        state.store.clone(),
        state.config.push_interval,
        &state.shutdown,
        Arc::clone(&state.stats),
    );

    Ok((
        [
            (CONTENT_TYPE, mjpeg::CONTENT_TYPE),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Single image revalidated with `If-None-Match`.
fn conditional(state: &WebState, headers: &HeaderMap) -> Result<Response> {
    let frame = state.store.get().ok_or(RelayError::NoFrameYet)?;
    let etag = frame.fingerprint.etag();

    let fresh = headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| frame.fingerprint.matches_if_none_match(v));

    if fresh {
        AtomicRelayStats::incr(&state.stats.not_modified);
        debug!(sequence = frame.sequence, "Frame not modified");
        return Ok((StatusCode::NOT_MODIFIED, [(ETAG, etag)]).into_response());
    }

    AtomicRelayStats::incr(&state.stats.stills_served);
    Ok((
        [
            (CONTENT_TYPE, IMAGE_JPEG.to_string()),
            (CACHE_CONTROL, "no-cache".to_string()),
            (ETAG, etag),
        ],
        frame.bytes,
    )
        .into_response())
}

/// Single image, no cache negotiation.
fn still(state: &WebState) -> Result<Response> {
    let frame = state.store.get().ok_or(RelayError::NoFrameYet)?;
    AtomicRelayStats::incr(&state.stats.stills_served);
    Ok(([(CONTENT_TYPE, IMAGE_JPEG)], frame.bytes).into_response())
}
