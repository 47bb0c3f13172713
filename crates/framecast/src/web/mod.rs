//! Web server module: axum HTTP surface of the relay.
//!
//! - `GET /` - redirect to `/view/`
//! - `GET /view/*` - static viewer assets (viewer auth)
//! - `GET /stream` - latest frame in the configured delivery mode (viewer auth)
//! - `POST /upload` - new frame from the device (bearer token)
//! - `GET /api/status` - counters and frame info (viewer auth)

pub mod mjpeg;
pub mod stream;
pub mod upload;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::stats::AtomicRelayStats;
use crate::{AuthGate, FrameStore, RelayConfig};

/// Shared state for the web server
pub struct WebState {
    pub store: FrameStore,
    pub gate: AuthGate,
    pub config: RelayConfig,
    pub stats: Arc<AtomicRelayStats>,
    /// Cancelled on server shutdown; push streams listen on children of it
    pub shutdown: CancellationToken,
    pub start_time: Instant,
}

impl WebState {
    pub fn new(
        store: FrameStore,
        gate: AuthGate,
        config: RelayConfig,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            gate,
            config,
            stats: Arc::new(AtomicRelayStats::new()),
            shutdown,
            start_time: Instant::now(),
        })
    }
}

/// Build the relay router.
///
/// `/` is registered here, before anything is served.
pub fn router(state: Arc<WebState>) -> Router {
    let mut viewer = Router::new()
        .route("/stream", get(stream::stream))
        .route("/api/status", get(api_status));

    match state.config.view_path {
        Some(ref path) if path.exists() => {
            info!("Serving viewer assets from {:?}", path);
            viewer = viewer.nest_service("/view", ServeDir::new(path));
        }
        Some(ref path) => {
            warn!("View path {:?} does not exist, skipping static file serving", path);
        }
        None => {}
    }

    let viewer = viewer.route_layer(middleware::from_fn_with_state(
        Arc::clone(&state),
        require_viewer,
    ));

    let uploader = Router::new()
        .route("/upload", post(upload::upload))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    Router::new()
        .route("/", get(|| async { Redirect::to("/view/") }))
        .merge(viewer)
        .merge(uploader)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already-bound listener until `state.shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: Arc<WebState>) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Bind and serve.
pub async fn start(bind: SocketAddr, state: Arc<WebState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(
        mode = %state.config.mode,
        "Relay listening on http://{}",
        listener.local_addr()?
    );
    serve(listener, state).await
}

/// Basic-auth gate for viewer routes
async fn require_viewer(
    State(state): State<Arc<WebState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.gate.viewer_authorized(request.headers()) {
        next.run(request).await
    } else {
        debug!(path = %request.uri().path(), "Viewer auth failed");
        RelayError::ViewerUnauthorized.into_response()
    }
}

/// GET /api/status - relay counters and current frame info
async fn api_status(State(state): State<Arc<WebState>>) -> Json<serde_json::Value> {
    let stats = state.stats.snapshot();
    let frame = state.store.get();

    Json(serde_json::json!({
        "mode": state.config.mode.as_str(),
        "push_interval_ms": state.config.push_interval.as_millis() as u64,
        "frame_present": frame.is_some(),
        "frame_sequence": frame.as_ref().map(|f| f.sequence),
        "frame_bytes": frame.as_ref().map(|f| f.len()),
        "frame_age_ms": frame.as_ref().map(|f| f.received_at.elapsed().as_millis() as u64),
        "uploads_accepted": stats.uploads_accepted,
        "uploads_rejected": stats.uploads_rejected,
        "stills_served": stats.stills_served,
        "not_modified": stats.not_modified,
        "viewers_active": stats.viewers_active,
        "viewers_total": stats.viewers_total,
        "parts_pushed": stats.parts_pushed,
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}
