//! Framecast - single-camera JPEG relay
//!
//! A device uploads JPEG stills with a bearer token; browsers authenticated
//! with basic auth fetch the most recent one. `/stream` delivers it in one of
//! three modes selected by [`DeliveryMode`]:
//!
//! - **Push**: `multipart/x-mixed-replace` stream, one part per interval
//! - **Conditional**: single image with `ETag` / `If-None-Match`
//! - **Still**: single image, no cache negotiation
//!
//! Modules:
//!
//! - **`frame`** / **`store`**: the latest frame and its fingerprint
//! - **`auth`**: viewer (basic) and uploader (bearer) credential checks
//! - **`web`**: axum router, handlers, push stream

mod auth;
mod config;
mod error;
mod frame;
mod stats;
mod store;

pub mod web;

pub use auth::{basic_credentials, bearer_token, AuthGate, Credentials, VIEWER_REALM};
pub use config::{
    DeliveryMode, EnvironmentMode, RelayConfig, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PUSH_INTERVAL,
};
pub use error::{RelayError, Result};
pub use frame::{Fingerprint, Frame};
pub use stats::{AtomicRelayStats, RelayStats};
pub use store::FrameStore;
