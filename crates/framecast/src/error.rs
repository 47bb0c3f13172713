//! Request errors and their HTTP responses

use axum::http::header::WWW_AUTHENTICATE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::auth::VIEWER_REALM;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Failures that end a single request.
///
/// Bodies are short plain text. Auth failures never say which part of the
/// credential was wrong.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Missing or wrong viewer basic-auth credentials
    #[error("Unauthorized")]
    ViewerUnauthorized,

    /// Missing or wrong uploader bearer token
    #[error("Unauthorized")]
    UploaderUnauthorized,

    /// Nothing has been uploaded yet
    #[error("No frame yet")]
    NoFrameYet,

    /// Upload body was not `image/jpeg`
    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    /// Upload body was empty
    #[error("Empty frame")]
    EmptyFrame,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::ViewerUnauthorized | RelayError::UploaderUnauthorized => {
                StatusCode::UNAUTHORIZED
            }
            RelayError::NoFrameYet => StatusCode::NOT_FOUND,
            RelayError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RelayError::EmptyFrame => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.to_string();
        match self {
            RelayError::ViewerUnauthorized => (
                status,
                [(WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", VIEWER_REALM))],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
