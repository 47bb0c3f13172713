//! Viewer and uploader credential checks
//!
//! Viewers authenticate with HTTP Basic credentials, uploaders with a static
//! bearer token. Both comparisons run in constant time. A missing or malformed
//! `Authorization` header is treated exactly like a wrong credential.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use subtle::ConstantTimeEq;

/// Realm sent in the viewer `WWW-Authenticate` challenge
pub const VIEWER_REALM: &str = "framecast";

/// Static credentials loaded once at startup
#[derive(Clone)]
pub struct Credentials {
    pub viewer_username: String,
    pub viewer_password: String,
    pub uploader_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("viewer_username", &self.viewer_username)
            .field("viewer_password", &"<redacted>")
            .field("uploader_api_key", &"<redacted>")
            .finish()
    }
}

/// Shared, immutable credential checker
#[derive(Debug, Clone)]
pub struct AuthGate {
    credentials: Arc<Credentials>,
}

impl AuthGate {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Arc::new(credentials),
        }
    }

    /// True iff both user and password match the configured viewer
    pub fn check_viewer(&self, user: &str, pass: &str) -> bool {
        let user_ok = secret_eq(user, &self.credentials.viewer_username);
        let pass_ok = secret_eq(pass, &self.credentials.viewer_password);
        // Non-short-circuit: both comparisons always run
        user_ok & pass_ok
    }

    /// True iff the token equals the configured API key
    pub fn check_uploader(&self, token: &str) -> bool {
        secret_eq(token, &self.credentials.uploader_api_key)
    }

    /// Check the `Authorization: Basic` header of a viewer request
    pub fn viewer_authorized(&self, headers: &HeaderMap) -> bool {
        basic_credentials(headers).is_some_and(|(user, pass)| self.check_viewer(&user, &pass))
    }

    /// Check the `Authorization: Bearer` header of an upload request
    pub fn uploader_authorized(&self, headers: &HeaderMap) -> bool {
        bearer_token(headers).is_some_and(|token| self.check_uploader(token))
    }
}

/// Constant-time string comparison. An empty configured secret never matches.
fn secret_eq(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Split `"<scheme> <param>"`, matching the scheme case-insensitively.
fn authorization_param<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (given, param) = value.split_once(' ')?;
    if !given.eq_ignore_ascii_case(scheme) {
        return None;
    }
    let param = param.trim();
    (!param.is_empty()).then_some(param)
}

/// Decode `Authorization: Basic <base64(user:pass)>`.
///
/// The password may contain `:`; only the first one separates the fields.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let encoded = authorization_param(headers, "Basic")?;
    let decoded = BASE64_STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    authorization_param(headers, "Bearer")
}
