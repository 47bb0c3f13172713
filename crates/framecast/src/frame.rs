//! Frame and fingerprint types

use std::time::Instant;

use bytes::Bytes;
use sha2::{Digest, Sha256};

/// Content hash of a frame's bytes, used as the HTTP cache validator.
///
/// Stored as the lowercase hex SHA-256 digest. On the wire it is rendered as a
/// strong entity tag (`"<hex>"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash the given bytes
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Lowercase hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted entity tag for the `ETag` response header
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Check an `If-None-Match` header value against this fingerprint.
    ///
    /// Accepts `*`, comma-separated lists, weak tags (`W/"..."`) and bare
    /// unquoted digests as sent by simple device clients.
    pub fn matches_if_none_match(&self, header: &str) -> bool {
        header.split(',').any(|candidate| {
            let candidate = candidate.trim();
            if candidate == "*" {
                return true;
            }
            let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
            let candidate = candidate
                .strip_prefix('"')
                .and_then(|c| c.strip_suffix('"'))
                .unwrap_or(candidate);
            !candidate.is_empty() && candidate.eq_ignore_ascii_case(&self.0)
        })
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The latest uploaded image.
///
/// Never mutated after construction; the store swaps whole frames. Cloning is
/// cheap since the payload is reference counted.
#[derive(Debug, Clone)]
pub struct Frame {
    /// JPEG bytes as uploaded
    pub bytes: Bytes,
    /// Hash of `bytes`
    pub fingerprint: Fingerprint,
    /// Upload number, starting at 1
    pub sequence: u64,
    /// When the store accepted this frame
    pub received_at: Instant,
}

impl Frame {
    /// Build a frame, hashing the payload
    pub fn new(bytes: Bytes, sequence: u64) -> Self {
        let fingerprint = Fingerprint::of(&bytes);
        Self {
            bytes,
            fingerprint,
            sequence,
            received_at: Instant::now(),
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_sha256_hex() {
        let fp = Fingerprint::of(b"abc");
        assert_eq!(
            fp.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(fp.to_string(), fp.as_str());
    }

    #[test]
    fn fingerprint_changes_with_content() {
        assert_ne!(Fingerprint::of(b"frame-1"), Fingerprint::of(b"frame-2"));
        assert_eq!(Fingerprint::of(b"same"), Fingerprint::of(b"same"));
    }

    #[test]
    fn etag_is_quoted() {
        let fp = Fingerprint::of(b"x");
        let etag = fp.etag();
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(&etag[1..etag.len() - 1], fp.as_str());
    }

    #[test]
    fn if_none_match_accepts_etag_forms() {
        let fp = Fingerprint::of(b"jpeg");
        assert!(fp.matches_if_none_match(&fp.etag()));
        assert!(fp.matches_if_none_match(fp.as_str()));
        assert!(fp.matches_if_none_match(&format!("W/{}", fp.etag())));
        assert!(fp.matches_if_none_match("*"));
        assert!(fp.matches_if_none_match(&format!("\"stale\", {}", fp.etag())));
        assert!(fp.matches_if_none_match(&fp.etag().to_uppercase()));
    }

    #[test]
    fn if_none_match_rejects_others() {
        let fp = Fingerprint::of(b"jpeg");
        let other = Fingerprint::of(b"other");
        assert!(!fp.matches_if_none_match(&other.etag()));
        assert!(!fp.matches_if_none_match(""));
        assert!(!fp.matches_if_none_match("\"\""));
        assert!(!fp.matches_if_none_match("W/"));
    }

    #[test]
    fn frame_hashes_payload() {
        let frame = Frame::new(Bytes::from_static(b"\xff\xd8jpeg"), 3);
        assert_eq!(frame.fingerprint, Fingerprint::of(b"\xff\xd8jpeg"));
        assert_eq!(frame.sequence, 3);
        assert_eq!(frame.len(), 6);
        assert!(!frame.is_empty());
    }
}
