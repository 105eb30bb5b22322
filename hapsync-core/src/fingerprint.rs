//! Content fingerprints.
//!
//! The same digest is produced by `sha256sum` on the remote host, so local
//! and remote fingerprints are directly comparable.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 64;

/// Lowercase hex SHA-256 of `content`.
pub fn fingerprint(content: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(content);
    hex::encode(h.finalize())
}

/// Extract the digest from `sha256sum` output (`<digest>  <path>`).
///
/// Returns `None` unless the first 64 characters are hex digits.
pub fn parse_sha256sum(output: &str) -> Option<&str> {
    let digest = output.get(..FINGERPRINT_LEN)?;
    digest
        .chars()
        .all(|c| c.is_ascii_hexdigit())
        .then_some(digest)
}
