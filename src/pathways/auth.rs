//! Transformer webhook authentication.
//!
//! The platform sends the shared transformer secret verbatim in the
//! `X-Secret` header. A delivery is authentic only if the header equals the
//! configured secret exactly.
//!
//! The comparison must not leak how many leading bytes matched, so both
//! values are reduced to HMAC-SHA256 tags over a fixed message and compared
//! with the HMAC library's constant-time check. Lengths are compared first:
//! HMAC zero-pads short keys, so equal tags alone would not imply equal
//! secrets of different lengths.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the transformer secret.
pub const HEADER_SECRET: &str = "x-secret";

/// Fixed message both sides are tagged over.
const TAG_MESSAGE: &[u8] = b"transformer-secret-check";

/// The shared secret the platform presents on every transformer delivery.
#[derive(Clone)]
pub struct TransformerSecret(Vec<u8>);

impl TransformerSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        TransformerSecret(secret.into())
    }

    /// Returns `true` if `provided` equals this secret exactly.
    pub fn verify(&self, provided: &str) -> bool {
        verify_secret(provided.as_bytes(), &self.0)
    }
}

impl fmt::Debug for TransformerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransformerSecret(<redacted>)")
    }
}

/// Computes the comparison tag for a secret.
fn secret_tag(secret: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(TAG_MESSAGE);
    Some(mac)
}

/// Compares a provided secret against the expected one.
///
/// Never panics; any internal failure is treated as a mismatch.
pub fn verify_secret(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }

    let (Some(expected_mac), Some(provided_mac)) = (secret_tag(expected), secret_tag(provided))
    else {
        return false;
    };
    let expected_tag = expected_mac.finalize().into_bytes();

    // Constant-time comparison via the HMAC library
    provided_mac.verify_slice(&expected_tag).is_ok()
}
