//! Visitor hash derivation.
//!
//! A visitor hash is `SHA256("<ip>:<user agent>:<daily salt>")`. The same
//! browser on the same network yields the same hash for one UTC day only;
//! once the salt rotates, the hash can no longer be linked to the inputs.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::salt::SaltClock;

/// Length of a visitor hash in hex characters.
pub const VISITOR_HASH_LEN: usize = 64;

/// Number of characters shown when a hash is logged.
pub const VISITOR_HASH_PREFIX_LEN: usize = 8;

/// The value is not 64 lowercase hex characters.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("visitor hash must be {VISITOR_HASH_LEN} lowercase hex characters")]
pub struct InvalidVisitorHash;

/// A day-scoped, one-way visitor identifier (64 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VisitorHash(String);

impl VisitorHash {
    /// Parses an already-derived hash, e.g. from a webhook payload.
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidVisitorHash> {
        let s = s.into();
        let well_formed = s.len() == VISITOR_HASH_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if well_formed {
            Ok(VisitorHash(s))
        } else {
            Err(InvalidVisitorHash)
        }
    }

    /// The full 64-character hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The short form used in logs.
    pub fn prefix(&self) -> &str {
        &self.0[..VISITOR_HASH_PREFIX_LEN]
    }
}

impl fmt::Display for VisitorHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for VisitorHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        VisitorHash::parse(s).map_err(serde::de::Error::custom)
    }
}

impl SaltClock {
    /// Derives the visitor hash for `ip` and `user_agent` on a UTC date.
    ///
    /// The raw inputs are consumed here and nowhere else; callers must not
    /// log or forward them.
    pub fn visitor_hash(&self, ip: &str, user_agent: &str, date: NaiveDate) -> VisitorHash {
        let salt = self.daily_salt(date);
        let mut hasher = Sha256::new();
        hasher.update(ip.as_bytes());
        hasher.update(b":");
        hasher.update(user_agent.as_bytes());
        hasher.update(b":");
        hasher.update(salt.as_hex().as_bytes());
        VisitorHash(hex::encode(hasher.finalize()))
    }
}
