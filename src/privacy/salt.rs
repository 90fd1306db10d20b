//! Daily salt rotation.
//!
//! The salt is `SHA256("<YYYY-MM-DD>:<master secret>")`, recomputed on demand
//! from the UTC calendar date. It changes at every UTC midnight, which bounds
//! how long a visitor hash stays linkable to a single day. The salt is never
//! stored, and only an 8-character prefix may leave this module.

use std::fmt;

use chrono::{DateTime, Days, NaiveDate, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Minimum length, in characters, of the master secret.
pub const MIN_MASTER_SECRET_LEN: usize = 32;

/// Number of salt hex characters exposed for monitoring.
pub const SALT_PREFIX_LEN: usize = 8;

/// The master secret is shorter than [`MIN_MASTER_SECRET_LEN`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("SECRET_KEY must be at least {MIN_MASTER_SECRET_LEN} characters (got {0})")]
pub struct MasterSecretTooShort(pub usize);

/// The long-lived secret all daily salts are derived from.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterSecret(String);

impl MasterSecret {
    /// Fails when `secret` is shorter than the minimum length.
    pub fn new(secret: impl Into<String>) -> Result<Self, MasterSecretTooShort> {
        let secret = secret.into();
        let len = secret.chars().count();
        if len < MIN_MASTER_SECRET_LEN {
            return Err(MasterSecretTooShort(len));
        }
        Ok(MasterSecret(secret))
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(<redacted>)")
    }
}

/// A salt valid for one UTC calendar day, as 64 lowercase hex characters.
#[derive(Clone, PartialEq, Eq)]
pub struct DailySalt(String);

impl DailySalt {
    /// Returns the first [`SALT_PREFIX_LEN`] hex characters.
    pub fn prefix(&self) -> &str {
        &self.0[..SALT_PREFIX_LEN]
    }

    pub(crate) fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DailySalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DailySalt({}...)", self.prefix())
    }
}

/// Formats a date the way it is mixed into the salt and recorded on events.
pub fn rotation_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Monitoring view of the current salt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationInfo {
    pub current_salt_prefix: String,
    #[serde(serialize_with = "serialize_millis")]
    pub next_rotation_at: DateTime<Utc>,
    pub seconds_until_rotation: i64,
}

fn serialize_millis<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Derives daily salts from an injected master secret.
#[derive(Debug, Clone)]
pub struct SaltClock {
    secret: MasterSecret,
}

impl SaltClock {
    /// Derives every daily salt from `secret`.
    pub fn new(secret: MasterSecret) -> Self {
        SaltClock { secret }
    }

    /// Computes the salt for a UTC calendar date.
    pub fn daily_salt(&self, date: NaiveDate) -> DailySalt {
        let mut hasher = Sha256::new();
        hasher.update(rotation_date(date).as_bytes());
        hasher.update(b":");
        hasher.update(self.secret.expose().as_bytes());
        DailySalt(hex::encode(hasher.finalize()))
    }

    /// Describes the salt in force at `now` and when it will be replaced.
    ///
    /// The next rotation is the first UTC midnight strictly after `now`;
    /// the remaining time is truncated to whole seconds.
    pub fn rotation_info(&self, now: DateTime<Utc>) -> RotationInfo {
        let today = now.date_naive();
        let next_rotation_at = next_midnight(today);
        let seconds_until_rotation = (next_rotation_at - now).num_seconds();

        RotationInfo {
            current_salt_prefix: self.daily_salt(today).prefix().to_string(),
            next_rotation_at,
            seconds_until_rotation,
        }
    }
}

fn next_midnight(date: NaiveDate) -> DateTime<Utc> {
    // `checked_add_days` only fails at the end of chrono's supported range.
    let tomorrow = date.checked_add_days(Days::new(1)).unwrap_or(date);
    tomorrow.and_time(chrono::NaiveTime::MIN).and_utc()
}
