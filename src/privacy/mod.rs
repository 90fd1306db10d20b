//! Privacy-preserving visitor identity.
//!
//! This module provides:
//! - Daily salt rotation from an injected master secret
//! - One-way, day-scoped visitor hashes
//! - Client address resolution from proxy headers
//!
//! Raw IP addresses and user agents enter this module and leave only as a
//! [`VisitorHash`].

pub mod client_ip;
pub mod salt;
pub mod visitor;

pub use client_ip::{UNKNOWN_CLIENT, resolve_client_ip, resolve_user_agent};
pub use salt::{
    DailySalt, MasterSecret, MasterSecretTooShort, RotationInfo, SaltClock, rotation_date,
};
pub use visitor::{InvalidVisitorHash, VisitorHash};
