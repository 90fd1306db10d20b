//! Client address resolution from proxy headers.
//!
//! The collector runs behind at least one reverse proxy, so the socket peer
//! address is never the browser. Headers are consulted in a fixed priority
//! order. Values are not checked for IP syntax: a malformed address is hashed
//! like any other rather than failing collection. Bytes that are not valid
//! UTF-8 are replaced with U+FFFD, so a value is never dropped for its bytes.

use std::borrow::Cow;

use axum::http::HeaderMap;

/// Returned when no proxy header identifies the client.
pub const UNKNOWN_CLIENT: &str = "unknown";

const HEADER_FORWARDED_FOR: &str = "x-forwarded-for";
const HEADER_REAL_IP: &str = "x-real-ip";
const HEADER_CF_CONNECTING_IP: &str = "cf-connecting-ip";
const HEADER_USER_AGENT: &str = "user-agent";

/// Resolves the originating client address.
///
/// Priority: first entry of `X-Forwarded-For`, then `X-Real-IP`, then
/// `CF-Connecting-IP`, then [`UNKNOWN_CLIENT`]. Empty headers are skipped.
pub fn resolve_client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, HEADER_FORWARDED_FOR) {
        // "client, proxy1, proxy2"
        let first = forwarded.split(',').next().unwrap_or_default();
        return first.trim().to_string();
    }

    [HEADER_REAL_IP, HEADER_CF_CONNECTING_IP]
        .into_iter()
        .find_map(|name| header_str(headers, name))
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Resolves the `User-Agent`, falling back to [`UNKNOWN_CLIENT`].
pub fn resolve_user_agent(headers: &HeaderMap) -> String {
    header_str(headers, HEADER_USER_AGENT)
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), Cow::into_owned)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<Cow<'a, str>> {
    headers
        .get(name)
        .filter(|v| !v.is_empty())
        .map(|v| String::from_utf8_lossy(v.as_bytes()))
}
