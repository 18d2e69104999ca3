//! Idempotency key extraction from request headers.

use fieldline_core::constants::IDEMPOTENCY_KEY_HEADERS;
use http::HeaderMap;

/// ## Summary
/// Reads a client-supplied idempotency key from `Idempotency-Key`, falling
/// back to `X-Idempotency-Key`. Absence (or an empty/non-ASCII value) is
/// not an error; it simply disables deduplication for the call.
#[must_use]
pub fn extract_idempotency_key(headers: &HeaderMap) -> Option<String> {
    IDEMPOTENCY_KEY_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    })
}
