//! Token cache entry and token-endpoint wire types

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::secret::Secret;

/// Lead time, in seconds, subtracted from a token's expiry when deciding
/// staleness. A token inside this margin is refreshed before it can expire
/// mid-flight on the wire.
pub const EXPIRY_SAFETY_MARGIN_SECONDS: i64 = 30;

/// A cached set of OAuth tokens.
///
/// Holds the bearer access token, its absolute expiry (if known), and the
/// refresh token currently associated with the session (if any). Mutated
/// only by a refresh; read by the token accessors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tokens {
    /// The bearer token attached to outgoing requests.
    pub access_token: Secret,
    /// Absolute expiry of the access token. `None` means the expiry is
    /// unknown and the token is treated as stale at its next observation.
    pub expires_at: Option<DateTime<Utc>>,
    /// The refresh token, when the active credential strategy carries one.
    pub refresh_token: Option<Secret>,
}

impl Tokens {
    /// Create a token set, converting a relative `expires_in` (seconds) into
    /// an absolute expiry stamped at the current time.
    #[must_use]
    pub fn new(access_token: Secret, expires_in: Option<i64>, refresh_token: Option<Secret>) -> Self {
        let expires_at = expires_in.map(|seconds| Utc::now() + Duration::seconds(seconds));
        Self { access_token, expires_at, refresh_token }
    }

    /// Whether the access token is still valid for at least `margin_seconds`.
    ///
    /// Returns `false` when no expiry is known: a token of unknown lifetime
    /// is never trusted past the request that produced it.
    #[must_use]
    pub fn is_fresh(&self, margin_seconds: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Utc::now() + Duration::seconds(margin_seconds) < expires_at)
    }
}

/// Token-endpoint response body (RFC 6749 §5.1).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: Secret,
    #[serde(default)]
    pub(crate) refresh_token: Option<Secret>,
    #[serde(default)]
    pub(crate) expires_in: Option<i64>,
}

/// Token-endpoint error body (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub(crate) error: String,
}
