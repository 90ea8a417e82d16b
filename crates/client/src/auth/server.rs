//! Descriptor of the OAuth issuer that mints Quantic access tokens

use serde::Deserialize;

/// Client ID registered for public Quantic installations.
pub const DEFAULT_CLIENT_ID: &str = "quantic-public-client";

/// Issuer URL of the production Quantic authorization server.
pub const DEFAULT_ISSUER: &str = "https://auth.quantic.cloud/oauth2/default";

/// An OAuth authorization server, identified by client ID and issuer URL.
///
/// Immutable value type with structural equality. The [`Default`] instance
/// points at the production Quantic issuer and is used whenever no override
/// is configured.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthServer {
    /// OAuth client ID presented to the issuer.
    pub client_id: String,
    /// Base URL of the issuer.
    pub issuer: String,
}

impl AuthServer {
    /// Create a new `AuthServer` descriptor.
    #[must_use]
    pub fn new(client_id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self { client_id: client_id.into(), issuer: issuer.into() }
    }

    /// The token endpoint derived from the issuer URL.
    #[must_use]
    pub(crate) fn token_url(&self) -> String {
        format!("{}/v1/token", self.issuer.trim_end_matches('/'))
    }
}

impl Default for AuthServer {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_ID, DEFAULT_ISSUER)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::server.
    use super::*;

    /// Validates `AuthServer::new` behavior for the structural equality
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms servers built from the same arguments compare equal.
    /// - Confirms servers differing in either field compare unequal.
    #[test]
    fn test_auth_server_structural_equality() {
        let server = AuthServer::new("id-a", "issuer-a");

        assert_eq!(server, AuthServer::new("id-a", "issuer-a"));
        assert_ne!(server, AuthServer::new("id-b", "issuer-a"));
        assert_ne!(server, AuthServer::new("id-a", "issuer-b"));
    }

    /// Validates `AuthServer::token_url` behavior for the endpoint
    /// derivation scenario.
    ///
    /// Assertions:
    /// - Confirms the token endpoint is the issuer plus `/v1/token`.
    /// - Confirms a trailing slash on the issuer does not double up.
    #[test]
    fn test_token_url_derivation() {
        let server = AuthServer::new("id", "https://auth.example.com");
        assert_eq!(server.token_url(), "https://auth.example.com/v1/token");

        let trailing = AuthServer::new("id", "https://auth.example.com/");
        assert_eq!(trailing.token_url(), "https://auth.example.com/v1/token");
    }

    /// Validates `AuthServer::default` behavior for the well-known issuer
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the default client ID and issuer constants are used.
    #[test]
    fn test_auth_server_default() {
        let server = AuthServer::default();
        assert_eq!(server.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(server.issuer, DEFAULT_ISSUER);
    }
}
