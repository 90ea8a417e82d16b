//! Credential strategies used to obtain and refresh access tokens
//!
//! Each [`CredentialPayload`] variant is one mutually exclusive way of
//! acquiring a bearer token:
//! - `RefreshToken`: exchange a stored refresh token at the issuer's token
//!   endpoint,
//! - `ClientCredentials`: machine-to-machine client-credentials grant,
//! - `ExternallyManaged`: defer to a caller-supplied refresh function; the
//!   engine itself performs no network call.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use reqwest::Client;
use tracing::debug;

use super::secret::Secret;
use super::server::AuthServer;
use super::types::{TokenErrorResponse, TokenResponse, Tokens};

/// Error type for token acquisition and refresh.
///
/// `Clone` so a single failed refresh can be handed to every caller waiting
/// on that attempt. Messages reference field names and status codes, never
/// secret values.
#[derive(Clone, Debug)]
pub enum AuthenticationError {
    /// The active credential strategy has no usable material.
    Misconfigured {
        /// Name of the empty or missing credential field.
        field: &'static str,
    },

    /// The token endpoint could not be reached.
    Transport {
        /// Description of the underlying transport failure.
        message: String,
    },

    /// The auth server answered the token request with a non-success status.
    Rejected {
        /// HTTP status code returned by the token endpoint.
        status: u16,
        /// OAuth error code from the response body, when one was supplied.
        error_code: Option<String>,
    },

    /// The token response body could not be decoded.
    InvalidResponse {
        /// Description of the decoding failure.
        message: String,
    },

    /// An externally managed refresh function failed.
    External(String),
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misconfigured { field } => {
                write!(f, "no usable credential: field `{field}` is empty or missing")
            }
            Self::Transport { message } => {
                write!(f, "could not reach the token endpoint: {message}")
            }
            Self::Rejected { status, error_code } => {
                let code = error_code.as_deref().unwrap_or("no error code");
                write!(f, "auth server rejected the token request with status {status} ({code})")
            }
            Self::InvalidResponse { message } => {
                write!(f, "could not decode the token response: {message}")
            }
            Self::External(message) => {
                write!(f, "externally managed refresh failed: {message}")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

impl AuthenticationError {
    fn transport(err: &reqwest::Error) -> Self {
        Self::Transport { message: err.to_string() }
    }

    fn invalid_response(err: &reqwest::Error) -> Self {
        Self::InvalidResponse { message: err.to_string() }
    }
}

/// Future returned by an externally managed refresh function.
pub type RefreshResult =
    Pin<Box<dyn Future<Output = Result<String, Box<dyn std::error::Error + Send + Sync>>> + Send>>;

/// A caller-supplied function that produces a fresh access token for the
/// given [`AuthServer`].
pub type RefreshFunction = Box<dyn Fn(AuthServer) -> RefreshResult + Send + Sync>;

/// Access-token source backed by a caller-supplied refresh function.
///
/// Lets applications that already manage their own token lifecycle plug
/// into the session without the engine contacting any server directly.
#[derive(Clone)]
pub struct ExternallyManaged {
    refresh_function: Arc<RefreshFunction>,
}

impl ExternallyManaged {
    /// Create an externally managed source from an already-boxed refresh
    /// function. [`ExternallyManaged::from_async`] and
    /// [`ExternallyManaged::from_sync`] are usually more convenient.
    #[must_use]
    pub fn new(
        refresh_function: impl Fn(AuthServer) -> RefreshResult + Send + Sync + 'static,
    ) -> Self {
        Self { refresh_function: Arc::new(Box::new(refresh_function)) }
    }

    /// Create an externally managed source from an async function or
    /// closure, handling the boxing and pinning internally.
    ///
    /// # Examples
    /// ```
    /// use quantic_client::auth::{AuthServer, ExternallyManaged};
    ///
    /// async fn fetch_token(
    ///     _auth_server: AuthServer,
    /// ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    ///     Ok("token-from-elsewhere".to_string())
    /// }
    ///
    /// let source = ExternallyManaged::from_async(fetch_token);
    /// ```
    #[must_use]
    pub fn from_async<F, Fut>(refresh_function: F) -> Self
    where
        F: Fn(AuthServer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, Box<dyn std::error::Error + Send + Sync>>>
            + Send
            + 'static,
    {
        Self {
            refresh_function: Arc::new(Box::new(move |auth_server| {
                Box::pin(refresh_function(auth_server))
            })),
        }
    }

    /// Create an externally managed source from a synchronous function,
    /// wrapped in an immediately ready future.
    #[must_use]
    pub fn from_sync(
        refresh_function: impl Fn(AuthServer) -> Result<String, Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            refresh_function: Arc::new(Box::new(move |auth_server| {
                let result = refresh_function(auth_server);
                Box::pin(async move { result })
            })),
        }
    }

    /// Invoke the refresh function for the given auth server.
    ///
    /// # Errors
    /// Propagates the refresh function's failure as
    /// [`AuthenticationError::External`].
    pub async fn request_tokens(
        &self,
        auth_server: &AuthServer,
    ) -> Result<Tokens, AuthenticationError> {
        let token = (self.refresh_function)(auth_server.clone())
            .await
            .map_err(|err| AuthenticationError::External(err.to_string()))?;

        // The callback communicates no expiry, so the token is due for
        // re-check at its next observation.
        Ok(Tokens::new(Secret::new(token), None, None))
    }
}

impl fmt::Debug for ExternallyManaged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternallyManaged").finish_non_exhaustive()
    }
}

/// The credential strategy active for an OAuth session.
///
/// Exactly one variant is active per session; dispatching on the enum keeps
/// strategy handling exhaustive at compile time instead of probing optional
/// fields at runtime.
#[derive(Clone)]
pub enum CredentialPayload {
    /// Exchange a stored refresh token for new access tokens.
    RefreshToken {
        /// The long-lived refresh token.
        refresh_token: Secret,
    },
    /// Client-credentials grant with a client ID and secret.
    ClientCredentials {
        /// OAuth client ID of the machine credential.
        client_id: String,
        /// OAuth client secret of the machine credential.
        client_secret: Secret,
    },
    /// Defer token acquisition to a caller-supplied function.
    ExternallyManaged(ExternallyManaged),
}

impl CredentialPayload {
    /// Request a new token set from the auth server using this strategy.
    ///
    /// For the `RefreshToken` variant a rotated refresh token returned by
    /// the server replaces the stored one.
    ///
    /// # Errors
    /// See [`AuthenticationError`].
    pub(crate) async fn request_tokens(
        &mut self,
        auth_server: &AuthServer,
        http: &Client,
    ) -> Result<Tokens, AuthenticationError> {
        match self {
            Self::RefreshToken { refresh_token } => {
                if refresh_token.is_empty() {
                    return Err(AuthenticationError::Misconfigured { field: "refresh_token" });
                }

                debug!(grant = "refresh_token", "requesting access token");
                let params = [
                    ("grant_type", "refresh_token"),
                    ("client_id", auth_server.client_id.as_str()),
                    ("refresh_token", refresh_token.expose()),
                ];
                let response = http
                    .post(auth_server.token_url())
                    .form(&params)
                    .send()
                    .await
                    .map_err(|err| AuthenticationError::transport(&err))?;
                let body = decode_token_response(response).await?;

                if let Some(rotated) = body.refresh_token {
                    *refresh_token = rotated;
                }
                Ok(Tokens::new(
                    body.access_token,
                    body.expires_in,
                    Some(refresh_token.clone()),
                ))
            }
            Self::ClientCredentials { client_id, client_secret } => {
                if client_secret.is_empty() {
                    return Err(AuthenticationError::Misconfigured { field: "client_secret" });
                }

                debug!(grant = "client_credentials", "requesting access token");
                let params = [("grant_type", "client_credentials")];
                let response = http
                    .post(auth_server.token_url())
                    .basic_auth(client_id.as_str(), Some(client_secret.expose()))
                    .form(&params)
                    .send()
                    .await
                    .map_err(|err| AuthenticationError::transport(&err))?;
                let body = decode_token_response(response).await?;

                // No refresh-token rotation for this grant type.
                Ok(Tokens::new(body.access_token, body.expires_in, None))
            }
            Self::ExternallyManaged(source) => source.request_tokens(auth_server).await,
        }
    }
}

// Variant names only; the payloads hold secrets.
impl fmt::Debug for CredentialPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefreshToken { .. } => f.write_str("RefreshToken"),
            Self::ClientCredentials { .. } => f.write_str("ClientCredentials"),
            Self::ExternallyManaged(_) => f.write_str("ExternallyManaged"),
        }
    }
}

impl From<ExternallyManaged> for CredentialPayload {
    fn from(source: ExternallyManaged) -> Self {
        Self::ExternallyManaged(source)
    }
}

/// Turn a token-endpoint HTTP response into a [`TokenResponse`], mapping
/// non-success statuses onto [`AuthenticationError::Rejected`].
async fn decode_token_response(
    response: reqwest::Response,
) -> Result<TokenResponse, AuthenticationError> {
    let status = response.status();
    if !status.is_success() {
        let error_code = response
            .json::<TokenErrorResponse>()
            .await
            .ok()
            .map(|body| body.error);
        return Err(AuthenticationError::Rejected { status: status.as_u16(), error_code });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|err| AuthenticationError::invalid_response(&err))
}
