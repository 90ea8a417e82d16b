//! Client configuration loading and resolution
//!
//! A [`ClientConfiguration`] bundles the four Quantic service URLs with an
//! [`OAuthSession`] that keeps a valid bearer token available. Values are
//! resolved from layered sources, in ascending precedence:
//!
//! 1. built-in defaults (well-known URLs and auth server),
//! 2. the `settings.toml` / `secrets.toml` profile stores under
//!    `~/.quantic` (or at paths named by [`SETTINGS_PATH_VAR`] /
//!    [`SECRETS_PATH_VAR`]),
//! 3. per-field environment overrides ([`API_URL_VAR`],
//!    [`GRPC_API_URL_VAR`], [`QUILC_URL_VAR`], [`QVM_URL_VAR`]),
//! 4. explicit values staged on a [`ClientConfigurationBuilder`].
//!
//! Both stores are organized as named profiles; [`PROFILE_NAME_VAR`]
//! selects one without code changes. Loading happens once, at
//! construction. The token accessors never re-read configuration files.

mod builder;
mod error;
mod loader;
mod store;

pub use builder::ClientConfigurationBuilder;
pub use error::{ConfigError, ValidationError};
pub use loader::{
    API_URL_VAR, DEFAULT_API_URL, DEFAULT_GRPC_API_URL, DEFAULT_QUILC_URL, DEFAULT_QVM_URL,
    GRPC_API_URL_VAR, PROFILE_NAME_VAR, QUILC_URL_VAR, QVM_URL_VAR, SECRETS_PATH_VAR,
    SETTINGS_PATH_VAR,
};

use crate::auth::{AuthenticationError, OAuthSession};

/// Fully resolved connection settings and credentials for the Quantic
/// platform.
///
/// Immutable after construction; the only interior mutability is the token
/// cache inside the owned [`OAuthSession`], reached through synchronized
/// accessors. Cloning shares that cache, so one configuration reused by
/// many outgoing requests refreshes at most once at a time.
#[derive(Clone, Debug)]
pub struct ClientConfiguration {
    pub(crate) profile_name: String,
    pub(crate) api_url: String,
    pub(crate) grpc_api_url: String,
    pub(crate) quilc_url: String,
    pub(crate) qvm_url: String,
    pub(crate) oauth_session: OAuthSession,
}

impl ClientConfiguration {
    /// Load the default profile from the configuration sources.
    ///
    /// # Errors
    /// See [`ConfigError`].
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Load the named profile from the configuration sources.
    ///
    /// # Errors
    /// See [`ConfigError`]; in particular
    /// [`ConfigError::ProfileNotFound`] when the settings store has no such
    /// profile.
    pub fn load_profile(name: impl Into<String>) -> Result<Self, ConfigError> {
        Self::builder().profile_name(name).build()
    }

    /// Start building a configuration with explicit overrides.
    #[must_use]
    pub fn builder() -> ClientConfigurationBuilder {
        ClientConfigurationBuilder::default()
    }

    /// Name of the profile this configuration was resolved from.
    #[must_use]
    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    /// URL of the Quantic REST API. Defaults to [`DEFAULT_API_URL`].
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// URL of the Quantic gRPC API. Defaults to [`DEFAULT_GRPC_API_URL`].
    #[must_use]
    pub fn grpc_api_url(&self) -> &str {
        &self.grpc_api_url
    }

    /// URL of the `quilc` compiler. Defaults to [`DEFAULT_QUILC_URL`].
    #[must_use]
    pub fn quilc_url(&self) -> &str {
        &self.quilc_url
    }

    /// URL of the QVM. Defaults to [`DEFAULT_QVM_URL`].
    #[must_use]
    pub fn qvm_url(&self) -> &str {
        &self.qvm_url
    }

    /// The OAuth session backing the token accessors.
    #[must_use]
    pub fn oauth_session(&self) -> &OAuthSession {
        &self.oauth_session
    }

    /// Get a valid bearer access token, blocking until one is available.
    ///
    /// Refreshes the cached token when it is missing or inside the expiry
    /// safety margin; concurrent callers share a single in-flight refresh.
    /// Not supported from inside a single-threaded async runtime; use
    /// [`ClientConfiguration::get_bearer_access_token_async`] there.
    ///
    /// # Errors
    /// See [`AuthenticationError`].
    pub fn get_bearer_access_token(&self) -> Result<String, AuthenticationError> {
        self.oauth_session.bearer_access_token_blocking()
    }

    /// Get a valid bearer access token without blocking a worker thread.
    ///
    /// # Errors
    /// See [`AuthenticationError`].
    pub async fn get_bearer_access_token_async(&self) -> Result<String, AuthenticationError> {
        self.oauth_session.bearer_access_token().await
    }

    /// Force a token refresh and return the new access token, blocking
    /// until it completes.
    ///
    /// # Errors
    /// See [`AuthenticationError`].
    pub fn refresh(&self) -> Result<String, AuthenticationError> {
        self.oauth_session.refresh_blocking()
    }

    /// Force a token refresh and return the new access token.
    ///
    /// # Errors
    /// See [`AuthenticationError`].
    pub async fn refresh_async(&self) -> Result<String, AuthenticationError> {
        self.oauth_session.refresh().await
    }
}

impl Default for ClientConfiguration {
    /// A configuration built entirely from built-in defaults, with no
    /// credential material. Token requests against it fail with a
    /// `Misconfigured` error until a credential is supplied.
    fn default() -> Self {
        let raw = loader::RawSettings::defaults();
        Self {
            profile_name: raw.profile_name,
            api_url: raw.api_url,
            grpc_api_url: raw.grpc_api_url,
            quilc_url: raw.quilc_url,
            qvm_url: raw.qvm_url,
            oauth_session: OAuthSession::new(raw.credential, raw.auth_server, None),
        }
    }
}
