//! Builder for [`ClientConfiguration`]
//!
//! Stages explicit overrides on top of the loaded/defaulted sources and
//! freezes them into an immutable configuration. Explicit values always
//! win over environment variables, store files, and built-in defaults.

use std::path::PathBuf;

use crate::auth::{AuthServer, CredentialPayload, OAuthSession, Secret};

use super::error::{ConfigError, ValidationError};
use super::loader::{self, RawSettings};
use super::store::DEFAULT_PROFILE_NAME;
use super::ClientConfiguration;

/// Mutable staging object for a [`ClientConfiguration`].
///
/// Every field is optional; unset fields fall back to the value resolved
/// from the configuration sources. Created through
/// [`ClientConfiguration::builder`].
#[derive(Debug, Default, Clone)]
pub struct ClientConfigurationBuilder {
    profile_name: Option<String>,
    settings_path: Option<PathBuf>,
    secrets_path: Option<PathBuf>,
    api_url: Option<String>,
    grpc_api_url: Option<String>,
    quilc_url: Option<String>,
    qvm_url: Option<String>,
    auth_server: Option<AuthServer>,
    credential: Option<CredentialPayload>,
    oauth_session: Option<OAuthSession>,
}

impl ClientConfigurationBuilder {
    /// Load the named profile instead of the resolved default.
    #[must_use]
    pub fn profile_name(mut self, name: impl Into<String>) -> Self {
        self.profile_name = Some(name.into());
        self
    }

    /// Read the settings store from an explicit path instead of the
    /// environment-named or default location.
    #[must_use]
    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Read the secrets store from an explicit path instead of the
    /// environment-named or default location.
    #[must_use]
    pub fn secrets_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.secrets_path = Some(path.into());
        self
    }

    /// Set the REST API URL.
    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Set the gRPC API URL.
    #[must_use]
    pub fn grpc_api_url(mut self, url: impl Into<String>) -> Self {
        self.grpc_api_url = Some(url.into());
        self
    }

    /// Set the `quilc` compiler URL.
    #[must_use]
    pub fn quilc_url(mut self, url: impl Into<String>) -> Self {
        self.quilc_url = Some(url.into());
        self
    }

    /// Set the QVM URL.
    #[must_use]
    pub fn qvm_url(mut self, url: impl Into<String>) -> Self {
        self.qvm_url = Some(url.into());
        self
    }

    /// Set the auth server used to mint tokens.
    #[must_use]
    pub fn auth_server(mut self, auth_server: AuthServer) -> Self {
        self.auth_server = Some(auth_server);
        self
    }

    /// Set the credential strategy, replacing any loaded credential
    /// material.
    #[must_use]
    pub fn credential(mut self, credential: impl Into<CredentialPayload>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Reuse a pre-built OAuth session verbatim, sharing its token cache
    /// and ignoring loaded credential material.
    #[must_use]
    pub fn oauth_session(mut self, session: OAuthSession) -> Self {
        self.oauth_session = Some(session);
        self
    }

    /// Freeze the staged values into a [`ClientConfiguration`].
    ///
    /// Runs the configuration source loader unless every URL and the
    /// credential strategy are explicitly staged, applies the staged
    /// overrides at highest precedence, and validates the result.
    ///
    /// # Errors
    /// See [`ConfigError`]; precondition violations surface as
    /// [`ConfigError::Validation`] naming the offending field.
    pub fn build(self) -> Result<ClientConfiguration, ConfigError> {
        if self.oauth_session.is_some() && self.credential.is_some() {
            return Err(ValidationError::ConflictingSession.into());
        }

        // Loading is dead work when nothing resolved could survive the
        // staged overrides.
        let fully_overridden = self.api_url.is_some()
            && self.grpc_api_url.is_some()
            && self.quilc_url.is_some()
            && self.qvm_url.is_some()
            && (self.oauth_session.is_some()
                || (self.auth_server.is_some() && self.credential.is_some()));

        let raw = if fully_overridden {
            None
        } else {
            Some(loader::resolve(
                self.profile_name.as_deref(),
                self.settings_path.as_deref(),
                self.secrets_path.as_deref(),
            )?)
        };

        Ok(Self::merge(self, raw)?)
    }

    /// Apply staged overrides on top of the resolved sources and validate.
    fn merge(staged: Self, raw: Option<RawSettings>) -> Result<ClientConfiguration, ValidationError> {
        let (raw_urls, raw_auth, profile_name) = match raw {
            Some(raw) => (
                (raw.api_url, raw.grpc_api_url, raw.quilc_url, raw.qvm_url),
                Some((raw.auth_server, raw.credential, raw.initial_tokens)),
                raw.profile_name,
            ),
            None => (
                Default::default(),
                None,
                staged.profile_name.clone().unwrap_or_else(|| DEFAULT_PROFILE_NAME.to_string()),
            ),
        };

        let api_url = staged.api_url.unwrap_or(raw_urls.0);
        let grpc_api_url = staged.grpc_api_url.unwrap_or(raw_urls.1);
        let quilc_url = staged.quilc_url.unwrap_or(raw_urls.2);
        let qvm_url = staged.qvm_url.unwrap_or(raw_urls.3);

        require_non_empty("api_url", &api_url)?;
        require_non_empty("grpc_api_url", &grpc_api_url)?;
        require_non_empty("quilc_url", &quilc_url)?;
        require_non_empty("qvm_url", &qvm_url)?;

        let oauth_session = match staged.oauth_session {
            Some(session) => session,
            None => {
                let (loaded_auth, loaded_credential, initial_tokens) = match raw_auth {
                    Some((auth, credential, tokens)) => (Some(auth), Some(credential), tokens),
                    None => (None, None, None),
                };
                // A staged credential replaces the loaded material, and the
                // loaded cache seed with it.
                let (credential, initial_tokens) = match staged.credential {
                    Some(credential) => (credential, None),
                    None => (
                        loaded_credential.unwrap_or(CredentialPayload::RefreshToken {
                            refresh_token: Secret::default(),
                        }),
                        initial_tokens,
                    ),
                };
                let auth_server = staged
                    .auth_server
                    .or(loaded_auth)
                    .unwrap_or_default();
                OAuthSession::new(credential, auth_server, initial_tokens)
            }
        };

        Ok(ClientConfiguration {
            profile_name,
            api_url,
            grpc_api_url,
            quilc_url,
            qvm_url,
            oauth_session,
        })
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

impl From<ClientConfiguration> for ClientConfigurationBuilder {
    fn from(config: ClientConfiguration) -> Self {
        Self {
            profile_name: Some(config.profile_name),
            settings_path: None,
            secrets_path: None,
            api_url: Some(config.api_url),
            grpc_api_url: Some(config.grpc_api_url),
            quilc_url: Some(config.quilc_url),
            qvm_url: Some(config.qvm_url),
            auth_server: None,
            credential: None,
            oauth_session: Some(config.oauth_session),
        }
    }
}
