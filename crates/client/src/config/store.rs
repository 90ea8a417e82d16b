//! On-disk settings and secrets stores
//!
//! Both stores are TOML files organized as named profiles. The settings
//! store carries service URLs and auth-server descriptors; the secrets
//! store carries credential material for profiles of the same names.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::auth::{AuthServer, Secret, Tokens};

use super::error::ConfigError;

/// Profile used when neither the caller, the environment, nor the settings
/// store names one.
pub(crate) const DEFAULT_PROFILE_NAME: &str = "default";

fn default_auth_server_name() -> String {
    DEFAULT_PROFILE_NAME.to_string()
}

/// Read and parse a TOML store from `path`.
pub(crate) fn read_store<T>(path: &Path) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .map_err(|source| ConfigError::FileUnreadable { path: path.to_path_buf(), source })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

/// The parsed settings store (`settings.toml`).
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SettingsStore {
    /// Profile selected when no override names one. When absent, the
    /// built-in fallback profile name applies.
    #[serde(default)]
    pub(crate) default_profile_name: Option<String>,
    /// All available settings profiles, keyed by name.
    #[serde(default)]
    pub(crate) profiles: HashMap<String, SettingsProfile>,
    /// Auth servers referenced by profiles, keyed by name.
    #[serde(default)]
    pub(crate) auth_servers: HashMap<String, AuthServer>,
}

/// One settings profile: the four service URLs plus an auth-server
/// reference. Absent fields fall back to the built-in defaults.
#[derive(Debug, Deserialize)]
pub(crate) struct SettingsProfile {
    #[serde(default)]
    pub(crate) api_url: Option<String>,
    #[serde(default)]
    pub(crate) grpc_api_url: Option<String>,
    #[serde(default)]
    pub(crate) quilc_url: Option<String>,
    #[serde(default)]
    pub(crate) qvm_url: Option<String>,
    #[serde(default = "default_auth_server_name")]
    pub(crate) auth_server_name: String,
}

impl Default for SettingsProfile {
    fn default() -> Self {
        Self {
            api_url: None,
            grpc_api_url: None,
            quilc_url: None,
            qvm_url: None,
            auth_server_name: default_auth_server_name(),
        }
    }
}

/// The parsed secrets store (`secrets.toml`).
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SecretsStore {
    /// Credential records, keyed by profile name.
    #[serde(default)]
    pub(crate) credentials: HashMap<String, CredentialRecord>,
}

/// Credential material for one profile. At most one of the two sections
/// may be present; supplying both is a validation error.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CredentialRecord {
    #[serde(default)]
    pub(crate) token_payload: Option<TokenPayload>,
    #[serde(default)]
    pub(crate) client_credentials: Option<ClientCredentialsRecord>,
}

/// Stored refresh-token material, optionally with a previously issued
/// access token that can seed the session cache.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenPayload {
    #[serde(default)]
    pub(crate) access_token: Option<Secret>,
    #[serde(default)]
    pub(crate) refresh_token: Option<Secret>,
    /// Lifetime, in seconds, of the stored access token at issue time.
    #[serde(default)]
    pub(crate) expires_in: Option<i64>,
    /// When the stored access token was issued (RFC 3339).
    #[serde(default)]
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl TokenPayload {
    /// Build a cache seed from the stored access token, if one is present.
    ///
    /// The expiry is reconstructed from `updated_at + expires_in` when both
    /// are stored; otherwise the seed has no expiry and is re-checked at
    /// its first observation.
    pub(crate) fn initial_tokens(&self) -> Option<Tokens> {
        let access_token = self.access_token.clone().filter(|token| !token.is_empty())?;
        let expires_at = match (self.updated_at, self.expires_in) {
            (Some(updated_at), Some(expires_in)) => Some(updated_at + Duration::seconds(expires_in)),
            _ => None,
        };
        Some(Tokens { access_token, expires_at, refresh_token: self.refresh_token.clone() })
    }
}

/// Stored client-credentials material.
#[derive(Debug, Deserialize)]
pub(crate) struct ClientCredentialsRecord {
    pub(crate) client_id: String,
    pub(crate) client_secret: Secret,
}
