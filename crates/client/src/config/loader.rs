//! Single-pass resolution of configuration sources
//!
//! Everything the builder needs is resolved here, once, into an immutable
//! [`RawSettings`] value: built-in defaults, then the settings/secrets
//! stores, then per-field environment overrides, in ascending precedence.
//! The environment is read through an injected lookup function so the
//! precedence order is auditable in tests without mutating process
//! globals.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::auth::{AuthServer, CredentialPayload, Secret, Tokens};

use super::error::{ConfigError, ValidationError};
use super::store::{
    read_store, CredentialRecord, SecretsStore, SettingsProfile, SettingsStore,
    DEFAULT_PROFILE_NAME,
};

/// Default URL of the Quantic REST API.
pub const DEFAULT_API_URL: &str = "https://api.quantic.cloud";
/// Default URL of the Quantic gRPC API.
pub const DEFAULT_GRPC_API_URL: &str = "https://grpc.quantic.cloud";
/// Default URL of a locally running `quilc` compiler.
pub const DEFAULT_QUILC_URL: &str = "tcp://127.0.0.1:5555";
/// Default URL of a locally running QVM.
pub const DEFAULT_QVM_URL: &str = "http://127.0.0.1:5000";

/// Overrides the path of the settings store.
pub const SETTINGS_PATH_VAR: &str = "QUANTIC_SETTINGS_FILE_PATH";
/// Overrides the path of the secrets store.
pub const SECRETS_PATH_VAR: &str = "QUANTIC_SECRETS_FILE_PATH";
/// Overrides which profile is loaded when none is named explicitly.
pub const PROFILE_NAME_VAR: &str = "QUANTIC_PROFILE_NAME";
/// Overrides the resolved REST API URL.
pub const API_URL_VAR: &str = "QUANTIC_API_URL";
/// Overrides the resolved gRPC API URL.
pub const GRPC_API_URL_VAR: &str = "QUANTIC_GRPC_API_URL";
/// Overrides the resolved `quilc` URL.
pub const QUILC_URL_VAR: &str = "QUANTIC_QUILC_URL";
/// Overrides the resolved QVM URL.
pub const QVM_URL_VAR: &str = "QUANTIC_QVM_URL";

/// Directory under the user's home that holds the default store files.
const CONFIG_DIR: &str = ".quantic";

/// Fully resolved configuration sources, before builder overrides.
#[derive(Debug)]
pub(crate) struct RawSettings {
    pub(crate) profile_name: String,
    pub(crate) api_url: String,
    pub(crate) grpc_api_url: String,
    pub(crate) quilc_url: String,
    pub(crate) qvm_url: String,
    pub(crate) auth_server: AuthServer,
    pub(crate) credential: CredentialPayload,
    pub(crate) initial_tokens: Option<Tokens>,
}

impl RawSettings {
    /// Resolution output when every source is absent: built-in URLs, the
    /// well-known auth server, and an empty refresh-token credential.
    pub(crate) fn defaults() -> Self {
        Self {
            profile_name: DEFAULT_PROFILE_NAME.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            grpc_api_url: DEFAULT_GRPC_API_URL.to_string(),
            quilc_url: DEFAULT_QUILC_URL.to_string(),
            qvm_url: DEFAULT_QVM_URL.to_string(),
            auth_server: AuthServer::default(),
            credential: CredentialPayload::RefreshToken { refresh_token: Secret::default() },
            initial_tokens: None,
        }
    }
}

/// Resolve the configuration sources for `profile_name` (or the default
/// profile) using the process environment.
pub(crate) fn resolve(
    profile_name: Option<&str>,
    settings_path: Option<&Path>,
    secrets_path: Option<&Path>,
) -> Result<RawSettings, ConfigError> {
    resolve_with(profile_name, settings_path, secrets_path, |var| std::env::var(var).ok())
}

/// Resolve the configuration sources with an explicit environment lookup.
///
/// Precedence, ascending: built-in defaults, store files, per-field
/// environment overrides. Builder overrides are applied by the builder on
/// top of the returned value.
pub(crate) fn resolve_with(
    profile_name: Option<&str>,
    settings_path: Option<&Path>,
    secrets_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<RawSettings, ConfigError> {
    let settings: SettingsStore =
        load_store(settings_path, env(SETTINGS_PATH_VAR), SETTINGS_PATH_VAR, "settings.toml")?;
    let mut secrets: SecretsStore =
        load_store(secrets_path, env(SECRETS_PATH_VAR), SECRETS_PATH_VAR, "secrets.toml")?;

    // Profile: explicit parameter, else environment, else the store's own
    // declared default, else the built-in fallback name.
    let named_profile = profile_name
        .map(str::to_string)
        .or_else(|| env(PROFILE_NAME_VAR))
        .or_else(|| settings.default_profile_name.clone());
    let explicitly_named = named_profile.is_some();
    let profile_name = named_profile.unwrap_or_else(|| DEFAULT_PROFILE_NAME.to_string());

    // A profile that was named anywhere must exist; the built-in fallback
    // name may be absent, in which case the default profile applies.
    let fallback_profile;
    let profile = match settings.profiles.get(&profile_name) {
        Some(profile) => profile,
        None if !explicitly_named => {
            fallback_profile = SettingsProfile::default();
            &fallback_profile
        }
        None => return Err(ConfigError::ProfileNotFound(profile_name)),
    };

    let auth_server = match settings.auth_servers.get(&profile.auth_server_name) {
        Some(server) => server.clone(),
        // The well-known default applies when the default reference was
        // never overridden; a profile naming anything else must find it.
        None if profile.auth_server_name == DEFAULT_PROFILE_NAME => AuthServer::default(),
        None => return Err(ConfigError::AuthServerNotFound(profile.auth_server_name.clone())),
    };

    let (credential, initial_tokens) =
        resolve_credential(&profile_name, secrets.credentials.remove(&profile_name))?;

    Ok(RawSettings {
        api_url: env(API_URL_VAR)
            .or_else(|| profile.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        grpc_api_url: env(GRPC_API_URL_VAR)
            .or_else(|| profile.grpc_api_url.clone())
            .unwrap_or_else(|| DEFAULT_GRPC_API_URL.to_string()),
        quilc_url: env(QUILC_URL_VAR)
            .or_else(|| profile.quilc_url.clone())
            .unwrap_or_else(|| DEFAULT_QUILC_URL.to_string()),
        qvm_url: env(QVM_URL_VAR)
            .or_else(|| profile.qvm_url.clone())
            .unwrap_or_else(|| DEFAULT_QVM_URL.to_string()),
        profile_name,
        auth_server,
        credential,
        initial_tokens,
    })
}

/// Turn a secrets record into the credential strategy for the session.
///
/// A missing record is not an error: the profile falls back to an empty
/// refresh-token credential, which fails with a `Misconfigured` error only
/// when a token is actually requested.
fn resolve_credential(
    profile_name: &str,
    record: Option<CredentialRecord>,
) -> Result<(CredentialPayload, Option<Tokens>), ConfigError> {
    let Some(record) = record else {
        debug!(profile = profile_name, "no credential record; using empty refresh token");
        return Ok((
            CredentialPayload::RefreshToken { refresh_token: Secret::default() },
            None,
        ));
    };

    match (record.token_payload, record.client_credentials) {
        (Some(_), Some(_)) => Err(ConfigError::Validation(
            ValidationError::ConflictingCredentials(profile_name.to_string()),
        )),
        (Some(payload), None) => {
            let initial_tokens = payload.initial_tokens();
            let refresh_token = payload.refresh_token.unwrap_or_default();
            Ok((CredentialPayload::RefreshToken { refresh_token }, initial_tokens))
        }
        (None, Some(creds)) => Ok((
            CredentialPayload::ClientCredentials {
                client_id: creds.client_id,
                client_secret: creds.client_secret,
            },
            None,
        )),
        (None, None) => Ok((
            CredentialPayload::RefreshToken { refresh_token: Secret::default() },
            None,
        )),
    }
}

/// Load one store, resolving its path from an explicit override, the
/// path-naming environment variable, or the default location.
///
/// A file that was explicitly configured must exist and parse; a missing
/// file at the default location silently yields the store's defaults.
fn load_store<T>(
    explicit_path: Option<&Path>,
    env_path: Option<String>,
    path_var: &'static str,
    file_name: &str,
) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let (path, explicitly_configured) = match explicit_path {
        Some(path) => (path.to_path_buf(), true),
        None => match env_path {
            Some(path) => (PathBuf::from(path), true),
            None => (default_store_path(path_var, file_name)?, false),
        },
    };

    if !explicitly_configured && !path.exists() {
        debug!(path = %path.display(), "store file not found; using defaults");
        return Ok(T::default());
    }

    debug!(path = %path.display(), "loading store file");
    read_store(&path)
}

/// The default path of a store file under the user's home directory.
fn default_store_path(path_var: &'static str, file_name: &str) -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR).join(file_name))
        .ok_or(ConfigError::HomeDirNotFound { env: path_var })
}
