//! Error types for configuration loading and building

use std::path::PathBuf;

/// Errors that may occur while loading or building a
/// [`ClientConfiguration`](super::ClientConfiguration).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A requested profile does not exist in the settings store.
    #[error("profile `{0}` does not exist in the settings store")]
    ProfileNotFound(String),

    /// A settings profile references an auth server that does not exist.
    #[error("auth server `{0}` does not exist in the settings store")]
    AuthServerNotFound(String),

    /// A configured settings or secrets file could not be read.
    #[error("could not read `{path}`: {source}")]
    FileUnreadable {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A settings or secrets file could not be parsed as TOML.
    #[error("could not parse `{path}` as TOML: {source}")]
    Parse {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// No home directory could be determined for the default store paths.
    #[error("could not determine a home directory; set `{env}` to an explicit path")]
    HomeDirNotFound {
        /// Environment variable that supplies an explicit path when set.
        env: &'static str,
    },

    /// A builder precondition was violated.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Precondition violations reported by
/// [`ClientConfigurationBuilder::build`](super::ClientConfigurationBuilder::build).
///
/// Messages name the offending field; they never contain field values.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// A required URL field resolved to an empty string.
    #[error("required field `{0}` is empty")]
    EmptyField(&'static str),

    /// A secrets profile supplies more than one kind of credential
    /// material, so no single strategy is determinable.
    #[error("profile `{0}` supplies both a token payload and client credentials")]
    ConflictingCredentials(String),

    /// Both a pre-built OAuth session and a credential payload were set on
    /// the builder.
    #[error("`oauth_session` and `credential` are mutually exclusive; set only one")]
    ConflictingSession,
}
