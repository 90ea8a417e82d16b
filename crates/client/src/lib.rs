//! Configuration loading and OAuth session management for Quantic API
//! clients.
//!
//! This crate resolves a user's connection settings and credentials from
//! layered sources (built-in defaults, the `~/.quantic` settings/secrets
//! stores, environment overrides, and explicit builder values) and keeps a
//! refreshable bearer token available to both blocking and async callers.
//!
//! Most users start from [`ClientConfiguration`]:
//!
//! ```no_run
//! use quantic_client::ClientConfiguration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfiguration::load_default()?;
//!     let token = config.get_bearer_access_token_async().await?;
//!     println!("authorized against {}", config.api_url());
//!     # let _ = token;
//!     Ok(())
//! }
//! ```
//!
//! Request middleware (HTTP hooks, gRPC interceptors) is deliberately not
//! part of this crate: a transport attaches `Authorization: Bearer <token>`
//! by asking a `ClientConfiguration` for a token and formatting the header
//! itself.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod config;

// Re-export the primary surface at the crate root
pub use auth::{
    AuthServer, AuthenticationError, CredentialPayload, ExternallyManaged, OAuthSession, Secret,
    Tokens,
};
pub use config::{ClientConfiguration, ClientConfigurationBuilder, ConfigError, ValidationError};
