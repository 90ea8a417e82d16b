//! OAuth token lifecycle for the Quantic API
//!
//! This module owns everything between "the client needs a bearer token"
//! and "a valid token string is in hand": the credential strategies, the
//! auth-server descriptor, the secret wrapper, and the session that caches
//! and refreshes tokens on behalf of concurrent callers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   OAuthSession   │  Token cache + single-flight refresh
//! └────────┬─────────┘
//!          │
//!          ├──► CredentialPayload   (refresh-token / client-credentials /
//!          │                         externally managed strategies)
//!          ├──► AuthServer          (issuer + client ID, token endpoint)
//!          └──► Tokens              (cached access token + expiry)
//! ```
//!
//! A session is shared by cloning; all clones observe one token cache, so
//! a configuration reused across many outgoing requests performs at most
//! one token-endpoint call (or external-callback invocation) at a time.
//!
//! # Secret hygiene
//!
//! Credential material is held in [`Secret`], which redacts itself from
//! `Debug`/`Display` output and zeroes its memory on drop. Error messages
//! produced here reference field names and HTTP statuses, never values.

pub mod credential;
pub mod secret;
pub mod server;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use credential::{
    AuthenticationError, CredentialPayload, ExternallyManaged, RefreshFunction, RefreshResult,
};
pub use secret::Secret;
pub use server::{AuthServer, DEFAULT_CLIENT_ID, DEFAULT_ISSUER};
pub use session::OAuthSession;
pub use types::{Tokens, EXPIRY_SAFETY_MARGIN_SECONDS};
