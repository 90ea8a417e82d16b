//! OAuth session with a single-flight refreshing token cache
//!
//! An [`OAuthSession`] combines an auth server, one credential strategy,
//! and an interior token cache. Callers ask it for a valid bearer token;
//! the session refreshes the cache when the token is missing or inside the
//! expiry safety margin, and guarantees that concurrent callers share one
//! in-flight refresh instead of issuing their own.
//!
//! The cache moves through four observable states:
//!
//! ```text
//! Empty ──request──► Refreshing ──ok──► Fresh ──margin elapsed──► Stale
//!   ▲                    │ err                                      │
//!   └────────────────────┘◄──────────────request───────────────────┘
//! ```
//!
//! A request against a `Fresh` cache returns immediately. The first caller
//! to observe `Empty`/`Stale` performs the refresh; everyone else waits for
//! that attempt and receives its result, success or failure alike.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::runtime::{Builder as RuntimeBuilder, Handle, Runtime};
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, warn};

use super::credential::{AuthenticationError, CredentialPayload};
use super::server::AuthServer;
use super::types::{Tokens, EXPIRY_SAFETY_MARGIN_SECONDS};

/// Timeout applied to token-endpoint requests.
const TOKEN_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Fallback runtime for blocking token requests made outside any Tokio
/// runtime. Built once per process, on first use.
static BLOCKING_RUNTIME: OnceCell<Runtime> = OnceCell::new();

fn blocking_runtime() -> Result<&'static Runtime, AuthenticationError> {
    BLOCKING_RUNTIME.get_or_try_init(|| {
        RuntimeBuilder::new_current_thread().enable_all().build().map_err(|err| {
            AuthenticationError::Transport {
                message: format!("could not start a runtime for the blocking token request: {err}"),
            }
        })
    })
}

/// Interior state shared by all clones of a session.
struct SessionState {
    credential: CredentialPayload,
    tokens: Option<Tokens>,
    /// Failure of the most recent refresh attempt, handed to waiters of
    /// that attempt. Cleared by the next successful refresh.
    last_failure: Option<AuthenticationError>,
}

/// Stateful engine that owns an [`AuthServer`], a [`CredentialPayload`],
/// and a cached token set.
///
/// Cloning shares the interior cache, so one session reused across many
/// outgoing requests (and across sync and async call sites) performs at
/// most one refresh at a time. Sessions constructed independently share
/// nothing.
#[derive(Clone)]
pub struct OAuthSession {
    auth_server: AuthServer,
    http: reqwest::Client,
    state: Arc<RwLock<SessionState>>,
    refreshing: Arc<Mutex<bool>>,
    refreshed: Arc<Notify>,
}

impl OAuthSession {
    /// Create a session for the given credential strategy and auth server.
    ///
    /// `initial_tokens` seeds the cache, e.g. with material loaded from the
    /// secrets store; pass `None` to start from the `Empty` state.
    #[must_use]
    pub fn new(
        credential: CredentialPayload,
        auth_server: AuthServer,
        initial_tokens: Option<Tokens>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .user_agent(concat!("quantic-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            auth_server,
            http,
            state: Arc::new(RwLock::new(SessionState {
                credential,
                tokens: initial_tokens,
                last_failure: None,
            })),
            refreshing: Arc::new(Mutex::new(false)),
            refreshed: Arc::new(Notify::new()),
        }
    }

    /// The auth server this session requests tokens from.
    #[must_use]
    pub fn auth_server(&self) -> &AuthServer {
        &self.auth_server
    }

    /// Snapshot of the current token cache, if any.
    pub async fn tokens(&self) -> Option<Tokens> {
        self.state.read().await.tokens.clone()
    }

    /// Get a valid bearer access token, refreshing it if needed.
    ///
    /// Returns the cached token when it is valid for at least the expiry
    /// safety margin; otherwise performs (or joins) a single-flight
    /// refresh.
    ///
    /// # Errors
    /// See [`AuthenticationError`]. A failure is not cached: the next call
    /// starts a fresh attempt.
    pub async fn bearer_access_token(&self) -> Result<String, AuthenticationError> {
        if let Some(token) = self.fresh_token().await {
            return Ok(token);
        }
        self.refresh_or_wait(false).await
    }

    /// Blocking counterpart of [`OAuthSession::bearer_access_token`].
    ///
    /// Inside a multi-threaded Tokio runtime the call is bridged with
    /// [`tokio::task::block_in_place`]; outside any runtime it runs on a
    /// process-wide fallback runtime. Calling this from a single-threaded
    /// async runtime is not supported; use the async accessor there.
    ///
    /// # Errors
    /// See [`AuthenticationError`].
    pub fn bearer_access_token_blocking(&self) -> Result<String, AuthenticationError> {
        match Handle::try_current() {
            Ok(handle) => {
                tokio::task::block_in_place(|| handle.block_on(self.bearer_access_token()))
            }
            Err(_) => blocking_runtime()?.block_on(self.bearer_access_token()),
        }
    }

    /// Force a refresh and return the new access token, regardless of the
    /// cached token's freshness. Joins an already in-flight refresh instead
    /// of starting a second one.
    ///
    /// # Errors
    /// See [`AuthenticationError`].
    pub async fn refresh(&self) -> Result<String, AuthenticationError> {
        self.refresh_or_wait(true).await
    }

    /// Blocking counterpart of [`OAuthSession::refresh`].
    ///
    /// # Errors
    /// See [`AuthenticationError`].
    pub fn refresh_blocking(&self) -> Result<String, AuthenticationError> {
        match Handle::try_current() {
            Ok(handle) => tokio::task::block_in_place(|| handle.block_on(self.refresh())),
            Err(_) => blocking_runtime()?.block_on(self.refresh()),
        }
    }

    /// The cached access token, when it is still fresh.
    async fn fresh_token(&self) -> Option<String> {
        let state = self.state.read().await;
        state
            .tokens
            .as_ref()
            .filter(|tokens| tokens.is_fresh(EXPIRY_SAFETY_MARGIN_SECONDS))
            .map(|tokens| tokens.access_token.expose().to_string())
    }

    /// Perform a refresh, or wait on the one already in flight.
    ///
    /// The `refreshing` flag is the single-flight gate: the caller that
    /// flips it performs the network request with no locks held, then
    /// stores the outcome and wakes every waiter.
    async fn refresh_or_wait(&self, force: bool) -> Result<String, AuthenticationError> {
        let mut refreshing = self.refreshing.lock().await;

        // A refresh may have completed between the caller's staleness check
        // and acquiring the flag.
        if !force {
            if let Some(token) = self.fresh_token().await {
                return Ok(token);
            }
        }

        if *refreshing {
            // Register for the completion signal before releasing the flag,
            // so a refresh finishing in between cannot be missed.
            let mut notified = std::pin::pin!(self.refreshed.notified());
            notified.as_mut().enable();
            drop(refreshing);

            notified.await;
            return self.shared_outcome().await;
        }

        *refreshing = true;
        drop(refreshing);

        let outcome = self.perform_refresh().await;

        *self.refreshing.lock().await = false;
        self.refreshed.notify_waiters();
        outcome
    }

    /// Run the credential strategy and store its outcome.
    async fn perform_refresh(&self) -> Result<String, AuthenticationError> {
        debug!(auth_server = %self.auth_server.issuer, "refreshing bearer access token");

        // Clone the credential so no lock is held across the network call;
        // a rotated refresh token is written back with the new cache entry.
        let mut credential = self.state.read().await.credential.clone();
        let result = credential.request_tokens(&self.auth_server, &self.http).await;

        let mut state = self.state.write().await;
        match result {
            Ok(tokens) => {
                let token = tokens.access_token.expose().to_string();
                state.credential = credential;
                state.tokens = Some(tokens);
                state.last_failure = None;
                Ok(token)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                state.tokens = None;
                state.last_failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Result of the refresh a waiter was parked on: the token it stored,
    /// or the failure it recorded.
    async fn shared_outcome(&self) -> Result<String, AuthenticationError> {
        let state = self.state.read().await;
        if let Some(tokens) = state.tokens.as_ref() {
            return Ok(tokens.access_token.expose().to_string());
        }
        Err(state
            .last_failure
            .clone()
            .unwrap_or(AuthenticationError::Misconfigured { field: "access_token" }))
    }
}

impl std::fmt::Debug for OAuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSession")
            .field("auth_server", &self.auth_server)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::session.
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::auth::credential::ExternallyManaged;
    use crate::auth::secret::Secret;

    fn counting_session(calls: Arc<AtomicUsize>) -> OAuthSession {
        let source = ExternallyManaged::from_async(move |_auth_server| {
            let calls = calls.clone();
            async move {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                Ok(format!("token-{call}"))
            }
        });
        OAuthSession::new(source.into(), AuthServer::default(), None)
    }

    /// Validates `OAuthSession::bearer_access_token` behavior for the
    /// externally managed callback scenario.
    ///
    /// Assertions:
    /// - Confirms the bearer token equals the callback's return value.
    /// - Confirms the callback receives the session's auth server.
    #[tokio::test]
    async fn test_externally_managed_token_round_trip() {
        let expected = AuthServer::new("cid", "iss");
        let source = ExternallyManaged::from_sync(move |auth_server| {
            assert_eq!(auth_server, AuthServer::new("cid", "iss"));
            Ok("token-123".to_string())
        });
        let session = OAuthSession::new(source.into(), expected, None);

        let token = session.bearer_access_token().await.unwrap();
        assert_eq!(token, "token-123");
    }

    /// Validates `OAuthSession::bearer_access_token` behavior for the fresh
    /// cache scenario.
    ///
    /// Assertions:
    /// - Confirms a seeded fresh token is returned without invoking the
    ///   refresh mechanism.
    #[tokio::test]
    async fn test_fresh_cache_skips_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = {
            let calls = calls.clone();
            ExternallyManaged::from_sync(move |_auth_server| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("refreshed".to_string())
            })
        };
        let seeded = Tokens::new(Secret::new("seeded"), Some(3600), None);
        let session = OAuthSession::new(source.into(), AuthServer::default(), Some(seeded));

        let token = session.bearer_access_token().await.unwrap();
        assert_eq!(token, "seeded");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// Validates `OAuthSession::bearer_access_token` behavior for the stale
    /// seed scenario.
    ///
    /// Assertions:
    /// - Confirms a seeded token inside the safety margin triggers exactly
    ///   one refresh.
    #[tokio::test]
    async fn test_stale_seed_triggers_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = counting_session(calls.clone());

        let token = session.bearer_access_token().await.unwrap();
        assert_eq!(token, "token-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Validates single-flight behavior for the concurrent request
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms N concurrent requests against an empty cache invoke the
    ///   refresh mechanism exactly once.
    /// - Confirms all N requests receive the same token.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_single_flight_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let source = {
            let calls = calls.clone();
            let gate = gate.clone();
            ExternallyManaged::from_async(move |_auth_server| {
                let calls = calls.clone();
                let gate = gate.clone();
                async move {
                    // Hold the refresh open until every contender has had a
                    // chance to arrive.
                    let _permit = gate.acquire().await?;
                    let call = calls.fetch_add(1, Ordering::SeqCst);
                    Ok(format!("token-{call}"))
                }
            })
        };
        let session = OAuthSession::new(source.into(), AuthServer::default(), None);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = session.clone();
            handles.push(tokio::spawn(async move { session.bearer_access_token().await }));
        }

        // Give every task time to park on the in-flight refresh, then let
        // the single refresh proceed.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        gate.add_permits(1);

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token, "token-0");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Validates failure propagation for the waiting caller scenario.
    ///
    /// Assertions:
    /// - Confirms a failed refresh surfaces the same failure to the caller
    ///   that triggered it and to a waiter.
    /// - Confirms a later request succeeds once the cause is resolved.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_reaches_waiters_without_poisoning() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let source = {
            let attempts = attempts.clone();
            let gate = gate.clone();
            ExternallyManaged::from_async(move |_auth_server| {
                let attempts = attempts.clone();
                let gate = gate.clone();
                async move {
                    let _permit = gate.acquire().await?;
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("issuer unreachable".into())
                    } else {
                        Ok("recovered".to_string())
                    }
                }
            })
        };
        let session = OAuthSession::new(source.into(), AuthServer::default(), None);

        let trigger = {
            let session = session.clone();
            tokio::spawn(async move { session.bearer_access_token().await })
        };
        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.bearer_access_token().await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        gate.add_permits(1);

        let results = [trigger.await.unwrap(), waiter.await.unwrap()];
        // One task triggered the refresh; depending on scheduling, the
        // other either joined it (same failure) or ran the second, now
        // successful attempt.
        let failures = results
            .iter()
            .filter(|result| {
                matches!(result, Err(AuthenticationError::External(msg)) if msg.contains("issuer unreachable"))
            })
            .count();
        assert!(failures >= 1, "the failed attempt must surface to its callers");

        // The session is not poisoned: the next independent request
        // succeeds.
        gate.add_permits(8);
        let token = session.bearer_access_token().await.unwrap();
        assert_eq!(token, "recovered");
    }

    /// Validates `OAuthSession::refresh` behavior for the forced refresh
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms a forced refresh replaces a still-fresh cached token.
    #[tokio::test]
    async fn test_forced_refresh_replaces_fresh_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = {
            let calls = calls.clone();
            ExternallyManaged::from_sync(move |_auth_server| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("forced".to_string())
            })
        };
        let seeded = Tokens::new(Secret::new("seeded"), Some(3600), None);
        let session = OAuthSession::new(source.into(), AuthServer::default(), Some(seeded));

        let token = session.refresh().await.unwrap();
        assert_eq!(token, "forced");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Validates `OAuthSession::bearer_access_token_blocking` behavior for
    /// the no-runtime scenario.
    ///
    /// Assertions:
    /// - Confirms the blocking accessor works on a plain thread with no
    ///   ambient runtime.
    #[test]
    fn test_blocking_accessor_outside_runtime() {
        let source = ExternallyManaged::from_sync(|_auth_server| Ok("blocking".to_string()));
        let session = OAuthSession::new(source.into(), AuthServer::default(), None);

        let token = session.bearer_access_token_blocking().unwrap();
        assert_eq!(token, "blocking");
    }

    /// Validates `OAuthSession::bearer_access_token_blocking` behavior for
    /// the multi-threaded runtime scenario.
    ///
    /// Assertions:
    /// - Confirms the blocking accessor can be called from inside a
    ///   multi-threaded runtime worker.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_accessor_inside_runtime() {
        let source = ExternallyManaged::from_sync(|_auth_server| Ok("bridged".to_string()));
        let session = OAuthSession::new(source.into(), AuthServer::default(), None);

        let token = session.bearer_access_token_blocking().unwrap();
        assert_eq!(token, "bridged");
    }

    /// Validates `OAuthSession` debug formatting for the redaction
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures the session's debug output exposes no token material.
    #[tokio::test]
    async fn test_session_debug_redacts_tokens() {
        let source = ExternallyManaged::from_sync(|_auth_server| Ok("super-secret".to_string()));
        let session = OAuthSession::new(source.into(), AuthServer::default(), None);
        let _ = session.bearer_access_token().await.unwrap();

        let rendered = format!("{session:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
