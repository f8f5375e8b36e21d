// ── Credential session ──
//
// Owns the session token: login, adoption of a persisted token, lazy
// invalidation, and the single transparent re-login that every cloud
// call gets. All token mutation goes through one async mutex, so two
// concurrent callers never run two logins.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use sengled_api::redact::{hide_email, hide_token};
use sengled_api::{CloudClient, ConnectionTicket, ServerInfo, SessionStore, StoredSession};

use crate::backoff;
use crate::config::ClientConfig;
use crate::error::CoreError;

/// How long the cloud keeps a session alive.
const SESSION_LIFETIME_HOURS: i64 = 24;

/// Counters for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Cloud calls made through [`CredentialSession::call`] and probes.
    pub api_calls: u64,
    /// Network logins performed (adopted tokens do not count).
    pub logins: u64,
    pub last_login: Option<DateTime<Utc>>,
}

struct HeldToken {
    value: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl HeldToken {
    fn matches(&self, other: &SecretString) -> bool {
        self.value.expose_secret() == other.expose_secret()
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

#[derive(Default)]
struct SessionState {
    token: Option<HeldToken>,
    /// Server endpoints discovered with the current token.
    server: Option<ServerInfo>,
    /// Last token the cloud rejected. Never adopted again.
    rejected: Option<String>,
    last_login: Option<DateTime<Utc>>,
}

/// Login state machine for one account.
///
/// Cheaply cloneable; clones share the token.
#[derive(Clone)]
pub struct CredentialSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: ClientConfig,
    cloud: CloudClient,
    store: Arc<dyn SessionStore>,
    state: Mutex<SessionState>,
    api_calls: AtomicU64,
    logins: AtomicU64,
}

impl CredentialSession {
    /// Build a session with an HTTP client from `config.transport`.
    pub fn new(config: ClientConfig, store: Arc<dyn SessionStore>) -> Result<Self, CoreError> {
        let cloud = CloudClient::new(config.endpoints.clone(), &config.transport)?;
        Ok(Self::with_cloud(config, cloud, store))
    }

    /// Build a session around an existing cloud client.
    pub fn with_cloud(config: ClientConfig, cloud: CloudClient, store: Arc<dyn SessionStore>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                cloud,
                store,
                state: Mutex::new(SessionState::default()),
                api_calls: AtomicU64::new(0),
                logins: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn cloud(&self) -> &CloudClient {
        &self.inner.cloud
    }

    fn account(&self) -> &str {
        self.inner.config.email.trim()
    }

    // ── Login ────────────────────────────────────────────────────────

    /// Make sure a token is held.
    ///
    /// Keeps a held token, adopts a persisted one that is neither known
    /// rejected nor past its expiry hint, and only then runs the
    /// credential exchange. Rejected credentials are terminal.
    pub async fn login(&self) -> Result<(), CoreError> {
        let mut state = self.inner.state.lock().await;
        self.acquire(&mut state).await.map(|_| ())
    }

    /// The current token, logging in first if none is held.
    pub async fn ensure_valid(&self) -> Result<SecretString, CoreError> {
        let mut state = self.inner.state.lock().await;
        self.acquire(&mut state).await
    }

    async fn acquire(&self, state: &mut SessionState) -> Result<SecretString, CoreError> {
        if let Some(held) = &state.token {
            if !held.is_expired() {
                return Ok(held.value.clone());
            }
            debug!("held session passed its expiry hint");
            state.token = None;
            state.server = None;
        }

        if let Some(stored) = self.inner.store.load(self.account())? {
            let known_bad = state.rejected.as_deref() == Some(stored.token.as_str());
            if !known_bad && !stored.is_expired_at(Utc::now()) && !stored.token.is_empty() {
                info!(
                    account = %hide_email(self.account()),
                    token = %hide_token(&stored.token),
                    "adopting persisted session"
                );
                let value = SecretString::from(stored.token);
                state.token = Some(HeldToken {
                    value: value.clone(),
                    expires_at: stored.expires_at,
                });
                return Ok(value);
            }
            debug!(known_bad, "persisted session not usable");
        }

        self.network_login(state).await
    }

    async fn network_login(&self, state: &mut SessionState) -> Result<SecretString, CoreError> {
        let config = &self.inner.config;
        let outcome = self
            .inner
            .cloud
            .login(self.account(), &config.password, &config.app_uuid)
            .await?;
        self.inner.api_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.logins.fetch_add(1, Ordering::Relaxed);

        let now = Utc::now();
        let expires_at = now + ChronoDuration::hours(SESSION_LIFETIME_HOURS);
        self.inner.store.save(&StoredSession {
            account: self.account().to_owned(),
            token: outcome.token.expose_secret().to_owned(),
            customer_id: outcome.customer_id,
            obtained_at: now,
            expires_at: Some(expires_at),
        })?;

        info!(account = %hide_email(self.account()), "logged in");
        state.token = Some(HeldToken {
            value: outcome.token.clone(),
            expires_at: Some(expires_at),
        });
        state.server = None;
        state.last_login = Some(now);
        Ok(outcome.token)
    }

    // ── Invalidation ─────────────────────────────────────────────────

    /// Record that the cloud rejected `token`.
    ///
    /// A no-op unless `token` is still the current one; otherwise the
    /// token is dropped, remembered as rejected, and cleared from the store.
    pub async fn report_rejected(&self, token: &SecretString) -> Result<(), CoreError> {
        let mut state = self.inner.state.lock().await;
        self.invalidate(&mut state, token)
    }

    fn invalidate(&self, state: &mut SessionState, token: &SecretString) -> Result<(), CoreError> {
        if !state.token.as_ref().is_some_and(|held| held.matches(token)) {
            return Ok(());
        }
        warn!(token = %hide_token(token.expose_secret()), "session token rejected");
        state.token = None;
        state.server = None;
        state.rejected = Some(token.expose_secret().to_owned());
        self.inner.store.clear(self.account())?;
        Ok(())
    }

    /// Replace a rejected token with a fresh one from the cloud.
    ///
    /// If another caller already replaced `stale`, that token is reused.
    async fn relogin(&self, stale: &SecretString) -> Result<SecretString, CoreError> {
        let mut state = self.inner.state.lock().await;
        if let Some(held) = &state.token {
            if !held.matches(stale) {
                debug!("session already refreshed by another caller");
                return Ok(held.value.clone());
            }
        }
        self.invalidate(&mut state, stale)?;
        state.rejected = Some(stale.expose_secret().to_owned());
        self.network_login(&mut state).await
    }

    // ── Calls ────────────────────────────────────────────────────────

    /// Run a cloud operation with a valid token.
    ///
    /// A session rejection triggers exactly one forced re-login and one
    /// retry. A rejection of the fresh token surfaces as
    /// [`CoreError::Authentication`]. Transient failures (rate limiting,
    /// refused or timed-out connections) are retried with backoff per
    /// `config.reconnect`. Every other error propagates as-is.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, CoreError>
    where
        F: Fn(CloudClient, SecretString) -> Fut,
        Fut: Future<Output = Result<T, sengled_api::Error>>,
    {
        let token = self.ensure_valid().await?;

        match self.attempt(&op, &token).await {
            Err(e) if e.is_session_rejected() => {
                info!(reason = %e, "session rejected, logging in again");
                let fresh = self.relogin(&token).await?;

                match self.attempt(&op, &fresh).await {
                    Err(e) if e.is_session_rejected() => {
                        self.report_rejected(&fresh).await?;
                        Err(CoreError::Authentication {
                            message: format!("session rejected right after re-login: {e}"),
                        })
                    }
                    other => other.map_err(CoreError::from),
                }
            }
            other => other.map_err(CoreError::from),
        }
    }

    /// Run `op` with `token`, retrying transient failures.
    async fn attempt<T, F, Fut>(
        &self,
        op: &F,
        token: &SecretString,
    ) -> Result<T, sengled_api::Error>
    where
        F: Fn(CloudClient, SecretString) -> Fut,
        Fut: Future<Output = Result<T, sengled_api::Error>>,
    {
        let policy = &self.inner.config.reconnect;
        let attempts = policy.max_attempts.max(1);
        let mut retry = 0;
        loop {
            self.inner.api_calls.fetch_add(1, Ordering::Relaxed);
            match op(self.inner.cloud.clone(), token.clone()).await {
                Err(e) if e.is_transient() && retry + 1 < attempts => {
                    let delay = match &e {
                        sengled_api::Error::RateLimited { retry_after_secs } => {
                            Duration::from_secs(*retry_after_secs).min(policy.max_delay)
                        }
                        _ => backoff::delay_for(retry, policy),
                    };
                    retry += 1;
                    warn!(
                        error = %e,
                        retry,
                        delay_ms = delay.as_millis(),
                        "cloud request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    // ── Probes & discovery ───────────────────────────────────────────

    /// Ask the cloud whether the held token is still alive.
    ///
    /// `Ok(false)` when no token is held or the cloud says it is dead; a
    /// dead token is invalidated as if it had been rejected.
    pub async fn verify(&self) -> Result<bool, CoreError> {
        let token = {
            let state = self.inner.state.lock().await;
            match &state.token {
                Some(held) => held.value.clone(),
                None => return Ok(false),
            }
        };

        self.inner.api_calls.fetch_add(1, Ordering::Relaxed);
        let alive = self.inner.cloud.check_session(&token).await?;
        if !alive {
            self.report_rejected(&token).await?;
        }
        Ok(alive)
    }

    /// Forget the token locally and in the store.
    pub async fn logout(&self) -> Result<(), CoreError> {
        let mut state = self.inner.state.lock().await;
        state.token = None;
        state.server = None;
        self.inner.store.clear(self.account())?;
        info!(account = %hide_email(self.account()), "logged out");
        Ok(())
    }

    /// Fetch server endpoints fresh from the cloud.
    pub async fn server_info(&self) -> Result<ServerInfo, CoreError> {
        let info = self
            .call(|cloud, token| async move { cloud.server_info(&token).await })
            .await?;
        self.inner.state.lock().await.server = Some(info.clone());
        Ok(info)
    }

    /// App-server base URL, discovered once per token.
    pub async fn app_server(&self) -> Result<Url, CoreError> {
        if let Some(server) = &self.inner.state.lock().await.server {
            return Ok(server.app_server.clone());
        }
        Ok(self.server_info().await?.app_server)
    }

    /// A fresh broker connection ticket. Never cached.
    pub async fn connection_ticket(&self) -> Result<ConnectionTicket, CoreError> {
        self.call(|cloud, token| async move {
            let info = cloud.server_info(&token).await?;
            Ok(ConnectionTicket::new(&info, &token))
        })
        .await
    }

    pub async fn stats(&self) -> SessionStats {
        let last_login = self.inner.state.lock().await.last_login;
        SessionStats {
            api_calls: self.inner.api_calls.load(Ordering::Relaxed),
            logins: self.inner.logins.load(Ordering::Relaxed),
            last_login,
        }
    }
}

impl std::fmt::Debug for CredentialSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSession")
            .field("account", &hide_email(self.account()))
            .finish_non_exhaustive()
    }
}
