use thiserror::Error;

/// Top-level error type for the `sengled-api` crate.
///
/// Covers every failure mode across the wire surfaces: authentication,
/// HTTP transport, cloud payloads, the MQTT broker link, and session
/// persistence. `sengled-core` maps these into its domain taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, locked account, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The cloud rejected the session token (HTTP 401 or an
    /// invalid-session payload code). Re-login may resolve it.
    #[error("Session rejected by the cloud: {message}")]
    SessionRejected { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Rate limited by the cloud. Includes retry-after in seconds.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Cloud API ───────────────────────────────────────────────────
    /// The cloud answered, but with an error status or failure code.
    #[error("Cloud API error: {message}")]
    Api { message: String, status: Option<u16> },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Broker ──────────────────────────────────────────────────────
    /// Opening the MQTT-over-WebSocket connection failed.
    #[error("Broker connection failed: {0}")]
    BrokerConnect(String),

    // ── Persistence ─────────────────────────────────────────────────
    /// Reading or writing the persisted session failed.
    #[error("Session store error: {0}")]
    Store(String),
}

impl Error {
    /// Returns `true` if the cloud rejected the session token and a
    /// fresh login might resolve it.
    pub fn is_session_rejected(&self) -> bool {
        matches!(self, Self::SessionRejected { .. })
    }

    /// HTTP status behind this error, when the cloud answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|code| code.as_u16()),
            Self::Api { status, .. } => *status,
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } | Self::BrokerConnect(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_rejection_is_distinct_from_login_failure() {
        let rejected = Error::SessionRejected {
            message: "HTTP 401".into(),
        };
        let login = Error::Authentication {
            message: "bad password".into(),
        };
        assert!(rejected.is_session_rejected());
        assert!(!login.is_session_rejected());
    }

    #[test]
    fn rate_limit_and_broker_connect_are_transient() {
        assert!(Error::BrokerConnect("refused".into()).is_transient());
        assert!(Error::RateLimited { retry_after_secs: 1 }.is_transient());
        assert!(
            !Error::Api {
                message: "nope".into(),
                status: Some(500)
            }
            .is_transient()
        );
    }
}
