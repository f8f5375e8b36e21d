// ── Core error types ──
//
// User-facing errors from sengled-core. Consumers never see HTTP status
// codes or JSON parse failures directly: the `From<sengled_api::Error>`
// impl translates wire-layer errors into domain variants.

use thiserror::Error;

use crate::model::AttributeName;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session ──────────────────────────────────────────────────────
    /// Credentials were rejected, or the session was rejected again
    /// right after a fresh login. Terminal: nothing retries this.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Cloud / transport ────────────────────────────────────────────
    #[error("Cloud API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Broker connection error: {reason}")]
    Connection { reason: String },

    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Device {device_id} does not support `{attribute}`")]
    UnsupportedAttribute {
        device_id: String,
        attribute: AttributeName,
    },

    // ── Caller errors ────────────────────────────────────────────────
    #[error("Unknown publish target '{value}' (expected mqtt or http)")]
    InvalidTarget { value: String },

    #[error("Broker client is already connecting or connected")]
    AlreadyConnected,

    // ── Local ────────────────────────────────────────────────────────
    #[error("Session store error: {message}")]
    Store { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Worth another attempt after a pause: transport failures, rate
    /// limiting, and server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } => true,
            Self::Api { status, .. } => status.is_some_and(|s| s == 429 || s >= 500),
            _ => false,
        }
    }
}

// ── Conversion from wire-layer errors ───────────────────────────────

impl From<sengled_api::Error> for CoreError {
    fn from(err: sengled_api::Error) -> Self {
        use sengled_api::Error as Api;

        let status = err.status();
        match err {
            Api::Authentication { message } | Api::SessionRejected { message } => {
                Self::Authentication { message }
            }
            Api::Transport(e) => {
                if e.is_timeout() {
                    Self::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    Self::Connection {
                        reason: e.to_string(),
                    }
                } else {
                    Self::Api {
                        message: e.to_string(),
                        status,
                    }
                }
            }
            Api::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(reason) => Self::Config {
                message: format!("TLS setup failed: {reason}"),
            },
            Api::RateLimited { retry_after_secs } => Self::Api {
                message: format!("Rate limited -- retry after {retry_after_secs}s"),
                status: Some(429),
            },
            Api::Api { message, status } => Self::Api { message, status },
            Api::Deserialization { message, .. } => Self::Api {
                message: format!("Unexpected response shape: {message}"),
                status: None,
            },
            Api::BrokerConnect(reason) => Self::Connection { reason },
            Api::Store(message) => Self::Store { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_rejection_maps_to_authentication() {
        let err: CoreError = sengled_api::Error::SessionRejected {
            message: "HTTP 401".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Authentication { .. }));
    }

    #[test]
    fn malformed_payload_maps_to_api() {
        let err: CoreError = sengled_api::Error::Deserialization {
            message: "missing field `deviceList`".into(),
            body: "{}".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Api { status: None, .. }));
    }

    #[test]
    fn retryable_classification() {
        assert!(
            CoreError::Connection {
                reason: "refused".into()
            }
            .is_retryable()
        );
        assert!(!CoreError::AlreadyConnected.is_retryable());
        assert!(
            CoreError::Api {
                message: "bad gateway".into(),
                status: Some(502)
            }
            .is_retryable()
        );
        assert!(
            !CoreError::Api {
                message: "bad request".into(),
                status: Some(400)
            }
            .is_retryable()
        );
        assert!(
            !CoreError::Authentication {
                message: "nope".into()
            }
            .is_retryable()
        );
    }
}
