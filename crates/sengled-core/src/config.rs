// ── Runtime client configuration ──
//
// Describes *who* to log in as and how to tune the network edges.
// Carries credential data but never touches disk: the CLI (or any other
// consumer) builds a `ClientConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use sengled_api::{Endpoints, TransportConfig};

/// Exponential backoff settings for `BrokerClient::connect_with_retry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Total attempts, including the first. 0 behaves like 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Everything the core needs to reach one Sengled account.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Login email. Also the key sessions are persisted under.
    pub email: String,
    pub password: SecretString,
    /// App installation serial sent with every login.
    pub app_uuid: String,
    /// Account-level endpoints. Overridden in tests.
    pub endpoints: Endpoints,
    /// HTTP timeout and TLS settings.
    pub transport: TransportConfig,
    /// Ceiling on opening the broker connection.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// Config with vendor endpoints and default tuning. Generates a
    /// fresh app uuid; callers that want a stable one set `app_uuid`.
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
            app_uuid: generate_app_uuid(),
            endpoints: Endpoints::default(),
            transport: TransportConfig::default(),
            connect_timeout: Duration::from_secs(15),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_app_uuid(mut self, app_uuid: impl Into<String>) -> Self {
        self.app_uuid = app_uuid.into();
        self
    }
}

/// 32 uppercase hex characters, the shape the vendor app uses.
pub fn generate_app_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_tuning() {
        let config = ClientConfig::new("a@b.c", SecretString::from("pw"));
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.transport.timeout, Duration::from_secs(30));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.base_delay, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn app_uuid_is_32_uppercase_hex() {
        let id = generate_app_uuid();
        assert_eq!(id.len(), 32);
        assert!(
            id.chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
    }
}
