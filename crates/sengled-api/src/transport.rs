// Shared transport configuration for building reqwest::Client instances.
//
// The cloud client and any ad-hoc probes share TLS, timeout, and
// user-agent settings through this module.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// User agent the vendor's Android app sends. The cloud is picky about it.
pub const USER_AGENT: &str = "okhttp/4.9.2";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Extra CA certificate (PEM) to trust on top of the webpki roots.
    pub ca_cert: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ca_cert: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// Session cookies are set explicitly on each request, so the client
    /// carries no cookie jar of its own.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("*/*"),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("*"),
        );

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers);

        if let Some(ref path) = self.ca_cert {
            let cert_pem = std::fs::read(path)
                .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
            let cert = reqwest::Certificate::from_pem(&cert_pem)
                .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.build_client().is_ok());
    }

    #[test]
    fn missing_ca_cert_is_a_tls_error() {
        let config = TransportConfig {
            timeout: Duration::from_secs(5),
            ca_cert: Some(PathBuf::from("/nonexistent/ca.pem")),
        };
        assert!(matches!(config.build_client(), Err(Error::Tls(_))));
    }
}
