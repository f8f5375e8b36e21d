// Cloud HTTP client
//
// Wraps `reqwest::Client` with the session-cookie header, status
// classification, and the vendor's in-band failure codes. Endpoint
// groups (auth, server, devices) are inherent methods in sibling files.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::cloud::models::ResponseMeta;
use crate::endpoints::{Endpoints, INVALID_SESSION_CODES, SESSION_COOKIE};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Fallback back-off when a 429 arrives without a usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Raw HTTP client for the Sengled cloud.
///
/// Stateless with respect to the session: every authenticated call takes
/// the token explicitly. Token lifecycle (login, re-login, persistence)
/// is owned by `sengled-core`. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl CloudClient {
    /// Build a client from a transport config.
    pub fn new(endpoints: Endpoints, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, endpoints })
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Cookie header value carrying the session token.
    pub(crate) fn session_cookie(token: &SecretString) -> String {
        format!("{SESSION_COOKIE}={}", token.expose_secret())
    }

    /// POST a JSON body with the session cookie and decode the response.
    pub(crate) async fn post_authed<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &SecretString,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::COOKIE, Self::session_cookie(token))
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_response(resp).await
    }

    /// Classify the HTTP status, reject invalid-session payloads, and
    /// deserialize the body.
    ///
    /// The cloud reports some failures with HTTP 200 and a `ret` or
    /// `messageCode` field, so the body is inspected before decoding.
    pub(crate) async fn parse_response<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionRejected {
                message: "HTTP 401".into(),
            });
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER.as_secs());
            return Err(Error::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                message: format!("HTTP {status}: {}", preview(&body)),
                status: Some(status.as_u16()),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        trace!(bytes = body.len(), "response body received");

        let value: Value = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })?;

        if let Ok(meta) = serde_json::from_value::<ResponseMeta>(value.clone()) {
            let code = meta.ret().or_else(|| meta.message_code());
            if code.is_some_and(|c| INVALID_SESSION_CODES.contains(&c)) {
                return Err(Error::SessionRejected {
                    message: meta.description(),
                });
            }
        }

        serde_json::from_value(value).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }
}

/// First 200 bytes of a body, cut on a char boundary.
pub(crate) fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
