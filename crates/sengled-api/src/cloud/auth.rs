// Account authentication
//
// Credential login and session probing against the ucenter service. The
// login endpoint answers with a `JSESSIONID` cookie; the token is handed
// back to the caller instead of being kept in a jar.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use crate::cloud::client::{CloudClient, preview};
use crate::cloud::models::{LoginOutcome, LoginRequest, LoginResponse, ResponseMeta, value_text};
use crate::endpoints::{LOGIN_OK, MESSAGE_OK, SESSION_COOKIE};
use crate::error::Error;
use crate::redact::hide_email;

impl CloudClient {
    /// Exchange credentials for a session token.
    ///
    /// `uuid` is the app installation serial the cloud associates with
    /// the session. A non-zero `ret` or an HTTP 401 is a terminal
    /// [`Error::Authentication`]; the caller must not retry it.
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
        uuid: &str,
    ) -> Result<LoginOutcome, Error> {
        let url = self.endpoints().login.clone();
        debug!(account = %hide_email(email), "logging in at {}", url);

        let body = LoginRequest::new(email, password.expose_secret(), uuid);
        let resp = self
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("login rejected (HTTP {status})"),
            });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                retry_after_secs: resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(5),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                message: format!("login failed (HTTP {status}): {}", preview(&body)),
                status: Some(status.as_u16()),
            });
        }

        let cookie_token = resp
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.value().to_owned());

        let text = resp.text().await.map_err(Error::Transport)?;
        let parsed: LoginResponse =
            serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&text)),
                body: text.clone(),
            })?;

        if parsed.meta.ret() != Some(LOGIN_OK) {
            return Err(Error::Authentication {
                message: parsed.meta.description(),
            });
        }

        let token = cookie_token
            .or(parsed.jsession_id)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication {
                message: format!("login succeeded but no {SESSION_COOKIE} was issued"),
            })?;

        debug!(account = %hide_email(email), "login successful");
        Ok(LoginOutcome {
            token: SecretString::from(token),
            customer_id: parsed.customer_id.as_ref().and_then(value_text),
        })
    }

    /// Ask the cloud whether `token` is still a live session.
    ///
    /// Returns `Ok(false)` for an expired or unknown session; transport
    /// failures propagate so callers can tell "dead" from "unreachable".
    pub async fn check_session(&self, token: &SecretString) -> Result<bool, Error> {
        let url = self.endpoints().session_check.clone();
        match self
            .post_authed::<ResponseMeta>(url, token, &json!({}))
            .await
        {
            Ok(meta) => {
                let alive = meta.message_code() == Some(MESSAGE_OK);
                debug!(alive, "session check complete");
                Ok(alive)
            }
            Err(Error::SessionRejected { message }) => {
                debug!(%message, "session check: rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
