// Server discovery
//
// The life2 service hands each account its app-server base URL and the
// MQTT-over-WebSocket broker address.

use secrecy::SecretString;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::cloud::client::CloudClient;
use crate::cloud::models::{ServerInfo, ServerInfoResponse, code_of};
use crate::endpoints::MESSAGE_OK;
use crate::error::Error;

impl CloudClient {
    /// Fetch the per-account server endpoints.
    pub async fn server_info(&self, token: &SecretString) -> Result<ServerInfo, Error> {
        let url = self.endpoints().server_info.clone();
        let resp: ServerInfoResponse = self.post_authed(url, token, &json!({})).await?;

        if let Some(code) = resp.meta.message_code() {
            if code != MESSAGE_OK {
                return Err(Error::Api {
                    message: format!("server info failed: {}", resp.meta.description()),
                    status: None,
                });
            }
        }

        let app_server = required_url(resp.app_server_addr.as_deref(), "appServerAddr")?;
        let broker_url = required_url(resp.inception_addr.as_deref(), "inceptionAddr")?;
        let broker_port = resp
            .mqtt_ssl_port
            .as_ref()
            .and_then(code_of)
            .and_then(|p| u16::try_from(p).ok());

        debug!(
            app_server = %app_server,
            broker = %broker_url,
            ?broker_port,
            "server endpoints discovered"
        );

        Ok(ServerInfo {
            app_server,
            broker_url,
            broker_port,
        })
    }
}

fn required_url(raw: Option<&str>, field: &str) -> Result<Url, Error> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Api {
            message: format!("server info is missing {field}"),
            status: None,
        })?;
    Ok(Url::parse(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_is_api_error() {
        assert!(matches!(
            required_url(None, "inceptionAddr"),
            Err(Error::Api { .. })
        ));
        assert!(matches!(
            required_url(Some("  "), "inceptionAddr"),
            Err(Error::Api { .. })
        ));
    }

    #[test]
    fn garbage_url_is_invalid_url() {
        assert!(matches!(
            required_url(Some("not a url"), "appServerAddr"),
            Err(Error::InvalidUrl(_))
        ));
    }
}
