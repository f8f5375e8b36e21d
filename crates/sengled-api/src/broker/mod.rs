// Broker transport seam
//
// The domain layer talks to the MQTT broker through a `BrokerLink`: a
// command sender plus an inbound event receiver. `MqttConnector` opens
// real links with rumqttc over WebSocket; tests substitute an in-process
// connector built on the same channels.

pub mod envelope;
pub mod mqtt;
pub mod topics;

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use url::Url;

use crate::cloud::models::ServerInfo;
use crate::endpoints::{MQTT_CLIENT_SUFFIX, MQTT_DEFAULT_PORT, SESSION_COOKIE};
use crate::error::Error;
use crate::redact::hide_token;

pub use mqtt::MqttConnector;

/// Everything needed for one broker connection attempt.
///
/// Built from freshly fetched server info and the current session token;
/// consumed by a single `open` call and never cached.
#[derive(Clone)]
pub struct ConnectionTicket {
    /// `wss://host:port/path` of the broker.
    pub url: Url,
    /// TLS port, from server info or the URL.
    pub port: u16,
    /// MQTT client id (`{token}@lifeApp`).
    pub client_id: SecretString,
    /// `Cookie` header value for the WebSocket upgrade.
    pub cookie: SecretString,
}

impl ConnectionTicket {
    pub fn new(server: &ServerInfo, token: &SecretString) -> Self {
        let port = server
            .broker_port
            .or_else(|| server.broker_url.port_or_known_default())
            .unwrap_or(MQTT_DEFAULT_PORT);
        Self {
            url: server.broker_url.clone(),
            port,
            client_id: SecretString::from(format!(
                "{}{MQTT_CLIENT_SUFFIX}",
                token.expose_secret()
            )),
            cookie: SecretString::from(format!("{SESSION_COOKIE}={}", token.expose_secret())),
        }
    }
}

impl fmt::Debug for ConnectionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTicket")
            .field("url", &self.url.as_str())
            .field("port", &self.port)
            .field("client_id", &hide_token(self.client_id.expose_secret()))
            .finish_non_exhaustive()
    }
}

/// Requests the domain layer sends down an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Publish { topic: String, payload: Vec<u8> },
    Disconnect,
}

/// What comes back up an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// An inbound PUBLISH.
    Message { topic: String, payload: Bytes },
    /// The link is gone. Always the last event on a link.
    Closed { reason: String },
}

/// An open broker connection, as a pair of channels.
#[derive(Debug)]
pub struct BrokerLink {
    pub commands: mpsc::Sender<LinkCommand>,
    pub events: mpsc::Receiver<LinkEvent>,
}

impl BrokerLink {
    pub fn new(commands: mpsc::Sender<LinkCommand>, events: mpsc::Receiver<LinkEvent>) -> Self {
        Self { commands, events }
    }
}

/// Opens broker links. Implementations own the wire protocol; the
/// caller owns timeouts and retries.
pub trait BrokerConnector: Send + Sync + 'static {
    fn open(
        &self,
        ticket: ConnectionTicket,
    ) -> impl Future<Output = Result<BrokerLink, Error>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn server(broker: &str, port: Option<u16>) -> ServerInfo {
        ServerInfo {
            app_server: Url::parse("https://app.example.com/life2/").unwrap(),
            broker_url: Url::parse(broker).unwrap(),
            broker_port: port,
        }
    }

    #[test]
    fn ticket_carries_session_identity() {
        let token = SecretString::from("ABCDEF123456");
        let ticket = ConnectionTicket::new(&server("wss://mq.example.com:443/mqtt", None), &token);
        assert_eq!(ticket.client_id.expose_secret(), "ABCDEF123456@lifeApp");
        assert_eq!(ticket.cookie.expose_secret(), "JSESSIONID=ABCDEF123456");
        assert_eq!(ticket.port, 443);
    }

    #[test]
    fn advertised_port_wins() {
        let token = SecretString::from("tok");
        let ticket = ConnectionTicket::new(&server("wss://mq.example.com/mqtt", Some(8443)), &token);
        assert_eq!(ticket.port, 8443);
    }

    #[test]
    fn debug_hides_token() {
        let token = SecretString::from("SUPERSECRETTOKEN");
        let ticket = ConnectionTicket::new(&server("wss://mq.example.com/mqtt", None), &token);
        let rendered = format!("{ticket:?}");
        assert!(!rendered.contains("SUPERSECRETTOKEN"));
    }
}
