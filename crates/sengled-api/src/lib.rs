// sengled-api: Async Rust client for the Sengled WiFi cloud (HTTPS + MQTT over WebSocket)

pub mod broker;
pub mod cloud;
pub mod endpoints;
pub mod error;
pub mod redact;
pub mod store;
pub mod transport;

pub use broker::{
    BrokerConnector, BrokerLink, ConnectionTicket, LinkCommand, LinkEvent, MqttConnector,
};
pub use cloud::CloudClient;
pub use cloud::models::{DeviceEntry, LoginOutcome, ServerInfo, WireAttribute};
pub use endpoints::Endpoints;
pub use error::Error;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoredSession};
pub use transport::TransportConfig;
