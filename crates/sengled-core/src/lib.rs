// sengled-core: Session, device, and broker lifecycle between sengled-api and consumers.

pub mod backoff;
pub mod broker;
pub mod config;
pub mod directory;
pub mod error;
pub mod facade;
pub mod model;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use broker::{BrokerClient, BrokerEvent, BrokerState, MessageCallback};
pub use config::{ClientConfig, ReconnectPolicy};
pub use directory::DeviceDirectory;
pub use error::CoreError;
pub use facade::{CommandFacade, PublishTarget, TargetKind};
pub use session::{CredentialSession, SessionStats};

pub use model::{
    Attribute, AttributeName, AttributeUpdate, DeviceRecord, Rgb, UpdateKind, capabilities,
};

// Wire-layer types consumers need to wire things up.
pub use sengled_api::{
    BrokerConnector, Endpoints, FileSessionStore, MemorySessionStore, MqttConnector,
    SessionStore, TransportConfig,
};
