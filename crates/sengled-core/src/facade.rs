// ── Command facade ──
//
// One entry point for listing bulbs and writing their state, over either
// the broker or a one-shot HTTPS request.

use std::fmt;
use std::str::FromStr;

use sengled_api::{BrokerConnector, MqttConnector};
use tracing::debug;

use crate::broker::{self, BrokerClient};
use crate::directory::DeviceDirectory;
use crate::error::CoreError;
use crate::model::{Attribute, DeviceRecord};

/// Which path a write takes, as named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetKind {
    #[default]
    Mqtt,
    Http,
}

impl FromStr for TargetKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mqtt" | "broker" => Ok(Self::Mqtt),
            "http" | "https" => Ok(Self::Http),
            _ => Err(CoreError::InvalidTarget {
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mqtt => "mqtt",
            Self::Http => "http",
        })
    }
}

/// A concrete write path.
pub enum PublishTarget<C: BrokerConnector = MqttConnector> {
    /// Publish on the live broker link. Requires `connect` first.
    Broker(BrokerClient<C>),
    /// Set-attributes request against the app server.
    Http(DeviceDirectory),
}

impl<C: BrokerConnector> PublishTarget<C> {
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Broker(_) => TargetKind::Mqtt,
            Self::Http(_) => TargetKind::Http,
        }
    }

    /// Write `attributes` to one device.
    ///
    /// Both paths reject unknown devices and unsupported attributes before
    /// any network traffic.
    pub async fn set_state(&self, device_id: &str, attributes: &[Attribute]) -> Result<(), CoreError> {
        match self {
            Self::Broker(client) => client.publish_update(device_id, attributes).await,
            Self::Http(directory) => {
                let wire = broker::validate(directory, device_id, attributes)?;
                if wire.is_empty() {
                    return Ok(());
                }
                let session = directory.session();
                let app_server = session.app_server().await?;
                session
                    .call(|cloud, token| {
                        let app_server = app_server.clone();
                        let wire = wire.clone();
                        async move {
                            cloud
                                .set_device_state(&app_server, &token, device_id, &wire)
                                .await
                        }
                    })
                    .await?;
                debug!(device = device_id, "state written over HTTPS");
                Ok(())
            }
        }
    }
}

/// Thin front over the directory and a write path chosen per call.
#[derive(Clone)]
pub struct CommandFacade {
    directory: DeviceDirectory,
}

impl CommandFacade {
    pub fn new(directory: DeviceDirectory) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    /// Refresh and return the account's bulbs.
    pub async fn get_devices(&self) -> Result<Vec<DeviceRecord>, CoreError> {
        self.directory.list_devices().await
    }

    pub async fn set_device_state<C: BrokerConnector>(
        &self,
        target: &PublishTarget<C>,
        device_id: &str,
        attributes: &[Attribute],
    ) -> Result<(), CoreError> {
        target.set_state(device_id, attributes).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn target_aliases_parse() {
        assert_eq!("mqtt".parse::<TargetKind>().ok(), Some(TargetKind::Mqtt));
        assert_eq!("Broker".parse::<TargetKind>().ok(), Some(TargetKind::Mqtt));
        assert_eq!("HTTPS".parse::<TargetKind>().ok(), Some(TargetKind::Http));
        assert_eq!(" http ".parse::<TargetKind>().ok(), Some(TargetKind::Http));
    }

    #[test]
    fn unknown_target_is_rejected() {
        let err = "zigbee".parse::<TargetKind>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidTarget { value } if value == "zigbee"));
    }
}
