//! Per-device MQTT topic names.
//!
//! Every WiFi bulb has two topics under `wifielement/{deviceUuid}/`:
//! `status` carries state pushes from the bulb, `update` carries commands
//! to it and the bulb's acknowledgements of them.

use crate::endpoints::WIFI_CATEGORY;

/// Which of a device's two topics a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    Status,
    Update,
}

pub fn status(device_id: &str) -> String {
    format!("{WIFI_CATEGORY}/{device_id}/status")
}

pub fn update(device_id: &str) -> String {
    format!("{WIFI_CATEGORY}/{device_id}/update")
}

/// Both topics a connected client subscribes to for one device.
pub fn device_topics(device_id: &str) -> [String; 2] {
    [status(device_id), update(device_id)]
}

/// Split a topic into `(device id, kind)`. Anything outside the
/// `wifielement/{id}/{status|update}` shape yields `None`.
pub fn parse(topic: &str) -> Option<(&str, TopicKind)> {
    let mut parts = topic.split('/');
    let root = parts.next()?;
    let device_id = parts.next()?;
    let leaf = parts.next()?;
    if root != WIFI_CATEGORY || device_id.is_empty() || parts.next().is_some() {
        return None;
    }
    let kind = match leaf {
        "status" => TopicKind::Status,
        "update" => TopicKind::Update,
        _ => return None,
    };
    Some((device_id, kind))
}
