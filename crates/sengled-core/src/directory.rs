// ── Device directory ──
//
// The account's WiFi bulbs, keyed by device id. Mutated only by a full
// refresh from the cloud or by single-attribute merges from the broker.
// Every mutation bumps a version counter observable through `watch`.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, trace};

use sengled_api::endpoints::WIFI_CATEGORY;

use crate::error::CoreError;
use crate::model::{self, AttributeName, AttributeUpdate, DeviceRecord, UpdateKind};
use crate::session::CredentialSession;

/// In-memory view of the account's bulbs.
///
/// Cheaply cloneable; clones share the same records.
#[derive(Clone)]
pub struct DeviceDirectory {
    inner: Arc<DirectoryInner>,
}

struct DirectoryInner {
    session: CredentialSession,
    records: DashMap<String, DeviceRecord>,
    version: watch::Sender<u64>,
}

impl DeviceDirectory {
    pub fn new(session: CredentialSession) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(DirectoryInner {
                session,
                records: DashMap::new(),
                version,
            }),
        }
    }

    pub fn session(&self) -> &CredentialSession {
        &self.inner.session
    }

    /// Fetch the device list and replace every record with it.
    ///
    /// Only `wifielement` devices are kept. Records come back in the
    /// order the cloud listed them.
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, CoreError> {
        let session = &self.inner.session;
        let app_server = session.app_server().await?;

        let entries = session
            .call(|cloud, token| {
                let app_server = app_server.clone();
                async move { cloud.list_devices(&app_server, &token).await }
            })
            .await?;

        let total = entries.len();
        let records: Vec<DeviceRecord> = entries
            .iter()
            .filter(|entry| entry.category == WIFI_CATEGORY)
            .map(DeviceRecord::from_entry)
            .collect();
        debug!(total, kept = records.len(), "device list parsed");

        self.replace(records.clone());
        Ok(records)
    }

    /// Replace the whole directory with `records`.
    pub fn replace(&self, records: impl IntoIterator<Item = DeviceRecord>) {
        let map = &self.inner.records;
        map.clear();
        for record in records {
            map.insert(record.id.clone(), record);
        }
        self.bump();
    }

    /// Last-known record for `device_id`. Never touches the network.
    pub fn get_device(&self, device_id: &str) -> Result<DeviceRecord, CoreError> {
        self.inner
            .records
            .get(device_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| CoreError::DeviceNotFound {
                device_id: device_id.to_owned(),
            })
    }

    /// Snapshot of every record, ordered by device id.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        let mut all: Vec<DeviceRecord> = self
            .inner
            .records
            .iter()
            .map(|r| r.value().clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.devices().into_iter().map(|r| r.id).collect()
    }

    /// Merge one broker-reported attribute into its device.
    ///
    /// Unknown devices and acknowledgements are ignored. Returns whether
    /// a record changed; applying the same update twice changes nothing
    /// the second time.
    pub fn apply_update(&self, update: &AttributeUpdate) -> bool {
        if update.kind == UpdateKind::Ack {
            return false;
        }
        let changed = match self.inner.records.get_mut(&update.device_id) {
            Some(mut record) => record.merge(&update.attribute, &update.value),
            None => {
                trace!(device = %update.device_id, "update for unknown device ignored");
                false
            }
        };
        if changed {
            self.bump();
        }
        changed
    }

    /// Receiver of the directory version, bumped on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    /// Writable attributes for a device kind.
    pub fn capabilities(&self, type_code: Option<&str>) -> BTreeSet<AttributeName> {
        model::capabilities(type_code)
    }

    fn bump(&self) {
        self.inner.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}
