// ── Broker client ──
//
// MQTT-over-WebSocket lifecycle: connect with a fresh ticket, subscribe
// two topics per device, publish commands, and dispatch inbound pushes
// into the device directory, per-device callbacks, and a broadcast
// stream. One live link at most. A lost link is reported, never
// silently re-established.

use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use sengled_api::broker::envelope::{self, PushEntry};
use sengled_api::broker::topics::{self, TopicKind};
use sengled_api::{BrokerConnector, BrokerLink, LinkCommand, LinkEvent, MqttConnector};

use crate::backoff;
use crate::config::ReconnectPolicy;
use crate::directory::DeviceDirectory;
use crate::error::CoreError;
use crate::model::{Attribute, AttributeUpdate, UpdateKind};

const EVENT_CHANNEL_SIZE: usize = 256;

// ── State & events ───────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Disconnected,
    Connecting,
    Connected,
}

/// What the broadcast stream carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// One decoded attribute from a status push or a command ack.
    Update(AttributeUpdate),
    /// The link dropped without `disconnect()` being called.
    Disconnected { reason: String },
}

/// Synchronous per-device handler, run on the dispatcher task. A panic
/// is caught and logged; later messages are still delivered.
pub type MessageCallback = Arc<dyn Fn(&AttributeUpdate) + Send + Sync>;

type Subscriptions = HashMap<String, BTreeSet<String>>;

struct ActiveLink {
    commands: mpsc::Sender<LinkCommand>,
    cancel: CancellationToken,
}

// ── BrokerClient ─────────────────────────────────────────────────

/// Owns the broker connection for one account.
///
/// Cheaply cloneable via `Arc`. Generic over the connector so tests can
/// run against an in-process link.
pub struct BrokerClient<C: BrokerConnector = MqttConnector> {
    inner: Arc<BrokerInner<C>>,
}

impl<C: BrokerConnector> Clone for BrokerClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct BrokerInner<C> {
    connector: C,
    directory: DeviceDirectory,
    connect_timeout: Duration,
    state: watch::Sender<BrokerState>,
    /// Guards the link and serializes connect/disconnect transitions.
    link: Mutex<Option<ActiveLink>>,
    /// Bumped by every connect attempt and every disconnect. A dispatcher
    /// or connect attempt whose generation is stale must not touch state.
    generation: AtomicU64,
    subscriptions: std::sync::Mutex<Subscriptions>,
    callbacks: std::sync::Mutex<HashMap<String, Vec<MessageCallback>>>,
    events: broadcast::Sender<BrokerEvent>,
}

fn lock<T>(mutex: &std::sync::Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BrokerClient<MqttConnector> {
    /// Client that connects with rumqttc.
    pub fn new(directory: DeviceDirectory) -> Self {
        Self::with_connector(directory, MqttConnector::default())
    }
}

impl<C: BrokerConnector> BrokerClient<C> {
    pub fn with_connector(directory: DeviceDirectory, connector: C) -> Self {
        let connect_timeout = directory.session().config().connect_timeout;
        let (state, _) = watch::channel(BrokerState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            inner: Arc::new(BrokerInner {
                connector,
                directory,
                connect_timeout,
                state,
                link: Mutex::new(None),
                generation: AtomicU64::new(0),
                subscriptions: std::sync::Mutex::new(HashMap::new()),
                callbacks: std::sync::Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn state(&self) -> BrokerState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<BrokerState> {
        self.inner.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of device id → subscribed topics.
    pub fn subscriptions(&self) -> Subscriptions {
        lock(&self.inner.subscriptions).clone()
    }

    /// Register a handler for every update about `device_id`.
    pub fn on_message<F>(&self, device_id: impl Into<String>, callback: F)
    where
        F: Fn(&AttributeUpdate) + Send + Sync + 'static,
    {
        lock(&self.inner.callbacks)
            .entry(device_id.into())
            .or_default()
            .push(Arc::new(callback));
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Open the broker link and subscribe to every device in `device_ids`.
    ///
    /// Fails with [`CoreError::AlreadyConnected`] while a link is up or
    /// being opened. Any other failure leaves the client `Disconnected`;
    /// nothing here retries.
    pub async fn connect(&self, device_ids: &[String]) -> Result<(), CoreError> {
        let generation = {
            let _link = self.inner.link.lock().await;
            let claimed = self.inner.state.send_if_modified(|state| {
                if *state == BrokerState::Disconnected {
                    *state = BrokerState::Connecting;
                    true
                } else {
                    false
                }
            });
            if !claimed {
                return Err(CoreError::AlreadyConnected);
            }
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let result = self.establish(device_ids, generation).await;
        if let Err(e) = &result {
            warn!(error = %e, "broker connect failed");
            let _link = self.inner.link.lock().await;
            if self.inner.generation.load(Ordering::SeqCst) == generation {
                self.inner.state.send_replace(BrokerState::Disconnected);
            }
        }
        result
    }

    async fn establish(&self, device_ids: &[String], generation: u64) -> Result<(), CoreError> {
        let ticket = self.inner.directory.session().connection_ticket().await?;

        let timeout = self.inner.connect_timeout;
        let BrokerLink { commands, events } =
            tokio::time::timeout(timeout, self.inner.connector.open(ticket))
                .await
                .map_err(|_| CoreError::Connection {
                    reason: format!("timed out after {}s", timeout.as_secs()),
                })?
                .map_err(|e| CoreError::Connection {
                    reason: e.to_string(),
                })?;

        let mut subscribed = Subscriptions::new();
        for device_id in device_ids {
            for topic in topics::device_topics(device_id) {
                commands
                    .send(LinkCommand::Subscribe {
                        topic: topic.clone(),
                    })
                    .await
                    .map_err(|_| CoreError::Connection {
                        reason: "broker link closed while subscribing".into(),
                    })?;
                subscribed
                    .entry(device_id.clone())
                    .or_default()
                    .insert(topic);
            }
        }

        let mut link = self.inner.link.lock().await;
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            let _ = commands.send(LinkCommand::Disconnect).await;
            return Err(CoreError::Connection {
                reason: "disconnected while connecting".into(),
            });
        }

        *lock(&self.inner.subscriptions) = subscribed;
        let cancel = CancellationToken::new();
        *link = Some(ActiveLink {
            commands,
            cancel: cancel.clone(),
        });
        tokio::spawn(dispatch_loop(
            Arc::clone(&self.inner),
            events,
            cancel,
            generation,
        ));
        self.inner.state.send_replace(BrokerState::Connected);

        info!(devices = device_ids.len(), "connected to broker");
        Ok(())
    }

    /// [`connect`](Self::connect) with exponential backoff between attempts.
    ///
    /// Only [retryable](CoreError::is_retryable) failures are retried;
    /// `AlreadyConnected` and `Authentication` end the loop immediately.
    pub async fn connect_with_retry(
        &self,
        device_ids: &[String],
        policy: &ReconnectPolicy,
    ) -> Result<(), CoreError> {
        let attempts = policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.connect(device_ids).await {
                Ok(()) => return Ok(()),
                Err(e) if !e.is_retryable() || attempt + 1 >= attempts => return Err(e),
                Err(e) => {
                    let delay = backoff::delay_for(attempt, policy);
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis(),
                        "broker connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Close the link and forget every subscription. Safe to call in any
    /// state, any number of times.
    pub async fn disconnect(&self) {
        let mut link = self.inner.link.lock().await;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(active) = link.take() {
            active.cancel.cancel();
            let _ = active.commands.send(LinkCommand::Disconnect).await;
            info!("disconnected from broker");
        }
        lock(&self.inner.subscriptions).clear();
        self.inner.state.send_replace(BrokerState::Disconnected);
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Publish one command envelope carrying `attributes` to a device.
    ///
    /// Validates before touching the network: the device must be known
    /// and support every attribute. Does not wait for the bulb's ack.
    pub async fn publish_update(
        &self,
        device_id: &str,
        attributes: &[Attribute],
    ) -> Result<(), CoreError> {
        let wire = validate(&self.inner.directory, device_id, attributes)?;
        if wire.is_empty() {
            debug!(device = device_id, "nothing to publish");
            return Ok(());
        }

        let payload = envelope::encode_command(device_id, &wire, envelope::command_time(Utc::now()))
            .map_err(|e| CoreError::Api {
                message: format!("failed to encode command: {e}"),
                status: None,
            })?;

        let link = self.inner.link.lock().await;
        let active = match (&*link, self.state()) {
            (Some(active), BrokerState::Connected) => active,
            _ => {
                return Err(CoreError::Connection {
                    reason: "not connected to the broker".into(),
                });
            }
        };

        let topic = topics::update(device_id);
        debug!(%topic, attributes = wire.len(), "publishing command");
        active
            .commands
            .send(LinkCommand::Publish { topic, payload })
            .await
            .map_err(|_| CoreError::Connection {
                reason: "broker link closed".into(),
            })
    }

    /// Stop receiving updates for a device.
    pub async fn unsubscribe_device(&self, device_id: &str) -> Result<(), CoreError> {
        let topics = lock(&self.inner.subscriptions).remove(device_id);
        let Some(topics) = topics else {
            return Ok(());
        };

        let link = self.inner.link.lock().await;
        if let Some(active) = link.as_ref() {
            for topic in topics {
                active
                    .commands
                    .send(LinkCommand::Unsubscribe { topic })
                    .await
                    .map_err(|_| CoreError::Connection {
                        reason: "broker link closed".into(),
                    })?;
            }
        }
        debug!(device = device_id, "unsubscribed");
        Ok(())
    }
}

/// Check a write against the directory and render it for the wire.
pub(crate) fn validate(
    directory: &DeviceDirectory,
    device_id: &str,
    attributes: &[Attribute],
) -> Result<Vec<(String, String)>, CoreError> {
    let record = directory.get_device(device_id)?;
    attributes
        .iter()
        .map(|attribute| {
            if record.supports(attribute.name()) {
                Ok(attribute.to_wire())
            } else {
                Err(CoreError::UnsupportedAttribute {
                    device_id: device_id.to_owned(),
                    attribute: attribute.name(),
                })
            }
        })
        .collect()
}

// ── Dispatcher ───────────────────────────────────────────────────

async fn dispatch_loop<C: BrokerConnector>(
    inner: Arc<BrokerInner<C>>,
    mut events: mpsc::Receiver<LinkEvent>,
    cancel: CancellationToken,
    generation: u64,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                trace!("dispatcher cancelled");
                break;
            }
            event = events.recv() => match event {
                Some(LinkEvent::Message { topic, payload }) => inner.dispatch(&topic, &payload),
                Some(LinkEvent::Closed { reason }) => {
                    inner.link_lost(generation, reason).await;
                    break;
                }
                None => {
                    inner.link_lost(generation, "broker link dropped".into()).await;
                    break;
                }
            },
        }
    }
}

impl<C: BrokerConnector> BrokerInner<C> {
    fn dispatch(&self, topic: &str, payload: &Bytes) {
        let Some((topic_device, kind)) = topics::parse(topic) else {
            debug!(%topic, "message on unexpected topic dropped");
            return;
        };

        let entries = match envelope::decode_push(payload) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(%topic, error = %e, "malformed broker payload dropped");
                return;
            }
        };

        let kind = match kind {
            TopicKind::Status => UpdateKind::Status,
            TopicKind::Update => UpdateKind::Ack,
        };

        for PushEntry {
            device_id,
            attribute,
            value,
            time,
        } in entries
        {
            // The topic names the device; a payload naming another is ignored.
            if device_id != topic_device {
                debug!(%topic, dn = %device_id, "entry for another device dropped");
                continue;
            }

            let update = AttributeUpdate {
                device_id,
                attribute,
                value,
                kind,
                time,
            };

            if kind == UpdateKind::Status {
                let changed = self.directory.apply_update(&update);
                trace!(device = %update.device_id, attribute = %update.attribute, changed, "status merged");
            }

            let callbacks = lock(&self.callbacks)
                .get(&update.device_id)
                .cloned()
                .unwrap_or_default();
            for callback in &callbacks {
                if panic::catch_unwind(AssertUnwindSafe(|| callback(&update))).is_err() {
                    warn!(device = %update.device_id, "message callback panicked");
                }
            }

            let _ = self.events.send(BrokerEvent::Update(update));
        }
    }

    async fn link_lost(&self, generation: u64, reason: String) {
        let mut link = self.link.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            trace!("stale link closure ignored");
            return;
        }
        *link = None;
        lock(&self.subscriptions).clear();
        self.state.send_replace(BrokerState::Disconnected);
        warn!(%reason, "broker link lost");
        let _ = self.events.send(BrokerEvent::Disconnected { reason });
    }
}
