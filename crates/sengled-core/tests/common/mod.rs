// Shared fixtures: a wiremock cloud and an in-process broker connector.
#![allow(clippy::unwrap_used, dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sengled_api::{BrokerLink, ConnectionTicket, LinkCommand, LinkEvent};
use sengled_core::{
    BrokerConnector, BrokerEvent, ClientConfig, CredentialSession, DeviceDirectory, Endpoints,
    MemorySessionStore, SessionStore,
};

pub const EMAIL: &str = "jane@example.com";
pub const LOGIN_PATH: &str = "/user/app/customer/v3/AuthenCross.json";
pub const SESSION_PATH: &str = "/user/app/customer/v2/isSessionTimeout.json";
pub const SERVER_INFO_PATH: &str = "/life2/server/getServerInfo.json";
pub const DEVICE_LIST_PATH: &str = "/life2/device/list.json";
pub const SET_STATE_PATH: &str = "/life2/device/deviceSetAttributes.json";

// ── Cloud fixtures ──────────────────────────────────────────────────

pub struct Cloud {
    pub server: MockServer,
    pub store: Arc<MemorySessionStore>,
}

impl Cloud {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            store: Arc::new(MemorySessionStore::new()),
        }
    }

    pub fn config(&self) -> ClientConfig {
        let base = Url::parse(&self.server.uri()).unwrap();
        ClientConfig::new(EMAIL, SecretString::from("hunter2".to_owned()))
            .with_endpoints(Endpoints::with_base(&base).unwrap())
            .with_app_uuid("ABCDEF0123456789ABCDEF0123456789")
    }

    pub fn session(&self) -> CredentialSession {
        let store: Arc<dyn SessionStore> = self.store.clone();
        CredentialSession::new(self.config(), store).unwrap()
    }

    pub fn directory(&self) -> DeviceDirectory {
        DeviceDirectory::new(self.session())
    }

    /// Login that hands out `token` as the session cookie.
    pub async fn mount_login(&self, token: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", format!("JSESSIONID={token}; Path=/").as_str())
                    .set_body_json(json!({ "ret": 0, "customerId": 42 })),
            )
            .expect(times)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_server_info(&self) {
        Mock::given(method("POST"))
            .and(path(SERVER_INFO_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messageCode": "200",
                "appServerAddr": format!("{}/life2/", self.server.uri()),
                "inceptionAddr": "wss://broker.example.com:443/mqtt",
                "mqttSslPort": "443"
            })))
            .mount(&self.server)
            .await;
    }

    /// Device list answered only for requests carrying `token`.
    pub async fn mount_devices(&self, token: &str, devices: Value) {
        Mock::given(method("POST"))
            .and(path(DEVICE_LIST_PATH))
            .and(header("cookie", format!("JSESSIONID={token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messageCode": "200",
                "deviceList": devices
            })))
            .mount(&self.server)
            .await;
    }

    /// Everything a happy-path test needs: login, discovery, two bulbs
    /// and a hub.
    pub async fn mount_account(&self) {
        self.mount_login("tok-1", 1).await;
        self.mount_server_info().await;
        self.mount_devices("tok-1", two_bulbs()).await;
    }
}

pub fn two_bulbs() -> Value {
    json!([
        {
            "deviceUuid": "dev1",
            "category": "wifielement",
            "typeCode": "W21-N13",
            "attributeList": [
                { "name": "name", "value": "Desk" },
                { "name": "switch", "value": "1" },
                { "name": "brightness", "value": "40" },
                { "name": "colorTemperature", "value": "50" },
                { "name": "color", "value": "255:0:0" },
                { "name": "online", "value": "1" }
            ]
        },
        {
            "deviceUuid": "dev2",
            "category": "wifielement",
            "typeCode": "W11-N13",
            "attributeList": [
                { "name": "name", "value": "Hall" },
                { "name": "switch", "value": "0" },
                { "name": "brightness", "value": "100" }
            ]
        },
        {
            "deviceUuid": "hub1",
            "category": "gateway",
            "attributeList": []
        }
    ])
}

// ── Fake broker ─────────────────────────────────────────────────────

struct OpenLink {
    commands: mpsc::Receiver<LinkCommand>,
    events: mpsc::Sender<LinkEvent>,
}

/// Connector whose links are plain channels the test holds the far end of.
#[derive(Clone, Default)]
pub struct FakeConnector {
    link: Arc<Mutex<Option<OpenLink>>>,
    tickets: Arc<Mutex<Vec<ConnectionTicket>>>,
    opens: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
    stall: Arc<AtomicBool>,
}

impl FakeConnector {
    /// Make every following `open` fail until reset.
    pub fn fail_opens(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make every following `open` hang until the caller gives up.
    pub fn stall_opens(&self, stall: bool) {
        self.stall.store(stall, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn last_ticket(&self) -> Option<ConnectionTicket> {
        self.tickets.lock().unwrap().last().cloned()
    }

    /// Commands sent on the current link since the last drain.
    pub fn drain(&self) -> Vec<LinkCommand> {
        let mut guard = self.link.lock().unwrap();
        let mut out = Vec::new();
        if let Some(link) = guard.as_mut() {
            while let Ok(command) = link.commands.try_recv() {
                out.push(command);
            }
        }
        out
    }

    pub fn publishes(&self) -> Vec<(String, Value)> {
        self.drain()
            .into_iter()
            .filter_map(|command| match command {
                LinkCommand::Publish { topic, payload } => {
                    Some((topic, serde_json::from_slice(&payload).unwrap()))
                }
                _ => None,
            })
            .collect()
    }

    fn events(&self) -> mpsc::Sender<LinkEvent> {
        self.link.lock().unwrap().as_ref().unwrap().events.clone()
    }

    /// Deliver a raw inbound PUBLISH on the current link.
    pub async fn push_raw(&self, topic: &str, payload: &[u8]) {
        self.events()
            .send(LinkEvent::Message {
                topic: topic.to_owned(),
                payload: bytes::Bytes::copy_from_slice(payload),
            })
            .await
            .unwrap();
    }

    pub async fn push(&self, topic: &str, payload: Value) {
        self.push_raw(topic, payload.to_string().as_bytes()).await;
    }

    /// Drop the link from the broker side.
    pub async fn close(&self, reason: &str) {
        self.events()
            .send(LinkEvent::Closed {
                reason: reason.to_owned(),
            })
            .await
            .unwrap();
    }
}

impl BrokerConnector for FakeConnector {
    async fn open(&self, ticket: ConnectionTicket) -> Result<BrokerLink, sengled_api::Error> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(sengled_api::Error::BrokerConnect(
                "connection refused".into(),
            ));
        }
        self.tickets.lock().unwrap().push(ticket);

        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);
        *self.link.lock().unwrap() = Some(OpenLink {
            commands: command_rx,
            events: event_tx,
        });
        Ok(BrokerLink::new(command_tx, event_rx))
    }
}

/// Next broker event, failing the test after a second of silence.
pub async fn next_event(events: &mut broadcast::Receiver<BrokerEvent>) -> BrokerEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for a broker event")
        .unwrap()
}
