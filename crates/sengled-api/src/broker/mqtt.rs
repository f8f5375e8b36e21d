// MQTT-over-WebSocket connector (rumqttc)
//
// Opens a rumqttc event loop against the vendor broker, waits for the
// CONNACK, then splits the connection into two tasks: a receive task
// pumping the event loop into `LinkEvent`s and a command task mapping
// `LinkCommand`s onto the async client.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport};
use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::{BrokerConnector, BrokerLink, ConnectionTicket, LinkCommand, LinkEvent};
use crate::endpoints::MQTT_REQUESTED_WITH;
use crate::error::Error;

/// Inbound events buffered between the receive task and the consumer.
const DEFAULT_CAPACITY: usize = 64;

/// Keep-alive the vendor app uses.
const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Payload ceiling for both directions. Device pushes are tiny, but the
/// rumqttc default is tighter than some multi-attribute status dumps.
const MAX_PACKET_SIZE: usize = 256 * 1024;

/// Opens broker links with rumqttc over `wss://`.
#[derive(Debug, Clone)]
pub struct MqttConnector {
    keep_alive: Duration,
    capacity: usize,
}

impl Default for MqttConnector {
    fn default() -> Self {
        Self {
            keep_alive: DEFAULT_KEEP_ALIVE,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl MqttConnector {
    pub fn new(keep_alive: Duration, capacity: usize) -> Self {
        Self {
            keep_alive,
            capacity: capacity.max(1),
        }
    }

    fn options(&self, ticket: &ConnectionTicket) -> MqttOptions {
        let mut options = MqttOptions::new(
            ticket.client_id.expose_secret(),
            ticket.url.as_str(),
            ticket.port,
        );
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
        options.set_transport(Transport::wss_with_default_config());

        let cookie = ticket.cookie.expose_secret().to_owned();
        options.set_request_modifier(move |mut request| {
            let headers = request.headers_mut();
            if let Ok(value) = cookie.parse() {
                headers.insert("cookie", value);
            }
            if let Ok(value) = MQTT_REQUESTED_WITH.parse() {
                headers.insert("x-requested-with", value);
            }
            async move { request }
        });
        options
    }
}

impl BrokerConnector for MqttConnector {
    async fn open(&self, ticket: ConnectionTicket) -> Result<BrokerLink, Error> {
        debug!(?ticket, "opening broker link");
        let (client, mut eventloop) = AsyncClient::new(self.options(&ticket), self.capacity);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(code = ?ack.code, "broker accepted connection");
                    break;
                }
                Ok(other) => trace!(?other, "pre-connack event"),
                Err(e) => return Err(Error::BrokerConnect(e.to_string())),
            }
        }

        let (event_tx, event_rx) = mpsc::channel(self.capacity);
        let (command_tx, command_rx) = mpsc::channel(self.capacity);

        tokio::spawn(receive_loop(eventloop, event_tx));
        tokio::spawn(command_loop(client, command_rx));

        Ok(BrokerLink::new(command_tx, event_rx))
    }
}

async fn receive_loop(mut eventloop: EventLoop, events: mpsc::Sender<LinkEvent>) {
    let reason = loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                trace!(topic = %publish.topic, bytes = publish.payload.len(), "inbound publish");
                let event = LinkEvent::Message {
                    topic: publish.topic,
                    payload: publish.payload,
                };
                if events.send(event).await.is_err() {
                    break "link consumer dropped".to_owned();
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                break "disconnected by client".to_owned();
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "broker event loop failed");
                break e.to_string();
            }
        }
    };

    debug!(%reason, "broker receive task exiting");
    let _ = events.send(LinkEvent::Closed { reason }).await;
}

async fn command_loop(client: AsyncClient, mut commands: mpsc::Receiver<LinkCommand>) {
    while let Some(command) = commands.recv().await {
        let result = match command {
            LinkCommand::Subscribe { topic } => {
                debug!(%topic, "subscribing");
                client.subscribe(topic, QoS::ExactlyOnce).await
            }
            LinkCommand::Unsubscribe { topic } => {
                debug!(%topic, "unsubscribing");
                client.unsubscribe(topic).await
            }
            LinkCommand::Publish { topic, payload } => {
                debug!(%topic, bytes = payload.len(), "publishing");
                client.publish(topic, QoS::AtMostOnce, false, payload).await
            }
            LinkCommand::Disconnect => break,
        };
        if let Err(e) = result {
            warn!(error = %e, "broker request failed");
        }
    }

    if let Err(e) = client.disconnect().await {
        trace!(error = %e, "disconnect after link teardown");
    }
}
