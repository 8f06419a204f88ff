use super::discovery::{channel_topic, thing_topic};
use super::{Incoming, Outgoing};
use crate::consts;
use anyhow::bail;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use rumqttc::{Event, Packet};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::{sync::Mutex, task};

use tracing::{debug, error, info, warn};

/// Value bursts after a (re)connect fill the outgoing queue quickly.
const OUTGOING_QUEUE: usize = 256;
const INCOMING_QUEUE: usize = 32;

pub struct Initiator {
    client: AsyncClient,
    event_loop: EventLoop,
    thing: String,
}

/// HA interfacing via MQTT
pub struct HomeAssistant {
    /// Outgoing event queue: things we sent to HA.
    outgoing: mpsc::Sender<Outgoing>,
    /// Incoming event queue: commands read from HA.
    incoming: Mutex<mpsc::Receiver<Incoming>>,
}

/// Parse `ihcgate/<thing>/<channel>/set` into the channel id.
pub(crate) fn parse_command_topic<'a>(thing: &str, topic: &'a str) -> Option<&'a str> {
    let parts: Vec<&str> = topic.split('/').collect();
    match parts.as_slice() {
        [prefix, t, channel, "set"] if *prefix == consts::HA_CONTROL_TOPIC && *t == thing => {
            Some(*channel)
        }
        _ => None,
    }
}

/// Split a trigger into topic leaf and payload. Press durations go to their
/// own topic, HA event entities only accept declared event types.
fn trigger_message(event: &str) -> (&'static str, String) {
    if event.parse::<u64>().is_ok() {
        ("duration", event.to_string())
    } else {
        ("event", json!({ "event_type": event }).to_string())
    }
}

impl Initiator {
    pub async fn new(
        id: &str,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        thing: &str,
    ) -> anyhow::Result<Self> {
        let mut mqttoptions = MqttOptions::new(id, host, port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        mqttoptions.set_credentials(username, password);
        mqttoptions.set_last_will(rumqttc::LastWill::new(
            thing_topic(thing, "status"),
            json!({ "status": "offline", "detail": "gate stopped" }).to_string(),
            QoS::AtLeastOnce,
            true,
        ));

        let (client, mut event_loop) = AsyncClient::new(mqttoptions, 10);

        // Fail early if parameters are invalid.
        if let Err(e) = event_loop.poll().await {
            warn!("Initial connection to MQTT failed. Check connection parameters");
            bail!("Unable to contact MQTT: {}", e);
        }

        Ok(Initiator {
            client,
            event_loop,
            thing: thing.to_string(),
        })
    }

    async fn receiver(thing: String, mut event_loop: EventLoop, queue: mpsc::Sender<Incoming>) {
        loop {
            let notification = event_loop.poll().await;
            let result = match notification {
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    info!("RX message to {} with payload '{:?}'", msg.topic, msg.payload);
                    let Some(channel) = parse_command_topic(&thing, &msg.topic) else {
                        info!("Unknown topic - ignoring");
                        continue;
                    };
                    let payload = match std::str::from_utf8(&msg.payload) {
                        Ok(payload) => payload.to_string(),
                        Err(_) => {
                            warn!("Non UTF-8 payload on {}", msg.topic);
                            continue;
                        }
                    };
                    queue
                        .send(Incoming::Command {
                            channel: channel.to_string(),
                            payload,
                        })
                        .await
                }
                Ok(Event::Outgoing(_))
                | Ok(Event::Incoming(Packet::PingResp))
                | Ok(Event::Incoming(Packet::SubAck(_)))
                | Ok(Event::Incoming(Packet::PubAck(_))) => {
                    // Silence common messages
                    continue;
                }
                Err(e) => {
                    // rumqttc reconnects on the next poll.
                    warn!("MQTT connection error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
                _ => {
                    info!("Received other message = {:?}", notification);
                    continue;
                }
            };
            if result.is_err() {
                error!(
                    "Error while sending received message to queue: {:?}. Quitting loop",
                    result
                );
                return;
            }
        }
    }

    async fn publish(client: &AsyncClient, topic: String, retain: bool, payload: String) {
        debug!("Publishing to {}: {}", topic, payload);
        if let Err(e) = client
            .publish(&topic, QoS::AtLeastOnce, retain, payload)
            .await
        {
            error!("Unable to publish message to {}: {:?}", topic, e);
        }
    }

    async fn sender(thing: String, client: AsyncClient, mut queue: mpsc::Receiver<Outgoing>) {
        while let Some(command) = queue.recv().await {
            match command {
                Outgoing::Subscribe(topic) => {
                    if let Err(e) = client.subscribe(&topic, QoS::AtMostOnce).await {
                        error!("Unable to subscribe to a topic {}: {:?}", topic, e);
                    }
                }
                Outgoing::Initial => {
                    let topic = format!("{}/{}/gate", consts::HA_CONTROL_TOPIC, thing);
                    Self::publish(&client, topic, false, "daemon started".to_string()).await;
                }
                Outgoing::DiscoveryDevice(msg) => {
                    let Some(id) = msg.device.identifiers.first() else {
                        error!("Discovery message without device identifier");
                        continue;
                    };
                    let topic = format!("{}/device/{}/config", consts::HA_DISCOVERY_TOPIC, id);
                    match msg.serialize() {
                        Ok(payload) => Self::publish(&client, topic, true, payload).await,
                        Err(e) => error!("Unable to serialize discovery message {:?}", e),
                    }
                }
                Outgoing::State { channel, payload } => {
                    let topic = channel_topic(&thing, &channel, "state");
                    Self::publish(&client, topic, true, payload).await;
                }
                Outgoing::Trigger { channel, event } => {
                    let (leaf, payload) = trigger_message(&event);
                    let topic = channel_topic(&thing, &channel, leaf);
                    Self::publish(&client, topic, false, payload).await;
                }
                Outgoing::Status {
                    status,
                    detail,
                    reason,
                } => {
                    let payload = json!({
                        "status": status.to_string(),
                        "detail": detail.to_string(),
                        "reason": reason,
                    });
                    Self::publish(&client, thing_topic(&thing, "status"), true, payload.to_string())
                        .await;
                }
                Outgoing::Properties(properties) => {
                    let payload = json!(properties).to_string();
                    Self::publish(&client, thing_topic(&thing, "properties"), true, payload).await;
                }
            }
        }
        // Channel end closed - quit.
    }

    pub async fn start(self) -> HomeAssistant {
        let (out_sender, out_receiver) = mpsc::channel::<Outgoing>(OUTGOING_QUEUE);
        let (in_sender, in_receiver) = mpsc::channel::<Incoming>(INCOMING_QUEUE);
        task::spawn(Self::receiver(self.thing.clone(), self.event_loop, in_sender));
        task::spawn(Self::sender(self.thing, self.client, out_receiver));

        HomeAssistant {
            outgoing: out_sender,
            incoming: Mutex::new(in_receiver),
        }
    }
}

impl HomeAssistant {
    /// Receive incoming message (from MQTT). None means the HA reading loop
    /// finished.
    pub async fn recv(&self) -> Option<Incoming> {
        let mut incoming = self.incoming.lock().await;
        incoming.recv().await
    }

    pub async fn send(&self, msg: Outgoing) -> anyhow::Result<()> {
        self.outgoing.send(msg).await?;
        Ok(())
    }

    /// Queue handle for synchronous producers.
    pub fn sender(&self) -> mpsc::Sender<Outgoing> {
        self.outgoing.clone()
    }
}
