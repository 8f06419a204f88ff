use super::discovery;
use crate::types::{StatusDetail, ThingStatus};
use std::collections::BTreeMap;

/// Things we sent to HA.
#[derive(Debug)]
pub enum Outgoing {
    /// Subscribe to a new topic given as argument. Not a real message.
    Subscribe(String),
    /// Send on initialization once.
    Initial,
    /// Discovery message, to be sent to
    /// homeassistant/device/ihc-gate-[thing]/config
    DiscoveryDevice(discovery::Discovery),
    /// New channel state, payload already rendered.
    State { channel: String, payload: String },
    /// Push-button event.
    Trigger { channel: String, event: String },
    Status {
        status: ThingStatus,
        detail: StatusDetail,
        reason: Option<String>,
    },
    Properties(BTreeMap<String, String>),
}

/// Things HA sents to us (like: switch a light)
#[derive(Debug, PartialEq)]
pub enum Incoming {
    /// Raw command payload for a channel.
    Command { channel: String, payload: String },
}
