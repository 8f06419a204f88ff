use super::Outgoing;
use crate::host::Host;
use crate::types::{State, StatusDetail, ThingStatus};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::warn;

/// Publishes handler output to Home Assistant.
///
/// Host calls come from scheduler tasks and can't wait for the broker, so
/// messages are queued with `try_send`. A full queue drops the message.
pub struct MqttHost {
    outgoing: mpsc::Sender<Outgoing>,
}

impl MqttHost {
    pub fn new(outgoing: mpsc::Sender<Outgoing>) -> Self {
        Self { outgoing }
    }

    fn push(&self, msg: Outgoing) {
        if let Err(e) = self.outgoing.try_send(msg) {
            warn!("Dropping message for HA: {}", e);
        }
    }
}

impl Host for MqttHost {
    fn update_state(&self, channel: &str, state: State) {
        self.push(Outgoing::State {
            channel: channel.to_string(),
            payload: state.to_string(),
        });
    }

    fn trigger(&self, channel: &str, event: &str) {
        self.push(Outgoing::Trigger {
            channel: channel.to_string(),
            event: event.to_string(),
        });
    }

    fn update_status(&self, status: ThingStatus, detail: StatusDetail, reason: Option<&str>) {
        self.push(Outgoing::Status {
            status,
            detail,
            reason: reason.map(str::to_string),
        });
    }

    fn update_properties(&self, properties: BTreeMap<String, String>) {
        self.push(Outgoing::Properties(properties));
    }

    /// Every configured channel is announced through discovery.
    fn is_linked(&self, _channel: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_rendered() {
        let (tx, mut rx) = mpsc::channel(4);
        let host = MqttHost::new(tx);
        host.update_state("kitchen", State::OnOff(true));
        host.trigger("doorbell", "PRESSED");

        match rx.try_recv() {
            Ok(Outgoing::State { channel, payload }) => {
                assert_eq!(channel, "kitchen");
                assert_eq!(payload, "ON");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(rx.try_recv(), Ok(Outgoing::Trigger { .. })));
    }

    #[test]
    fn full_queue_drops() {
        let (tx, mut rx) = mpsc::channel(1);
        let host = MqttHost::new(tx);
        host.update_state("a", State::Decimal(1.0));
        host.update_state("a", State::Decimal(2.0));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
