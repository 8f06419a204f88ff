use crate::config::{ChannelConfig, ChannelKind, Config, Direction};
use crate::consts::{self, ButtonEvent};
use serde::Serialize;
use std::collections::HashMap;

/// Topic of a single channel: ihcgate/<thing>/<channel>/<leaf>
pub fn channel_topic(thing: &str, channel: &str, leaf: &str) -> String {
    format!("{}/{}/{}/{}", consts::HA_CONTROL_TOPIC, thing, channel, leaf)
}

/// Thing level topic: ihcgate/<thing>/<leaf>
pub fn thing_topic(thing: &str, leaf: &str) -> String {
    format!("{}/{}/{}", consts::HA_CONTROL_TOPIC, thing, leaf)
}

/// Device identifier
#[derive(Serialize, Debug, Default)]
pub struct DeviceId {
    pub name: String,
    /// Thing name, unique per gate instance.
    pub identifiers: Vec<String>,
    pub manufacturer: String,
}

/// Discovery origin - this software identifier.
#[derive(Serialize, Debug, Default)]
pub struct Origin {
    name: String,
    sw_version: String,
    support_url: String,
}

/// Represents a component - a part of Device defined by Discovery
#[derive(Serialize, Debug, Default)]
pub struct Component {
    pub name: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    pub state_topic: String,
    pub availability_topic: String,
    pub availability_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<String>,
}

impl Component {
    fn new(thing: &str, channel: &str, name: &str, platform: &str) -> Self {
        Self {
            name: name.to_string(),
            platform: platform.to_string(),
            unique_id: format!("ihc-gate-{}-{}", thing, channel),
            state_topic: channel_topic(thing, channel, "state"),
            availability_topic: thing_topic(thing, "status"),
            availability_template: "{{ value_json.status }}".to_string(),
            ..Default::default()
        }
    }

    fn writable(mut self, thing: &str, channel: &str) -> Self {
        self.command_topic = Some(channel_topic(thing, channel, "set"));
        self
    }

    fn on_off(mut self, on: &str, off: &str) -> Self {
        self.payload_on = Some(on.to_string());
        self.payload_off = Some(off.to_string());
        self
    }

    fn class(mut self, device_class: &str) -> Self {
        self.device_class = Some(device_class.to_string());
        self
    }

    /// Component for a configured resource channel.
    pub fn for_channel(thing: &str, channel: &str, config: &ChannelConfig) -> Self {
        let name = config.label.as_deref().unwrap_or(channel);
        let writable = config.direction != Direction::ReadOnly;
        match config.kind {
            ChannelKind::Switch if writable => Self::new(thing, channel, name, "switch")
                .writable(thing, channel)
                .on_off("ON", "OFF"),
            ChannelKind::Switch => {
                Self::new(thing, channel, name, "binary_sensor").on_off("ON", "OFF")
            }
            ChannelKind::Contact => Self::new(thing, channel, name, "binary_sensor")
                .on_off("OPEN", "CLOSED")
                .class("opening"),
            ChannelKind::Number if writable => {
                Self::new(thing, channel, name, "number").writable(thing, channel)
            }
            ChannelKind::Number => Self::new(thing, channel, name, "sensor"),
            ChannelKind::Dimmer => {
                let mut component = Self::new(thing, channel, name, "number");
                component.min = Some(0.0);
                component.max = Some(100.0);
                component.unit_of_measurement = Some("%".to_string());
                if writable {
                    component = component.writable(thing, channel);
                }
                component
            }
            ChannelKind::String if writable => {
                Self::new(thing, channel, name, "text").writable(thing, channel)
            }
            ChannelKind::String => Self::new(thing, channel, name, "sensor"),
            ChannelKind::PushButton => {
                let mut component = Self::new(thing, channel, name, "event").class("button");
                component.state_topic = channel_topic(thing, channel, "event");
                component.event_types = [
                    ButtonEvent::Pressed,
                    ButtonEvent::Released,
                    ButtonEvent::ShortPress,
                    ButtonEvent::LongPress,
                ]
                .iter()
                .map(|e| e.as_str().to_string())
                .collect();
                component
            }
            ChannelKind::RfLowBattery => Self::new(thing, channel, name, "binary_sensor")
                .on_off("ON", "OFF")
                .class("battery"),
            ChannelKind::RfSignalStrength => Self::new(thing, channel, name, "sensor"),
        }
    }
}

// config topic: homeassistant/device/<object_id>/config
#[derive(Serialize, Debug)]
pub struct Discovery {
    pub device: DeviceId,
    pub origin: Origin,

    pub components: HashMap<String, Component>,
}

impl Discovery {
    pub fn serialize(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Topics HA publishes commands on.
    pub fn command_topics(&self) -> impl Iterator<Item = &str> {
        self.components
            .values()
            .filter_map(|c| c.command_topic.as_deref())
    }
}

pub fn new_device(name: &str, config: &Config) -> Discovery {
    let thing = &config.thing;
    let origin = Origin {
        name: consts::GATE_NAME.to_string(),
        sw_version: consts::GATE_VERSION.to_string(),
        support_url: consts::GATE_URL.to_string(),
    };

    let device_id = DeviceId {
        name: name.to_string(),
        identifiers: vec![format!("ihc-gate-{}", thing)],
        manufacturer: "IHC / ELKO".to_string(),
    };

    let mut components = HashMap::new();

    let state = Component::new(thing, consts::CHANNEL_CONTROLLER_STATE, "Controller state", "sensor");
    components.insert(consts::CHANNEL_CONTROLLER_STATE.to_string(), state);

    let mut uptime =
        Component::new(thing, consts::CHANNEL_CONTROLLER_UPTIME, "Controller uptime", "sensor")
            .class("duration");
    uptime.unit_of_measurement = Some("s".to_string());
    components.insert(consts::CHANNEL_CONTROLLER_UPTIME.to_string(), uptime);

    let time = Component::new(thing, consts::CHANNEL_CONTROLLER_TIME, "Controller time", "sensor")
        .class("timestamp");
    components.insert(consts::CHANNEL_CONTROLLER_TIME.to_string(), time);

    for (channel, cfg) in &config.channels {
        components.insert(channel.clone(), Component::for_channel(thing, channel, cfg));
    }

    Discovery {
        origin,
        device: device_id,
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
thing: ihc1
controller:
  hostname: 10.0.0.2
channels:
  kitchen:
    type: switch
    resource_id: 100
  window:
    type: contact
    resource_id: 101
    direction: read_only
  doorbell:
    type: push_button
    resource_id: 102
"#;

    #[test]
    fn components_follow_channel_kinds() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let discovery = new_device("House", &config);

        let kitchen = &discovery.components["kitchen"];
        assert_eq!(kitchen.platform, "switch");
        assert_eq!(kitchen.command_topic.as_deref(), Some("ihcgate/ihc1/kitchen/set"));
        assert_eq!(kitchen.state_topic, "ihcgate/ihc1/kitchen/state");

        let window = &discovery.components["window"];
        assert_eq!(window.platform, "binary_sensor");
        assert!(window.command_topic.is_none());
        assert_eq!(window.payload_on.as_deref(), Some("OPEN"));

        let doorbell = &discovery.components["doorbell"];
        assert_eq!(doorbell.platform, "event");
        assert_eq!(doorbell.state_topic, "ihcgate/ihc1/doorbell/event");
        assert!(doorbell.event_types.contains(&"LONG_PRESS".to_string()));

        assert!(discovery.components.contains_key(consts::CHANNEL_CONTROLLER_TIME));
        assert_eq!(discovery.command_topics().count(), 1);
    }

    #[test]
    fn serializes_without_empty_fields() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let json = new_device("House", &config).serialize().unwrap();
        assert!(json.contains("\"identifiers\":[\"ihc-gate-ihc1\"]"));
        assert!(!json.contains("event_types\":[]"));
    }
}
