use chrono::{DateTime, Local};
use serde::Deserialize;
use std::fmt;

/// Item type a channel accepts on the host side.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Switch,
    Contact,
    Number,
    Dimmer,
    String,
    DateTime,
}

/// Typed state pushed to the host, also used as command payload.
#[derive(Clone, PartialEq, Debug)]
pub enum State {
    OnOff(bool),
    /// `true` is OPEN.
    OpenClosed(bool),
    Decimal(f64),
    Percent(u8),
    Text(String),
    DateTime(DateTime<Local>),
}

impl State {
    pub fn item_kind(&self) -> ItemKind {
        match self {
            Self::OnOff(_) => ItemKind::Switch,
            Self::OpenClosed(_) => ItemKind::Contact,
            Self::Decimal(_) => ItemKind::Number,
            Self::Percent(_) => ItemKind::Dimmer,
            Self::Text(_) => ItemKind::String,
            Self::DateTime(_) => ItemKind::DateTime,
        }
    }

    /// Parse a host payload for an item of the given kind.
    pub fn parse(payload: &str, kind: ItemKind) -> Option<Self> {
        let payload = payload.trim();
        match kind {
            ItemKind::Switch => match payload {
                "ON" => Some(Self::OnOff(true)),
                "OFF" => Some(Self::OnOff(false)),
                _ => None,
            },
            ItemKind::Contact => match payload {
                "OPEN" => Some(Self::OpenClosed(true)),
                "CLOSED" => Some(Self::OpenClosed(false)),
                _ => None,
            },
            ItemKind::Number => payload.parse().ok().map(Self::Decimal),
            ItemKind::Dimmer => match payload {
                "ON" => Some(Self::Percent(100)),
                "OFF" => Some(Self::Percent(0)),
                _ => payload
                    .parse::<u8>()
                    .ok()
                    .filter(|p| *p <= 100)
                    .map(Self::Percent),
            },
            ItemKind::String => Some(Self::Text(payload.to_string())),
            ItemKind::DateTime => DateTime::parse_from_rfc3339(payload)
                .ok()
                .map(|t| Self::DateTime(t.with_timezone(&Local))),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnOff(true) => write!(f, "ON"),
            Self::OnOff(false) => write!(f, "OFF"),
            Self::OpenClosed(true) => write!(f, "OPEN"),
            Self::OpenClosed(false) => write!(f, "CLOSED"),
            Self::Decimal(v) => write!(f, "{}", v),
            Self::Percent(p) => write!(f, "{}", p),
            Self::Text(t) => write!(f, "{}", t),
            Self::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// Commands the host sends to a channel.
#[derive(Clone, PartialEq, Debug)]
pub enum Command {
    /// Re-read the current value.
    Refresh,
    Set(State),
}

impl Command {
    pub fn parse(payload: &str, kind: ItemKind) -> Option<Self> {
        if payload.trim() == "REFRESH" {
            return Some(Self::Refresh);
        }
        State::parse(payload, kind).map(Self::Set)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refresh => write!(f, "REFRESH"),
            Self::Set(state) => state.fmt(f),
        }
    }
}

/// Coarse thing status reported to the host.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ThingStatus {
    Online,
    Offline,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum StatusDetail {
    None,
    CommunicationError,
    BridgeOffline,
}

impl fmt::Display for ThingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl fmt::Display for StatusDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::CommunicationError => write!(f, "communication_error"),
            Self::BridgeOffline => write!(f, "bridge_offline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_per_item_kind() {
        assert_eq!(
            Command::parse("ON", ItemKind::Switch),
            Some(Command::Set(State::OnOff(true)))
        );
        assert_eq!(Command::parse("REFRESH", ItemKind::Number), Some(Command::Refresh));
        assert_eq!(
            Command::parse("21.5", ItemKind::Number),
            Some(Command::Set(State::Decimal(21.5)))
        );
        assert_eq!(Command::parse("150", ItemKind::Dimmer), None);
        assert_eq!(Command::parse("maybe", ItemKind::Contact), None);
    }

    #[test]
    fn state_payloads() {
        assert_eq!(State::OnOff(false).to_string(), "OFF");
        assert_eq!(State::OpenClosed(true).to_string(), "OPEN");
        assert_eq!(State::Percent(40).to_string(), "40");
    }
}
