mod connection;
pub mod discovery;
mod host;
mod message;

pub use connection::{HomeAssistant, Initiator};
pub use host::MqttHost;
pub use message::{Incoming, Outgoing};
