//! Host runtime seam: where channel states, trigger events and the thing
//! status end up.

mod memory;

pub use memory::{HostEvent, MemoryHost};

use crate::types::{State, StatusDetail, ThingStatus};
use std::collections::BTreeMap;

/// Calls are made from scheduler tasks and must not block.
pub trait Host: Send + Sync {
    fn update_state(&self, channel: &str, state: State);
    fn trigger(&self, channel: &str, event: &str);
    fn update_status(&self, status: ThingStatus, detail: StatusDetail, reason: Option<&str>);
    fn update_properties(&self, properties: BTreeMap<String, String>);
    /// Whether any item is linked to the channel.
    fn is_linked(&self, channel: &str) -> bool;
}
