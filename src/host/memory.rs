use super::Host;
use crate::types::{State, StatusDetail, ThingStatus};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, PartialEq, Debug)]
pub enum HostEvent {
    State {
        channel: String,
        state: State,
    },
    Trigger {
        channel: String,
        event: String,
    },
    Status {
        status: ThingStatus,
        detail: StatusDetail,
        reason: Option<String>,
    },
    Properties(BTreeMap<String, String>),
}

/// Records every host call. Channels are linked unless marked otherwise.
#[derive(Default)]
pub struct MemoryHost {
    events: Mutex<Vec<HostEvent>>,
    unlinked: Mutex<HashSet<String>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn events_lock(&self) -> MutexGuard<'_, Vec<HostEvent>> {
        crate::lock(&self.events)
    }

    pub fn set_linked(&self, channel: &str, linked: bool) {
        let mut unlinked = crate::lock(&self.unlinked);
        if linked {
            unlinked.remove(channel);
        } else {
            unlinked.insert(channel.to_string());
        }
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events_lock().clone()
    }

    pub fn clear(&self) {
        self.events_lock().clear();
    }

    /// Trigger events of one channel, in emission order.
    pub fn triggers(&self, channel: &str) -> Vec<String> {
        self.events_lock()
            .iter()
            .filter_map(|e| match e {
                HostEvent::Trigger { channel: c, event } if c == channel => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self, channel: &str) -> Vec<State> {
        self.events_lock()
            .iter()
            .filter_map(|e| match e {
                HostEvent::State { channel: c, state } if c == channel => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<(ThingStatus, StatusDetail, Option<String>)> {
        self.events_lock().iter().rev().find_map(|e| match e {
            HostEvent::Status {
                status,
                detail,
                reason,
            } => Some((*status, *detail, reason.clone())),
            _ => None,
        })
    }

    pub fn last_properties(&self) -> Option<BTreeMap<String, String>> {
        self.events_lock().iter().rev().find_map(|e| match e {
            HostEvent::Properties(p) => Some(p.clone()),
            _ => None,
        })
    }
}

impl Host for MemoryHost {
    fn update_state(&self, channel: &str, state: State) {
        self.events_lock().push(HostEvent::State {
            channel: channel.to_string(),
            state,
        });
    }

    fn trigger(&self, channel: &str, event: &str) {
        self.events_lock().push(HostEvent::Trigger {
            channel: channel.to_string(),
            event: event.to_string(),
        });
    }

    fn update_status(&self, status: ThingStatus, detail: StatusDetail, reason: Option<&str>) {
        self.events_lock().push(HostEvent::Status {
            status,
            detail,
            reason: reason.map(|r| r.to_string()),
        });
    }

    fn update_properties(&self, properties: BTreeMap<String, String>) {
        self.events_lock().push(HostEvent::Properties(properties));
    }

    fn is_linked(&self, channel: &str) -> bool {
        !crate::lock(&self.unlinked).contains(channel)
    }
}
