//! In-memory controller.
//!
//! Holds resource values locally and echoes writes back as value
//! notifications, the way a real controller does for subscribed resources.
//! Used for commissioning without hardware and as the test controller, so
//! it can also inject failures and count calls.

use super::{
    ClientFactory, ConnectionState, ControllerClient, ControllerEvent, EventSender, ProjectFile,
    ProjectInfo, RfDevice, SystemInfo, TimeSettings,
};
use crate::config::ControllerConfig;
use crate::consts::{self, ResourceId};
use crate::error::ClientError;
use crate::value::{ResourceValue, Value};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

struct Inner {
    connection: ConnectionState,
    resources: BTreeMap<ResourceId, Value>,
    subscribed: BTreeSet<ResourceId>,
    events: Option<EventSender>,
    controller_state: String,
    project: ProjectFile,
    rf_devices: Vec<RfDevice>,
    open_delay: Duration,
}

/// Call counters, readable by tests.
#[derive(Default, Debug)]
pub struct Calls {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub updates: AtomicUsize,
    pub notification_requests: AtomicUsize,
    pub project_downloads: AtomicUsize,
}

/// Pending failures, each counter is consumed by one failing call.
#[derive(Default, Debug)]
pub struct Failures {
    pub open: AtomicUsize,
    pub update: AtomicUsize,
    pub notifications: AtomicUsize,
    pub project_info: AtomicUsize,
}

pub struct LoopbackController {
    inner: Mutex<Inner>,
    started: Instant,
    pub calls: Calls,
    pub failures: Failures,
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl LoopbackController {
    pub fn new(resources: BTreeMap<ResourceId, Value>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                connection: ConnectionState::Disconnected,
                resources,
                subscribed: BTreeSet::new(),
                events: None,
                controller_state: consts::CONTROLLER_STATE_READY.to_string(),
                project: ProjectFile::default(),
                rf_devices: Vec::new(),
                open_delay: Duration::ZERO,
            }),
            started: Instant::now(),
            calls: Calls::default(),
            failures: Failures::default(),
        }
    }

    pub fn with_project(self, project: ProjectFile) -> Self {
        self.lock().project = project;
        self
    }

    pub fn with_rf_devices(self, devices: Vec<RfDevice>) -> Self {
        self.lock().rf_devices = devices;
        self
    }

    /// Make `open_connection` take this long, like a controller behind a slow link.
    pub fn with_open_delay(self, delay: Duration) -> Self {
        self.lock().open_delay = delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        crate::lock(&self.inner)
    }

    fn connected(&self) -> Result<(), ClientError> {
        if self.lock().connection != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        Ok(())
    }

    /// Push an event to the registered listener. Returns false when nobody listens.
    pub fn inject(&self, event: ControllerEvent) -> bool {
        let inner = self.lock();
        match &inner.events {
            Some(events) => events.send(event).is_ok(),
            None => false,
        }
    }

    /// Simulate a value change on the controller side (eg. a pressed button).
    pub fn set_value(&self, id: ResourceId, value: Value) {
        let mut inner = self.lock();
        inner.resources.insert(id, value.clone());
        if inner.subscribed.contains(&id) {
            if let Some(events) = &inner.events {
                let _ = events.send(ControllerEvent::ValueUpdated(ResourceValue::new(id, value)));
            }
        }
    }

    pub fn value(&self, id: ResourceId) -> Option<Value> {
        self.lock().resources.get(&id).cloned()
    }

    pub fn subscribed(&self) -> BTreeSet<ResourceId> {
        self.lock().subscribed.clone()
    }

    pub fn set_controller_state(&self, state: &str) {
        self.lock().controller_state = state.to_string();
    }

    pub fn set_project(&self, project: ProjectFile) {
        self.lock().project = project;
    }
}

#[async_trait]
impl ControllerClient for LoopbackController {
    async fn open_connection(&self) -> Result<(), ClientError> {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        let delay = self.lock().open_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if take_failure(&self.failures.open) {
            return Err(ClientError::Communication("connection refused".into()));
        }
        self.lock().connection = ConnectionState::Connected;
        Ok(())
    }

    async fn close_connection(&self) -> Result<(), ClientError> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        inner.connection = ConnectionState::Disconnected;
        inner.events = None;
        inner.subscribed.clear();
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        self.lock().connection
    }

    async fn start_event_listeners(&self, events: EventSender) -> Result<(), ClientError> {
        self.connected()?;
        let mut inner = self.lock();
        let state = inner.controller_state.clone();
        let _ = events.send(ControllerEvent::StateChanged(state));
        inner.events = Some(events);
        Ok(())
    }

    async fn resource_query(&self, id: ResourceId) -> Result<ResourceValue, ClientError> {
        self.connected()?;
        self.lock()
            .resources
            .get(&id)
            .map(|v| ResourceValue::new(id, v.clone()))
            .ok_or_else(|| ClientError::Protocol(format!("unknown resource {}", id)))
    }

    async fn resource_value_information(
        &self,
        id: ResourceId,
    ) -> Result<Option<ResourceValue>, ClientError> {
        self.connected()?;
        Ok(self
            .lock()
            .resources
            .get(&id)
            .map(|v| ResourceValue::new(id, v.clone())))
    }

    async fn resource_update(&self, value: &ResourceValue) -> Result<bool, ClientError> {
        self.calls.updates.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failures.update) {
            return Err(ClientError::Timeout);
        }
        self.connected()?;
        let mut inner = self.lock();
        if !inner.resources.contains_key(&value.resource_id) {
            return Ok(false);
        }
        debug!("Loopback write {:?}", value);
        inner.resources.insert(value.resource_id, value.value.clone());
        if inner.subscribed.contains(&value.resource_id) {
            if let Some(events) = &inner.events {
                let _ = events.send(ControllerEvent::ValueUpdated(value.clone()));
            }
        }
        Ok(true)
    }

    async fn enable_runtime_value_notifications(
        &self,
        ids: &BTreeSet<ResourceId>,
    ) -> Result<(), ClientError> {
        self.calls.notification_requests.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failures.notifications) {
            return Err(ClientError::Communication("subscription rejected".into()));
        }
        self.connected()?;
        self.lock().subscribed = ids.clone();
        Ok(())
    }

    async fn controller_state(&self) -> Result<String, ClientError> {
        self.connected()?;
        Ok(self.lock().controller_state.clone())
    }

    async fn system_info(&self) -> Result<SystemInfo, ClientError> {
        self.connected()?;
        Ok(SystemInfo {
            brand: "loopback".into(),
            serial_number: "LB-0001".into(),
            version: consts::GATE_VERSION.into(),
            hw_revision: "1".into(),
            uptime: self.started.elapsed().as_millis() as u64,
            sw_date: Utc::now(),
            ..Default::default()
        })
    }

    async fn project_info(&self) -> Result<ProjectInfo, ClientError> {
        if take_failure(&self.failures.project_info) {
            return Err(ClientError::Timeout);
        }
        self.connected()?;
        Ok(self.lock().project.info.clone())
    }

    async fn time_settings(&self) -> Result<TimeSettings, ClientError> {
        self.connected()?;
        Ok(TimeSettings {
            time_and_date_utc: Utc::now(),
        })
    }

    async fn detected_rf_devices(&self) -> Result<Vec<RfDevice>, ClientError> {
        self.connected()?;
        Ok(self.lock().rf_devices.clone())
    }

    async fn project_file(&self) -> Result<ProjectFile, ClientError> {
        self.connected()?;
        self.calls.project_downloads.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().project.clone())
    }
}

/// Hands out one shared loopback controller for every connection attempt.
pub struct LoopbackFactory {
    controller: Arc<LoopbackController>,
    pub created: AtomicUsize,
}

impl LoopbackFactory {
    pub fn new(controller: Arc<LoopbackController>) -> Self {
        Self {
            controller,
            created: AtomicUsize::new(0),
        }
    }

    pub fn controller(&self) -> &Arc<LoopbackController> {
        &self.controller
    }
}

impl ClientFactory for LoopbackFactory {
    fn create(&self, config: &ControllerConfig) -> Arc<dyn ControllerClient> {
        debug!("Creating loopback client for '{}'", config.hostname);
        self.created.fetch_add(1, Ordering::SeqCst);
        self.controller.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn echoes_subscribed_writes() {
        let controller = LoopbackController::new(BTreeMap::from([(5, Value::Boolean(false))]));
        controller.open_connection().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.start_event_listeners(tx).await.unwrap();
        assert!(matches!(rx.recv().await, Some(ControllerEvent::StateChanged(_))));

        controller
            .enable_runtime_value_notifications(&BTreeSet::from([5]))
            .await
            .unwrap();
        let written = ResourceValue::new(5, Value::Boolean(true));
        assert_eq!(controller.resource_update(&written).await, Ok(true));
        match rx.recv().await {
            Some(ControllerEvent::ValueUpdated(v)) => assert_eq!(v, written),
            other => panic!("unexpected {:?}", other),
        }

        let unknown = ResourceValue::new(6, Value::Boolean(true));
        assert_eq!(controller.resource_update(&unknown).await, Ok(false));
    }

    #[tokio::test]
    async fn failures_are_consumed() {
        let controller = LoopbackController::new(BTreeMap::new());
        controller.failures.open.store(1, Ordering::SeqCst);
        assert!(controller.open_connection().await.is_err());
        assert!(controller.open_connection().await.is_ok());
        assert_eq!(controller.calls.opens.load(Ordering::SeqCst), 2);
        assert_eq!(controller.connection_state(), ConnectionState::Connected);
    }
}
