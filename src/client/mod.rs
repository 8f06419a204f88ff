//! Controller client seam.
//!
//! The vendor client owns the wire protocol. The handler only sees this
//! trait plus a stream of [`ControllerEvent`]s the client pushes from its
//! own I/O tasks.

pub mod loopback;

use crate::config::ControllerConfig;
use crate::consts::ResourceId;
use crate::error::ClientError;
use crate::value::{EnumDefinition, ResourceValue};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Asynchronous notifications from the controller.
#[derive(Clone, Debug)]
pub enum ControllerEvent {
    ConnectionError(ClientError),
    StateChanged(String),
    ValueUpdated(ResourceValue),
    RfDevicesPolled(Vec<RfDevice>),
}

pub type EventSender = mpsc::UnboundedSender<ControllerEvent>;

#[derive(Clone, Debug, Default)]
pub struct SystemInfo {
    pub brand: String,
    pub serial_number: String,
    pub version: String,
    pub hw_revision: String,
    /// Milliseconds since controller start.
    pub uptime: u64,
    pub sw_date: DateTime<Utc>,
    pub production_date: String,
    pub application_is_without_viewer: bool,
    pub dataline_version: String,
    pub rf_module_serial_number: String,
    pub rf_module_software_version: String,
}

/// Identifies a controller project revision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectInfo {
    pub project_number: String,
    pub last_modified: NaiveDateTime,
}

#[derive(Clone, Debug)]
pub struct TimeSettings {
    pub time_and_date_utc: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RfDevice {
    pub serial_number: u64,
    /// 1 is a healthy battery.
    pub battery_level: i32,
    pub signal_strength: i32,
}

/// Project artifact downloaded from the controller, already parsed by the
/// client into what the handler needs.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ProjectFile {
    pub info: ProjectInfo,
    pub enums: Vec<EnumDefinition>,
    /// Raw project document.
    pub data: Vec<u8>,
}

#[async_trait]
pub trait ControllerClient: Send + Sync {
    async fn open_connection(&self) -> Result<(), ClientError>;
    async fn close_connection(&self) -> Result<(), ClientError>;
    fn connection_state(&self) -> ConnectionState;

    /// Register the event sink and start pushing controller events to it.
    async fn start_event_listeners(&self, events: EventSender) -> Result<(), ClientError>;

    async fn resource_query(&self, id: ResourceId) -> Result<ResourceValue, ClientError>;
    /// Current value including type information, `None` for unknown resources.
    async fn resource_value_information(
        &self,
        id: ResourceId,
    ) -> Result<Option<ResourceValue>, ClientError>;
    async fn resource_update(&self, value: &ResourceValue) -> Result<bool, ClientError>;
    async fn enable_runtime_value_notifications(
        &self,
        ids: &BTreeSet<ResourceId>,
    ) -> Result<(), ClientError>;

    async fn controller_state(&self) -> Result<String, ClientError>;
    async fn system_info(&self) -> Result<SystemInfo, ClientError>;
    async fn project_info(&self) -> Result<ProjectInfo, ClientError>;
    async fn time_settings(&self) -> Result<TimeSettings, ClientError>;
    async fn detected_rf_devices(&self) -> Result<Vec<RfDevice>, ClientError>;
    async fn project_file(&self) -> Result<ProjectFile, ClientError>;
}

/// Creates a fresh client for every connection attempt.
pub trait ClientFactory: Send + Sync {
    fn create(&self, config: &ControllerConfig) -> Arc<dyn ControllerClient>;
}
