//! Controller thing handler.
//!
//! All state shared between the scheduled tasks lives in one [`Context`]:
//! the supervisor loop, the dispatch loop, RF polling and the one-shot
//! timers all hold an `Arc` to it. Locks are plain std mutexes and are
//! never held across an `.await`.

mod button;
mod command;
mod debounce;
mod dispatcher;
mod info;
mod project;
mod rf;
mod supervisor;

pub use button::{ButtonChannel, ButtonClassifier};
pub use command::update_resource;
pub use debounce::NotificationDebouncer;
pub use rf::system_wide_signal_level;
pub use supervisor::{Flags, SupervisorFlags};

use crate::client::{ClientFactory, ControllerClient, ControllerEvent, ProjectFile};
use crate::config::{
    ChannelConfig, ChannelKind, ChannelParams, Config, ControllerConfig, TimingConfig,
};
use crate::consts::{self, ResourceId};
use crate::error::ConversionError;
use crate::host::Host;
use crate::lock;
use crate::types::{Command, ItemKind};
use crate::value::{EnumDictionary, EnumValue, ResourceValue, Value};
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

/// A configured channel of the thing.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: String,
    pub config: ChannelConfig,
}

impl Channel {
    pub fn params(&self) -> Result<ChannelParams, ConversionError> {
        ChannelParams::new(&self.id, &self.config)
    }
}

/// Tasks living as long as one controller connection.
#[derive(Default)]
struct ConnectionTasks {
    dispatch: Option<JoinHandle<()>>,
    rf_poll: Option<JoinHandle<()>>,
}

pub(crate) struct Context {
    thing: String,
    controller: ControllerConfig,
    timing: TimingConfig,
    channels: Vec<Channel>,
    host: Arc<dyn Host>,
    factory: Arc<dyn ClientFactory>,

    flags: Flags,
    connection: Mutex<Option<Arc<dyn ControllerClient>>>,
    linked: Mutex<HashSet<ResourceId>>,
    project: Mutex<Option<ProjectFile>>,
    enums: Mutex<EnumDictionary>,
    /// Last controller state seen on the event stream.
    controller_state: Mutex<String>,
    debouncer: NotificationDebouncer,
    buttons: ButtonClassifier,
    tasks: Mutex<ConnectionTasks>,

    /// Held by a tick for its whole run and by `dispose` while tearing down.
    session: tokio::sync::Mutex<()>,
    tick_job: Mutex<Option<AbortHandle>>,
    disposed: AtomicBool,
}

impl Context {
    fn client(&self) -> Option<Arc<dyn ControllerClient>> {
        lock(&self.connection).clone()
    }

    fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Resource ids of all channels the host has linked.
    fn linked_channels_resource_ids(&self) -> HashSet<ResourceId> {
        self.channels
            .iter()
            .filter(|c| self.host.is_linked(&c.id))
            .filter_map(|c| match c.params() {
                Ok(params) => {
                    debug!(
                        "Linked channel '{}' found, resource id '{:?}'",
                        c.id, params.resource_id
                    );
                    params.resource_id
                }
                Err(e) => {
                    warn!("Channel param error, reason: {}.", e);
                    None
                }
            })
            .collect()
    }

    /// Push-button resources need notifications even when nothing is linked.
    fn trigger_channels_resource_ids(&self) -> BTreeSet<ResourceId> {
        self.channels
            .iter()
            .filter(|c| c.config.kind == ChannelKind::PushButton)
            .filter_map(|c| c.params().ok().and_then(|p| p.resource_id))
            .collect()
    }

    fn enum_values(&self, value: &ResourceValue) -> Option<Vec<EnumValue>> {
        match &value.value {
            Value::Enum {
                definition_type_id, ..
            } => lock(&self.enums)
                .values(*definition_type_id)
                .map(|v| v.to_vec()),
            _ => None,
        }
    }
}

/// Handler of a single controller thing.
pub struct IhcHandler {
    ctx: Arc<Context>,
    control_job: Mutex<Option<JoinHandle<()>>>,
}

impl IhcHandler {
    pub fn new(config: &Config, host: Arc<dyn Host>, factory: Arc<dyn ClientFactory>) -> Self {
        let flags = Flags::default();
        let channels = config
            .channels
            .iter()
            .map(|(id, cfg)| Channel {
                id: id.clone(),
                config: cfg.clone(),
            })
            .collect();

        let ctx = Context {
            thing: config.thing.clone(),
            controller: config.controller.clone(),
            timing: config.timing.clone(),
            channels,
            debouncer: NotificationDebouncer::new(
                config.timing.notification_debounce(),
                flags.clone(),
            ),
            buttons: ButtonClassifier::new(host.clone(), config.timing.max_long_press()),
            host,
            factory,
            flags,
            connection: Mutex::new(None),
            linked: Mutex::new(HashSet::new()),
            project: Mutex::new(None),
            enums: Mutex::new(EnumDictionary::default()),
            controller_state: Mutex::new(String::new()),
            tasks: Mutex::new(ConnectionTasks::default()),
            session: tokio::sync::Mutex::new(()),
            tick_job: Mutex::new(None),
            disposed: AtomicBool::new(false),
        };

        Self {
            ctx: Arc::new(ctx),
            control_job: Mutex::new(None),
        }
    }

    /// Collect linked resources and start the supervisor loop.
    pub fn initialize(&self) {
        debug!("Using configuration: {:?}", self.ctx.controller.hostname);

        let linked = self.ctx.linked_channels_resource_ids();
        debug!("Linked resources {}: {:?}", linked.len(), linked);
        *lock(&self.ctx.linked) = linked;
        self.ctx.disposed.store(false, Ordering::SeqCst);

        let mut job = lock(&self.control_job);
        if job.as_ref().map_or(true, |j| j.is_finished()) {
            debug!(
                "Start control task, interval={:?}",
                self.ctx.timing.tick_interval()
            );
            *job = Some(tokio::spawn(supervisor::control_loop(self.ctx.clone())));
        }
    }

    /// Stop the supervisor and close the connection. A tick that is still
    /// connecting is aborted or, when it can't be, waited for and undone.
    pub async fn dispose(&self) {
        debug!("Stopping thing");
        self.ctx.disposed.store(true, Ordering::SeqCst);
        if let Some(job) = lock(&self.control_job).take() {
            job.abort();
        }
        if let Some(tick) = lock(&self.ctx.tick_job).take() {
            tick.abort();
        }

        let _session = self.ctx.session.lock().await;
        self.ctx.debouncer.cancel();
        self.ctx.disconnect().await;
    }

    /// One supervisor step. The control loop started by `initialize` calls
    /// this every tick interval.
    pub async fn tick(&self) {
        self.ctx.tick().await;
    }

    pub async fn handle_command(&self, channel_id: &str, command: Command) {
        self.ctx.handle_command(channel_id, command).await;
    }

    pub async fn channel_linked(&self, channel_id: &str) {
        debug!("channelLinked: {}", channel_id);
        let ctx = &self.ctx;

        match channel_id {
            consts::CHANNEL_CONTROLLER_STATE
            | consts::CHANNEL_CONTROLLER_UPTIME
            | consts::CHANNEL_CONTROLLER_TIME => {
                if let Some(client) = ctx.client() {
                    ctx.update_controller_channel(client.as_ref(), channel_id).await;
                }
            }
            _ => {
                let Some(channel) = ctx.channel(channel_id) else {
                    return;
                };
                match channel.params() {
                    Ok(params) => {
                        if let Some(id) = params.resource_id {
                            if lock(&ctx.linked).insert(id) {
                                debug!("New channel '{}' found, resource id '{}'", channel_id, id);
                                ctx.debouncer.schedule();
                            }
                        }
                    }
                    Err(e) => warn!("Channel param error, reason: {}.", e),
                }
            }
        }
    }

    pub fn channel_unlinked(&self, channel_id: &str) {
        debug!("channelUnlinked: {}", channel_id);
        let ctx = &self.ctx;

        match channel_id {
            consts::CHANNEL_CONTROLLER_STATE
            | consts::CHANNEL_CONTROLLER_UPTIME
            | consts::CHANNEL_CONTROLLER_TIME => {}
            _ => {
                let Some(channel) = ctx.channel(channel_id) else {
                    return;
                };
                match channel.params() {
                    Ok(params) => {
                        if let Some(id) = params.resource_id {
                            lock(&ctx.linked).remove(&id);
                            ctx.debouncer.schedule();
                        }
                    }
                    Err(e) => warn!("Channel param error, reason: {}.", e),
                }
            }
        }
    }

    /// Feed a controller event as if it came from the client.
    pub fn dispatch(&self, event: ControllerEvent) {
        self.ctx.dispatch(event);
    }

    pub fn flags(&self) -> SupervisorFlags {
        self.ctx.flags.get()
    }

    pub fn linked_resources(&self) -> BTreeSet<ResourceId> {
        lock(&self.ctx.linked).iter().copied().collect()
    }

    pub fn has_cached_project(&self) -> bool {
        lock(&self.ctx.project).is_some()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.ctx.channels
    }

    /// Item kind a command for this channel should be parsed as.
    pub fn command_kind(&self, channel_id: &str) -> Option<ItemKind> {
        match channel_id {
            consts::CHANNEL_CONTROLLER_STATE => Some(ItemKind::String),
            consts::CHANNEL_CONTROLLER_UPTIME => Some(ItemKind::Number),
            consts::CHANNEL_CONTROLLER_TIME => Some(ItemKind::DateTime),
            _ => self.ctx.channel(channel_id)?.config.kind.item_kind(),
        }
    }
}
