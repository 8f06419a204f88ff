use super::{dispatcher, Context};
use crate::client::{ConnectionState, ControllerClient};
use crate::consts::ResourceId;
use crate::error::ClientError;
use crate::lock;
use crate::types::{StatusDetail, ThingStatus};
use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Requests exchanged between the supervisor tick and the other tasks.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct SupervisorFlags {
    pub reconnect_requested: bool,
    pub value_notification_requested: bool,
    /// Only true while a connect attempt runs.
    pub connecting: bool,
}

/// Supervisor flags behind a single lock.
#[derive(Clone, Default)]
pub struct Flags(Arc<Mutex<SupervisorFlags>>);

impl Flags {
    pub fn get(&self) -> SupervisorFlags {
        *lock(&self.0)
    }

    pub fn set_reconnect_requested(&self, value: bool) {
        lock(&self.0).reconnect_requested = value;
    }

    pub fn set_value_notification_requested(&self, value: bool) {
        lock(&self.0).value_notification_requested = value;
    }

    fn set_connecting(&self, value: bool) {
        lock(&self.0).connecting = value;
    }
}

/// Keeps `connecting` set for the lifetime of a connect attempt.
struct ConnectingGuard<'a>(&'a Flags);

impl<'a> ConnectingGuard<'a> {
    fn new(flags: &'a Flags) -> Self {
        flags.set_connecting(true);
        Self(flags)
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.set_connecting(false);
    }
}

/// Fixed-delay supervisor loop. Each tick runs as its own task so a panic
/// inside one tick doesn't stop the next one. The running tick can be
/// aborted through `Context::tick_job`.
pub(super) async fn control_loop(ctx: Arc<Context>) {
    loop {
        let tick_ctx = ctx.clone();
        let tick = tokio::spawn(async move { tick_ctx.tick().await });
        *lock(&ctx.tick_job) = Some(tick.abort_handle());
        match tick.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => debug!("Supervisor tick cancelled"),
            Err(e) => error!("Supervisor tick failed: {}", e),
        }
        tokio::time::sleep(ctx.timing.tick_interval()).await;
    }
}

impl Context {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Connect attempts racing with `dispose` stop at the next check.
    fn ensure_running(&self) -> Result<(), ClientError> {
        if self.is_disposed() {
            return Err(ClientError::NotConnected);
        }
        Ok(())
    }

    pub(super) async fn tick(self: &Arc<Self>) {
        let _session = self.session.lock().await;
        if self.is_disposed() {
            return;
        }

        if self.client().is_none() || self.flags.get().reconnect_requested {
            if self.client().is_some() {
                self.disconnect().await;
            }
            match self.connect().await {
                Ok(()) => self.flags.set_reconnect_requested(false),
                Err(_) if self.is_disposed() => {
                    debug!("Handler disposed during connect");
                    return;
                }
                Err(e) => {
                    debug!("Can't open connection to controller: {}", e);
                    self.host.update_status(
                        ThingStatus::Offline,
                        StatusDetail::CommunicationError,
                        Some(&e.to_string()),
                    );
                    self.flags.set_reconnect_requested(true);
                    return;
                }
            }
        }

        let flags = self.flags.get();
        if flags.value_notification_requested && !flags.connecting {
            self.enable_notifications().await;
        }
    }

    async fn connect(self: &Arc<Self>) -> Result<(), ClientError> {
        let _connecting = ConnectingGuard::new(&self.flags);
        info!(
            "Connecting to IHC / ELKO LS controller [hostname='{}', username='{}'].",
            self.controller.hostname, self.controller.username
        );

        let client = self.factory.create(&self.controller);
        client.open_connection().await?;
        // Stored before anything else so a disconnect always finds it.
        *lock(&self.connection) = Some(client.clone());
        self.ensure_running()?;
        self.host.update_status(
            ThingStatus::Offline,
            StatusDetail::None,
            Some("Initializing communication to the IHC / ELKO controller"),
        );

        self.load_project(client.as_ref()).await?;
        self.update_controller_properties(client.as_ref()).await;
        self.update_controller_state_channel(client.as_ref()).await;
        self.update_controller_information_channels(client.as_ref())
            .await;
        self.update_controller_time_channels(client.as_ref()).await;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let dispatch = tokio::spawn(dispatcher::dispatch_loop(self.clone(), events_rx));
        if let Some(old) = lock(&self.tasks).dispatch.replace(dispatch) {
            old.abort();
        }
        client.start_event_listeners(events_tx).await?;

        self.debouncer.schedule();
        self.start_rf_polling();
        self.ensure_running()?;
        self.host.update_status(ThingStatus::Online, StatusDetail::None, None);
        info!("Connected to controller '{}'", self.controller.hostname);
        Ok(())
    }

    /// Safe to call when already disconnected.
    pub(super) async fn disconnect(&self) {
        self.buttons.cancel_all();
        {
            let mut tasks = lock(&self.tasks);
            if let Some(job) = tasks.rf_poll.take() {
                job.abort();
            }
            if let Some(job) = tasks.dispatch.take() {
                job.abort();
            }
        }

        let client = lock(&self.connection).take();
        if let Some(client) = client {
            if let Err(e) = client.close_connection().await {
                warn!("Couldn't close connection to IHC controller: {}", e);
            }
        }
    }

    /// Order resource value notifications from the controller.
    async fn enable_notifications(&self) {
        debug!("Subscribe resource runtime value notifications");

        let Some(client) = self.client() else {
            warn!("Controller is not initialized!");
            debug!("Reconnection request");
            self.flags.set_reconnect_requested(true);
            return;
        };
        if client.connection_state() != ConnectionState::Connected {
            debug!("Controller is connecting, abort subscribe");
            return;
        }
        self.flags.set_value_notification_requested(false);

        let mut resource_ids = self.trigger_channels_resource_ids();
        debug!("Enable runtime notifications for {} trigger(s)", resource_ids.len());
        let linked: Vec<_> = lock(&self.linked).iter().copied().collect();
        debug!("Enable runtime notifications for {} channel(s)", linked.len());
        resource_ids.extend(linked);
        resource_ids.extend(self.linked_channels_resource_ids());
        debug!(
            "Enable runtime notifications for {} resources: {:?}",
            resource_ids.len(),
            resource_ids
        );

        if !resource_ids.is_empty() {
            self.subscribe(client.as_ref(), &resource_ids).await;
        }
    }

    async fn subscribe(&self, client: &dyn ControllerClient, ids: &BTreeSet<ResourceId>) {
        if let Err(e) = client.enable_runtime_value_notifications(ids).await {
            warn!("Can't enable resource value notifications from controller: {}", e);
            debug!("Reconnection request");
            self.flags.set_reconnect_requested(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connecting_guard_clears_on_drop() {
        let flags = Flags::default();
        {
            let _guard = ConnectingGuard::new(&flags);
            assert!(flags.get().connecting);
        }
        assert!(!flags.get().connecting);
    }

    #[test]
    fn connecting_guard_clears_on_early_return() {
        fn attempt(flags: &Flags, fail: bool) -> Result<(), ClientError> {
            let _guard = ConnectingGuard::new(flags);
            if fail {
                return Err(ClientError::Timeout);
            }
            Ok(())
        }
        let flags = Flags::default();
        assert!(attempt(&flags, true).is_err());
        assert!(!flags.get().connecting);
    }
}
