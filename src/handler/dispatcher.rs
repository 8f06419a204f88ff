use super::{ButtonChannel, Channel, Context};
use crate::client::{ControllerEvent, RfDevice};
use crate::config::{ChannelKind, ChannelParams};
use crate::consts::{self, CONTROLLER_STATE_INITIALIZE, CONTROLLER_STATE_READY};
use crate::converter::{ConvertInfo, Converter};
use crate::error::ClientError;
use crate::lock;
use crate::types::{State, StatusDetail, ThingStatus};
use crate::value::ResourceValue;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Consumes controller events until the client drops its sender or the
/// connection is torn down.
pub(super) async fn dispatch_loop(
    ctx: Arc<Context>,
    mut events: mpsc::UnboundedReceiver<ControllerEvent>,
) {
    while let Some(event) = events.recv().await {
        ctx.dispatch(event);
    }
    debug!("Controller event stream closed");
}

impl Context {
    pub(super) fn dispatch(&self, event: ControllerEvent) {
        match event {
            ControllerEvent::ConnectionError(e) => self.on_connection_error(&e),
            ControllerEvent::StateChanged(state) => self.on_controller_state_changed(&state),
            ControllerEvent::ValueUpdated(value) => self.on_resource_value_updated(&value),
            ControllerEvent::RfDevicesPolled(devices) => self.on_rf_devices_polled(&devices),
        }
    }

    fn on_connection_error(&self, e: &ClientError) {
        warn!("Error occurred on communication to IHC controller: {}", e);
        debug!("Reconnection request");
        self.flags.set_reconnect_requested(true);
    }

    fn on_controller_state_changed(&self, new_state: &str) {
        debug!("Controller state: {}", new_state);
        let previous = lock(&self.controller_state).clone();

        if previous != new_state {
            debug!(
                "Controller state change detected ({} -> {})",
                previous, new_state
            );

            match new_state {
                CONTROLLER_STATE_INITIALIZE => {
                    info!("Controller state changed to initializing state, waiting for ready state");
                    self.host.update_state(
                        consts::CHANNEL_CONTROLLER_STATE,
                        State::Text("initialize".into()),
                    );
                    self.host.update_status(
                        ThingStatus::Offline,
                        StatusDetail::BridgeOffline,
                        Some("Controller is in initializing state"),
                    );
                }
                CONTROLLER_STATE_READY => {
                    info!("Controller state changed to ready state");
                    self.host.update_state(
                        consts::CHANNEL_CONTROLLER_STATE,
                        State::Text("ready".into()),
                    );
                    self.host
                        .update_status(ThingStatus::Online, StatusDetail::None, None);
                }
                _ => {}
            }

            if previous == CONTROLLER_STATE_INITIALIZE && new_state == CONTROLLER_STATE_READY {
                // Controller was reset, the project may have changed.
                debug!("Reconnection request");
                *lock(&self.project) = None;
                self.flags.set_reconnect_requested(true);
            }
        }

        *lock(&self.controller_state) = new_state.to_string();
    }

    pub(super) fn on_resource_value_updated(&self, value: &ResourceValue) {
        debug!("resourceValueUpdateReceived: {:?}", value);

        let mut buttons = Vec::new();
        for channel in &self.channels {
            let params = match channel.params() {
                Ok(params) => params,
                Err(e) => {
                    warn!("Channel param error, reason: {}.", e);
                    continue;
                }
            };
            if params.resource_id != Some(value.resource_id) {
                continue;
            }
            if params.is_push_button() {
                buttons.push(ButtonChannel {
                    id: &channel.id,
                    long_press_time: params.long_press_time,
                });
                continue;
            }
            self.update_channel_state(channel, &params, value);
        }

        self.buttons.on_value(value, &buttons);
    }

    fn update_channel_state(&self, channel: &Channel, params: &ChannelParams, value: &ResourceValue) {
        if params.is_write_only() {
            debug!("Write only channel, skip update to {}", channel.id);
            return;
        }
        let Some(item) = params.kind.item_kind() else {
            return;
        };

        debug!("Update channel '{}' state, channel params: {:?}", channel.id, params);
        let Some(converter) = Converter::lookup(value.kind(), item) else {
            debug!(
                "No converter implemented for {:?} <-> {:?}",
                value.kind(),
                item
            );
            return;
        };

        let enum_values = self.enum_values(value);
        let info = ConvertInfo {
            inverted: params.inverted,
            on_level: params.on_level,
            enum_values: enum_values.as_deref(),
        };
        match converter.to_state(value, &info) {
            Ok(state) => self.host.update_state(&channel.id, state),
            Err(e) => debug!(
                "Can't convert resource value '{:?}' to item type {:?}, reason: {}.",
                value, item, e
            ),
        }
    }

    fn on_rf_devices_polled(&self, devices: &[RfDevice]) {
        debug!("RF data: {:?}", devices);

        for device in devices {
            for channel in &self.channels {
                let params = match channel.params() {
                    Ok(params) => params,
                    Err(e) => {
                        warn!("Channel param error, reason: {}", e);
                        continue;
                    }
                };
                if params.serial_number != Some(device.serial_number) {
                    continue;
                }
                match params.kind {
                    ChannelKind::RfLowBattery => self
                        .host
                        .update_state(&channel.id, State::OnOff(device.battery_level != 1)),
                    ChannelKind::RfSignalStrength => {
                        let level = super::system_wide_signal_level(device.signal_strength);
                        self.host
                            .update_state(&channel.id, State::Text(level.to_string()));
                    }
                    _ => {}
                }
            }
        }
    }
}
