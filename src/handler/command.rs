use super::{Channel, Context};
use crate::client::{ConnectionState, ControllerClient};
use crate::config::ChannelParams;
use crate::consts;
use crate::converter::{ConvertInfo, Converter};
use crate::error::{ClientError, HandlerError};
use crate::types::{Command, ItemKind, State};
use crate::value::ResourceValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Write a value to the controller, retrying once on a client error.
pub async fn update_resource(
    client: &dyn ControllerClient,
    value: &ResourceValue,
) -> Result<bool, ClientError> {
    match client.resource_update(value).await {
        Ok(result) => Ok(result),
        Err(e) => {
            warn!("Value could not be updated - retrying one time: {}.", e);
            client.resource_update(value).await
        }
    }
}

impl Context {
    pub(super) async fn handle_command(&self, channel_id: &str, command: Command) {
        debug!("Received channel: {}, command: {}", channel_id, command);

        let Some(client) = self.client() else {
            warn!(
                "Connection is not initialized, abort resource value update for channel '{}'!",
                channel_id
            );
            return;
        };
        if client.connection_state() != ConnectionState::Connected {
            warn!(
                "Connection to controller is not open, abort resource value update for channel '{}'!",
                channel_id
            );
            return;
        }

        match channel_id {
            consts::CHANNEL_CONTROLLER_STATE
            | consts::CHANNEL_CONTROLLER_UPTIME
            | consts::CHANNEL_CONTROLLER_TIME => {
                if command == Command::Refresh {
                    self.update_controller_channel(client.as_ref(), channel_id)
                        .await;
                }
            }
            _ => match command {
                Command::Refresh => self.refresh_channel(client.as_ref(), channel_id).await,
                Command::Set(state) => self.update_resource_channel(&client, channel_id, state).await,
            },
        }
    }

    async fn refresh_channel(&self, client: &dyn ControllerClient, channel_id: &str) {
        debug!("REFRESH channel {}", channel_id);
        let Some(channel) = self.channel(channel_id) else {
            return;
        };
        let params = match channel.params() {
            Ok(params) => params,
            Err(e) => {
                warn!("Channel param error, reason: {}.", e);
                return;
            }
        };
        debug!("Channel params: {:?}", params);
        if params.is_write_only() {
            warn!("Write only channel, skip refresh command to {}", channel_id);
            return;
        }
        let Some(resource_id) = params.resource_id else {
            return;
        };

        match client.resource_query(resource_id).await {
            Ok(value) => self.on_resource_value_updated(&value),
            Err(e) => warn!("Can't update channel '{}' value, reason: {}", channel_id, e),
        }
    }

    async fn update_resource_channel(
        &self,
        client: &Arc<dyn ControllerClient>,
        channel_id: &str,
        state: State,
    ) {
        let Some(channel) = self.channel(channel_id) else {
            return;
        };
        let params = match channel.params() {
            Ok(params) => params,
            Err(e) => {
                debug!("Conversion error for channel {}, reason: {}.", channel_id, e);
                return;
            }
        };
        debug!("Channel params: {:?}", params);
        if params.is_read_only() {
            debug!("Read only channel, skip the update to {}", channel_id);
            return;
        }

        match self.update_channel(client, channel, &params, &state).await {
            Ok(()) => {}
            Err(HandlerError::Client(e)) => {
                error!("Can't update channel '{}' value, cause {}", channel_id, e)
            }
            Err(HandlerError::Conversion(e)) => {
                debug!("Conversion error for channel {}, reason: {}.", channel_id, e)
            }
        }
    }

    async fn update_channel(
        &self,
        client: &Arc<dyn ControllerClient>,
        channel: &Channel,
        params: &ChannelParams,
        state: &State,
    ) -> Result<(), HandlerError> {
        if let Some(react) = &params.command_to_react {
            if state.to_string() != *react {
                debug!(
                    "Command '{}' doesn't equal to reaction trigger parameter '{}', skip it",
                    state, react
                );
                return Ok(());
            }
            debug!(
                "Command '{}' equal to channel reaction parameter '{}', execute it",
                state, react
            );
        }
        let Some(resource_id) = params.resource_id else {
            return Ok(());
        };
        let Some(value) = client.resource_value_information(resource_id).await? else {
            return Ok(());
        };

        match params.pulse_width {
            Some(width) => {
                let width = width.min(self.timing.max_pulse_width());
                self.send_pulse(client, channel, params, &value, width).await
            }
            None => self.send_normal(client.as_ref(), channel, params, state, &value).await,
        }
    }

    async fn send_normal(
        &self,
        client: &dyn ControllerClient,
        channel: &Channel,
        params: &ChannelParams,
        state: &State,
        value: &ResourceValue,
    ) -> Result<(), HandlerError> {
        debug!("Send command '{}' to resource '{}'", state, value.resource_id);
        let Some(converter) = Converter::lookup(value.kind(), state.item_kind()) else {
            debug!(
                "No converter implemented for {:?} <-> {:?}",
                value.kind(),
                state.item_kind()
            );
            return Ok(());
        };

        let enum_values = self.enum_values(value);
        let info = ConvertInfo {
            inverted: params.inverted,
            on_level: params.on_level,
            enum_values: enum_values.as_deref(),
        };
        let new_value = converter.to_value(state, value, &info)?;
        debug!(
            "Update resource value (inverted output={}): {:?}",
            params.inverted, new_value
        );
        if !update_resource(client, &new_value).await? {
            warn!(
                "Channel {} update to resource '{:?}' failed.",
                channel.id, new_value
            );
        }
        Ok(())
    }

    /// Drive the resource ON now and back OFF after `width`. The OFF write
    /// runs in its own task, the caller doesn't wait for it.
    async fn send_pulse(
        &self,
        client: &Arc<dyn ControllerClient>,
        channel: &Channel,
        params: &ChannelParams,
        value: &ResourceValue,
        width: Duration,
    ) -> Result<(), HandlerError> {
        debug!("Send {:?} pulse to resource: {}", width, value.resource_id);
        let Some(converter) = Converter::lookup(value.kind(), ItemKind::Switch) else {
            debug!(
                "No converter implemented for {:?} <-> {:?}",
                value.kind(),
                ItemKind::Switch
            );
            return Ok(());
        };

        let info = ConvertInfo {
            inverted: params.inverted,
            on_level: params.on_level,
            enum_values: None,
        };
        let on = converter.to_value(&State::OnOff(true), value, &info)?;
        let off = converter.to_value(&State::OnOff(false), value, &info)?;

        debug!("Update resource value (inverted output={}): {:?}", params.inverted, on);
        if !update_resource(client.as_ref(), &on).await? {
            warn!("Channel {} update failed.", channel.id);
            return Ok(());
        }

        let client = client.clone();
        let channel_id = channel.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(width).await;
            debug!("Update resource value (pulse end): {:?}", off);
            match update_resource(client.as_ref(), &off).await {
                Ok(true) => {}
                Ok(false) => warn!(
                    "Channel {} update to resource '{:?}' failed.",
                    channel_id, off
                ),
                Err(e) => error!("Can't update channel '{}' value, cause {}", channel_id, e),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::loopback::LoopbackController;
    use crate::value::Value;
    use std::collections::BTreeMap;
    use std::sync::atomic::Ordering;

    async fn connected(id: u32) -> LoopbackController {
        let controller = LoopbackController::new(BTreeMap::from([(id, Value::Boolean(false))]));
        controller.open_connection().await.unwrap();
        controller
    }

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let controller = connected(7).await;
        controller.failures.update.store(1, Ordering::SeqCst);

        let value = ResourceValue::new(7, Value::Boolean(true));
        assert_eq!(update_resource(&controller, &value).await, Ok(true));
        assert_eq!(controller.calls.updates.load(Ordering::SeqCst), 2);
        assert_eq!(controller.value(7), Some(Value::Boolean(true)));
    }

    #[tokio::test]
    async fn gives_up_after_second_failure() {
        let controller = connected(7).await;
        controller.failures.update.store(2, Ordering::SeqCst);

        let value = ResourceValue::new(7, Value::Boolean(true));
        assert_eq!(
            update_resource(&controller, &value).await,
            Err(ClientError::Timeout)
        );
        assert_eq!(controller.calls.updates.load(Ordering::SeqCst), 2);
        assert_eq!(controller.value(7), Some(Value::Boolean(false)));
    }

    #[tokio::test]
    async fn rejected_write_is_not_retried() {
        let controller = connected(7).await;
        let value = ResourceValue::new(8, Value::Boolean(true));
        assert_eq!(update_resource(&controller, &value).await, Ok(false));
        assert_eq!(controller.calls.updates.load(Ordering::SeqCst), 1);
    }
}
