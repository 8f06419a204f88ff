use super::Context;
use crate::client::ControllerClient;
use crate::consts::{self, CONTROLLER_STATE_INITIALIZE, CONTROLLER_STATE_READY};
use crate::types::State;
use chrono::Local;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Text shown on the controller state channel.
fn controller_state_text(state: &str) -> String {
    match state {
        CONTROLLER_STATE_INITIALIZE => "initialize".to_string(),
        CONTROLLER_STATE_READY => "ready".to_string(),
        other => format!("Unknown state: {}", other),
    }
}

impl Context {
    pub(super) async fn update_controller_channel(&self, client: &dyn ControllerClient, channel: &str) {
        match channel {
            consts::CHANNEL_CONTROLLER_STATE => self.update_controller_state_channel(client).await,
            consts::CHANNEL_CONTROLLER_UPTIME => {
                self.update_controller_information_channels(client).await
            }
            consts::CHANNEL_CONTROLLER_TIME => self.update_controller_time_channels(client).await,
            _ => {}
        }
    }

    pub(super) async fn update_controller_state_channel(&self, client: &dyn ControllerClient) {
        match client.controller_state().await {
            Ok(state) => self.host.update_state(
                consts::CHANNEL_CONTROLLER_STATE,
                State::Text(controller_state_text(&state)),
            ),
            Err(e) => warn!("Controller state information fetch failed, reason: {}", e),
        }
    }

    pub(super) async fn update_controller_information_channels(&self, client: &dyn ControllerClient) {
        match client.system_info().await {
            Ok(info) => {
                debug!("Controller information: {:?}", info);
                self.host.update_state(
                    consts::CHANNEL_CONTROLLER_UPTIME,
                    State::Decimal(info.uptime as f64 / 1000.0),
                );
            }
            Err(e) => warn!("Controller uptime information fetch failed, reason: {}.", e),
        }
    }

    pub(super) async fn update_controller_time_channels(&self, client: &dyn ControllerClient) {
        match client.time_settings().await {
            Ok(settings) => {
                debug!("Controller time settings: {:?}", settings);
                let time = settings.time_and_date_utc.with_timezone(&Local);
                self.host
                    .update_state(consts::CHANNEL_CONTROLLER_TIME, State::DateTime(time));
            }
            Err(e) => warn!("Controller time information fetch failed, reason: {}.", e),
        }
    }

    pub(super) async fn update_controller_properties(&self, client: &dyn ControllerClient) {
        let system = match client.system_info().await {
            Ok(info) => info,
            Err(e) => {
                warn!("Controller information fetch failed, reason: {}", e);
                return;
            }
        };
        debug!("Controller information: {:?}", system);
        let project = match client.project_info().await {
            Ok(info) => info,
            Err(e) => {
                warn!("Controller information fetch failed, reason: {}", e);
                return;
            }
        };
        debug!("Project information: {:?}", project);

        let mut properties = BTreeMap::new();
        properties.insert(consts::PROPERTY_MANUFACTURER.to_string(), system.brand);
        properties.insert(consts::PROPERTY_SERIALNUMBER.to_string(), system.serial_number);
        properties.insert(consts::PROPERTY_SW_VERSION.to_string(), system.version);
        properties.insert(consts::PROPERTY_FW_VERSION.to_string(), system.hw_revision);
        properties.insert(
            consts::PROPERTY_APP_WITHOUT_VIEWER.to_string(),
            system.application_is_without_viewer.to_string(),
        );
        properties.insert(
            consts::PROPERTY_SW_DATE.to_string(),
            system.sw_date.with_timezone(&Local).to_rfc3339(),
        );
        properties.insert(
            consts::PROPERTY_PRODUCTION_DATE.to_string(),
            system.production_date,
        );
        for (key, value) in [
            (consts::PROPERTY_DATALINE_VERSION, system.dataline_version),
            (consts::PROPERTY_RF_MODULE_SERIALNUMBER, system.rf_module_serial_number),
            (consts::PROPERTY_RF_MODULE_VERSION, system.rf_module_software_version),
        ] {
            if !value.is_empty() {
                properties.insert(key.to_string(), value);
            }
        }
        properties.insert(
            consts::PROPERTY_PROJECT_DATE.to_string(),
            project.last_modified.to_string(),
        );
        properties.insert(
            consts::PROPERTY_PROJECT_NUMBER.to_string(),
            project.project_number,
        );
        self.host.update_properties(properties);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_texts() {
        assert_eq!(controller_state_text(CONTROLLER_STATE_READY), "ready");
        assert_eq!(controller_state_text(CONTROLLER_STATE_INITIALIZE), "initialize");
        assert_eq!(controller_state_text("x"), "Unknown state: x");
    }
}
