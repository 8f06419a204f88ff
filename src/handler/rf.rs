use super::Context;
use crate::client::{ConnectionState, ControllerEvent};
use crate::lock;
use std::sync::Arc;
use tracing::debug;

/// Strongest signal the controller reports for RF devices.
const MAX_RF_SIGNAL_STRENGTH: i32 = 18;
/// Host-wide signal scale is 0..=4.
const MAX_SYSTEM_SIGNAL_LEVEL: i32 = 4;

/// Map controller RF signal strength onto the 0-4 scale used for signal
/// channels.
pub fn system_wide_signal_level(signal_strength: i32) -> i32 {
    let strength = signal_strength.clamp(0, MAX_RF_SIGNAL_STRENGTH);
    (strength * MAX_SYSTEM_SIGNAL_LEVEL + MAX_RF_SIGNAL_STRENGTH / 2) / MAX_RF_SIGNAL_STRENGTH
}

impl Context {
    pub(super) fn start_rf_polling(self: &Arc<Self>) {
        let mut tasks = lock(&self.tasks);
        if tasks.rf_poll.as_ref().is_some_and(|job| !job.is_finished()) {
            return;
        }

        debug!(
            "Start RF device refresh task, interval={:?}",
            self.timing.rf_poll_interval()
        );
        let ctx = self.clone();
        tasks.rf_poll = Some(tokio::spawn(async move {
            tokio::time::sleep(ctx.timing.rf_poll_delay()).await;
            loop {
                ctx.update_rf_device_states().await;
                tokio::time::sleep(ctx.timing.rf_poll_interval()).await;
            }
        }));
    }

    async fn update_rf_device_states(&self) {
        let Some(client) = self.client() else {
            return;
        };
        if client.connection_state() != ConnectionState::Connected {
            debug!("Controller is connecting, abort RF device update");
            return;
        }

        debug!("Update RF device data");
        match client.detected_rf_devices().await {
            Ok(devices) => self.dispatch(ControllerEvent::RfDevicesPolled(devices)),
            Err(e) => debug!("Error occurred when fetching RF device information, reason: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_levels() {
        assert_eq!(system_wide_signal_level(0), 0);
        assert_eq!(system_wide_signal_level(18), 4);
        assert_eq!(system_wide_signal_level(9), 2);
        assert_eq!(system_wide_signal_level(-3), 0);
        assert_eq!(system_wide_signal_level(40), 4);
    }
}
