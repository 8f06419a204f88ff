use std::time::Duration;

/// Controller resource address.
pub type ResourceId = u32;

/// Semantic events emitted on push-button trigger channels.
/// Pressed -> (LongPress) -> Released -> duration -> (ShortPress)
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ButtonEvent {
    /// Emitted as soon as the resource goes `true`.
    Pressed,
    /// Emitted on `false`, no matter the time.
    Released,
    /// Released before the long press threshold. Triggered after Released.
    ShortPress,
    /// Held past the long press threshold. A bit delayed.
    LongPress,
}

impl ButtonEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pressed => "PRESSED",
            Self::Released => "RELEASED",
            Self::ShortPress => "SHORT_PRESS",
            Self::LongPress => "LONG_PRESS",
        }
    }
}

/// Software version
pub const GATE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GATE_NAME: &str = "ihc-gate";
pub const GATE_URL: &str = env!("CARGO_PKG_HOMEPAGE");

pub const HA_DISCOVERY_TOPIC: &str = "homeassistant";
pub const HA_CONTROL_TOPIC: &str = "ihcgate";

// Controller channels, not backed by a resource.
pub const CHANNEL_CONTROLLER_STATE: &str = "controllerState";
pub const CHANNEL_CONTROLLER_UPTIME: &str = "controllerUptime";
pub const CHANNEL_CONTROLLER_TIME: &str = "controllerTime";

/// Controller state strings reported by the controller.
pub const CONTROLLER_STATE_INITIALIZE: &str = "text.ctrl.state.initialize";
pub const CONTROLLER_STATE_READY: &str = "text.ctrl.state.ready";

// Thing property keys.
pub const PROPERTY_MANUFACTURER: &str = "manufacturer";
pub const PROPERTY_SERIALNUMBER: &str = "serialNumber";
pub const PROPERTY_SW_VERSION: &str = "softwareVersion";
pub const PROPERTY_FW_VERSION: &str = "firmwareVersion";
pub const PROPERTY_APP_WITHOUT_VIEWER: &str = "applicationWithoutViewer";
pub const PROPERTY_SW_DATE: &str = "softwareDate";
pub const PROPERTY_PRODUCTION_DATE: &str = "productionDate";
pub const PROPERTY_DATALINE_VERSION: &str = "datalineVersion";
pub const PROPERTY_RF_MODULE_SERIALNUMBER: &str = "rfModuleSerialNumber";
pub const PROPERTY_RF_MODULE_VERSION: &str = "rfModuleVersion";
pub const PROPERTY_PROJECT_DATE: &str = "projectDate";
pub const PROPERTY_PROJECT_NUMBER: &str = "projectNumber";

// Timing defaults. All of them can be overridden in the `timing` config section.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Quiet period before resource value notifications are ordered again.
pub const DEFAULT_NOTIFICATION_DEBOUNCE: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_LONG_PRESS: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_PULSE_WIDTH: Duration = Duration::from_millis(4000);
pub const DEFAULT_RF_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_RF_POLL_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_LONG_PRESS_TIME_MS: u64 = 1000;
