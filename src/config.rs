use crate::consts::{self, ResourceId};
use crate::error::ConversionError;
use crate::types::ItemKind;
use crate::value::Value;
use anyhow::bail;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Controller connection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Keep a local copy of the controller project.
    #[serde(default)]
    pub load_project_file: bool,
    /// Where the project cache is stored.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_timeout() -> u64 {
    5000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Supervisor timing. Defaults are the values the controller was tuned with.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimingConfig {
    pub tick_interval_ms: u64,
    pub notification_debounce_ms: u64,
    pub max_long_press_ms: u64,
    pub max_pulse_width_ms: u64,
    pub rf_poll_interval_s: u64,
    pub rf_poll_delay_s: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: consts::DEFAULT_TICK_INTERVAL.as_millis() as u64,
            notification_debounce_ms: consts::DEFAULT_NOTIFICATION_DEBOUNCE.as_millis() as u64,
            max_long_press_ms: consts::DEFAULT_MAX_LONG_PRESS.as_millis() as u64,
            max_pulse_width_ms: consts::DEFAULT_MAX_PULSE_WIDTH.as_millis() as u64,
            rf_poll_interval_s: consts::DEFAULT_RF_POLL_INTERVAL.as_secs(),
            rf_poll_delay_s: consts::DEFAULT_RF_POLL_DELAY.as_secs(),
        }
    }
}

impl TimingConfig {
    /// Zero periods would turn the supervisor and RF loops into busy loops.
    fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval_ms == 0 {
            bail!("timing.tick_interval_ms must be positive");
        }
        if self.rf_poll_interval_s == 0 {
            bail!("timing.rf_poll_interval_s must be positive");
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn notification_debounce(&self) -> Duration {
        Duration::from_millis(self.notification_debounce_ms)
    }

    pub fn max_long_press(&self) -> Duration {
        Duration::from_millis(self.max_long_press_ms)
    }

    pub fn max_pulse_width(&self) -> Duration {
        Duration::from_millis(self.max_pulse_width_ms)
    }

    pub fn rf_poll_interval(&self) -> Duration {
        Duration::from_secs(self.rf_poll_interval_s)
    }

    pub fn rf_poll_delay(&self) -> Duration {
        Duration::from_secs(self.rf_poll_delay_s)
    }
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Switch,
    Contact,
    Number,
    Dimmer,
    String,
    PushButton,
    RfLowBattery,
    RfSignalStrength,
}

impl ChannelKind {
    /// Host item type, `None` for trigger-only channels.
    pub fn item_kind(self) -> Option<ItemKind> {
        match self {
            Self::Switch | Self::RfLowBattery => Some(ItemKind::Switch),
            Self::Contact => Some(ItemKind::Contact),
            Self::Number => Some(ItemKind::Number),
            Self::Dimmer => Some(ItemKind::Dimmer),
            Self::String | Self::RfSignalStrength => Some(ItemKind::String),
            Self::PushButton => None,
        }
    }

    fn is_rf(self) -> bool {
        matches!(self, Self::RfLowBattery | Self::RfSignalStrength)
    }
}

#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

/// Raw channel entry as written in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub label: Option<String>,
    pub resource_id: Option<ResourceId>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub inverted: bool,
    /// Milliseconds before a held button counts as a long press.
    pub long_press_time: Option<u64>,
    pub on_level: Option<i32>,
    /// Milliseconds; turns writes into ON-then-OFF pulses.
    pub pulse_width: Option<u64>,
    /// Only this command payload is forwarded to the controller.
    pub command_to_react: Option<String>,
    pub serial_number: Option<u64>,
}

/// Channel parameters after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelParams {
    pub kind: ChannelKind,
    pub resource_id: Option<ResourceId>,
    pub direction: Direction,
    pub inverted: bool,
    pub long_press_time: Duration,
    pub on_level: Option<i32>,
    pub pulse_width: Option<Duration>,
    pub command_to_react: Option<String>,
    pub serial_number: Option<u64>,
}

impl ChannelParams {
    pub fn new(channel_id: &str, cfg: &ChannelConfig) -> Result<Self, ConversionError> {
        let invalid = |reason: &str| ConversionError::InvalidParameter {
            channel: channel_id.to_string(),
            reason: reason.to_string(),
        };

        let resource_id = cfg.resource_id.filter(|id| *id != 0);
        if cfg.kind.is_rf() {
            if cfg.serial_number.is_none() {
                return Err(invalid("RF channel requires serial_number"));
            }
        } else if resource_id.is_none() {
            return Err(invalid("resource_id is required and must not be 0"));
        }

        let long_press_time = cfg.long_press_time.unwrap_or(consts::DEFAULT_LONG_PRESS_TIME_MS);
        if long_press_time == 0 {
            return Err(invalid("long_press_time must be positive"));
        }
        if cfg.pulse_width == Some(0) {
            return Err(invalid("pulse_width must be positive"));
        }

        Ok(Self {
            kind: cfg.kind,
            resource_id,
            direction: cfg.direction,
            inverted: cfg.inverted,
            long_press_time: Duration::from_millis(long_press_time),
            on_level: cfg.on_level,
            pulse_width: cfg.pulse_width.map(Duration::from_millis),
            command_to_react: cfg.command_to_react.clone(),
            serial_number: cfg.serial_number,
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.direction == Direction::ReadOnly
    }

    pub fn is_write_only(&self) -> bool {
        self.direction == Direction::WriteOnly
    }

    pub fn is_push_button(&self) -> bool {
        self.kind == ChannelKind::PushButton
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Thing identifier, used in topics and the project cache name.
    pub thing: String,
    pub controller: ControllerConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelConfig>,
    /// Initial resource values for the loopback controller.
    #[serde(default)]
    pub resources: BTreeMap<ResourceId, Value>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(filename: P) -> anyhow::Result<Self> {
        let handle = File::open(filename)?;
        let data: Config = serde_yaml::from_reader(handle)?;
        data.timing.validate()?;

        Ok(data)
    }

    pub fn from_yaml(data: &str) -> anyhow::Result<Self> {
        let data: Config = serde_yaml::from_str(data)?;
        data.timing.validate()?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
thing: ihc1
controller:
  hostname: 192.168.1.20
  username: admin
  password: secret
  load_project_file: true
timing:
  notification_debounce_ms: 500
channels:
  hall_button:
    type: push_button
    resource_id: 1001
    long_press_time: 800
  hall_light:
    type: switch
    resource_id: 1002
    pulse_width: 300
  battery:
    type: rf_low_battery
    serial_number: 77
resources:
  1001:
    boolean: false
"#;

    #[test]
    fn parses_sample_config() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.thing, "ihc1");
        assert_eq!(config.controller.timeout, 5000);
        assert_eq!(config.timing.notification_debounce(), Duration::from_millis(500));
        assert_eq!(config.timing.max_long_press(), consts::DEFAULT_MAX_LONG_PRESS);
        assert_eq!(config.channels.len(), 3);
        assert_eq!(config.resources.get(&1001), Some(&Value::Boolean(false)));

        let params = ChannelParams::new("hall_button", &config.channels["hall_button"]).unwrap();
        assert!(params.is_push_button());
        assert_eq!(params.long_press_time, Duration::from_millis(800));

        let params = ChannelParams::new("hall_light", &config.channels["hall_light"]).unwrap();
        assert_eq!(params.pulse_width, Some(Duration::from_millis(300)));
        assert_eq!(params.long_press_time, Duration::from_millis(1000));
    }

    #[test]
    fn rejects_unknown_fields() {
        let data = "thing: a\ncontroller: { hostname: h, port: 1 }\n";
        assert!(Config::from_yaml(data).is_err());
    }

    #[test]
    fn rejects_zero_periods() {
        for field in ["tick_interval_ms", "rf_poll_interval_s"] {
            let data = format!("thing: a\ncontroller: {{ hostname: h }}\ntiming: {{ {}: 0 }}\n", field);
            let err = Config::from_yaml(&data).unwrap_err();
            assert!(err.to_string().contains(field), "{}", err);
        }
        let data = "thing: a\ncontroller: { hostname: h }\ntiming: { rf_poll_delay_s: 0 }\n";
        assert!(Config::from_yaml(data).is_ok());
    }

    #[test]
    fn channel_params_validation() {
        let cfg = ChannelConfig {
            kind: ChannelKind::Switch,
            label: None,
            resource_id: Some(0),
            direction: Direction::ReadWrite,
            inverted: false,
            long_press_time: None,
            on_level: None,
            pulse_width: None,
            command_to_react: None,
            serial_number: None,
        };
        assert!(matches!(
            ChannelParams::new("x", &cfg),
            Err(ConversionError::InvalidParameter { .. })
        ));

        let rf = ChannelConfig {
            kind: ChannelKind::RfSignalStrength,
            resource_id: None,
            ..cfg
        };
        assert!(ChannelParams::new("rf", &rf).is_err());
    }
}
