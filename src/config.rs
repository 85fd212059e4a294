use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PopupCamConfig {
    pub motor: MotorConfig,
    pub throttle: ThrottleConfig,
    pub camera: CameraConfig,
    pub indicator: IndicatorConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotorConfig {
    /// Window in which opposite camera signals cancel each other (ms)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Time a command is assumed to occupy the motor (ms)
    #[serde(default = "default_busy_settle_ms")]
    pub busy_settle_ms: u64,

    /// Re-check cadence while waiting for the motor to become free (ms)
    #[serde(default = "default_busy_poll_ms")]
    pub busy_poll_ms: u64,

    /// Popup jams tolerated before calibration is offered
    #[serde(default = "default_max_retries")]
    pub max_popup_retries: u32,

    /// Takeback jams tolerated before calibration is offered
    #[serde(default = "default_max_retries")]
    pub max_takeback_retries: u32,

    /// How long the indicator stays lit for each issued command (ms)
    #[serde(default = "default_indicator_pulse_ms")]
    pub indicator_pulse_ms: u64,

    /// Give up on a request that waited this long for the motor (ms, 0 = wait forever)
    #[serde(default)]
    pub busy_wait_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ThrottleConfig {
    /// Number of actuations remembered for frequency detection
    #[serde(default = "default_frequent_trigger_count")]
    pub frequent_trigger_count: usize,

    /// A full history spanning less than this is "too frequent" (seconds)
    #[serde(default = "default_frequent_window_secs")]
    pub frequent_window_secs: u64,

    /// Acknowledgement lock-out on the frequent-operation dialog (seconds)
    #[serde(default = "default_dialog_cooldown_secs")]
    pub dialog_cooldown_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Identifier of the front-facing camera that sits on the motor
    #[serde(default = "default_front_camera_id")]
    pub front_camera_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndicatorConfig {
    /// LED brightness nodes driven together as the indicator
    #[serde(default = "default_led_paths")]
    pub led_paths: Vec<String>,

    #[serde(default = "default_led_on_value")]
    pub on_value: String,

    #[serde(default = "default_led_off_value")]
    pub off_value: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl MotorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn busy_settle(&self) -> Duration {
        Duration::from_millis(self.busy_settle_ms)
    }

    pub fn busy_poll(&self) -> Duration {
        Duration::from_millis(self.busy_poll_ms)
    }

    pub fn indicator_pulse(&self) -> Duration {
        Duration::from_millis(self.indicator_pulse_ms)
    }

    pub fn busy_wait_timeout(&self) -> Option<Duration> {
        match self.busy_wait_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl ThrottleConfig {
    pub fn frequent_window(&self) -> Duration {
        Duration::from_secs(self.frequent_window_secs)
    }

    pub fn dialog_cooldown(&self) -> Duration {
        Duration::from_secs(self.dialog_cooldown_secs)
    }
}

impl PopupCamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("popupcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("motor.debounce_ms", default_debounce_ms())?
            .set_default("motor.busy_settle_ms", default_busy_settle_ms())?
            .set_default("motor.busy_poll_ms", default_busy_poll_ms())?
            .set_default("motor.max_popup_retries", default_max_retries())?
            .set_default("motor.max_takeback_retries", default_max_retries())?
            .set_default("motor.indicator_pulse_ms", default_indicator_pulse_ms())?
            .set_default("motor.busy_wait_timeout_ms", 0)?
            .set_default(
                "throttle.frequent_trigger_count",
                default_frequent_trigger_count() as i64,
            )?
            .set_default(
                "throttle.frequent_window_secs",
                default_frequent_window_secs(),
            )?
            .set_default(
                "throttle.dialog_cooldown_secs",
                default_dialog_cooldown_secs(),
            )?
            .set_default("camera.front_camera_id", default_front_camera_id())?
            .set_default("indicator.led_paths", default_led_paths())?
            .set_default("indicator.on_value", default_led_on_value())?
            .set_default("indicator.off_value", default_led_off_value())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // POPUPCAM_MOTOR__BUSY_SETTLE_MS=1500
            .add_source(
                Environment::with_prefix("POPUPCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: PopupCamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.motor.debounce_ms == 0 {
            return Err(ConfigError::Message(
                "Motor debounce_ms must be greater than 0".to_string(),
            ));
        }

        if self.motor.busy_settle_ms == 0 {
            return Err(ConfigError::Message(
                "Motor busy_settle_ms must be greater than 0".to_string(),
            ));
        }

        if self.motor.busy_poll_ms == 0 {
            return Err(ConfigError::Message(
                "Motor busy_poll_ms must be greater than 0".to_string(),
            ));
        }

        if self.throttle.frequent_trigger_count < 2 {
            return Err(ConfigError::Message(
                "Throttle frequent_trigger_count must be at least 2".to_string(),
            ));
        }

        if self.throttle.frequent_window_secs == 0 {
            return Err(ConfigError::Message(
                "Throttle frequent_window_secs must be greater than 0".to_string(),
            ));
        }

        if self.camera.front_camera_id.is_empty() {
            return Err(ConfigError::Message(
                "Camera front_camera_id must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PopupCamConfig {
    fn default() -> Self {
        Self {
            motor: MotorConfig {
                debounce_ms: default_debounce_ms(),
                busy_settle_ms: default_busy_settle_ms(),
                busy_poll_ms: default_busy_poll_ms(),
                max_popup_retries: default_max_retries(),
                max_takeback_retries: default_max_retries(),
                indicator_pulse_ms: default_indicator_pulse_ms(),
                busy_wait_timeout_ms: 0,
            },
            throttle: ThrottleConfig {
                frequent_trigger_count: default_frequent_trigger_count(),
                frequent_window_secs: default_frequent_window_secs(),
                dialog_cooldown_secs: default_dialog_cooldown_secs(),
            },
            camera: CameraConfig {
                front_camera_id: default_front_camera_id(),
            },
            indicator: IndicatorConfig {
                led_paths: default_led_paths(),
                on_value: default_led_on_value(),
                off_value: default_led_off_value(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_debounce_ms() -> u64 {
    100
}
fn default_busy_settle_ms() -> u64 {
    1200
}
fn default_busy_poll_ms() -> u64 {
    100
}
fn default_max_retries() -> u32 {
    3
}
fn default_indicator_pulse_ms() -> u64 {
    1000
}

fn default_frequent_trigger_count() -> usize {
    10
}
fn default_frequent_window_secs() -> u64 {
    20
}
fn default_dialog_cooldown_secs() -> u64 {
    6
}

fn default_front_camera_id() -> String {
    "1".to_string()
}

fn default_led_paths() -> Vec<String> {
    vec![
        "/sys/class/leds/green/brightness".to_string(),
        "/sys/class/leds/blue/brightness".to_string(),
    ]
}
fn default_led_on_value() -> String {
    "255".to_string()
}
fn default_led_off_value() -> String {
    "0".to_string()
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PopupCamConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.motor.debounce(), Duration::from_millis(100));
        assert_eq!(config.motor.busy_settle(), Duration::from_millis(1200));
        assert_eq!(config.motor.max_popup_retries, 3);
        assert_eq!(config.motor.busy_wait_timeout(), None);
        assert_eq!(config.throttle.frequent_trigger_count, 10);
        assert_eq!(config.throttle.frequent_window(), Duration::from_secs(20));
        assert_eq!(config.throttle.dialog_cooldown(), Duration::from_secs(6));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[motor]\nbusy_settle_ms = 1500\nbusy_wait_timeout_ms = 5000\n\n[throttle]\nfrequent_trigger_count = 5\n\n[camera]\nfront_camera_id = \"2\""
        )
        .unwrap();

        let config = PopupCamConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.motor.busy_settle_ms, 1500);
        assert_eq!(
            config.motor.busy_wait_timeout(),
            Some(Duration::from_millis(5000))
        );
        assert_eq!(config.motor.debounce_ms, 100);
        assert_eq!(config.throttle.frequent_trigger_count, 5);
        assert_eq!(config.camera.front_camera_id, "2");
        assert_eq!(config.indicator.led_paths.len(), 2);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = PopupCamConfig::load_from_file("/nonexistent/popupcam.toml").unwrap();
        assert_eq!(config.motor.busy_poll_ms, 100);
        assert_eq!(config.system.event_bus_capacity, 100);
    }

    #[test]
    fn test_config_validation() {
        let mut config = PopupCamConfig::default();

        config.throttle.frequent_trigger_count = 1;
        assert!(config.validate().is_err());
        config.throttle.frequent_trigger_count = 10;

        config.motor.busy_settle_ms = 0;
        assert!(config.validate().is_err());
        config.motor.busy_settle_ms = 1200;

        config.camera.front_camera_id.clear();
        assert!(config.validate().is_err());
        config.camera.front_camera_id = "1".to_string();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let rendered = toml::to_string_pretty(&PopupCamConfig::default()).unwrap();
        let parsed: PopupCamConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.motor.busy_settle_ms, 1200);
        assert_eq!(parsed.camera.front_camera_id, "1");
    }
}
