use super::Indicator;
use crate::config::IndicatorConfig;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::{debug, warn};

/// Indicator backed by LED brightness nodes
pub struct SysfsIndicator {
    paths: Vec<String>,
    on_value: String,
    off_value: String,
}

impl SysfsIndicator {
    pub fn new(config: &IndicatorConfig) -> Self {
        Self {
            paths: config.led_paths.clone(),
            on_value: config.on_value.clone(),
            off_value: config.off_value.clone(),
        }
    }

    fn write_value(path: &str, value: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(value.as_bytes())?;
        file.write_all(b"\n")
    }
}

impl Indicator for SysfsIndicator {
    fn set(&self, on: bool) {
        let value = if on { &self.on_value } else { &self.off_value };
        for path in &self.paths {
            match Self::write_value(path, value) {
                Ok(()) => debug!("Wrote {} to {}", value, path),
                Err(e) => warn!("Failed to write LED {}: {}", path, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_brightness_to_every_led() {
        let dir = tempfile::tempdir().unwrap();
        let green = dir.path().join("green");
        let blue = dir.path().join("blue");
        std::fs::write(&green, "0\n").unwrap();
        std::fs::write(&blue, "0\n").unwrap();

        let indicator = SysfsIndicator::new(&IndicatorConfig {
            led_paths: vec![
                green.to_string_lossy().into_owned(),
                blue.to_string_lossy().into_owned(),
            ],
            on_value: "255".to_string(),
            off_value: "0".to_string(),
        });

        indicator.set(true);
        assert_eq!(std::fs::read_to_string(&green).unwrap(), "255\n");
        assert_eq!(std::fs::read_to_string(&blue).unwrap(), "255\n");

        indicator.set(false);
        assert_eq!(std::fs::read_to_string(&green).unwrap(), "0\n");
    }

    #[test]
    fn test_missing_led_is_ignored() {
        let indicator = SysfsIndicator::new(&IndicatorConfig {
            led_paths: vec!["/nonexistent/led/brightness".to_string()],
            on_value: "255".to_string(),
            off_value: "0".to_string(),
        });

        indicator.set(true);
    }
}
