//! Contracts for the hardware and host services the motor controller drives.
//!
//! The controller never talks to a device directly; everything goes through
//! the traits below so the host can supply vendor bindings, sysfs nodes or
//! test doubles.

pub mod console;
pub mod mock;
pub mod sysfs;

use crate::error::ActuatorError;
use crate::motor::{Dialog, DialogAction};
use async_trait::async_trait;
use std::sync::Arc;

pub use console::{ConsoleNotifier, DialogAnswer, LogIndicator, LogSafeState, LogSensorControl};
pub use mock::{MockActuator, MockIndicator, MockNotifier, MockSafeState, MockSensorControl};
pub use sysfs::SysfsIndicator;

/// Position/health report of the popup motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorStatus {
    PoppedOut,
    PoppedJammed,
    RetractedOk,
    RetractedJammed,
    Pressed,
    CalibrationOk,
    CalibrationError,
    CalibrationRequested,
}

impl ActuatorStatus {
    /// Map a raw driver status code
    pub fn from_code(code: i32) -> Result<Self, ActuatorError> {
        match code {
            11 => Ok(ActuatorStatus::PoppedOut),
            12 => Ok(ActuatorStatus::PoppedJammed),
            13 => Ok(ActuatorStatus::RetractedOk),
            14 => Ok(ActuatorStatus::RetractedJammed),
            15 => Ok(ActuatorStatus::Pressed),
            17 => Ok(ActuatorStatus::CalibrationOk),
            18 => Ok(ActuatorStatus::CalibrationError),
            19 => Ok(ActuatorStatus::CalibrationRequested),
            code => Err(ActuatorError::UnknownStatus { code }),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ActuatorStatus::PoppedOut => 11,
            ActuatorStatus::PoppedJammed => 12,
            ActuatorStatus::RetractedOk => 13,
            ActuatorStatus::RetractedJammed => 14,
            ActuatorStatus::Pressed => 15,
            ActuatorStatus::CalibrationOk => 17,
            ActuatorStatus::CalibrationError => 18,
            ActuatorStatus::CalibrationRequested => 19,
        }
    }

    /// Statuses that send the controller down the error path
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ActuatorStatus::PoppedJammed
                | ActuatorStatus::RetractedJammed
                | ActuatorStatus::CalibrationError
                | ActuatorStatus::CalibrationRequested
        )
    }
}

/// Motion commands understood by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    Popup,
    Takeback,
    Calibrate,
}

/// Command/status contract of the motor driver
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn status(&self) -> Result<ActuatorStatus, ActuatorError>;

    async fn popup(&self, cookie: u32) -> Result<(), ActuatorError>;

    async fn takeback(&self, cookie: u32) -> Result<(), ActuatorError>;

    async fn calibrate(&self) -> Result<(), ActuatorError>;
}

/// User-visible light pulsed on every issued command. Best effort.
pub trait Indicator: Send + Sync {
    fn set(&self, on: bool);
}

/// Renders one modal dialog and resolves with the user's choice
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, dialog: Dialog) -> DialogAction;
}

/// Brings the host UI back to a neutral home context
pub trait SafeStateAction: Send + Sync {
    fn return_to_safe_state(&self);
}

/// Subscription control for the sensors feeding the controller
pub trait SensorControl: Send + Sync {
    fn set_proximity_enabled(&self, enabled: bool);

    fn set_free_fall_enabled(&self, enabled: bool);
}

/// Everything the controller needs from its host
#[derive(Clone)]
pub struct Peripherals {
    pub actuator: Option<Arc<dyn Actuator>>,
    pub indicator: Arc<dyn Indicator>,
    pub notifier: Arc<dyn Notifier>,
    pub safe_state: Arc<dyn SafeStateAction>,
    pub sensors: Arc<dyn SensorControl>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        for code in [11, 12, 13, 14, 15, 17, 18, 19] {
            let status = ActuatorStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(
            ActuatorStatus::from_code(16),
            Err(ActuatorError::UnknownStatus { code: 16 })
        );
    }

    #[test]
    fn test_error_statuses() {
        assert!(ActuatorStatus::PoppedJammed.is_error());
        assert!(ActuatorStatus::CalibrationRequested.is_error());
        assert!(!ActuatorStatus::PoppedOut.is_error());
        assert!(!ActuatorStatus::Pressed.is_error());
        assert!(!ActuatorStatus::CalibrationOk.is_error());
    }
}
