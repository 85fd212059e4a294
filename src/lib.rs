pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod hal;
pub mod motor;

pub use app::{KeyboardInputHandler, PopupCamOrchestrator, RuntimeOptions, ShutdownReason};
pub use config::PopupCamConfig;
pub use error::{ActuatorError, EventBusError, PopupCamError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, PopupCamEvent};
pub use hal::{
    Actuator, ActuatorStatus, Indicator, MotorCommand, Notifier, Peripherals, SafeStateAction,
    SensorControl,
};
pub use motor::{CameraState, Dialog, DialogAction, DialogKind, MotorController};
