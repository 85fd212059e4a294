use super::keyboard_input::KeyboardInputHandler;
use super::types::{RuntimeOptions, ShutdownReason};
use crate::config::PopupCamConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::hal::{
    Actuator, ActuatorStatus, ConsoleNotifier, Indicator, LogIndicator, LogSafeState,
    LogSensorControl, MockActuator, Peripherals, SysfsIndicator,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Time the simulated motor takes to report the end of a motion
const SIMULATED_TRAVEL: Duration = Duration::from_millis(600);

/// Owns the event bus, the host peripherals and the motor controller task
pub struct PopupCamOrchestrator {
    pub(super) config: PopupCamConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) peripherals: Peripherals,

    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) motor_handle: Option<JoinHandle<()>>,

    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl PopupCamOrchestrator {
    /// Build console peripherals for the given options
    pub fn new(config: PopupCamConfig, options: RuntimeOptions) -> Result<Self> {
        config.validate()?;
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));

        let simulated = options.simulate.then(|| {
            info!("Simulating the popup motor");
            Arc::new(
                MockActuator::new(ActuatorStatus::RetractedOk)
                    .with_notifications(Arc::clone(&event_bus), SIMULATED_TRAVEL),
            )
        });
        let actuator = simulated
            .clone()
            .map(|mock| -> Arc<dyn Actuator> { mock });
        if actuator.is_none() {
            warn!("No motor driver bound to this host");
        }

        let (answer_sender, answer_receiver) = if options.keyboard {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let peripherals = Peripherals {
            actuator,
            indicator: Self::build_indicator(&config),
            notifier: Arc::new(ConsoleNotifier::new(answer_receiver)),
            safe_state: Arc::new(LogSafeState),
            sensors: Arc::new(LogSensorControl),
        };

        let keyboard_handler = options.keyboard.then(|| {
            KeyboardInputHandler::new(
                Arc::clone(&event_bus),
                config.camera.front_camera_id.clone(),
                simulated,
                answer_sender,
            )
        });

        let mut orchestrator = Self::with_peripherals(config, event_bus, peripherals);
        orchestrator.keyboard_handler = keyboard_handler;
        Ok(orchestrator)
    }

    /// Use host-supplied peripherals, e.g. vendor bindings
    pub fn with_peripherals(
        config: PopupCamConfig,
        event_bus: Arc<EventBus>,
        peripherals: Peripherals,
    ) -> Self {
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        Self {
            config,
            event_bus,
            peripherals,
            keyboard_handler: None,
            motor_handle: None,
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        }
    }

    fn build_indicator(config: &PopupCamConfig) -> Arc<dyn Indicator> {
        let mut indicator_config = config.indicator.clone();
        indicator_config
            .led_paths
            .retain(|path| Path::new(path).exists());
        if indicator_config.led_paths.is_empty() {
            info!("No indicator LEDs found, logging indicator changes");
            Arc::new(LogIndicator)
        } else {
            Arc::new(SysfsIndicator::new(&indicator_config))
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn is_running(&self) -> bool {
        self.motor_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
