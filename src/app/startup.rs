use super::PopupCamOrchestrator;
use crate::error::{PopupCamError, Result};
use crate::events::PopupCamEvent;
use crate::motor::MotorController;
use tracing::{error, info, warn};

impl PopupCamOrchestrator {
    /// Report the wiring that `start` will use
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing popup camera components");
        info!(
            "Front camera id {}, debounce {:?}, busy settle {:?}",
            self.config.camera.front_camera_id,
            self.config.motor.debounce(),
            self.config.motor.busy_settle()
        );

        if self.peripherals.actuator.is_none() {
            warn!("Motor controller will run without a motor and ignore all requests");
            if let Err(e) = self
                .event_bus
                .publish(PopupCamEvent::SystemError {
                    component: "motor".to_string(),
                    error: "motor service not available".to_string(),
                })
                .await
            {
                info!("No listeners for startup error: {}", e);
            }
        }

        if self.keyboard_handler.is_some() {
            info!("Keyboard input enabled");
        }

        info!("All components initialized successfully");
        Ok(())
    }

    /// Spawn the motor controller and the keyboard driver
    pub async fn start(&mut self) -> Result<()> {
        if self.motor_handle.is_some() {
            return Err(PopupCamError::system("Motor controller already started"));
        }
        info!("Starting popup camera system");

        let controller = MotorController::new(
            &self.config,
            self.peripherals.clone(),
            self.event_bus(),
        );
        self.motor_handle = Some(controller.start(self.cancellation_token.clone()));
        info!("Motor controller started");

        if let Some(keyboard_handler) = &self.keyboard_handler {
            keyboard_handler.start().await.map_err(|e| {
                error!("Failed to start keyboard handler: {}", e);
                e
            })?;
            info!("Keyboard input handler started - o/c open/close camera, q quits");
        }

        info!("Popup camera system started successfully");
        Ok(())
    }
}
