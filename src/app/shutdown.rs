use super::PopupCamOrchestrator;
use crate::error::Result;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const CONTROLLER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl PopupCamOrchestrator {
    /// Stop the keyboard driver and the controller loop
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Controller disables its sensor listeners on the way out
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Some(keyboard_handler) = &self.keyboard_handler {
            if let Err(e) = keyboard_handler.stop().await {
                error!("Error stopping keyboard: {}", e);
                exit_code = 1;
            }
        }

        if let Some(handle) = self.motor_handle.take() {
            match timeout(CONTROLLER_STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => info!("Motor controller stopped"),
                Ok(Err(e)) => {
                    error!("Motor controller task failed: {}", e);
                    exit_code = 1;
                }
                Err(_) => {
                    error!("Motor controller stop timeout");
                    exit_code = 1;
                }
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
