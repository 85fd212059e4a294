use super::{PopupCamOrchestrator, ShutdownReason};
use crate::error::{PopupCamError, Result};
use crate::events::{EventFilter, EventReceiver, PopupCamEvent};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info};

type SharedShutdown = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl PopupCamOrchestrator {
    /// Run until a signal, a shutdown request or the controller exiting
    pub async fn run(&mut self) -> Result<i32> {
        info!("Popup camera system is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| PopupCamError::system("Shutdown sender already taken"))?;

        let mut shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| PopupCamError::system("Shutdown receiver already taken"))?;

        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));
        self.setup_signal_handlers(Arc::clone(&shutdown_sender));
        self.listen_for_shutdown_requests(shutdown_sender);

        let shutdown_reason = match self.motor_handle.take() {
            Some(mut handle) => tokio::select! {
                reason = &mut shutdown_receiver => {
                    self.motor_handle = Some(handle);
                    reason
                }
                _ = &mut handle => {
                    error!("Motor controller exited unexpectedly");
                    Ok(ShutdownReason::ControllerStopped)
                }
            },
            None => shutdown_receiver.await,
        }
        .map_err(|_| PopupCamError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let mut exit_code = self.shutdown().await?;
        if shutdown_reason == ShutdownReason::ControllerStopped {
            exit_code = 1;
        }

        info!("Popup camera system shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self, shutdown_sender: SharedShutdown) {
        // SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        // SIGINT (Ctrl+C) - Cross-platform
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }

    /// Forward `ShutdownRequested` events from the bus, e.g. the keyboard quit key
    fn listen_for_shutdown_requests(&self, shutdown_sender: SharedShutdown) {
        let mut receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "shutdown".to_string(),
        );
        let cancel = self.cancellation_token.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = receiver.recv() => event,
                };
                match event {
                    Ok(PopupCamEvent::ShutdownRequested { reason }) => {
                        if let Some(sender) = shutdown_sender.lock().await.take() {
                            let _ = sender.send(ShutdownReason::UserRequest(reason));
                        }
                        break;
                    }
                    Ok(_) => {}
                    Err(crate::error::EventBusError::ChannelClosed) => break,
                    Err(e) => debug!("Shutdown listener: {}", e),
                }
            }
        });
    }
}
