use crate::error::Result;
use crate::events::{EventBus, PopupCamEvent};
use crate::hal::{ActuatorStatus, DialogAnswer, MockActuator, MotorCommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a key press does
#[derive(Debug, Clone)]
pub enum KeyAction {
    Publish(PopupCamEvent),
    Jam(MotorCommand),
    Answer(DialogAnswer),
    Quit,
}

/// Terminal driver for exercising the controller by hand
pub struct KeyboardInputHandler {
    event_bus: Arc<EventBus>,
    camera_id: String,
    simulated: Option<Arc<MockActuator>>,
    answers: Option<mpsc::UnboundedSender<DialogAnswer>>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(
        event_bus: Arc<EventBus>,
        camera_id: String,
        simulated: Option<Arc<MockActuator>>,
        answers: Option<mpsc::UnboundedSender<DialogAnswer>>,
    ) -> Self {
        Self {
            event_bus,
            camera_id,
            simulated,
            answers,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Map a key to its action
    pub fn action_for(camera_id: &str, code: KeyCode) -> Option<KeyAction> {
        let now = Instant::now();
        let camera = |available| {
            KeyAction::Publish(PopupCamEvent::CameraAvailability {
                camera_id: camera_id.to_string(),
                available,
                timestamp: now,
            })
        };
        let action = match code {
            KeyCode::Char('o') => camera(false),
            KeyCode::Char('c') => camera(true),
            KeyCode::Char('p') => KeyAction::Publish(PopupCamEvent::ProximityChanged {
                near: true,
                timestamp: now,
            }),
            KeyCode::Char('f') => KeyAction::Publish(PopupCamEvent::ProximityChanged {
                near: false,
                timestamp: now,
            }),
            KeyCode::Char('d') => {
                KeyAction::Publish(PopupCamEvent::FreeFallDetected { timestamp: now })
            }
            KeyCode::Char('b') => KeyAction::Publish(PopupCamEvent::MotorNotify {
                code: ActuatorStatus::Pressed.code(),
                cookie: 0,
            }),
            KeyCode::Char('j') => KeyAction::Jam(MotorCommand::Popup),
            KeyCode::Char('k') => KeyAction::Jam(MotorCommand::Takeback),
            KeyCode::Char('y') => KeyAction::Answer(DialogAnswer::Positive),
            KeyCode::Char('n') => KeyAction::Answer(DialogAnswer::Negative),
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
            _ => return None,
        };
        Some(action)
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        let event_bus = Arc::clone(&self.event_bus);
        let camera_id = self.camera_id.clone();
        let simulated = self.simulated.clone();
        let answers = self.answers.clone();
        let cancellation_token = self.cancellation_token.clone();
        let runtime_handle = Handle::current();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled - keyboard handler active");

            while !cancellation_token.is_cancelled() {
                let key_event = match event::poll(Duration::from_millis(100)) {
                    Ok(true) => match event::read() {
                        Ok(Event::Key(key_event)) if key_event.kind == KeyEventKind::Press => {
                            key_event
                        }
                        _ => continue,
                    },
                    Ok(false) => continue,
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                        continue;
                    }
                };

                let Some(action) = Self::action_for(&camera_id, key_event.code) else {
                    debug!("Key pressed: {:?}", key_event.code);
                    continue;
                };

                match action {
                    KeyAction::Publish(event) => {
                        info!("Key {:?}: {}", key_event.code, event.description());
                        let event_bus = Arc::clone(&event_bus);
                        runtime_handle.spawn(async move {
                            if let Err(e) = event_bus.publish(event).await {
                                warn!("Failed to publish keyboard event: {}", e);
                            }
                        });
                    }
                    KeyAction::Jam(command) => match &simulated {
                        Some(actuator) => {
                            info!("Next {:?} will jam", command);
                            actuator.jam_next(command);
                        }
                        None => warn!("Jamming needs --simulate"),
                    },
                    KeyAction::Answer(answer) => match &answers {
                        Some(answers) => {
                            let _ = answers.send(answer);
                        }
                        None => debug!("No dialog listener for {:?}", answer),
                    },
                    KeyAction::Quit => {
                        info!("Quit key pressed - requesting shutdown");
                        let event_bus = Arc::clone(&event_bus);
                        runtime_handle.spawn(async move {
                            let shutdown_event = PopupCamEvent::ShutdownRequested {
                                reason: "User requested via keyboard".to_string(),
                            };
                            if let Err(e) = event_bus.publish(shutdown_event).await {
                                warn!("Failed to publish shutdown event: {}", e);
                            }
                        });
                        break;
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard input handler task exited");
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the blocking task one poll interval to restore the terminal
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_camera_keys() {
        match KeyboardInputHandler::action_for("1", KeyCode::Char('o')) {
            Some(KeyAction::Publish(PopupCamEvent::CameraAvailability {
                camera_id,
                available,
                ..
            })) => {
                assert_eq!(camera_id, "1");
                assert!(!available);
            }
            other => panic!("Unexpected action {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_control_keys() {
        assert!(matches!(
            KeyboardInputHandler::action_for("1", KeyCode::Char('j')),
            Some(KeyAction::Jam(MotorCommand::Popup))
        ));
        assert!(matches!(
            KeyboardInputHandler::action_for("1", KeyCode::Char('n')),
            Some(KeyAction::Answer(DialogAnswer::Negative))
        ));
        assert!(matches!(
            KeyboardInputHandler::action_for("1", KeyCode::Esc),
            Some(KeyAction::Quit)
        ));
        assert!(KeyboardInputHandler::action_for("1", KeyCode::Char('x')).is_none());
    }

    #[tokio::test]
    async fn test_keyboard_handler_creation() {
        let event_bus = Arc::new(EventBus::new(100));
        let handler = KeyboardInputHandler::new(event_bus, "1".to_string(), None, None);
        assert!(!handler.cancellation_token.is_cancelled());
    }
}
