use crate::error::EventBusError;
use crate::hal::MotorCommand;
use crate::motor::{DialogAction, DialogKind};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Events flowing between the hardware sources, the motor controller and the host
#[derive(Debug, Clone)]
pub enum PopupCamEvent {
    /// Camera service reported a device becoming available (closed) or unavailable (opened)
    CameraAvailability {
        camera_id: String,
        available: bool,
        timestamp: Instant,
    },
    /// First reading after the proximity sensor is enabled
    ProximityInit { near: bool, timestamp: Instant },
    /// Proximity sensor changed state
    ProximityChanged { near: bool, timestamp: Instant },
    /// Free-fall sensor fired
    FreeFallDetected { timestamp: Instant },
    /// Asynchronous status notification from the motor driver, carrying the raw vendor code
    MotorNotify { code: i32, cookie: u32 },
    /// A dialog was closed by the user
    DialogClosed {
        kind: DialogKind,
        action: DialogAction,
    },
    /// A command was sent to the motor
    MotorCommandIssued { command: MotorCommand, cookie: u32 },
    /// An open request was held back because something covers the camera
    OpenDeferred { timestamp: Instant },
    /// A dialog was handed to the notifier
    DialogShown { kind: DialogKind, message: String },
    /// The host was asked to return to its home context
    SafeStateRequested { reason: String },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested { reason: String },
}

impl PopupCamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PopupCamEvent::CameraAvailability {
                camera_id,
                available,
                ..
            } => format!(
                "Camera {} {}",
                camera_id,
                if *available { "available" } else { "unavailable" }
            ),
            PopupCamEvent::ProximityInit { near, .. } => {
                format!("Proximity initialized (near: {})", near)
            }
            PopupCamEvent::ProximityChanged { near, .. } => {
                format!("Proximity changed (near: {})", near)
            }
            PopupCamEvent::FreeFallDetected { .. } => "Free fall detected".to_string(),
            PopupCamEvent::MotorNotify { code, cookie } => {
                format!("Motor notify: code {} (cookie {})", code, cookie)
            }
            PopupCamEvent::DialogClosed { kind, action } => {
                format!("Dialog {:?} closed with {:?}", kind, action)
            }
            PopupCamEvent::MotorCommandIssued { command, cookie } => {
                format!("Motor command {:?} issued (cookie {})", command, cookie)
            }
            PopupCamEvent::OpenDeferred { .. } => "Popup deferred by proximity".to_string(),
            PopupCamEvent::DialogShown { kind, message } => {
                format!("Dialog {:?} shown: {}", kind, message)
            }
            PopupCamEvent::SafeStateRequested { reason } => {
                format!("Safe state requested: {}", reason)
            }
            PopupCamEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            PopupCamEvent::ShutdownRequested { reason } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PopupCamEvent::CameraAvailability { .. } => "camera_availability",
            PopupCamEvent::ProximityInit { .. } => "proximity_init",
            PopupCamEvent::ProximityChanged { .. } => "proximity_changed",
            PopupCamEvent::FreeFallDetected { .. } => "free_fall_detected",
            PopupCamEvent::MotorNotify { .. } => "motor_notify",
            PopupCamEvent::DialogClosed { .. } => "dialog_closed",
            PopupCamEvent::MotorCommandIssued { .. } => "motor_command_issued",
            PopupCamEvent::OpenDeferred { .. } => "open_deferred",
            PopupCamEvent::DialogShown { .. } => "dialog_shown",
            PopupCamEvent::SafeStateRequested { .. } => "safe_state_requested",
            PopupCamEvent::SystemError { .. } => "system_error",
            PopupCamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Event types the motor controller consumes
pub const CONTROLLER_INPUTS: &[&str] = &[
    "camera_availability",
    "proximity_init",
    "proximity_changed",
    "free_fall_detected",
    "motor_notify",
];

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<PopupCamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<PopupCamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: PopupCamEvent) -> Result<usize, EventBusError> {
        match &event {
            PopupCamEvent::MotorNotify { code, cookie } => {
                info!("Motor status code {} (cookie {})", code, cookie);
            }
            PopupCamEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            PopupCamEvent::FreeFallDetected { .. } => {
                warn!("Free fall detected");
            }
            PopupCamEvent::ShutdownRequested { reason } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => debug!("Publishing event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&PopupCamEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &PopupCamEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<PopupCamEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<PopupCamEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<PopupCamEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<PopupCamEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let event = PopupCamEvent::MotorNotify {
            code: 11,
            cookie: 7,
        };

        let subscriber_count = event_bus.publish(event).await.unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            PopupCamEvent::MotorNotify { code, cookie } => {
                assert_eq!(code, 11);
                assert_eq!(cookie, 7);
            }
            _ => panic!("Unexpected event type"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(10);
        assert!(!event_bus.has_subscribers());

        let result = event_bus
            .publish(PopupCamEvent::FreeFallDetected {
                timestamp: Instant::now(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let filter = EventFilter::EventTypes(CONTROLLER_INPUTS.to_vec());
        let mut filtered_receiver =
            EventReceiver::new(event_bus.subscribe(), filter, "test".to_string());

        event_bus
            .publish(PopupCamEvent::MotorCommandIssued {
                command: MotorCommand::Popup,
                cookie: 1,
            })
            .await
            .unwrap();
        event_bus
            .publish(PopupCamEvent::ProximityChanged {
                near: true,
                timestamp: Instant::now(),
            })
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), filtered_receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "proximity_changed");
        assert!(filtered_receiver.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_event_properties() {
        let event = PopupCamEvent::CameraAvailability {
            camera_id: "1".to_string(),
            available: false,
            timestamp: Instant::now(),
        };

        assert_eq!(event.event_type(), "camera_availability");
        assert_eq!(event.description(), "Camera 1 unavailable");
        assert!(EventFilter::EventTypes(CONTROLLER_INPUTS.to_vec()).matches(&event));

        let closed = PopupCamEvent::DialogClosed {
            kind: DialogKind::MotorError,
            action: DialogAction::Cancel,
        };
        assert!(!EventFilter::EventTypes(CONTROLLER_INPUTS.to_vec()).matches(&closed));
    }
}
