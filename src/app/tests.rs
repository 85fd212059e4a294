use super::*;
use crate::config::PopupCamConfig;
use crate::events::{EventBus, PopupCamEvent};
use crate::hal::{
    Actuator, ActuatorStatus, MockActuator, MockIndicator, MockNotifier, MockSafeState,
    MockSensorControl, MotorCommand, Peripherals,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn mock_peripherals(actuator: Arc<MockActuator>, sensors: Arc<MockSensorControl>) -> Peripherals {
    let actuator: Arc<dyn Actuator> = actuator;
    Peripherals {
        actuator: Some(actuator),
        indicator: Arc::new(MockIndicator::default()),
        notifier: Arc::new(MockNotifier::default()),
        safe_state: Arc::new(MockSafeState::default()),
        sensors,
    }
}

#[tokio::test]
async fn test_orchestrator_creation() {
    let orchestrator = PopupCamOrchestrator::new(
        PopupCamConfig::default(),
        RuntimeOptions {
            simulate: true,
            keyboard: false,
        },
    )
    .unwrap();

    assert!(orchestrator.peripherals.actuator.is_some());
    assert!(orchestrator.keyboard_handler.is_none());
    assert!(!orchestrator.is_running());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = PopupCamConfig::default();
    config.throttle.frequent_trigger_count = 0;

    assert!(PopupCamOrchestrator::new(config, RuntimeOptions::default()).is_err());
}

#[tokio::test]
async fn test_start_twice_fails() {
    let mut orchestrator =
        PopupCamOrchestrator::new(PopupCamConfig::default(), RuntimeOptions::default()).unwrap();

    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();
    assert!(orchestrator.is_running());
    assert!(orchestrator.start().await.is_err());

    assert_eq!(orchestrator.shutdown().await.unwrap(), 0);
    assert!(!orchestrator.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_request_stops_controller() {
    let event_bus = Arc::new(EventBus::new(64));
    let actuator = Arc::new(MockActuator::new(ActuatorStatus::RetractedOk));
    let sensors = Arc::new(MockSensorControl::default());
    let mut orchestrator = PopupCamOrchestrator::with_peripherals(
        PopupCamConfig::default(),
        Arc::clone(&event_bus),
        mock_peripherals(Arc::clone(&actuator), Arc::clone(&sensors)),
    );

    orchestrator.start().await.unwrap();
    let running = tokio::spawn(async move { orchestrator.run().await });
    sleep(Duration::from_millis(10)).await;
    assert!(sensors.proximity_enabled());

    event_bus
        .publish(PopupCamEvent::CameraAvailability {
            camera_id: "1".to_string(),
            available: false,
            timestamp: Instant::now(),
        })
        .await
        .unwrap();
    sleep(Duration::from_millis(200)).await;
    assert_eq!(actuator.commands(), vec![MotorCommand::Popup]);

    event_bus
        .publish(PopupCamEvent::ShutdownRequested {
            reason: "test".to_string(),
        })
        .await
        .unwrap();

    let exit_code = running.await.unwrap().unwrap();
    assert_eq!(exit_code, 0);
    assert!(!sensors.proximity_enabled());
}
