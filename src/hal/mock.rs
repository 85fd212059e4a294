//! In-process stand-ins for the motor driver and host services, used by the
//! test suite and by `--simulate`.

use super::{
    Actuator, ActuatorStatus, Indicator, MotorCommand, Notifier, SafeStateAction, SensorControl,
};
use crate::error::ActuatorError;
use crate::events::{EventBus, PopupCamEvent};
use crate::motor::{Dialog, DialogAction};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug)]
struct MockActuatorState {
    status: ActuatorStatus,
    scripted: VecDeque<ActuatorStatus>,
    commands: Vec<(MotorCommand, u32)>,
    jam_next: Vec<MotorCommand>,
    fail_next: Option<ActuatorError>,
    calibration_fails: bool,
}

/// Motor driver double. Tracks its own position, can be told to jam or fail,
/// and optionally reports completion on the event bus like the real driver.
pub struct MockActuator {
    state: Mutex<MockActuatorState>,
    notifications: Option<(Arc<EventBus>, Duration)>,
}

impl MockActuator {
    pub fn new(initial: ActuatorStatus) -> Self {
        Self {
            state: Mutex::new(MockActuatorState {
                status: initial,
                scripted: VecDeque::new(),
                commands: Vec::new(),
                jam_next: Vec::new(),
                fail_next: None,
                calibration_fails: false,
            }),
            notifications: None,
        }
    }

    /// Publish a `MotorNotify` with the resulting status `travel` after every command
    pub fn with_notifications(mut self, event_bus: Arc<EventBus>, travel: Duration) -> Self {
        self.notifications = Some((event_bus, travel));
        self
    }

    pub fn set_status(&self, status: ActuatorStatus) {
        self.state.lock().status = status;
    }

    pub fn current_status(&self) -> ActuatorStatus {
        self.state.lock().status
    }

    /// Statuses returned by the next `status()` calls before falling back to the tracked position
    pub fn script_statuses<I: IntoIterator<Item = ActuatorStatus>>(&self, statuses: I) {
        self.state.lock().scripted.extend(statuses);
    }

    /// Make the next command of this kind jam
    pub fn jam_next(&self, command: MotorCommand) {
        self.state.lock().jam_next.push(command);
    }

    /// Make the next driver call fail
    pub fn fail_next(&self, error: ActuatorError) {
        self.state.lock().fail_next = Some(error);
    }

    pub fn set_calibration_fails(&self, fails: bool) {
        self.state.lock().calibration_fails = fails;
    }

    pub fn commands(&self) -> Vec<MotorCommand> {
        self.state.lock().commands.iter().map(|(c, _)| *c).collect()
    }

    pub fn cookies(&self) -> Vec<u32> {
        self.state.lock().commands.iter().map(|(_, c)| *c).collect()
    }

    pub fn count(&self, command: MotorCommand) -> usize {
        self.state
            .lock()
            .commands
            .iter()
            .filter(|(c, _)| *c == command)
            .count()
    }

    fn run_command(&self, command: MotorCommand, cookie: u32) -> Result<(), ActuatorError> {
        let status = {
            let mut state = self.state.lock();
            if let Some(error) = state.fail_next.take() {
                return Err(error);
            }
            state.commands.push((command, cookie));

            let position = state.jam_next.iter().position(|c| *c == command);
            let jammed = match position {
                Some(index) => {
                    state.jam_next.remove(index);
                    true
                }
                None => false,
            };
            state.status = match (command, jammed) {
                (MotorCommand::Popup, false) => ActuatorStatus::PoppedOut,
                (MotorCommand::Popup, true) => ActuatorStatus::PoppedJammed,
                (MotorCommand::Takeback, false) => ActuatorStatus::RetractedOk,
                (MotorCommand::Takeback, true) => ActuatorStatus::RetractedJammed,
                (MotorCommand::Calibrate, _) if state.calibration_fails => {
                    ActuatorStatus::CalibrationError
                }
                (MotorCommand::Calibrate, _) => ActuatorStatus::CalibrationOk,
            };
            state.status
        };
        debug!("Mock motor {:?} -> {:?}", command, status);

        if let Some((event_bus, travel)) = &self.notifications {
            let event_bus = Arc::clone(event_bus);
            let travel = *travel;
            tokio::spawn(async move {
                tokio::time::sleep(travel).await;
                if let Err(e) = event_bus
                    .publish(PopupCamEvent::MotorNotify {
                        code: status.code(),
                        cookie,
                    })
                    .await
                {
                    warn!("Mock motor could not notify: {}", e);
                }
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Actuator for MockActuator {
    async fn status(&self) -> Result<ActuatorStatus, ActuatorError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }
        let scripted = state.scripted.pop_front();
        Ok(scripted.unwrap_or(state.status))
    }

    async fn popup(&self, cookie: u32) -> Result<(), ActuatorError> {
        self.run_command(MotorCommand::Popup, cookie)
    }

    async fn takeback(&self, cookie: u32) -> Result<(), ActuatorError> {
        self.run_command(MotorCommand::Takeback, cookie)
    }

    async fn calibrate(&self) -> Result<(), ActuatorError> {
        self.run_command(MotorCommand::Calibrate, 0)
    }
}

/// Records every indicator change
#[derive(Default)]
pub struct MockIndicator {
    changes: Mutex<Vec<bool>>,
}

impl MockIndicator {
    pub fn changes(&self) -> Vec<bool> {
        self.changes.lock().clone()
    }

    pub fn is_on(&self) -> bool {
        self.changes.lock().last().copied().unwrap_or(false)
    }
}

impl Indicator for MockIndicator {
    fn set(&self, on: bool) {
        self.changes.lock().push(on);
    }
}

/// Keeps every dialog open until the test answers it, unless an automatic answer is set
pub struct MockNotifier {
    shown: Mutex<Vec<Dialog>>,
    auto_answer: Mutex<Option<DialogAction>>,
    answer_tx: mpsc::UnboundedSender<DialogAction>,
    answer_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<DialogAction>>,
}

impl Default for MockNotifier {
    fn default() -> Self {
        let (answer_tx, answer_rx) = mpsc::unbounded_channel();
        Self {
            shown: Mutex::new(Vec::new()),
            auto_answer: Mutex::new(None),
            answer_tx,
            answer_rx: tokio::sync::Mutex::new(answer_rx),
        }
    }
}

impl MockNotifier {
    pub fn auto_answer(&self, action: Option<DialogAction>) {
        *self.auto_answer.lock() = action;
    }

    /// Close the dialog currently on screen
    pub fn answer(&self, action: DialogAction) {
        let _ = self.answer_tx.send(action);
    }

    pub fn shown(&self) -> Vec<Dialog> {
        self.shown.lock().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn show(&self, dialog: Dialog) -> DialogAction {
        self.shown.lock().push(dialog);
        let auto_answer = *self.auto_answer.lock();
        if let Some(action) = auto_answer {
            return action;
        }
        self.answer_rx
            .lock()
            .await
            .recv()
            .await
            .unwrap_or(DialogAction::Acknowledge)
    }
}

/// Counts safe-state transitions
#[derive(Default)]
pub struct MockSafeState {
    count: Mutex<usize>,
}

impl MockSafeState {
    pub fn count(&self) -> usize {
        *self.count.lock()
    }
}

impl SafeStateAction for MockSafeState {
    fn return_to_safe_state(&self) {
        *self.count.lock() += 1;
    }
}

/// Tracks sensor subscriptions
#[derive(Default)]
pub struct MockSensorControl {
    proximity_enabled: Mutex<bool>,
    free_fall: Mutex<Vec<bool>>,
}

impl MockSensorControl {
    pub fn proximity_enabled(&self) -> bool {
        *self.proximity_enabled.lock()
    }

    pub fn free_fall_enabled(&self) -> bool {
        self.free_fall.lock().last().copied().unwrap_or(false)
    }

    pub fn free_fall_changes(&self) -> Vec<bool> {
        self.free_fall.lock().clone()
    }
}

impl SensorControl for MockSensorControl {
    fn set_proximity_enabled(&self, enabled: bool) {
        *self.proximity_enabled.lock() = enabled;
    }

    fn set_free_fall_enabled(&self, enabled: bool) {
        self.free_fall.lock().push(enabled);
    }
}
