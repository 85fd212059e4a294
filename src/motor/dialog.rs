use super::CameraState;
use crate::hal::ActuatorStatus;
use std::time::Duration;
use tracing::debug;

/// The three dialogs the controller can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    FrequentOperation,
    CalibrationResult,
    MotorError,
}

/// Buttons a dialog can offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    Acknowledge,
    Calibrate,
    Cancel,
}

impl DialogAction {
    pub fn label(&self) -> &'static str {
        match self {
            DialogAction::Acknowledge => "OK",
            DialogAction::Calibrate => "Calibrate now",
            DialogAction::Cancel => "Cancel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogMessage {
    StopOperatingFrequently,
    CalibrationRunning,
    CalibrationSucceeded,
    CalibrationFailed,
    PopupFailed,
    TakebackFailed,
    PopupFailedCalibrate,
    TakebackFailedCalibrate,
}

impl DialogMessage {
    pub fn text(&self) -> &'static str {
        match self {
            DialogMessage::StopOperatingFrequently => {
                "Please do not open and close the front camera too frequently"
            }
            DialogMessage::CalibrationRunning => "Calibrating the front camera motor, please wait",
            DialogMessage::CalibrationSucceeded => "Front camera motor calibrated successfully",
            DialogMessage::CalibrationFailed => "Front camera motor calibration failed",
            DialogMessage::PopupFailed => "The front camera could not pop up, please try again",
            DialogMessage::TakebackFailed => "The front camera could not retract, retrying",
            DialogMessage::PopupFailedCalibrate => {
                "The front camera failed to pop up several times. Calibrate the motor?"
            }
            DialogMessage::TakebackFailedCalibrate => {
                "The front camera failed to retract several times. Calibrate the motor?"
            }
        }
    }

    /// Message for the error dialog. An unknown last target reads as a popup.
    pub fn for_motor_error(needs_calibration: bool, last_target: Option<CameraState>) -> Self {
        let takeback = last_target == Some(CameraState::Closed);
        match (needs_calibration, takeback) {
            (true, true) => DialogMessage::TakebackFailedCalibrate,
            (true, false) => DialogMessage::PopupFailedCalibrate,
            (false, true) => DialogMessage::TakebackFailed,
            (false, false) => DialogMessage::PopupFailed,
        }
    }

    /// Message for the calibration dialog; `None` means calibration is still running
    pub fn for_calibration(status: Option<ActuatorStatus>) -> Self {
        match status {
            None => DialogMessage::CalibrationRunning,
            Some(ActuatorStatus::CalibrationOk) => DialogMessage::CalibrationSucceeded,
            Some(_) => DialogMessage::CalibrationFailed,
        }
    }
}

/// A modal request handed to the notifier
#[derive(Debug, Clone, PartialEq)]
pub struct Dialog {
    pub kind: DialogKind,
    pub title: Option<&'static str>,
    pub message: DialogMessage,
    pub actions: Vec<DialogAction>,
    /// Acknowledgement stays disabled for this long
    pub ack_cooldown: Option<Duration>,
}

const POPUP_CAMERA_TIP: &str = "Popup camera";

impl Dialog {
    pub fn frequent_operation(cooldown: Duration) -> Self {
        Self {
            kind: DialogKind::FrequentOperation,
            title: Some(POPUP_CAMERA_TIP),
            message: DialogMessage::StopOperatingFrequently,
            actions: vec![DialogAction::Acknowledge],
            ack_cooldown: Some(cooldown),
        }
    }

    pub fn calibration(status: Option<ActuatorStatus>) -> Self {
        Self {
            kind: DialogKind::CalibrationResult,
            title: None,
            message: DialogMessage::for_calibration(status),
            actions: vec![DialogAction::Acknowledge],
            ack_cooldown: None,
        }
    }

    pub fn motor_error(needs_calibration: bool, last_target: Option<CameraState>) -> Self {
        let actions = if needs_calibration {
            vec![DialogAction::Calibrate, DialogAction::Cancel]
        } else {
            vec![DialogAction::Acknowledge]
        };
        Self {
            kind: DialogKind::MotorError,
            title: Some(POPUP_CAMERA_TIP),
            message: DialogMessage::for_motor_error(needs_calibration, last_target),
            actions,
            ack_cooldown: None,
        }
    }

    pub fn offers(&self, action: DialogAction) -> bool {
        self.actions.contains(&action)
    }
}

/// Single-slot modal resource: at most one dialog is visible, extra requests are dropped.
#[derive(Debug, Default)]
pub struct DialogSlot {
    active: Option<DialogKind>,
}

impl DialogSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&mut self, kind: DialogKind) -> bool {
        if let Some(active) = self.active {
            debug!("Dropping {:?} dialog, {:?} already showing", kind, active);
            return false;
        }
        self.active = Some(kind);
        true
    }

    pub fn release(&mut self, kind: DialogKind) {
        if self.active == Some(kind) {
            self.active = None;
        }
    }

    pub fn active(&self) -> Option<DialogKind> {
        self.active
    }

    pub fn is_showing(&self) -> bool {
        self.active.is_some()
    }
}

/// Acknowledgement button state at one moment of the cool-down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckLabel {
    pub text: String,
    pub enabled: bool,
}

/// Visible count-down on a locked acknowledgement button
#[derive(Debug, Clone, Copy)]
pub struct AckCountdown {
    cooldown: Duration,
}

impl AckCountdown {
    pub const TICK: Duration = Duration::from_secs(1);

    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn label_at(&self, elapsed: Duration) -> AckLabel {
        let ok = DialogAction::Acknowledge.label();
        if elapsed >= self.cooldown {
            return AckLabel {
                text: ok.to_string(),
                enabled: true,
            };
        }
        let remaining_ms = (self.cooldown - elapsed).as_millis();
        let seconds = ((remaining_ms.saturating_sub(1)) / 1000).max(1);
        AckLabel {
            text: format!("{} ({})", ok, seconds),
            enabled: false,
        }
    }
}
