//! Popup motor actuation: debouncing, command scheduling, jam recovery,
//! proximity gating and frequency throttling.

mod controller;
mod debounce;
mod dialog;
mod proximity;
mod recovery;
mod scheduler;
mod throttle;


pub use controller::MotorController;
pub use debounce::{DebounceOutcome, Debouncer};
pub use dialog::{AckCountdown, AckLabel, Dialog, DialogAction, DialogKind, DialogMessage, DialogSlot};
pub use proximity::{PendingIntent, ProximityGate};
pub use recovery::{Direction, FailureCounter, JamAssessment, JamTracker};
pub use scheduler::{decide, BusyFlag, Decision, MotorRequest, RequestPriority, RequestQueue};
pub use throttle::FrequencyThrottle;

/// Target position of the camera module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Open,
    Closed,
}

impl CameraState {
    pub fn opposite(&self) -> Self {
        match self {
            CameraState::Open => CameraState::Closed,
            CameraState::Closed => CameraState::Open,
        }
    }
}
