use crate::hal::ActuatorStatus;
use tracing::{debug, info, warn};

/// Direction of a motor motion, used to key jam counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Popup,
    Takeback,
}

/// Consecutive jam count for one direction, bounded by its retry budget
#[derive(Debug, Clone)]
pub struct FailureCounter {
    failures: u32,
    max_retries: u32,
}

impl FailureCounter {
    pub fn new(max_retries: u32) -> Self {
        Self {
            failures: 0,
            max_retries,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn is_exhausted(&self) -> bool {
        self.failures >= self.max_retries
    }

    /// Count a jam; returns false once the budget was already spent.
    fn record_jam(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.failures += 1;
        true
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}

/// What the error path should do about the status it just read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JamAssessment {
    pub needs_calibration: bool,
    /// Send another takeback straight away
    pub retry_takeback: bool,
}

/// Per-direction jam counters plus the calibration-in-progress flag
#[derive(Debug)]
pub struct JamTracker {
    popup: FailureCounter,
    takeback: FailureCounter,
    calibrating: bool,
}

impl JamTracker {
    pub fn new(max_popup_retries: u32, max_takeback_retries: u32) -> Self {
        Self {
            popup: FailureCounter::new(max_popup_retries),
            takeback: FailureCounter::new(max_takeback_retries),
            calibrating: false,
        }
    }

    pub fn counter(&self, direction: Direction) -> &FailureCounter {
        match direction {
            Direction::Popup => &self.popup,
            Direction::Takeback => &self.takeback,
        }
    }

    /// Clear the jam history of a direction after it moved successfully
    pub fn reset(&mut self, direction: Direction) {
        let counter = match direction {
            Direction::Popup => &mut self.popup,
            Direction::Takeback => &mut self.takeback,
        };
        if counter.failures > 0 {
            debug!("Resetting {:?} failure count ({})", direction, counter.failures);
        }
        counter.reset();
    }

    /// Decide how to recover from the status read on the error path
    pub fn assess(&mut self, status: Option<ActuatorStatus>) -> JamAssessment {
        match status {
            Some(ActuatorStatus::CalibrationRequested) | Some(ActuatorStatus::CalibrationError) => {
                JamAssessment {
                    needs_calibration: true,
                    retry_takeback: false,
                }
            }
            Some(ActuatorStatus::PoppedJammed) => {
                if self.popup.record_jam() {
                    warn!(
                        "Popup jammed (attempt {}/{})",
                        self.popup.failures, self.popup.max_retries
                    );
                    JamAssessment::default()
                } else {
                    warn!("Popup jammed too many times, calibration needed");
                    JamAssessment {
                        needs_calibration: true,
                        retry_takeback: false,
                    }
                }
            }
            Some(ActuatorStatus::RetractedJammed) => {
                if self.takeback.record_jam() {
                    warn!(
                        "Takeback jammed (attempt {}/{}), retrying",
                        self.takeback.failures, self.takeback.max_retries
                    );
                    JamAssessment {
                        needs_calibration: false,
                        retry_takeback: true,
                    }
                } else {
                    warn!("Takeback jammed too many times, calibration needed");
                    JamAssessment {
                        needs_calibration: true,
                        retry_takeback: false,
                    }
                }
            }
            _ => JamAssessment::default(),
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// Mark calibration as started; false if one is already running
    pub fn begin_calibration(&mut self) -> bool {
        if self.calibrating {
            return false;
        }
        info!("Motor calibration started");
        self.calibrating = true;
        true
    }

    pub fn finish_calibration(&mut self) {
        self.calibrating = false;
    }
}
