use super::CameraState;
use crate::hal::ActuatorStatus;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Marks the motor as occupied by an in-flight command.
///
/// Every acquisition gets a new generation so a stale release timer cannot
/// free a later command.
#[derive(Debug, Default)]
pub struct BusyFlag {
    busy: bool,
    generation: u64,
}

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn acquire(&mut self) -> u64 {
        self.busy = true;
        self.generation += 1;
        self.generation
    }

    pub fn release(&mut self) {
        self.busy = false;
    }

    /// Release only if no newer command took the flag since `generation`
    pub fn release_if_current(&mut self, generation: u64) -> bool {
        if self.busy && self.generation == generation {
            self.busy = false;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPriority {
    Normal,
    /// Jumps ahead of every waiting request
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorRequest {
    pub target: CameraState,
    pub priority: RequestPriority,
    pub requested_at: Instant,
}

impl MotorRequest {
    pub fn new(target: CameraState, requested_at: Instant) -> Self {
        Self {
            target,
            priority: RequestPriority::Normal,
            requested_at,
        }
    }

    pub fn emergency(target: CameraState, requested_at: Instant) -> Self {
        Self {
            target,
            priority: RequestPriority::Emergency,
            requested_at,
        }
    }
}

/// Requests waiting for the busy flag to clear
#[derive(Debug, Default)]
pub struct RequestQueue {
    waiting: VecDeque<MotorRequest>,
}

impl RequestQueue {
    pub fn push(&mut self, request: MotorRequest) {
        match request.priority {
            RequestPriority::Emergency => self.waiting.push_front(request),
            RequestPriority::Normal => self.waiting.push_back(request),
        }
    }

    pub fn pop(&mut self) -> Option<MotorRequest> {
        self.waiting.pop_front()
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Remove normal requests that waited longer than `timeout`. Emergency requests never expire.
    pub fn drain_expired(&mut self, now: Instant, timeout: Duration) -> Vec<MotorRequest> {
        let (expired, kept): (Vec<_>, Vec<_>) = self.waiting.drain(..).partition(|request| {
            request.priority == RequestPriority::Normal
                && now.saturating_duration_since(request.requested_at) >= timeout
        });
        self.waiting = kept.into();
        expired
    }
}

/// What the scheduler does with a request once the motor is free
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Calibration is running; tell the user and leave the motor alone
    ReportCalibrating,
    Popup,
    /// Something covers the camera; hold the popup until it clears
    DeferPopup,
    Takeback,
    /// Status does not allow the transition; `error` routes to the error path
    Reject { error: bool },
}

pub fn decide(
    target: CameraState,
    status: ActuatorStatus,
    calibrating: bool,
    obstructed: bool,
) -> Decision {
    if calibrating {
        return Decision::ReportCalibrating;
    }
    match (target, status) {
        (CameraState::Open, ActuatorStatus::RetractedOk | ActuatorStatus::CalibrationOk) => {
            if obstructed {
                Decision::DeferPopup
            } else {
                Decision::Popup
            }
        }
        (CameraState::Closed, ActuatorStatus::PoppedOut | ActuatorStatus::CalibrationOk) => {
            Decision::Takeback
        }
        (_, status) => Decision::Reject {
            error: status.is_error(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_flag_generations() {
        let mut busy = BusyFlag::default();
        let first = busy.acquire();
        let second = busy.acquire();

        assert!(!busy.release_if_current(first));
        assert!(busy.is_busy());
        assert!(busy.release_if_current(second));
        assert!(!busy.is_busy());
        assert!(!busy.release_if_current(second));
    }

    #[test]
    fn test_emergency_requests_jump_the_queue() {
        let now = Instant::now();
        let mut queue = RequestQueue::default();
        queue.push(MotorRequest::new(CameraState::Open, now));
        queue.push(MotorRequest::new(CameraState::Open, now));
        queue.push(MotorRequest::emergency(CameraState::Closed, now));

        assert_eq!(queue.pop().map(|r| r.target), Some(CameraState::Closed));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_expired_requests_are_drained() {
        let now = Instant::now();
        let mut queue = RequestQueue::default();
        queue.push(MotorRequest::new(CameraState::Open, now));
        queue.push(MotorRequest::emergency(CameraState::Closed, now));
        queue.push(MotorRequest::new(CameraState::Closed, now + Duration::from_secs(4)));

        let expired = queue.drain_expired(now + Duration::from_secs(5), Duration::from_secs(5));

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].target, CameraState::Open);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().map(|r| r.priority), Some(RequestPriority::Emergency));
    }

    #[test]
    fn test_decisions() {
        use ActuatorStatus::*;

        assert_eq!(decide(CameraState::Open, RetractedOk, false, false), Decision::Popup);
        assert_eq!(decide(CameraState::Open, CalibrationOk, false, true), Decision::DeferPopup);
        assert_eq!(decide(CameraState::Closed, PoppedOut, false, true), Decision::Takeback);
        assert_eq!(decide(CameraState::Closed, CalibrationOk, false, false), Decision::Takeback);
        assert_eq!(
            decide(CameraState::Open, PoppedOut, true, false),
            Decision::ReportCalibrating
        );
        assert_eq!(
            decide(CameraState::Open, PoppedOut, false, false),
            Decision::Reject { error: false }
        );
        assert_eq!(
            decide(CameraState::Closed, RetractedJammed, false, false),
            Decision::Reject { error: true }
        );
        assert_eq!(
            decide(CameraState::Open, CalibrationRequested, false, false),
            Decision::Reject { error: true }
        );
    }
}
