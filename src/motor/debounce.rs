use super::CameraState;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Result of feeding one camera signal into the debouncer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// Dispatch `target` after `delay` unless cancelled; the timer must carry `generation`.
    /// `superseded` is set when a pending opposite intent was dropped as bounce.
    Scheduled {
        target: CameraState,
        generation: u64,
        delay: Duration,
        superseded: bool,
    },
    /// Same intent already pending
    Coalesced,
}

/// Pending timer and last signal time for one direction
#[derive(Debug, Default, Clone)]
struct DebounceSlot {
    pending: Option<u64>,
    last_signal: Option<Instant>,
}

/// Coalesces bouncing camera availability signals into one intent
#[derive(Debug)]
pub struct Debouncer {
    camera_id: String,
    window: Duration,
    open: DebounceSlot,
    close: DebounceSlot,
    generation: u64,
}

impl Debouncer {
    pub fn new(camera_id: impl Into<String>, window: Duration) -> Self {
        Self {
            camera_id: camera_id.into(),
            window,
            open: DebounceSlot::default(),
            close: DebounceSlot::default(),
            generation: 0,
        }
    }

    /// Availability signal from the camera service. Other cameras are ignored.
    ///
    /// An unavailable camera is being opened by someone, so the motor should pop up.
    pub fn on_availability(
        &mut self,
        camera_id: &str,
        available: bool,
        at: Instant,
    ) -> Option<DebounceOutcome> {
        if camera_id != self.camera_id {
            return None;
        }
        let target = if available {
            CameraState::Closed
        } else {
            CameraState::Open
        };
        Some(self.on_signal(target, at))
    }

    fn on_signal(&mut self, target: CameraState, at: Instant) -> DebounceOutcome {
        let window = self.window;
        self.slot_mut(target).last_signal = Some(at);

        let opposite_target = target.opposite();
        let opposite = self.slot_mut(opposite_target);
        let bounced = opposite.pending.is_some()
            && opposite
                .last_signal
                .is_some_and(|last| at.saturating_duration_since(last) < window);
        if bounced {
            opposite.pending = None;
            debug!("Dropping pending {:?} intent as bounce", opposite_target);
        }

        if self.slot_mut(target).pending.is_some() {
            return DebounceOutcome::Coalesced;
        }

        self.generation += 1;
        let generation = self.generation;
        self.slot_mut(target).pending = Some(generation);
        DebounceOutcome::Scheduled {
            target,
            generation,
            delay: window,
            superseded: bounced,
        }
    }

    /// Timer for `target` fired; true if it is still the live intent.
    pub fn fire(&mut self, target: CameraState, generation: u64) -> bool {
        let slot = self.slot_mut(target);
        if slot.pending == Some(generation) {
            slot.pending = None;
            true
        } else {
            false
        }
    }

    pub fn pending(&self, target: CameraState) -> bool {
        match target {
            CameraState::Open => self.open.pending.is_some(),
            CameraState::Closed => self.close.pending.is_some(),
        }
    }

    fn slot_mut(&mut self, target: CameraState) -> &mut DebounceSlot {
        match target {
            CameraState::Open => &mut self.open,
            CameraState::Closed => &mut self.close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn scheduled(outcome: Option<DebounceOutcome>) -> (CameraState, u64) {
        match outcome {
            Some(DebounceOutcome::Scheduled {
                target, generation, ..
            }) => (target, generation),
            other => panic!("expected a scheduled intent, got {:?}", other),
        }
    }

    #[test]
    fn test_ignores_other_cameras() {
        let mut debouncer = Debouncer::new("1", ms(100));
        assert_eq!(debouncer.on_availability("0", false, Instant::now()), None);
        assert!(!debouncer.pending(CameraState::Open));
    }

    #[test]
    fn test_single_signal_schedules_intent() {
        let mut debouncer = Debouncer::new("1", ms(100));
        let (target, generation) = scheduled(debouncer.on_availability("1", false, Instant::now()));

        assert_eq!(target, CameraState::Open);
        assert!(debouncer.fire(CameraState::Open, generation));
        assert!(!debouncer.fire(CameraState::Open, generation));
    }

    #[test]
    fn test_bounce_replaces_pending_opposite() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new("1", ms(100));
        let (_, close_generation) = scheduled(debouncer.on_availability("1", true, start));

        match debouncer.on_availability("1", false, start + ms(30)) {
            Some(DebounceOutcome::Scheduled {
                target,
                generation,
                superseded,
                ..
            }) => {
                assert_eq!(target, CameraState::Open);
                assert!(superseded);
                assert!(!debouncer.fire(CameraState::Closed, close_generation));
                assert!(debouncer.fire(CameraState::Open, generation));
            }
            other => panic!("expected the open intent to replace the close, got {:?}", other),
        }
    }

    #[test]
    fn test_last_surviving_intent_wins() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new("1", ms(100));

        debouncer.on_availability("1", false, start);
        debouncer.on_availability("1", true, start + ms(20));
        let (target, generation) =
            scheduled(debouncer.on_availability("1", false, start + ms(40)));

        assert_eq!(target, CameraState::Open);
        assert!(!debouncer.pending(CameraState::Closed));
        assert!(debouncer.fire(CameraState::Open, generation));
    }

    #[test]
    fn test_repeated_signal_coalesces() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new("1", ms(100));

        scheduled(debouncer.on_availability("1", false, start));
        assert_eq!(
            debouncer.on_availability("1", false, start + ms(10)),
            Some(DebounceOutcome::Coalesced)
        );
    }

    #[test]
    fn test_stale_opposite_is_not_cancelled() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new("1", ms(100));

        let (_, close_generation) = scheduled(debouncer.on_availability("1", true, start));
        let (target, _) = scheduled(debouncer.on_availability("1", false, start + ms(150)));

        assert_eq!(target, CameraState::Open);
        assert!(debouncer.fire(CameraState::Closed, close_generation));
    }

    #[test]
    fn test_first_signal_is_not_superseding() {
        let mut debouncer = Debouncer::new("1", ms(100));
        assert!(matches!(
            debouncer.on_availability("1", true, Instant::now()),
            Some(DebounceOutcome::Scheduled {
                superseded: false,
                ..
            })
        ));
    }
}
