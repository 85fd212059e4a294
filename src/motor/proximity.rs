use tracing::debug;

/// Action held back while the camera window is covered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingIntent {
    OpenWhenClear,
}

/// Tracks obstruction state and at most one deferred popup
#[derive(Debug, Default)]
pub struct ProximityGate {
    near: bool,
    pending: Option<PendingIntent>,
}

impl ProximityGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the obstruction state without replaying anything
    pub fn init(&mut self, near: bool) {
        debug!("Proximity sensor init: near={}", near);
        self.near = near;
    }

    pub fn is_near(&self) -> bool {
        self.near
    }

    /// Remember that a popup should run once the obstruction clears
    pub fn defer_open(&mut self) {
        self.pending = Some(PendingIntent::OpenWhenClear);
    }

    pub fn pending(&self) -> Option<PendingIntent> {
        self.pending
    }

    /// Apply a new reading; returns the intent to replay when the path just cleared.
    pub fn update(&mut self, near: bool) -> Option<PendingIntent> {
        self.near = near;
        debug!("Proximity sensor: near={}", near);
        if near {
            return None;
        }
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_open_replays_once_when_clear() {
        let mut gate = ProximityGate::new();
        gate.init(true);
        gate.defer_open();
        gate.defer_open();

        assert_eq!(gate.update(true), None);
        assert_eq!(gate.update(false), Some(PendingIntent::OpenWhenClear));
        assert_eq!(gate.update(false), None);
        assert_eq!(gate.pending(), None);
    }

    #[test]
    fn test_clear_without_pending_does_nothing() {
        let mut gate = ProximityGate::new();
        assert!(!gate.is_near());
        assert_eq!(gate.update(true), None);
        assert!(gate.is_near());
        assert_eq!(gate.update(false), None);
    }

    #[test]
    fn test_init_does_not_replay() {
        let mut gate = ProximityGate::new();
        gate.update(true);
        gate.defer_open();
        gate.init(false);
        assert!(!gate.is_near());
        assert_eq!(gate.pending(), Some(PendingIntent::OpenWhenClear));
    }
}
