use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Bounded history of recent actuations used to spot abusive triggering
pub struct FrequencyThrottle {
    history: VecDeque<Instant>,
    capacity: usize,
    window: Duration,
}

impl FrequencyThrottle {
    /// Create a throttle remembering `capacity` actuations
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            window,
        }
    }

    /// Record an actuation; returns true when the full history fits inside the window.
    pub fn record(&mut self, timestamp: Instant) -> bool {
        self.history.push_back(timestamp);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        let too_frequent = self.is_full() && self.span() < self.window;
        if too_frequent {
            debug!(
                "{} actuations within {:?} (limit {:?})",
                self.history.len(),
                self.span(),
                self.window
            );
        }
        too_frequent
    }

    pub fn is_full(&self) -> bool {
        self.history.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Time between the oldest and newest remembered actuation
    pub fn span(&self) -> Duration {
        match (self.history.front(), self.history.back()) {
            (Some(oldest), Some(newest)) => newest.duration_since(*oldest),
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_trips_once_history_is_full() {
        let start = Instant::now();
        let mut throttle = FrequencyThrottle::new(10, Duration::from_secs(20));

        let trips: Vec<bool> = (0..10)
            .map(|i| throttle.record(start + Duration::from_secs(i)))
            .collect();

        assert_eq!(trips.iter().filter(|t| **t).count(), 1);
        assert!(trips[9]);
        assert_eq!(throttle.span(), Duration::from_secs(9));
    }

    #[test]
    fn test_spaced_actuations_never_trip() {
        let start = Instant::now();
        let mut throttle = FrequencyThrottle::new(10, Duration::from_secs(20));

        for i in 0..30 {
            assert!(!throttle.record(start + Duration::from_secs(i * 20)));
        }
        assert_eq!(throttle.len(), 10);
    }

    #[test]
    fn test_oldest_entries_are_evicted() {
        let start = Instant::now();
        let mut throttle = FrequencyThrottle::new(3, Duration::from_secs(20));

        throttle.record(start);
        throttle.record(start + Duration::from_secs(30));
        throttle.record(start + Duration::from_secs(31));
        assert_eq!(throttle.span(), Duration::from_secs(31));

        // the first entry falls out and the remaining three are close together
        assert!(throttle.record(start + Duration::from_secs(32)));
        assert_eq!(throttle.span(), Duration::from_secs(2));
        assert_eq!(throttle.len(), 3);
    }
}
