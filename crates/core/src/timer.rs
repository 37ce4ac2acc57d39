use std::time::Instant;

/// Monotonic elapsed-time tracker for a quiz session.
///
/// Elapsed seconds are recomputed from the start instant on every read.
/// After `stop`, reads return the value captured at stop time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    started_at: Instant,
    frozen_secs: Option<u64>,
}

impl Timer {
    #[must_use]
    pub fn start() -> Self {
        Self::start_at(Instant::now())
    }

    #[must_use]
    pub fn start_at(started_at: Instant) -> Self {
        Self {
            started_at,
            frozen_secs: None,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.frozen_secs.is_none()
    }

    /// Whole seconds since start, or the frozen value once stopped.
    #[must_use]
    pub fn elapsed(&self) -> u64 {
        self.elapsed_at(Instant::now())
    }

    #[must_use]
    pub fn elapsed_at(&self, now: Instant) -> u64 {
        match self.frozen_secs {
            Some(secs) => secs,
            None => now.saturating_duration_since(self.started_at).as_secs(),
        }
    }

    /// Freeze the elapsed value. Stopping twice keeps the first value.
    pub fn stop(&mut self) -> u64 {
        self.stop_at(Instant::now())
    }

    pub fn stop_at(&mut self, now: Instant) -> u64 {
        let secs = self.elapsed_at(now);
        self.frozen_secs = Some(secs);
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn elapsed_is_non_decreasing() {
        let timer = Timer::start();
        let first = timer.elapsed();
        let second = timer.elapsed();
        assert!(second >= first);
    }

    #[test]
    fn elapsed_counts_whole_seconds() {
        let start = Instant::now();
        let timer = Timer::start_at(start);
        assert_eq!(timer.elapsed_at(start + Duration::from_millis(2_900)), 2);
        assert_eq!(timer.elapsed_at(start + Duration::from_secs(61)), 61);
    }

    #[test]
    fn stop_freezes_elapsed() {
        let start = Instant::now();
        let mut timer = Timer::start_at(start);

        assert_eq!(timer.stop_at(start + Duration::from_secs(42)), 42);
        assert!(!timer.is_running());
        assert_eq!(timer.elapsed_at(start + Duration::from_secs(100)), 42);
        assert_eq!(timer.elapsed(), 42);
        assert_eq!(timer.elapsed(), 42);

        // A second stop does not move the frozen value.
        assert_eq!(timer.stop_at(start + Duration::from_secs(90)), 42);
    }
}
