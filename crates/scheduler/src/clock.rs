use core::time::Duration;
use std::time::Instant;

/// Frame budget gate: decides whether enough time has passed to start a new frame.
///
/// Ticks arriving within the budget window are refused and counted as deferred,
/// so a host polling faster than its frame rate still runs at most one frame per window.
#[derive(Debug, Clone)]
pub struct FrameClock {
    /// The minimum time interval between frames.
    budget: Duration,
    /// Timestamp of the most recent frame start that was allowed.
    last_frame_start: Option<Instant>,
    /// Number of ticks refused because the budget window had not expired.
    deferred_count: u64,
}

impl FrameClock {
    /// Creates a new frame clock with the specified time budget.
    #[inline]
    #[must_use]
    pub const fn new(budget: Duration) -> Self {
        Self {
            budget,
            last_frame_start: None,
            deferred_count: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Checks if a new frame budget window has started at the current instant.
    #[inline]
    #[must_use]
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Checks if a new frame budget window has started at `now`.
    ///
    /// Returns `true` and opens a new window if the previous one expired; returns
    /// `false` otherwise.
    #[must_use]
    pub fn allow_at(&mut self, now: Instant) -> bool {
        match self.last_frame_start {
            Some(start) if now.saturating_duration_since(start) < self.budget => false,
            Some(_) | None => {
                self.last_frame_start = Some(now);
                true
            }
        }
    }

    #[inline]
    pub const fn incr_deferred(&mut self) {
        self.deferred_count = self.deferred_count.saturating_add(1);
    }

    /// Returns the total number of deferred ticks since creation.
    #[inline]
    #[must_use]
    pub const fn deferred(&self) -> u64 {
        self.deferred_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_always_allowed() {
        let mut clock = FrameClock::new(Duration::from_millis(16));
        assert!(clock.allow_at(Instant::now()));
    }

    #[test]
    fn ticks_inside_the_window_are_refused() {
        let mut clock = FrameClock::new(Duration::from_millis(16));
        let start = Instant::now();
        assert!(clock.allow_at(start));
        assert!(!clock.allow_at(start + Duration::from_millis(5)));
        assert!(clock.allow_at(start + Duration::from_millis(16)));
        assert!(!clock.allow_at(start + Duration::from_millis(20)));
    }

    #[test]
    fn deferred_count_saturates_upwards() {
        let mut clock = FrameClock::new(Duration::from_millis(1));
        clock.incr_deferred();
        clock.incr_deferred();
        assert_eq!(clock.deferred(), 2);
    }
}
