use std::time::{Duration, Instant};

/// A Timer with a given duration after which it will enter into a "Ringing"
/// state. The Timer can be reset at an given time, or manually set to start
/// "Ringing" again.
#[derive(Debug, Clone)]
pub struct Timer {
    duration: Duration,
    last: Instant,
}

impl Timer {
    /// Creates a new Timer with a given Duration
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            last: Instant::now(),
        }
    }

    /// Creates a Timer that is already ringing
    pub fn new_ringing(duration: Duration) -> Self {
        let mut timer = Self::new(duration);
        timer.ring_manual();
        timer
    }

    /// Reset the Timer to stop ringing and wait till 'Duration' has elapsed
    /// again
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    /// Gets whether or not the Timer is "Ringing" (i.e. the given Duration
    /// has elapsed since the last "reset")
    pub fn ringing(&self) -> bool {
        Instant::now().saturating_duration_since(self.last) >= self.duration
    }

    /// Manually causes the Timer to enter into a "Ringing" state
    pub fn ring_manual(&mut self) {
        match Instant::now().checked_sub(self.duration + Duration::from_millis(1)) {
            Some(past) => self.last = past,
            None => self.duration = Duration::ZERO,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.last.elapsed()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }
}
