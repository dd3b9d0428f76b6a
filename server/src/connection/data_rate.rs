use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Bytes per second, averaged over one-second windows and smoothed between
/// windows
pub(crate) struct DataRate {
    window_start: Instant,
    window_bytes: u64,
    bytes_per_second: f32,
}

impl DataRate {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            window_bytes: 0,
            bytes_per_second: 0.0,
        }
    }

    pub fn record(&mut self, bytes: u64) {
        self.window_bytes += bytes;
        let elapsed = self.window_start.elapsed();
        if elapsed < WINDOW {
            return;
        }
        let sample = self.window_bytes as f32 / elapsed.as_secs_f32();
        self.bytes_per_second = if self.bytes_per_second == 0.0 {
            sample
        } else {
            self.bytes_per_second * 0.5 + sample * 0.5
        };
        self.window_bytes = 0;
        self.window_start = Instant::now();
    }

    pub fn bytes_per_second(&self) -> f32 {
        self.bytes_per_second
    }
}
