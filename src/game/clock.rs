//! Match countdown clock

/// Countdown timer for one half. Overtime (negative remaining) is a valid state.
#[derive(Debug, Clone)]
pub struct Clock {
    duration: f64,
    remaining: f64,
    running: bool,
}

impl Clock {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration: duration_secs,
            remaining: duration_secs,
            running: false,
        }
    }

    /// Rewind to the full half duration (does not change running state)
    pub fn reset(&mut self) {
        self.remaining = self.duration;
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Advance by `delta_secs` of wall time. No-op while halted.
    pub fn tick(&mut self, delta_secs: f64) {
        if self.running && delta_secs > 0.0 {
            self.remaining -= delta_secs;
        }
    }

    /// Whole seconds shown on the scoreboard
    pub fn seconds(&self) -> i64 {
        self.remaining.ceil() as i64
    }

    pub fn is_overtime(&self) -> bool {
        self.remaining < 0.0
    }
}
