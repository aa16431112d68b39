//! Elapsed-time accumulator for the execution surface.
//!
//! Tick-driven rather than wall-clock: the session delivers ticks at a fixed
//! granularity while the gate condition holds, so the displayed value freezes
//! the instant the gate drops and survives the ticks that are already queued.

use std::time::Duration;

/// Accumulates elapsed time while running. Stopping freezes the value;
/// only [`Stopwatch::reset`] returns it to zero.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    elapsed: Duration,
    running: bool,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Freeze at the current value.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    /// Advance by one tick if running; ignored while stopped.
    pub fn tick(&mut self, granularity: Duration) {
        if self.running {
            self.elapsed += granularity;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    #[test]
    fn test_accumulates_while_running() {
        let mut watch = Stopwatch::new();
        watch.start();
        watch.tick(TICK);
        watch.tick(TICK);
        assert_eq!(watch.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn test_stop_freezes_against_late_ticks() {
        let mut watch = Stopwatch::new();
        watch.start();
        watch.tick(TICK);
        watch.stop();
        // Ticks already scheduled may still arrive after the stop.
        watch.tick(TICK);
        watch.tick(TICK);
        assert_eq!(watch.elapsed(), Duration::from_millis(100));
    }

    #[test]
    fn test_stop_does_not_reset() {
        let mut watch = Stopwatch::new();
        watch.start();
        watch.tick(TICK);
        watch.stop();
        assert_eq!(watch.elapsed(), Duration::from_millis(100));

        watch.reset();
        assert_eq!(watch.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_restart_continues_from_frozen_value() {
        let mut watch = Stopwatch::new();
        watch.start();
        watch.tick(TICK);
        watch.stop();
        watch.start();
        watch.tick(TICK);
        assert_eq!(watch.elapsed(), Duration::from_millis(200));
    }
}
