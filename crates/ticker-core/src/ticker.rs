//! Fixed-period ticker state

use std::time::Duration;
use tracing::debug;

/// Tick period. Not configurable.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Whether the 1-second clock is running.
///
/// The epoch changes on every (re)start so the scheduler can tell that its
/// timer must be recreated.
#[derive(Debug, Default)]
pub struct Ticker {
    running: bool,
    epoch: u64,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking. No-op when already running. Returns whether it started.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.epoch += 1;
        debug!(epoch = self.epoch, "Ticker started");
        true
    }

    /// Stop ticking. Safe when not running. Returns whether it was running.
    pub fn stop(&mut self) -> bool {
        let was_running = self.running;
        self.running = false;
        if was_running {
            debug!(epoch = self.epoch, "Ticker stopped");
        }
        was_running
    }

    /// Cancel and start again with a fresh epoch
    pub fn restart(&mut self) {
        self.stop();
        self.start();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_idempotent() {
        let mut ticker = Ticker::new();
        assert!(ticker.start());
        let epoch = ticker.epoch();

        assert!(!ticker.start());
        assert_eq!(ticker.epoch(), epoch);
        assert!(ticker.is_running());
    }

    #[test]
    fn stop_when_idle_is_safe() {
        let mut ticker = Ticker::new();
        assert!(!ticker.stop());
        assert!(!ticker.is_running());
    }

    #[test]
    fn restart_bumps_epoch() {
        let mut ticker = Ticker::new();
        ticker.start();
        let epoch = ticker.epoch();

        ticker.restart();
        assert!(ticker.is_running());
        assert_eq!(ticker.epoch(), epoch + 1);
    }
}
