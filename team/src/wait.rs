//! Wait strategies used by the driver loop between polls of a pending step.
//!
//! The protocol only requires that the driver does not busy-spin; how long it
//! waits is a pluggable policy. [`Signal`] lets agents wake a waiting driver
//! as soon as they publish an outcome.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Policy for suspending the coordinator between polls.
pub trait WaitStrategy {
    /// Suspend before poll number `poll + 1` of the current step (`poll` starts at 1).
    fn wait(&mut self, poll: u32);

    /// Called when the driver moves to a new step.
    fn reset(&mut self) {}
}

/// Sleep the same interval before every re-poll.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    interval: Duration,
}

impl FixedDelay {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl WaitStrategy for FixedDelay {
    fn wait(&mut self, _poll: u32) {
        thread::sleep(self.interval);
    }
}

/// Double the delay after every poll, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// Delay used after poll number `poll`.
    pub fn delay(&self, poll: u32) -> Duration {
        let exponent = poll.saturating_sub(1).min(16);
        self.initial
            .saturating_mul(1u32 << exponent)
            .min(self.max)
    }
}

impl WaitStrategy for ExponentialBackoff {
    fn wait(&mut self, poll: u32) {
        thread::sleep(self.delay(poll));
    }
}

/// Generation counter that agents bump after publishing an outcome.
#[derive(Debug, Default)]
pub struct Signal {
    generation: Mutex<u64>,
    changed: Condvar,
}

impl Signal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn generation(&self) -> u64 {
        *self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn notify(&self) {
        let mut generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *generation = generation.wrapping_add(1);
        self.changed.notify_all();
    }

    /// Block until the generation differs from `seen` or `timeout` elapses.
    ///
    /// Returns the generation observed on wake-up.
    pub fn wait_for_change(&self, seen: u64, timeout: Duration) -> u64 {
        let guard = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |generation| *generation == seen)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Wait until an agent publishes, or at most `max_wait`.
#[derive(Debug, Clone)]
pub struct SignalWait {
    signal: Arc<Signal>,
    max_wait: Duration,
    seen: u64,
}

impl SignalWait {
    pub fn new(signal: Arc<Signal>, max_wait: Duration) -> Self {
        let seen = signal.generation();
        Self {
            signal,
            max_wait,
            seen,
        }
    }
}

impl WaitStrategy for SignalWait {
    fn wait(&mut self, _poll: u32) {
        self.seen = self.signal.wait_for_change(self.seen, self.max_wait);
    }

    fn reset(&mut self) {
        self.seen = self.signal.generation();
    }
}

/// Serialized choice of wait strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitKind {
    Fixed,
    Backoff,
    Signal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub kind: WaitKind,
    /// Fixed delay, or the first backoff delay, in milliseconds.
    pub interval_ms: u64,
    /// Backoff cap, or the longest a signal wait may block, in milliseconds.
    pub max_interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            kind: WaitKind::Fixed,
            interval_ms: 1000,
            max_interval_ms: 8000,
        }
    }
}

impl WaitConfig {
    /// Build the configured strategy; `signal` is the team's wake-up signal.
    pub fn build(&self, signal: &Arc<Signal>) -> Box<dyn WaitStrategy> {
        let interval = Duration::from_millis(self.interval_ms);
        let max = Duration::from_millis(self.max_interval_ms);
        match self.kind {
            WaitKind::Fixed => Box::new(FixedDelay::new(interval)),
            WaitKind::Backoff => Box::new(ExponentialBackoff::new(interval, max)),
            WaitKind::Signal => Box::new(SignalWait::new(Arc::clone(signal), max)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn backoff_doubles_until_cap() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(50));
        assert_eq!(backoff.delay(1), Duration::from_millis(10));
        assert_eq!(backoff.delay(2), Duration::from_millis(20));
        assert_eq!(backoff.delay(3), Duration::from_millis(40));
        assert_eq!(backoff.delay(4), Duration::from_millis(50));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(50));
    }

    #[test]
    fn signal_wait_returns_early_on_notify() {
        let signal = Signal::new();
        let notifier = Arc::clone(&signal);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            notifier.notify();
        });

        let started = Instant::now();
        let generation = signal.wait_for_change(0, Duration::from_secs(10));
        handle.join().expect("join notifier");

        assert_eq!(generation, 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn signal_wait_times_out_without_notify() {
        let signal = Signal::new();
        let generation = signal.wait_for_change(0, Duration::from_millis(10));
        assert_eq!(generation, 0);
    }

    #[test]
    fn wait_config_parses_kind() {
        let cfg: WaitConfig = toml::from_str("kind = \"backoff\"\ninterval_ms = 5").expect("parse");
        assert_eq!(cfg.kind, WaitKind::Backoff);
        assert_eq!(cfg.interval_ms, 5);
        assert_eq!(cfg.max_interval_ms, WaitConfig::default().max_interval_ms);
    }
}
