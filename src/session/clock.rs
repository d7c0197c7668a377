//! Time source and recovery timer
//!
//! Sessions read time through `Clock` so tests can drive the NotFound
//! recovery delay with `ManualClock` instead of sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonic time source, measured from an arbitrary origin
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

/// Identifier of one scheduled recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Single-slot timer: scheduling replaces whatever was pending
#[derive(Debug, Default)]
pub struct RecoveryTimer {
    pending: Option<(TimerId, Duration)>,
}

impl RecoveryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to fire `delay` after `now`
    pub fn schedule(&mut self, id: TimerId, now: Duration, delay: Duration) {
        if let Some((previous, _)) = self.pending {
            log::debug!("Recovery timer {:?} superseded by {:?}", previous, id);
        }
        self.pending = Some((id, now + delay));
    }

    /// Disarm. No-op if nothing is pending.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Take the pending timer if its deadline has passed
    pub fn take_due(&mut self, now: Duration) -> Option<TimerId> {
        match self.pending {
            Some((id, deadline)) if now >= deadline => {
                self.pending = None;
                Some(id)
            }
            _ => None,
        }
    }

    /// Time left until the pending timer fires
    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        self.pending
            .map(|(_, deadline)| deadline.saturating_sub(now))
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(Duration::from_millis(1500));
        assert_eq!(other.now(), Duration::from_millis(1500));
    }

    #[test]
    fn test_timer_fires_once_after_deadline() {
        let mut timer = RecoveryTimer::new();
        timer.schedule(TimerId(1), Duration::ZERO, Duration::from_millis(2000));

        assert_eq!(timer.take_due(Duration::from_millis(1999)), None);
        assert_eq!(
            timer.remaining(Duration::from_millis(500)),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(timer.take_due(Duration::from_millis(2000)), Some(TimerId(1)));
        assert_eq!(timer.take_due(Duration::from_millis(5000)), None);
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_schedule_replaces_pending() {
        let mut timer = RecoveryTimer::new();
        timer.schedule(TimerId(1), Duration::ZERO, Duration::from_millis(2000));
        timer.schedule(TimerId(2), Duration::from_millis(1000), Duration::from_millis(2000));

        assert_eq!(timer.take_due(Duration::from_millis(2500)), None);
        assert_eq!(timer.take_due(Duration::from_millis(3000)), Some(TimerId(2)));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut timer = RecoveryTimer::new();
        timer.cancel();
        timer.schedule(TimerId(1), Duration::ZERO, Duration::from_millis(10));
        timer.cancel();
        timer.cancel();
        assert_eq!(timer.take_due(Duration::from_secs(1)), None);
    }
}
