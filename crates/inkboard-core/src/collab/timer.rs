//! Timers driven by an explicit clock. `now` is milliseconds on any
//! monotonic scale the caller picks.

/// Fires once, `delay_ms` after the last schedule.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    delay_ms: u64,
    deadline: Option<u64>,
}

impl DebounceTimer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            deadline: None,
        }
    }

    /// (Re)arm the timer. Supersedes any pending deadline.
    pub fn schedule(&mut self, now: u64) {
        self.deadline = Some(now.saturating_add(self.delay_ms));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns `true` once when the deadline has passed.
    pub fn fire(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Fires every `period_ms`. The first call to [`IntervalTimer::fire`] starts
/// the clock.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period_ms: u64,
    next: Option<u64>,
}

impl IntervalTimer {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            next: None,
        }
    }

    /// Restart the period from `now`.
    pub fn reset(&mut self, now: u64) {
        self.next = Some(now.saturating_add(self.period_ms));
    }

    pub fn fire(&mut self, now: u64) -> bool {
        match self.next {
            None => {
                self.reset(now);
                false
            }
            Some(next) if now >= next => {
                self.reset(now);
                true
            }
            Some(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_fires_once() {
        let mut timer = DebounceTimer::new(100);
        assert!(!timer.fire(0));
        timer.schedule(0);
        assert!(!timer.fire(99));
        assert!(timer.fire(100));
        assert!(!timer.fire(200));
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_debounce_reschedule_supersedes() {
        let mut timer = DebounceTimer::new(100);
        timer.schedule(0);
        timer.schedule(80);
        assert!(!timer.fire(120));
        assert!(timer.fire(180));
    }

    #[test]
    fn test_debounce_cancel() {
        let mut timer = DebounceTimer::new(10);
        timer.schedule(0);
        timer.cancel();
        assert!(!timer.fire(50));
    }

    #[test]
    fn test_interval() {
        let mut timer = IntervalTimer::new(1000);
        assert!(!timer.fire(500));
        assert!(!timer.fire(1400));
        assert!(timer.fire(1500));
        assert!(!timer.fire(2000));
        assert!(timer.fire(2600));
    }
}
