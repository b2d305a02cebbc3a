//! Poll-driven timers.
//!
//! Nothing here owns a thread. The owner calls `poll(now)` from its own
//! `poll` and acts when it returns `true`, so each timer keeps running only
//! while it stays armed and cancelling one never touches another.

/// Repeating timer.
#[derive(Debug, Clone)]
pub struct Interval {
    period_ms: u64,
    next_due_ms: Option<u64>,
}

impl Interval {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms: period_ms.max(1),
            next_due_ms: None,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// (Re)arm; the first firing is one full period after `now_ms`.
    pub fn arm(&mut self, now_ms: u64) {
        self.next_due_ms = Some(now_ms.saturating_add(self.period_ms));
    }

    pub fn cancel(&mut self) {
        self.next_due_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due_ms.is_some()
    }

    /// Fires at most once per call. Periods missed between polls are
    /// skipped, not replayed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.next_due_ms {
            Some(due) if now_ms >= due => {
                let missed = (now_ms - due) / self.period_ms;
                self.next_due_ms = Some(due + (missed + 1) * self.period_ms);
                true
            }
            _ => false,
        }
    }
}

/// One-shot timer.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    due_ms: Option<u64>,
}

impl Deadline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now_ms: u64, after_ms: u64) {
        self.due_ms = Some(now_ms.saturating_add(after_ms));
    }

    pub fn cancel(&mut self) {
        self.due_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.due_ms.is_some()
    }

    /// Returns `true` exactly once, on the first poll at or after the due time.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.due_ms {
            Some(due) if now_ms >= due => {
                self.due_ms = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_fires_once_per_period() {
        let mut tick = Interval::new(1_000);
        tick.arm(0);
        assert!(!tick.poll(999));
        assert!(tick.poll(1_000));
        assert!(!tick.poll(1_500));
        assert!(tick.poll(2_000));
    }

    #[test]
    fn interval_skips_missed_periods() {
        let mut tick = Interval::new(500);
        tick.arm(0);
        assert!(tick.poll(2_250));
        assert!(!tick.poll(2_400));
        assert!(tick.poll(2_500));
    }

    #[test]
    fn cancelled_interval_never_fires() {
        let mut tick = Interval::new(100);
        tick.arm(0);
        tick.cancel();
        assert!(!tick.is_armed());
        assert!(!tick.poll(10_000));
    }

    #[test]
    fn independent_intervals_do_not_interfere() {
        let mut session_tick = Interval::new(1_000);
        let mut tempo_tick = Interval::new(500);
        session_tick.arm(0);
        tempo_tick.arm(0);
        tempo_tick.cancel();
        assert!(session_tick.poll(1_000));
        assert!(!tempo_tick.poll(1_000));
    }

    #[test]
    fn deadline_fires_exactly_once() {
        let mut grace = Deadline::new();
        grace.arm(100, 2_000);
        assert!(!grace.poll(2_099));
        assert!(grace.poll(2_100));
        assert!(!grace.poll(5_000));
        assert!(!grace.is_armed());
    }
}
