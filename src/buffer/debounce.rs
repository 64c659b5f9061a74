use std::time::Duration;
use tokio::time::Instant;

/// Debounce timer with a maximum wait.
///
/// Every call pushes the deadline out to `last call + wait`, but never past
/// `first pending call + max_wait`, so a continuous stream of calls still
/// fires regularly.
#[derive(Debug, Clone)]
pub struct Debounce {
    wait: Duration,
    max_wait: Duration,
    first_pending: Option<Instant>,
    last_call: Option<Instant>,
}

impl Debounce {
    pub fn new(wait: Duration, max_wait: Duration) -> Self {
        Self {
            wait,
            max_wait: max_wait.max(wait),
            first_pending: None,
            last_call: None,
        }
    }

    /// Record a call at `now`, arming the timer if it wasn't already
    pub fn schedule(&mut self, now: Instant) {
        if self.first_pending.is_none() {
            self.first_pending = Some(now);
        }
        self.last_call = Some(now);
    }

    /// When the pending call should fire, if any.
    ///
    /// A bound that overflows the clock is treated as absent.
    pub fn deadline(&self) -> Option<Instant> {
        let first = self.first_pending?;
        let last = self.last_call?;
        match (last.checked_add(self.wait), first.checked_add(self.max_wait)) {
            (Some(quiet), Some(cap)) => Some(quiet.min(cap)),
            (quiet, cap) => quiet.or(cap),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.first_pending.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Disarm without firing
    pub fn cancel(&mut self) {
        self.first_pending = None;
        self.last_call = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_idle_debounce_has_no_deadline() {
        let debounce = Debounce::new(ms(250), ms(1000));
        assert!(debounce.deadline().is_none());
        assert!(!debounce.is_due(Instant::now()));
    }

    #[test]
    fn test_deadline_follows_last_call() {
        let start = Instant::now();
        let mut debounce = Debounce::new(ms(250), ms(1000));

        debounce.schedule(start);
        assert_eq!(debounce.deadline(), Some(start + ms(250)));

        debounce.schedule(start + ms(100));
        assert_eq!(debounce.deadline(), Some(start + ms(350)));
        assert!(!debounce.is_due(start + ms(300)));
        assert!(debounce.is_due(start + ms(350)));
    }

    #[test]
    fn test_max_wait_caps_continuous_calls() {
        let start = Instant::now();
        let mut debounce = Debounce::new(ms(250), ms(1000));

        // a call every 200ms never leaves a 250ms quiet gap
        for i in 0..6 {
            debounce.schedule(start + ms(i * 200));
        }

        assert_eq!(debounce.deadline(), Some(start + ms(1000)));
        assert!(debounce.is_due(start + ms(1000)));
    }

    #[test]
    fn test_unrepresentable_bounds_do_not_panic() {
        let start = Instant::now();

        let mut debounce = Debounce::new(ms(250), Duration::MAX);
        debounce.schedule(start);
        assert_eq!(debounce.deadline(), Some(start + ms(250)));

        let mut debounce = Debounce::new(Duration::MAX, Duration::MAX);
        debounce.schedule(start);
        assert!(debounce.is_pending());
        assert!(debounce.deadline().is_none());
        assert!(!debounce.is_due(start + ms(5000)));
    }

    #[test]
    fn test_cancel_disarms() {
        let start = Instant::now();
        let mut debounce = Debounce::new(ms(250), ms(1000));

        debounce.schedule(start);
        debounce.cancel();

        assert!(!debounce.is_pending());
        assert!(!debounce.is_due(start + ms(5000)));

        // the max-wait window restarts with the next call
        debounce.schedule(start + ms(2000));
        assert_eq!(debounce.deadline(), Some(start + ms(2250)));
    }
}
