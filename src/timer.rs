// src/timer.rs
//
// Cancellable repeating-pass handle.
//
// The host owns the real timer (a thread, a JS interval, an audio
// callback) and simply polls. This handle decides whether a poll is due
// and lets stop/retune cancel or restart the loop deterministically.

/// Repeating pass schedule driven by host polls.
#[derive(Debug, Clone)]
pub struct PassTimer {
    interval: f64,

    /// Device time the next pass becomes due; None when cancelled
    next_due: Option<f64>,
}

impl PassTimer {
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Arm the loop with the first pass due immediately.
    pub fn start(&mut self, now: f64) {
        self.next_due = Some(now);
    }

    /// Disarm the loop. No pass is due until the next `start`.
    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    /// Cancel and re-arm, so the next poll runs against the fresh anchor.
    pub fn restart(&mut self, now: f64) {
        self.cancel();
        self.start(now);
    }

    /// Whether a pass should run at `now`. If so, the following pass is
    /// scheduled one interval after `now`.
    ///
    /// Polls up to half an interval early count as due, so a host timer
    /// ticking at the same nominal rate never skips a pass.
    pub fn take_due(&mut self, now: f64) -> bool {
        match self.next_due {
            Some(due) if now >= due - self.interval * 0.5 => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    #[inline]
    pub fn interval(&self) -> f64 {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_due_until_started() {
        let mut timer = PassTimer::new(0.025);
        assert!(!timer.take_due(10.0));
        timer.start(10.0);
        assert!(timer.take_due(10.0));
    }

    #[test]
    fn test_reschedules_after_interval() {
        let mut timer = PassTimer::new(0.025);
        timer.start(0.0);
        assert!(timer.take_due(0.0));
        assert!(!timer.take_due(0.005));
        assert!(timer.take_due(0.024));
        assert!(timer.take_due(0.049));
    }

    #[test]
    fn test_cancel_stops_passes() {
        let mut timer = PassTimer::new(0.025);
        timer.start(0.0);
        assert!(timer.take_due(0.0));
        timer.cancel();
        assert!(!timer.is_armed());
        assert!(!timer.take_due(5.0));
    }

    #[test]
    fn test_restart_is_due_immediately() {
        let mut timer = PassTimer::new(0.025);
        timer.start(0.0);
        assert!(timer.take_due(0.0));
        timer.restart(0.01);
        assert!(timer.take_due(0.01));
    }
}
