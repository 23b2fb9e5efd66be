//! An injectable clock and the debounce discipline for recovery-snapshot
//! capture (spec §4.6). Generalized from the teacher's practice of
//! injecting `web_sys::Performance` into `network.rs` to make timing
//! assertions (flap detection) testable without real sleeps.

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Collapses a burst of capture triggers into at most one snapshot per
/// `interval_ms`. If the last snapshot is older than the interval, the
/// next trigger fires immediately; otherwise it marks a pending capture
/// for the caller's timer to flush.
pub struct Debouncer {
    interval_ms: i64,
    last_fired_at: Option<i64>,
    pending: bool,
}

impl Debouncer {
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms,
            last_fired_at: None,
            pending: false,
        }
    }

    /// Whether the caller should capture right now in response to a
    /// trigger event.
    pub fn on_trigger(&mut self, now_ms: i64) -> bool {
        match self.last_fired_at {
            None => true,
            Some(last) if now_ms - last >= self.interval_ms => true,
            _ => {
                self.pending = true;
                false
            }
        }
    }

    pub fn mark_fired(&mut self, now_ms: i64) {
        self.last_fired_at = Some(now_ms);
        self.pending = false;
    }

    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Whether a collapsed timer started at the last fire should now
    /// flush the pending capture.
    pub fn should_flush(&self, now_ms: i64) -> bool {
        self.pending
            && self
                .last_fired_at
                .is_none_or(|last| now_ms - last >= self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_trigger_fires_immediately() {
        let mut debouncer = Debouncer::new(3_000);
        assert!(debouncer.on_trigger(0));
        debouncer.mark_fired(0);
    }

    #[test]
    fn burst_within_interval_collapses_to_pending() {
        let mut debouncer = Debouncer::new(3_000);
        assert!(debouncer.on_trigger(0));
        debouncer.mark_fired(0);

        assert!(!debouncer.on_trigger(500));
        assert!(!debouncer.on_trigger(1_000));
        assert!(debouncer.has_pending());
        assert!(!debouncer.should_flush(1_500));
        assert!(debouncer.should_flush(3_000));
    }

    #[test]
    fn trigger_after_interval_fires_immediately_again() {
        let mut debouncer = Debouncer::new(3_000);
        debouncer.mark_fired(0);
        assert!(debouncer.on_trigger(3_500));
    }
}
