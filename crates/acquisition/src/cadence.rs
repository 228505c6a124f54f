//! Spin-wait cadence enforcement

use std::time::Instant;

/// Busy-wait until `deadline` on the monotonic clock.
///
/// Returns immediately if the deadline has already passed. A step that ran
/// long slips its own cycle only; the next deadline is measured from that
/// step's start, so slip never accumulates.
#[inline]
pub fn spin_until(deadline: Instant) {
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_each_step_meets_the_interval() {
        let interval = Duration::from_micros(200);

        for _ in 0..1000 {
            let start = Instant::now();
            spin_until(start + interval);
            assert!(start.elapsed() >= interval);
        }
    }

    #[test]
    fn test_past_deadline_returns_immediately() {
        let start = Instant::now();
        spin_until(start);
        // No lower bound to check; just must not hang.
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
