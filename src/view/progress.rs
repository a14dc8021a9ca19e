//! Progress tick throttling
//!
//! Decides whether a progress sample is worth reporting and keeps reported
//! positions monotonic between seeks.

use std::time::{Duration, Instant};

/// Values reported by one `onVideoProgress`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub position: Duration,
    pub playable: Duration,
    pub seekable: Duration,
}

/// Tracks what was last reported for the current source
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    /// Minimum spacing between two reports
    min_interval: Duration,

    last_emit: Option<Instant>,

    /// Highest position reported since the last baseline reset
    last_position: Option<Duration>,
}

impl ProgressTracker {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: None,
            last_position: None,
        }
    }

    /// Turn engine readings into a sample, or `None` when nothing should be sent
    pub fn sample(
        &mut self,
        now: Instant,
        position: Duration,
        playable: Duration,
        duration: Option<Duration>,
        paused: bool,
    ) -> Option<ProgressSample> {
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.min_interval {
                return None;
            }
        }

        // Engines may report a slightly earlier position right after a
        // rebuffer; never let the host see time run backwards.
        let position = match self.last_position {
            Some(previous) if position < previous => previous,
            _ => position,
        };

        if paused && self.last_position == Some(position) {
            return None;
        }

        self.last_emit = Some(now);
        self.last_position = Some(position);

        Some(ProgressSample {
            position,
            playable: playable.max(position),
            seekable: duration.unwrap_or(playable),
        })
    }

    /// Forget the reported position, after a seek or a source change
    pub fn reset_baseline(&mut self) {
        self.last_position = None;
        self.last_emit = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TICK: Duration = Duration::from_millis(250);

    #[test]
    fn test_interval_is_enforced() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(TICK);

        assert!(tracker.sample(start, Duration::from_secs(1), Duration::from_secs(2), None, false).is_some());
        assert!(tracker
            .sample(start + Duration::from_millis(100), Duration::from_secs(2), Duration::from_secs(2), None, false)
            .is_none());
        assert!(tracker
            .sample(start + TICK, Duration::from_secs(2), Duration::from_secs(2), None, false)
            .is_some());
    }

    #[test]
    fn test_paused_without_change_is_suppressed() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(TICK);
        let pos = Duration::from_secs(5);

        assert!(tracker.sample(start, pos, pos, None, true).is_some());
        assert!(tracker.sample(start + TICK, pos, pos, None, true).is_none());
        // Still reported while playing, even if the engine is stuck
        assert!(tracker.sample(start + TICK * 2, pos, pos, None, false).is_some());
    }

    #[test]
    fn test_seek_resets_baseline() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(TICK);

        tracker.sample(start, Duration::from_secs(20), Duration::from_secs(20), None, false);
        let clamped = tracker
            .sample(start + TICK, Duration::from_secs(3), Duration::from_secs(3), None, false)
            .unwrap();
        assert_eq!(clamped.position, Duration::from_secs(20));

        tracker.reset_baseline();
        let after_seek = tracker
            .sample(start + TICK * 2, Duration::from_secs(3), Duration::from_secs(3), None, false)
            .unwrap();
        assert_eq!(after_seek.position, Duration::from_secs(3));
    }

    #[test]
    fn test_seekable_falls_back_to_playable() {
        let mut tracker = ProgressTracker::new(TICK);
        let sample = tracker
            .sample(Instant::now(), Duration::from_secs(4), Duration::from_secs(9), None, false)
            .unwrap();
        assert_eq!(sample.seekable, Duration::from_secs(9));
        assert_eq!(sample.playable, Duration::from_secs(9));
    }

    proptest! {
        #[test]
        fn prop_reported_positions_never_decrease(readings in proptest::collection::vec(0u64..60_000, 1..64)) {
            let start = Instant::now();
            let mut tracker = ProgressTracker::new(TICK);
            let mut reported = Vec::new();

            for (i, ms) in readings.iter().enumerate() {
                let now = start + TICK * i as u32;
                let pos = Duration::from_millis(*ms);
                if let Some(sample) = tracker.sample(now, pos, pos, None, false) {
                    reported.push(sample.position);
                }
            }

            prop_assert_eq!(reported.len(), readings.len());
            prop_assert!(reported.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
