//! Periodic engine statistics and per-block warnings.
//!
//! The audio task cannot log freely inside its deadline, so it only decides
//! *when* something is worth reporting. [`StatsThrottle`] picks roughly one
//! block per second for the full statistics; [`StatsDelta`] turns running
//! totals into "what changed since last time" for warnings.

use dae::{EngineConfig, EngineStats};

/// Fires once every `interval` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsThrottle {
    interval: u32,
    countdown: u32,
}

impl StatsThrottle {
    /// Fire every `interval` blocks (at least 1).
    pub const fn every(interval: u32) -> Self {
        let interval = if interval == 0 { 1 } else { interval };
        Self {
            interval,
            countdown: interval,
        }
    }

    /// About one report per second for `config` at `block_size` frames.
    pub fn per_second(config: &EngineConfig, block_size: usize) -> Self {
        let block = u32::try_from(block_size).unwrap_or(u32::MAX);
        Self::every(config.sample_rate.get().checked_div(block).unwrap_or(1))
    }

    /// Blocks between reports.
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Count one block. Returns `true` on the block that should report.
    pub fn tick(&mut self) -> bool {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.countdown = self.interval;
            true
        } else {
            false
        }
    }
}

/// Change in the warning-worthy counters between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "hardware", derive(defmt::Format))]
pub struct StatsDelta {
    /// New overrun blocks.
    pub overruns: u32,
    /// New bytes dropped by the MIDI queue.
    pub dropped: u32,
    /// New malformed MIDI bytes.
    pub malformed: u32,
}

impl StatsDelta {
    /// Counters grown from `before` to `after`. Wrapping is handled.
    pub fn between(before: &EngineStats, after: &EngineStats) -> Self {
        Self {
            overruns: after.overruns.wrapping_sub(before.overruns),
            dropped: after.dropped.wrapping_sub(before.dropped),
            malformed: after.malformed.wrapping_sub(before.malformed),
        }
    }

    /// Whether anything changed.
    pub fn is_quiet(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_fires_once_per_interval() {
        let mut throttle = StatsThrottle::every(3);
        let fired: Vec<bool> = (0..7).map(|_| throttle.tick()).collect();
        assert_eq!(fired, [false, false, true, false, false, true, false]);
    }

    #[test]
    fn test_zero_interval_fires_every_block() {
        let mut throttle = StatsThrottle::every(0);
        assert!(throttle.tick());
        assert!(throttle.tick());
    }

    #[test]
    fn test_per_second_at_48k() {
        let throttle = StatsThrottle::per_second(&EngineConfig::default(), 128);
        assert_eq!(throttle.interval(), 375);
    }

    #[test]
    fn test_delta_handles_wrap() {
        let before = EngineStats {
            dropped: u32::MAX,
            ..EngineStats::default()
        };
        let after = EngineStats {
            dropped: 1,
            overruns: 2,
            ..EngineStats::default()
        };
        let delta = StatsDelta::between(&before, &after);
        assert_eq!(delta.dropped, 2);
        assert_eq!(delta.overruns, 2);
        assert!(!delta.is_quiet());
        assert!(StatsDelta::between(&after, &after).is_quiet());
    }
}
