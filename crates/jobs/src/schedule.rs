//! Adaptive polling schedule for job status checks.
//!
//! While a job reports progress, it is polled at the base interval. Once
//! progress has stood still for more than [`PollConfig::stall_threshold`]
//! consecutive polls, the interval backs off to
//! `base_interval * stall_multiplier`, clamped to
//! [`PollConfig::max_interval`]. Any forward progress resets both the
//! interval and the stall counter.

use std::time::Duration;

use crate::config::{parse_or, ConfigError};

/// Interval used while progress is moving.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(2000);
/// Upper bound on the delay between two polls.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_millis(10_000);
/// Unchanged polls tolerated before backing off.
pub const DEFAULT_STALL_THRESHOLD: u32 = 3;
/// Backoff factor applied to the base interval during a stall.
pub const DEFAULT_STALL_MULTIPLIER: f64 = 1.5;
/// Wall-clock ceiling on polling, measured from the first poll.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(45 * 60);

/// Tunable parameters for job polling.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub stall_threshold: u32,
    pub stall_multiplier: f64,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            base_interval: DEFAULT_BASE_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            stall_multiplier: DEFAULT_STALL_MULTIPLIER,
            timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

impl PollConfig {
    /// Load overrides from environment variables.
    ///
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `SCEI_POLL_BASE_MS`     | `2000`  |
    /// | `SCEI_POLL_MAX_MS`      | `10000` |
    /// | `SCEI_JOB_TIMEOUT_SECS` | `2700`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_ms = parse_or(
            "SCEI_POLL_BASE_MS",
            std::env::var("SCEI_POLL_BASE_MS").ok(),
            defaults.base_interval.as_millis() as u64,
            "number of milliseconds",
        )?;
        let max_ms = parse_or(
            "SCEI_POLL_MAX_MS",
            std::env::var("SCEI_POLL_MAX_MS").ok(),
            defaults.max_interval.as_millis() as u64,
            "number of milliseconds",
        )?;
        let timeout_secs = parse_or(
            "SCEI_JOB_TIMEOUT_SECS",
            std::env::var("SCEI_JOB_TIMEOUT_SECS").ok(),
            defaults.timeout.as_secs(),
            "number of seconds",
        )?;

        Ok(Self {
            base_interval: Duration::from_millis(base_ms),
            max_interval: Duration::from_millis(max_ms.max(base_ms)),
            timeout: Duration::from_secs(timeout_secs),
            ..defaults
        })
    }
}

/// The interval used once a job is considered stalled.
///
/// The result is clamped to [`PollConfig::max_interval`].
pub fn stalled_interval(config: &PollConfig) -> Duration {
    let stalled_ms = (config.base_interval.as_millis() as f64 * config.stall_multiplier) as u64;
    Duration::from_millis(stalled_ms).min(config.max_interval)
}

/// Per-job polling state: last seen progress and the stall counter.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    config: PollConfig,
    last_progress: u8,
    stall_count: u32,
    interval: Duration,
}

impl PollSchedule {
    pub fn new(config: PollConfig) -> Self {
        let interval = config.base_interval;
        Self {
            config,
            last_progress: 0,
            stall_count: 0,
            interval,
        }
    }

    /// Record one status observation and return the delay before the
    /// next poll.
    ///
    /// Only forward movement counts as progress; a lower value than the
    /// highest seen so far is treated like no change.
    pub fn observe(&mut self, progress: u8) -> Duration {
        if progress > self.last_progress {
            self.last_progress = progress;
            self.stall_count = 0;
            self.interval = self.config.base_interval;
        } else {
            self.stall_count = self.stall_count.saturating_add(1);
            self.interval = if self.stall_count > self.config.stall_threshold {
                stalled_interval(&self.config)
            } else {
                self.config.base_interval
            };
        }
        self.interval
    }

    /// Highest progress value observed so far.
    pub fn last_progress(&self) -> u8 {
        self.last_progress
    }

    pub fn stall_count(&self) -> u32 {
        self.stall_count
    }

    /// Delay chosen by the most recent [`observe`](Self::observe).
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(2000);

    #[test]
    fn increasing_progress_always_polls_at_base() {
        let mut schedule = PollSchedule::new(PollConfig::default());
        for progress in [1, 5, 10, 11, 40, 99, 100] {
            assert_eq!(schedule.observe(progress), BASE);
            assert_eq!(schedule.stall_count(), 0);
        }
    }

    #[test]
    fn stall_backs_off_after_threshold() {
        let mut schedule = PollSchedule::new(PollConfig::default());
        schedule.observe(20);

        // Stalled polls 1..=3 stay at base.
        for _ in 0..3 {
            assert_eq!(schedule.observe(20), BASE);
        }
        // From the 4th stalled poll on, the interval is base * 1.5.
        for _ in 0..20 {
            assert_eq!(schedule.observe(20), Duration::from_millis(3000));
        }
        assert_eq!(schedule.stall_count(), 23);
    }

    #[test]
    fn stalled_interval_never_exceeds_max() {
        let config = PollConfig {
            base_interval: Duration::from_millis(8000),
            ..Default::default()
        };
        assert_eq!(stalled_interval(&config), Duration::from_millis(10_000));

        let mut schedule = PollSchedule::new(config);
        for _ in 0..50 {
            assert!(schedule.observe(0) <= Duration::from_millis(10_000));
        }
    }

    #[test]
    fn progress_resets_stall() {
        let mut schedule = PollSchedule::new(PollConfig::default());
        for _ in 0..6 {
            schedule.observe(0);
        }
        assert_eq!(schedule.interval(), Duration::from_millis(3000));

        assert_eq!(schedule.observe(30), BASE);
        assert_eq!(schedule.stall_count(), 0);
    }

    #[test]
    fn regression_counts_as_stall() {
        let mut schedule = PollSchedule::new(PollConfig::default());
        schedule.observe(50);
        schedule.observe(40);

        assert_eq!(schedule.stall_count(), 1);
        assert_eq!(schedule.last_progress(), 50);
    }

    #[test]
    fn custom_multiplier() {
        let config = PollConfig {
            base_interval: Duration::from_millis(1000),
            stall_multiplier: 3.0,
            ..Default::default()
        };
        assert_eq!(stalled_interval(&config), Duration::from_millis(3000));
    }
}
