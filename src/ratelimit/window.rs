//! Fixed time windows and the rate limit configuration built on them.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TollgateError};

/// Unit of a rate limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[serde(alias = "second", alias = "s")]
    Seconds,
    #[serde(alias = "minute", alias = "m")]
    Minutes,
    #[serde(alias = "hour", alias = "h")]
    Hours,
}

impl TimeUnit {
    /// Number of seconds in one unit.
    pub const fn seconds(&self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3600,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
        };
        f.write_str(name)
    }
}

/// A window length expressed as `duration` units.
///
/// Always holds a positive duration whose length in seconds fits in a `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    duration: u64,
    unit: TimeUnit,
}

impl TimeWindow {
    /// Create a window, rejecting zero-length or overflowing durations.
    pub fn new(duration: u64, unit: TimeUnit) -> Result<Self> {
        if duration == 0 {
            return Err(TollgateError::Config(
                "window duration must be greater than zero".to_string(),
            ));
        }
        if duration.checked_mul(unit.seconds()).is_none() {
            return Err(TollgateError::Config(format!(
                "window of {} {} is too large",
                duration, unit
            )));
        }
        Ok(Self { duration, unit })
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Length of the window in seconds.
    pub fn as_secs(&self) -> u64 {
        // Overflow is ruled out in `new`.
        self.duration * self.unit.seconds()
    }

    pub fn to_std(&self) -> Duration {
        Duration::from_secs(self.as_secs())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.duration, self.unit)
    }
}

/// Start of the window containing `now`.
///
/// Every instance that shares a store and a reasonably synchronized clock lands on the same
/// boundary without coordinating.
pub fn window_start(now: u64, window_secs: u64) -> u64 {
    (now / window_secs) * window_secs
}

/// Unix time at which the window starting at `window_start` ends.
pub fn reset_time(window_start: u64, window_secs: u64) -> u64 {
    window_start.saturating_add(window_secs)
}

/// Quota applied by a limiter: at most `limit` requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    limit: u64,
    window: TimeWindow,
}

impl RateLimitConfig {
    pub fn new(limit: u64, window: TimeWindow) -> Self {
        Self { limit, window }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_seconds_per_unit() {
        assert_eq!(TimeWindow::new(30, TimeUnit::Seconds).unwrap().as_secs(), 30);
        assert_eq!(TimeWindow::new(5, TimeUnit::Minutes).unwrap().as_secs(), 300);
        assert_eq!(TimeWindow::new(2, TimeUnit::Hours).unwrap().as_secs(), 7200);
        assert_eq!(
            TimeWindow::new(2, TimeUnit::Hours).unwrap().to_std(),
            Duration::from_secs(7200)
        );
    }

    #[test]
    fn test_zero_duration_rejected() {
        let err = TimeWindow::new(0, TimeUnit::Minutes).unwrap_err();
        assert!(matches!(err, TollgateError::Config(_)));
    }

    #[test]
    fn test_overflowing_duration_rejected() {
        assert!(TimeWindow::new(u64::MAX, TimeUnit::Hours).is_err());
        assert!(TimeWindow::new(u64::MAX, TimeUnit::Seconds).is_ok());
    }

    #[test]
    fn test_window_start_and_reset() {
        let start = window_start(1000, 300);
        assert_eq!(start, 900);
        assert_eq!(reset_time(start, 300), 1200);
    }

    #[test]
    fn test_window_start_on_boundary() {
        assert_eq!(window_start(1200, 300), 1200);
        assert_eq!(window_start(1199, 300), 900);
        assert_eq!(window_start(0, 60), 0);
    }

    #[test]
    fn test_window_math_is_pure() {
        let first = (window_start(1_700_000_123, 60), reset_time(1_700_000_100, 60));
        let second = (window_start(1_700_000_123, 60), reset_time(1_700_000_100, 60));
        assert_eq!(first, second);
        assert_eq!(first, (1_700_000_100, 1_700_000_160));
    }

    #[test]
    fn test_time_unit_deserialize() {
        let unit: TimeUnit = serde_yaml::from_str("minutes").unwrap();
        assert_eq!(unit, TimeUnit::Minutes);
        let unit: TimeUnit = serde_yaml::from_str("hour").unwrap();
        assert_eq!(unit, TimeUnit::Hours);
        let unit: TimeUnit = serde_yaml::from_str("s").unwrap();
        assert_eq!(unit, TimeUnit::Seconds);
        assert!(serde_yaml::from_str::<TimeUnit>("days").is_err());
    }

    #[test]
    fn test_window_display() {
        let window = TimeWindow::new(5, TimeUnit::Minutes).unwrap();
        assert_eq!(window.to_string(), "5 minutes");
    }
}
