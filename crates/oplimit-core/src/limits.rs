//! Rate and burst parameters, and the pacing arithmetic derived from them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of tokens the replenisher drains per cycle.
pub const DRAIN_BATCH: u32 = 100;

/// Limits applied to a wrapped stream.
///
/// `limit_rate` is in operations per second, `max_burst` in operations.
/// A `max_burst` of zero is legal: every admission must then meet the
/// replenisher directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub limit_rate: u32,
    #[serde(default)]
    pub max_burst: usize,
}

impl Limits {
    /// Validates and builds a set of limits.
    pub fn new(limit_rate: u32, max_burst: usize) -> Result<Self> {
        let limits = Self {
            limit_rate,
            max_burst,
        };
        limits.validate()?;
        Ok(limits)
    }

    /// Rejects a zero rate, which has no meaningful cycle length.
    pub fn validate(&self) -> Result<()> {
        if self.limit_rate == 0 {
            return Err(Error::InvalidRate {
                rate: self.limit_rate,
            });
        }
        Ok(())
    }

    /// Time the replenisher sleeps before each drain batch:
    /// `floor(100 / limit_rate)` whole seconds.
    ///
    /// Rates above 100 floor to a zero-length cycle, so the replenisher
    /// drains as fast as tokens arrive and the limiter stops pacing. Only
    /// `max_burst` still bounds the number of outstanding admissions.
    pub fn cycle(&self) -> Duration {
        match DRAIN_BATCH.checked_div(self.limit_rate) {
            Some(secs) => Duration::from_secs(u64::from(secs)),
            None => Duration::ZERO,
        }
    }

    /// Whether the replenisher sleeps between batches at all.
    pub fn is_paced(&self) -> bool {
        !self.cycle().is_zero()
    }

    /// The average admission rate actually achieved, in operations per
    /// second: `100 / floor(100 / limit_rate)`.
    ///
    /// Returns `None` for unpaced limits.
    pub fn effective_rate(&self) -> Option<f64> {
        let cycle = self.cycle();
        if cycle.is_zero() {
            None
        } else {
            Some(f64::from(DRAIN_BATCH) / cycle.as_secs_f64())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_is_rejected() {
        let err = Limits::new(0, 4).unwrap_err();
        assert!(matches!(err, Error::InvalidRate { rate: 0 }));
    }

    #[test]
    fn test_cycle_floors_to_whole_seconds() {
        assert_eq!(Limits::new(1, 0).unwrap().cycle(), Duration::from_secs(100));
        assert_eq!(Limits::new(10, 0).unwrap().cycle(), Duration::from_secs(10));
        assert_eq!(Limits::new(30, 0).unwrap().cycle(), Duration::from_secs(3));
        assert_eq!(Limits::new(60, 0).unwrap().cycle(), Duration::from_secs(1));
        assert_eq!(Limits::new(100, 0).unwrap().cycle(), Duration::from_secs(1));
    }

    #[test]
    fn test_rates_above_batch_are_unpaced() {
        let limits = Limits::new(101, 5).unwrap();
        assert_eq!(limits.cycle(), Duration::ZERO);
        assert!(!limits.is_paced());
        assert_eq!(limits.effective_rate(), None);
    }

    #[test]
    fn test_effective_rate_follows_floor_division() {
        // 100 / floor(100 / 30) = 100 / 3
        let rate = Limits::new(30, 0).unwrap().effective_rate().unwrap();
        assert!((rate - 33.333).abs() < 0.01);

        // 100 / floor(100 / 60) = 100 / 1, far from the requested 60
        let rate = Limits::new(60, 0).unwrap().effective_rate().unwrap();
        assert!((rate - 100.0).abs() < f64::EPSILON);

        let rate = Limits::new(10, 0).unwrap().effective_rate().unwrap();
        assert!((rate - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cycle_of_unvalidated_zero_rate_does_not_panic() {
        let limits = Limits {
            limit_rate: 0,
            max_burst: 0,
        };
        assert_eq!(limits.cycle(), Duration::ZERO);
    }
}
