//! Conversion between real-valued durations and integer ticks of the instrument timebase.
//!
//! All positions, lengths and delays inside the engine are [`Ticks`]. The host talks in
//! seconds; [`Timebase::to_ticks`] is the single gate through which a duration enters the
//! engine, and it refuses anything that is not (within 1%) an integer number of ticks.

use crate::error::{PulserError, Result};

/// Signed count of timebase periods.
pub type Ticks = i64;

/// Largest relative deviation from an integer tick count still accepted by
/// [`Timebase::to_ticks`], in units of one tick.
const MAX_TICK_ERROR: f64 = 1.0e-2;

/// Durations below this are treated as a true zero even when the timebase is coarse.
const ZERO_TIME_THRESHOLD: f64 = 0.99e-9;

/// The instrument timebase together with the range the instrument supports.
///
/// The period is set exactly once per run.
///
/// # Example
/// ```
/// use pulser_backend::timebase::Timebase;
///
/// let mut tb = Timebase::new(1.0e-9, 1.0e-5);
/// tb.set(2.0e-9).unwrap();
/// assert_eq!(tb.to_ticks(10.0e-9).unwrap(), 5);
/// assert!(tb.to_ticks(3.0e-9).is_err()); // 1.5 ticks
/// assert!(tb.set(4.0e-9).is_err()); // already set
/// ```
#[derive(Debug, Clone)]
pub struct Timebase {
    period: Option<f64>,
    min: f64,
    max: f64,
}

impl Timebase {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            period: None,
            min,
            max,
        }
    }

    pub fn is_set(&self) -> bool {
        self.period.is_some()
    }

    pub fn period(&self) -> Option<f64> {
        self.period
    }

    /// Sets the timebase period in seconds.
    ///
    /// Fails if a period was already set or if `seconds` lies outside the instrument range.
    pub fn set(&mut self, seconds: f64) -> Result<()> {
        if let Some(period) = self.period {
            return Err(PulserError::TimebaseAlreadySet(period));
        }
        if !seconds.is_finite() || seconds < self.min || seconds > self.max {
            return Err(PulserError::TimebaseOutOfRange {
                value: seconds,
                min: self.min,
                max: self.max,
            });
        }
        self.period = Some(seconds);
        Ok(())
    }

    /// Converts a duration in seconds to ticks, rounding to the nearest tick.
    ///
    /// Rejects values whose rounding error exceeds 1% of a tick, values whose tick count
    /// does not fit into [`Ticks`], and positive durations of at least ~1 ns that would
    /// round down to zero ticks.
    pub fn to_ticks(&self, seconds: f64) -> Result<Ticks> {
        let timebase = self.period.ok_or(PulserError::NoTimebase)?;
        let ticks = seconds / timebase;
        if !ticks.is_finite() || ticks.abs() >= Ticks::MAX as f64 {
            return Err(PulserError::OutOfRange(seconds));
        }
        let rounded = ticks.round();
        if (rounded - ticks).abs() > MAX_TICK_ERROR
            || (seconds >= ZERO_TIME_THRESHOLD && rounded == 0.0)
        {
            return Err(PulserError::NotAnIntegerMultiple {
                time: seconds,
                timebase,
            });
        }
        Ok(rounded as Ticks)
    }

    /// Converts ticks back to seconds.
    ///
    /// # Panics
    /// If no timebase has been set: callers only hold ticks after a successful
    /// [`Timebase::to_ticks`], so this is a logic error.
    pub fn to_seconds(&self, ticks: Ticks) -> f64 {
        let timebase = self
            .period
            .expect("tick conversion requested before a timebase was set");
        ticks as f64 * timebase
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn two_ns() -> Timebase {
        let mut tb = Timebase::new(1.0e-9, 1.0e-5);
        tb.set(2.0e-9).unwrap();
        tb
    }

    #[test]
    fn unset_timebase() {
        let tb = Timebase::new(1.0e-9, 1.0e-5);
        assert_eq!(tb.to_ticks(1.0e-6), Err(PulserError::NoTimebase));
    }

    #[test]
    #[should_panic(expected = "before a timebase was set")]
    fn seconds_without_timebase_panics() {
        Timebase::new(1.0e-9, 1.0e-5).to_seconds(3);
    }

    #[test]
    fn timebase_range_and_write_once() {
        let mut tb = Timebase::new(1.0e-9, 1.0e-5);
        assert!(matches!(
            tb.set(1.0e-3),
            Err(PulserError::TimebaseOutOfRange { .. })
        ));
        assert!(!tb.is_set());
        tb.set(5.0e-9).unwrap();
        assert_eq!(tb.set(5.0e-9), Err(PulserError::TimebaseAlreadySet(5.0e-9)));
    }

    #[test]
    fn rounding_tolerance() {
        let tb = two_ns();
        // 0.5% off an integer tick count is accepted
        assert_eq!(tb.to_ticks(10.01e-9).unwrap(), 5);
        assert_eq!(tb.to_ticks(-4.0e-9).unwrap(), -2);
        assert!(matches!(
            tb.to_ticks(10.1e-9),
            Err(PulserError::NotAnIntegerMultiple { .. })
        ));
    }

    #[test]
    fn tiny_times() {
        let mut tb = Timebase::new(1.0e-9, 1.0e-3);
        tb.set(1.0e-6).unwrap();
        // Below ~1 ns counts as zero
        assert_eq!(tb.to_ticks(0.5e-9).unwrap(), 0);
        // 2 ns is within 1% of zero ticks, but a real non-zero time
        assert!(tb.to_ticks(2.0e-9).is_err());
    }

    #[test]
    fn overflow() {
        let tb = two_ns();
        assert_eq!(tb.to_ticks(1.0e12), Err(PulserError::OutOfRange(1.0e12)));
        assert!(tb.to_ticks(f64::NAN).is_err());
    }

    proptest! {
        #[test]
        fn tick_round_trip(k in -1_000_000_000i64..1_000_000_000i64) {
            let tb = two_ns();
            prop_assert_eq!(tb.to_ticks(tb.to_seconds(k)).unwrap(), k);
        }
    }
}
