//! Last-write timestamps.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A last-write time, measured from the Unix epoch.
///
/// Used only to break ties between differing contents, never as identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// Creates a timestamp from a duration since the epoch.
    pub fn from_duration(since_epoch: Duration) -> Self {
        Self(since_epoch)
    }

    /// Creates a timestamp from whole seconds since the epoch.
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Creates a timestamp from the wire form (fractional seconds).
    ///
    /// Negative or non-finite values clamp to the epoch.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Self(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
        } else {
            Self(Duration::ZERO)
        }
    }

    /// Converts a [`SystemTime`]; times before the epoch clamp to it.
    pub fn from_system_time(time: SystemTime) -> Self {
        Self(time.duration_since(UNIX_EPOCH).unwrap_or_default())
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Returns the wire form (fractional seconds).
    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Rounds to what survives a trip through the wire form.
    ///
    /// Two timestamps taken from the same filesystem mtime compare equal
    /// after this, whichever side of the wire each came from.
    pub fn at_wire_precision(&self) -> Self {
        Self::from_secs_f64(self.as_secs_f64())
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({:.3})", self.as_secs_f64())
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_time() {
        assert!(Timestamp::from_secs(10) < Timestamp::from_secs(11));
        assert_eq!(Timestamp::from_secs_f64(10.0), Timestamp::from_secs(10));
    }

    #[test]
    fn wire_form_clamps_garbage() {
        assert_eq!(Timestamp::from_secs_f64(-3.0), Timestamp::default());
        assert_eq!(Timestamp::from_secs_f64(f64::NAN), Timestamp::default());
    }

    #[test]
    fn system_time_conversion() {
        let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_250);
        let ts = Timestamp::from(t);
        assert!((ts.as_secs_f64() - 1_700_000_000.25).abs() < 1e-6);
    }

    #[test]
    fn wire_precision_survives_round_trip() {
        let local = Timestamp::from_duration(Duration::new(1_650_000_000, 123_456_789));
        let remote = Timestamp::from_secs_f64(local.as_secs_f64());
        assert_ne!(local, remote);
        assert_eq!(local.at_wire_precision(), remote);
        assert_eq!(remote.at_wire_precision(), remote);
    }

    #[test]
    fn huge_wire_values_saturate() {
        let ts = Timestamp::from_secs_f64(1e300);
        assert_eq!(ts.at_wire_precision().as_secs_f64(), ts.as_secs_f64());
    }
}
