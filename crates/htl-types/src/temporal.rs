use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::TypeError;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as an RFC 3339 string, the format stamped on records.
    fn now_rfc3339(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    pub fn parse(rfc3339: &str) -> Result<Self, TypeError> {
        DateTime::parse_from_rfc3339(rfc3339)
            .map(|t| Self(t.with_timezone(&Utc)))
            .map_err(|e| TypeError::InvalidTimestamp(format!("{rfc3339}: {e}")))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_formats_with_millis() {
        let clock = FixedClock::parse("2024-05-01T12:30:00Z").unwrap();
        assert_eq!(clock.now_rfc3339(), "2024-05-01T12:30:00.000Z");
    }

    #[test]
    fn fixed_clock_normalizes_offsets() {
        let clock = FixedClock::parse("2024-05-01T14:30:00+02:00").unwrap();
        assert_eq!(clock.now_rfc3339(), "2024-05-01T12:30:00.000Z");
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        let err = FixedClock::parse("yesterday").unwrap_err();
        assert!(matches!(err, TypeError::InvalidTimestamp(_)));
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now().timestamp() > 1_577_836_800);
    }
}
