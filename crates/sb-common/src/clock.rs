//! Marketplace-local wall clock.
//!
//! Shift dates and hours are stored as local calendar values without a zone, so
//! "today" and "has this shift started" are always answered in one fixed
//! offset configured for the deployment.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

/// UTC+07:00.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 420;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    /// Returns `None` when the offset is outside +/- 24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_utc_plus_seven() {
        assert_eq!(LocalClock::default().offset().local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        assert!(LocalClock::from_offset_minutes(24 * 60).is_none());
        assert!(LocalClock::from_offset_minutes(-24 * 60).is_none());
        assert!(LocalClock::from_offset_minutes(-300).is_some());
    }
}
