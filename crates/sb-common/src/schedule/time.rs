use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("invalid time of day {0:?}, expected HH:mm")]
    InvalidFormat(String),
    #[error("time window {from}-{to} must end after it starts")]
    EmptyWindow { from: TimeOfDay, to: TimeOfDay },
}

/// Minutes since local midnight. `24:00` is representable so a window can
/// run to the end of the day; it is never a valid start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(MINUTES_PER_DAY);

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        let total = hour.checked_mul(60)?.checked_add(minute)?;
        (total <= MINUTES_PER_DAY).then_some(Self(total))
    }

    fn from_time(time: NaiveTime) -> Self {
        Self((time.num_seconds_from_midnight() / 60) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(self.0))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || TimeError::InvalidFormat(raw.to_string());
        let (hour, minute) = raw.trim().split_once(':').ok_or_else(invalid)?;
        let digits = |s: &str, max_len: usize| {
            !s.is_empty() && s.len() <= max_len && s.bytes().all(|b| b.is_ascii_digit())
        };
        if !digits(hour, 2) || !digits(minute, 2) || minute.len() != 2 {
            return Err(invalid());
        }
        let hour: u16 = hour.parse().map_err(|_| invalid())?;
        let minute: u16 = minute.parse().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A same-day window `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeWindow {
    from: TimeOfDay,
    to: TimeOfDay,
}

impl TimeWindow {
    pub fn new(from: TimeOfDay, to: TimeOfDay) -> Result<Self, TimeError> {
        if from >= to {
            return Err(TimeError::EmptyWindow { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> TimeOfDay {
        self.from
    }

    pub fn to(&self) -> TimeOfDay {
        self.to
    }

    /// Touching windows (`09:00-12:00`, `12:00-17:00`) do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.from < other.to && other.from < self.to
    }

    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.from <= other.from && other.to <= self.to
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Sorts and joins windows that touch or overlap.
pub fn merge_windows(mut windows: Vec<TimeWindow>) -> Vec<TimeWindow> {
    windows.sort();
    let mut merged: Vec<TimeWindow> = Vec::with_capacity(windows.len());
    for window in windows {
        match merged.last_mut() {
            Some(last) if window.from <= last.to => {
                if window.to > last.to {
                    last.to = window.to;
                }
            }
            _ => merged.push(window),
        }
    }
    merged
}

/// Concrete local start/end of one shift instance. `end` may fall on the
/// following day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ShiftInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ShiftInterval {
    pub fn overlaps(&self, other: &ShiftInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn has_started(&self, now: NaiveDateTime) -> bool {
        now >= self.start
    }

    /// Per-calendar-day pieces, so an overnight `22:00-06:00` becomes
    /// `(d, 22:00-24:00)` and `(d+1, 00:00-06:00)`.
    pub fn split_by_day(&self) -> Vec<(NaiveDate, TimeWindow)> {
        let mut pieces = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let date = cursor.date();
            let next_midnight = (date + Duration::days(1)).and_time(NaiveTime::MIN);
            let piece_end = self.end.min(next_midnight);
            let from = TimeOfDay::from_time(cursor.time());
            let to = if piece_end == next_midnight {
                TimeOfDay::END_OF_DAY
            } else {
                TimeOfDay::from_time(piece_end.time())
            };
            if from < to {
                pieces.push((date, TimeWindow { from, to }));
            }
            cursor = piece_end;
        }
        pieces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(raw: &str) -> TimeOfDay {
        raw.parse().unwrap()
    }

    fn w(from: &str, to: &str) -> TimeWindow {
        TimeWindow::new(t(from), t(to)).unwrap()
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parses_and_renders_clock_times() {
        assert_eq!(t("09:30").minutes(), 570);
        assert_eq!(t("9:05").to_string(), "09:05");
        assert_eq!(t("24:00"), TimeOfDay::END_OF_DAY);
        for bad in ["24:01", "12:60", "12", "ab:cd", "12:5", "", "-1:00", "123:00"] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn serde_uses_clock_strings() {
        let json = serde_json::to_string(&t("07:00")).unwrap();
        assert_eq!(json, "\"07:00\"");
        assert!(serde_json::from_str::<TimeOfDay>("\"25:00\"").is_err());
    }

    #[test]
    fn window_requires_positive_length() {
        assert!(TimeWindow::new(t("10:00"), t("10:00")).is_err());
        assert!(TimeWindow::new(t("12:00"), t("09:00")).is_err());
        assert!(TimeWindow::new(t("00:00"), t("24:00")).is_ok());
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        assert!(!w("09:00", "12:00").overlaps(&w("12:00", "17:00")));
        assert!(w("09:00", "12:01").overlaps(&w("12:00", "17:00")));
        assert!(w("08:00", "20:00").contains(&w("09:00", "12:00")));
    }

    #[test]
    fn merge_joins_touching_and_overlapping() {
        let merged = merge_windows(vec![w("13:00", "17:00"), w("09:00", "12:00"), w("12:00", "13:00"), w("18:00", "20:00")]);
        assert_eq!(merged, vec![w("09:00", "17:00"), w("18:00", "20:00")]);
    }

    #[test]
    fn overnight_interval_splits_at_midnight() {
        let interval = ShiftInterval {
            start: t("22:00").on(date("2030-03-01")),
            end: t("06:00").on(date("2030-03-02")),
        };
        assert_eq!(
            interval.split_by_day(),
            vec![
                (date("2030-03-01"), w("22:00", "24:00")),
                (date("2030-03-02"), w("00:00", "06:00")),
            ]
        );
    }

    #[test]
    fn interval_ending_at_midnight_stays_on_one_day() {
        let interval = ShiftInterval {
            start: t("18:00").on(date("2030-03-01")),
            end: t("24:00").on(date("2030-03-01")),
        };
        assert_eq!(interval.split_by_day(), vec![(date("2030-03-01"), w("18:00", "24:00"))]);
    }

    #[test]
    fn interval_overlap_and_start() {
        let a = ShiftInterval { start: t("08:00").on(date("2030-03-01")), end: t("12:00").on(date("2030-03-01")) };
        let b = ShiftInterval { start: t("12:00").on(date("2030-03-01")), end: t("16:00").on(date("2030-03-01")) };
        assert!(!a.overlaps(&b));
        assert!(a.has_started(t("08:00").on(date("2030-03-01"))));
        assert!(!a.has_started(t("07:59").on(date("2030-03-01"))));
    }
}
