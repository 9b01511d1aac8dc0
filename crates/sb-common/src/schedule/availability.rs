//! Worker availability: a recurring weekly pattern plus specific-date
//! overrides, validated so that no two windows on the same key overlap.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::time::{merge_windows, ShiftInterval, TimeError, TimeOfDay, TimeWindow};

/// Upper bound on slots across all entries of one worker.
pub const MAX_SLOTS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySlot {
    pub day: DayOfWeek,
    pub from: TimeOfDay,
    pub to: TimeOfDay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedSlot {
    pub date: NaiveDate,
    pub from: TimeOfDay,
    pub to: TimeOfDay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    #[serde(rename_all = "camelCase")]
    WeeklyPattern { weekly_pattern: Vec<WeeklySlot> },
    #[serde(rename_all = "camelCase")]
    SpecificDates { specific_dates: Vec<DatedSlot> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvailabilityError {
    #[error("availability entry {0} has no slots")]
    EmptyEntry(usize),
    #[error("invalid slot on {key}: {source}")]
    InvalidSlot {
        key: String,
        #[source]
        source: TimeError,
    },
    #[error("overlapping windows on {key}: {first} and {second}")]
    Overlap {
        key: String,
        first: TimeWindow,
        second: TimeWindow,
    },
    #[error("too many availability slots (max {MAX_SLOTS})")]
    TooManySlots,
}

/// Validated, indexed availability of one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilitySet {
    weekly: BTreeMap<DayOfWeek, Vec<TimeWindow>>,
    dated: BTreeMap<NaiveDate, Vec<TimeWindow>>,
}

fn window(key: impl Fn() -> String, from: TimeOfDay, to: TimeOfDay) -> Result<TimeWindow, AvailabilityError> {
    TimeWindow::new(from, to).map_err(|source| AvailabilityError::InvalidSlot { key: key(), source })
}

fn check_no_overlap<K: std::fmt::Debug>(
    index: &mut BTreeMap<K, Vec<TimeWindow>>,
) -> Result<(), AvailabilityError> {
    for (key, windows) in index.iter_mut() {
        windows.sort();
        if let Some(pair) = windows.windows(2).find(|pair| pair[0].overlaps(&pair[1])) {
            return Err(AvailabilityError::Overlap {
                key: format!("{key:?}"),
                first: pair[0],
                second: pair[1],
            });
        }
    }
    Ok(())
}

impl AvailabilitySet {
    pub fn new(entries: &[Availability]) -> Result<Self, AvailabilityError> {
        let mut set = Self::default();
        let mut total = 0usize;

        for (index, entry) in entries.iter().enumerate() {
            match entry {
                Availability::WeeklyPattern { weekly_pattern } => {
                    if weekly_pattern.is_empty() {
                        return Err(AvailabilityError::EmptyEntry(index));
                    }
                    total += weekly_pattern.len();
                    for slot in weekly_pattern {
                        let w = window(|| format!("{:?}", slot.day), slot.from, slot.to)?;
                        set.weekly.entry(slot.day).or_default().push(w);
                    }
                }
                Availability::SpecificDates { specific_dates } => {
                    if specific_dates.is_empty() {
                        return Err(AvailabilityError::EmptyEntry(index));
                    }
                    total += specific_dates.len();
                    for slot in specific_dates {
                        let w = window(|| slot.date.to_string(), slot.from, slot.to)?;
                        set.dated.entry(slot.date).or_default().push(w);
                    }
                }
            }
            if total > MAX_SLOTS {
                return Err(AvailabilityError::TooManySlots);
            }
        }

        check_no_overlap(&mut set.weekly)?;
        check_no_overlap(&mut set.dated)?;
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.weekly.is_empty() && self.dated.is_empty()
    }

    /// Open windows on `date`, merged. Specific-date slots for a date replace
    /// the weekly pattern for that date.
    pub fn windows_on(&self, date: NaiveDate) -> Vec<TimeWindow> {
        let source = self
            .dated
            .get(&date)
            .or_else(|| self.weekly.get(&DayOfWeek::from(date.weekday())));
        source.map(|windows| merge_windows(windows.clone())).unwrap_or_default()
    }

    /// Whether the worker is open for the whole interval, including both
    /// halves of an overnight shift.
    pub fn covers(&self, interval: &ShiftInterval) -> bool {
        let pieces = interval.split_by_day();
        !pieces.is_empty()
            && pieces.iter().all(|(date, piece)| {
                self.windows_on(*date).iter().any(|open| open.contains(piece))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(raw: &str) -> TimeOfDay {
        raw.parse().unwrap()
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn weekly(slots: &[(DayOfWeek, &str, &str)]) -> Availability {
        Availability::WeeklyPattern {
            weekly_pattern: slots
                .iter()
                .map(|(day, from, to)| WeeklySlot { day: *day, from: t(from), to: t(to) })
                .collect(),
        }
    }

    fn dated(slots: &[(&str, &str, &str)]) -> Availability {
        Availability::SpecificDates {
            specific_dates: slots
                .iter()
                .map(|(d, from, to)| DatedSlot { date: date(d), from: t(from), to: t(to) })
                .collect(),
        }
    }

    fn interval(day: &str, from: &str, end_day: &str, to: &str) -> ShiftInterval {
        ShiftInterval { start: t(from).on(date(day)), end: t(to).on(date(end_day)) }
    }

    // 2030-03-04 is a Monday.
    const MONDAY: &str = "2030-03-04";

    #[test]
    fn touching_weekly_slots_are_allowed() {
        let set = AvailabilitySet::new(&[weekly(&[
            (DayOfWeek::Monday, "09:00", "12:00"),
            (DayOfWeek::Monday, "12:00", "17:00"),
        ])])
        .unwrap();
        assert_eq!(set.windows_on(date(MONDAY)).len(), 1);
        assert!(set.covers(&interval(MONDAY, "10:00", MONDAY, "16:00")));
    }

    #[test]
    fn overlapping_weekly_slots_are_rejected_across_entries() {
        let err = AvailabilitySet::new(&[
            weekly(&[(DayOfWeek::Monday, "09:00", "12:00")]),
            weekly(&[(DayOfWeek::Monday, "11:00", "13:00")]),
        ])
        .unwrap_err();
        assert!(matches!(err, AvailabilityError::Overlap { .. }));
    }

    #[test]
    fn same_window_on_different_days_is_fine() {
        assert!(AvailabilitySet::new(&[weekly(&[
            (DayOfWeek::Monday, "09:00", "12:00"),
            (DayOfWeek::Tuesday, "09:00", "12:00"),
        ])])
        .is_ok());
    }

    #[test]
    fn overlapping_dated_slots_are_rejected() {
        let err = AvailabilitySet::new(&[dated(&[
            ("2030-03-05", "08:00", "10:00"),
            ("2030-03-05", "08:00", "10:00"),
        ])])
        .unwrap_err();
        assert!(matches!(err, AvailabilityError::Overlap { .. }));
    }

    #[test]
    fn empty_entries_and_inverted_slots_are_rejected() {
        assert_eq!(
            AvailabilitySet::new(&[Availability::WeeklyPattern { weekly_pattern: vec![] }]).unwrap_err(),
            AvailabilityError::EmptyEntry(0)
        );
        let err = AvailabilitySet::new(&[dated(&[("2030-03-05", "18:00", "08:00")])]).unwrap_err();
        assert!(matches!(err, AvailabilityError::InvalidSlot { .. }));
    }

    #[test]
    fn specific_dates_override_weekly_pattern() {
        let set = AvailabilitySet::new(&[
            weekly(&[(DayOfWeek::Monday, "08:00", "20:00")]),
            dated(&[(MONDAY, "08:00", "10:00")]),
        ])
        .unwrap();
        assert!(set.covers(&interval(MONDAY, "08:00", MONDAY, "10:00")));
        assert!(!set.covers(&interval(MONDAY, "12:00", MONDAY, "14:00")));
        // Following Monday falls back to the weekly pattern.
        assert!(set.covers(&interval("2030-03-11", "12:00", "2030-03-11", "14:00")));
    }

    #[test]
    fn overnight_shift_needs_both_days() {
        let evening_only = AvailabilitySet::new(&[weekly(&[(DayOfWeek::Monday, "18:00", "24:00")])]).unwrap();
        let overnight = interval(MONDAY, "22:00", "2030-03-05", "06:00");
        assert!(!evening_only.covers(&overnight));

        let both = AvailabilitySet::new(&[weekly(&[
            (DayOfWeek::Monday, "18:00", "24:00"),
            (DayOfWeek::Tuesday, "00:00", "08:00"),
        ])])
        .unwrap();
        assert!(both.covers(&overnight));
    }

    #[test]
    fn empty_set_covers_nothing() {
        let set = AvailabilitySet::default();
        assert!(set.is_empty());
        assert!(!set.covers(&interval(MONDAY, "09:00", MONDAY, "10:00")));
    }

    #[test]
    fn wire_shape_uses_type_tag_and_camel_case() {
        let json = serde_json::json!([
            {"type": "WEEKLY_PATTERN", "weeklyPattern": [{"day": "MONDAY", "from": "09:00", "to": "12:00"}]},
            {"type": "SPECIFIC_DATES", "specificDates": [{"date": "2030-03-05", "from": "13:00", "to": "17:00"}]}
        ]);
        let parsed: Vec<Availability> = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(serde_json::to_value(&parsed).unwrap(), json);
    }
}
