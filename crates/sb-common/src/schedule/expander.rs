//! Expands a recurring shift template into dated shift instances.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::availability::DayOfWeek;
use super::time::{ShiftInterval, TimeOfDay};
use crate::model::shift::GenderRequirement;

pub const MAX_INSTANCES_PER_EXPANSION: usize = 366;
/// Longest recurring range scanned, independent of how many dates match.
pub const MAX_RECURRING_SPAN_DAYS: i64 = 2 * 366;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error("start hour must be 0..=23 and end hour 0..=24, got {start_hour}-{end_hour}")]
    HoursOutOfRange { start_hour: i16, end_hour: i16 },
    #[error("a shift cannot start and end at the same hour")]
    ZeroLengthShift,
    #[error("salary must be positive")]
    NonPositiveSalary,
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("salary override must be positive")]
    NonPositiveSalaryOverride,
    #[error("no dates selected")]
    EmptySelection,
    #[error("date range {from}..{until} is inverted")]
    InvertedRange { from: NaiveDate, until: NaiveDate },
    #[error("date range spans more than {MAX_RECURRING_SPAN_DAYS} days")]
    RangeTooLong,
    #[error("expansion would create more than {MAX_INSTANCES_PER_EXPANSION} shift dates")]
    TooManyInstances,
    #[error("{0} is in the past")]
    PastDate(NaiveDate),
    #[error("{date} is outside the posting window {window}")]
    OutsideWindow { date: NaiveDate, window: ActiveWindow },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftTemplate {
    pub start_hour: i16,
    pub end_hour: i16,
    pub salary: i64,
}

impl ShiftTemplate {
    pub fn new(start_hour: i16, end_hour: i16, salary: i64) -> Result<Self, ExpansionError> {
        if !(0..=23).contains(&start_hour) || !(0..=24).contains(&end_hour) {
            return Err(ExpansionError::HoursOutOfRange { start_hour, end_hour });
        }
        if start_hour == end_hour {
            return Err(ExpansionError::ZeroLengthShift);
        }
        if salary <= 0 {
            return Err(ExpansionError::NonPositiveSalary);
        }
        Ok(Self { start_hour, end_hour, salary })
    }

    /// Ends on the day after it starts.
    pub fn is_overnight(&self) -> bool {
        self.end_hour < self.start_hour
    }

    pub fn instance_interval(&self, date: NaiveDate) -> ShiftInterval {
        let hour = |h: i16| TimeOfDay::from_hm(h as u16, 0).unwrap_or(TimeOfDay::MIDNIGHT);
        let start = hour(self.start_hour).on(date);
        let end_date = if self.is_overnight() { date + Duration::days(1) } else { date };
        ShiftInterval { start, end: hour(self.end_hour).on(end_date) }
    }
}

/// Inclusive posting window; an open bound accepts any date on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

impl ActiveWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.starts_on.map_or(true, |start| date >= start)
            && self.ends_on.map_or(true, |end| date <= end)
    }

    /// Both ends of `first..=last` fall inside the window.
    pub fn contains_range(&self, first: NaiveDate, last: NaiveDate) -> bool {
        self.contains(first) && self.contains(last)
    }

    pub fn is_valid(&self) -> bool {
        match (self.starts_on, self.ends_on) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }
}

impl std::fmt::Display for ActiveWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "open".into());
        write!(f, "[{}, {}]", bound(self.starts_on), bound(self.ends_on))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DateSelection {
    Explicit {
        dates: Vec<NaiveDate>,
    },
    /// Every date in `from..=until` falling on one of `weekdays`; an empty
    /// weekday list means every day.
    Recurring {
        from: NaiveDate,
        until: NaiveDate,
        #[serde(default)]
        weekdays: Vec<DayOfWeek>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDemand {
    pub quantity: i32,
    #[serde(default)]
    pub gender_requirement: GenderRequirement,
    #[serde(default)]
    pub salary_override: Option<i64>,
}

impl ShiftDemand {
    pub fn validate(&self) -> Result<(), ExpansionError> {
        if self.quantity < 1 {
            return Err(ExpansionError::ZeroQuantity);
        }
        if matches!(self.salary_override, Some(s) if s <= 0) {
            return Err(ExpansionError::NonPositiveSalaryOverride);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionRequest {
    pub dates: DateSelection,
    #[serde(flatten)]
    pub demand: ShiftDemand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpansionPlan {
    /// New dates to insert, ascending.
    pub dates: Vec<NaiveDate>,
    /// Requested dates the template already has.
    pub skipped: Vec<NaiveDate>,
    pub demand: ShiftDemand,
    pub template: ShiftTemplate,
}

fn selected_dates(selection: &DateSelection) -> Result<BTreeSet<NaiveDate>, ExpansionError> {
    match selection {
        DateSelection::Explicit { dates } => Ok(dates.iter().copied().collect()),
        DateSelection::Recurring { from, until, weekdays } => {
            if until < from {
                return Err(ExpansionError::InvertedRange { from: *from, until: *until });
            }
            if (*until - *from).num_days() > MAX_RECURRING_SPAN_DAYS {
                return Err(ExpansionError::RangeTooLong);
            }
            Ok(from
                .iter_days()
                .take_while(|d| d <= until)
                .filter(|d| weekdays.is_empty() || weekdays.contains(&DayOfWeek::from(d.weekday())))
                .collect())
        }
    }
}

/// Plans the shift dates `request` asks for.
///
/// Every requested date must be today or later and inside `window`; dates
/// already in `existing` are reported as skipped rather than duplicated.
pub fn expand(
    template: &ShiftTemplate,
    window: &ActiveWindow,
    existing: &BTreeSet<NaiveDate>,
    request: &ExpansionRequest,
    today: NaiveDate,
) -> Result<ExpansionPlan, ExpansionError> {
    request.demand.validate()?;

    let requested = selected_dates(&request.dates)?;
    if requested.is_empty() {
        return Err(ExpansionError::EmptySelection);
    }
    if requested.len() > MAX_INSTANCES_PER_EXPANSION {
        return Err(ExpansionError::TooManyInstances);
    }

    let mut plan = ExpansionPlan {
        dates: Vec::new(),
        skipped: Vec::new(),
        demand: request.demand,
        template: *template,
    };
    for date in requested {
        if date < today {
            return Err(ExpansionError::PastDate(date));
        }
        if !window.contains(date) {
            return Err(ExpansionError::OutsideWindow { date, window: *window });
        }
        if existing.contains(&date) {
            plan.skipped.push(date);
        } else {
            plan.dates.push(date);
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn demand(quantity: i32) -> ShiftDemand {
        ShiftDemand { quantity, gender_requirement: GenderRequirement::Any, salary_override: None }
    }

    fn explicit(dates: &[&str]) -> ExpansionRequest {
        ExpansionRequest {
            dates: DateSelection::Explicit { dates: dates.iter().map(|d| date(d)).collect() },
            demand: demand(2),
        }
    }

    const TODAY: &str = "2030-03-01";
    const TEMPLATE: ShiftTemplate = ShiftTemplate { start_hour: 8, end_hour: 17, salary: 250_000 };

    #[test]
    fn template_validation() {
        assert!(ShiftTemplate::new(8, 17, 200_000).is_ok());
        assert!(ShiftTemplate::new(22, 6, 300_000).unwrap().is_overnight());
        assert!(ShiftTemplate::new(18, 24, 1).is_ok());
        assert_eq!(ShiftTemplate::new(8, 8, 1).unwrap_err(), ExpansionError::ZeroLengthShift);
        assert!(matches!(ShiftTemplate::new(24, 6, 1), Err(ExpansionError::HoursOutOfRange { .. })));
        assert!(matches!(ShiftTemplate::new(8, 25, 1), Err(ExpansionError::HoursOutOfRange { .. })));
        assert_eq!(ShiftTemplate::new(8, 12, 0).unwrap_err(), ExpansionError::NonPositiveSalary);
    }

    #[test]
    fn overnight_interval_ends_next_day() {
        let template = ShiftTemplate::new(22, 6, 1).unwrap();
        let interval = template.instance_interval(date("2030-03-01"));
        assert_eq!(interval.start, date("2030-03-01").and_hms_opt(22, 0, 0).unwrap());
        assert_eq!(interval.end, date("2030-03-02").and_hms_opt(6, 0, 0).unwrap());
    }

    #[test]
    fn explicit_dates_are_sorted_and_deduplicated() {
        let plan = expand(
            &TEMPLATE,
            &ActiveWindow::default(),
            &BTreeSet::new(),
            &explicit(&["2030-03-05", "2030-03-03", "2030-03-05"]),
            date(TODAY),
        )
        .unwrap();
        assert_eq!(plan.dates, vec![date("2030-03-03"), date("2030-03-05")]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn existing_dates_are_skipped() {
        let existing: BTreeSet<_> = [date("2030-03-03")].into_iter().collect();
        let plan = expand(&TEMPLATE, &ActiveWindow::default(), &existing, &explicit(&["2030-03-03", "2030-03-04"]), date(TODAY)).unwrap();
        assert_eq!(plan.dates, vec![date("2030-03-04")]);
        assert_eq!(plan.skipped, vec![date("2030-03-03")]);
    }

    #[test]
    fn recurring_selects_matching_weekdays() {
        // 2030-03-04 is a Monday.
        let request = ExpansionRequest {
            dates: DateSelection::Recurring {
                from: date("2030-03-04"),
                until: date("2030-03-17"),
                weekdays: vec![DayOfWeek::Monday, DayOfWeek::Friday],
            },
            demand: demand(1),
        };
        let plan = expand(&TEMPLATE, &ActiveWindow::default(), &BTreeSet::new(), &request, date(TODAY)).unwrap();
        assert_eq!(
            plan.dates,
            vec![date("2030-03-04"), date("2030-03-08"), date("2030-03-11"), date("2030-03-15")]
        );
    }

    #[test]
    fn recurring_without_weekdays_takes_every_day() {
        let request = ExpansionRequest {
            dates: DateSelection::Recurring { from: date("2030-03-04"), until: date("2030-03-10"), weekdays: vec![] },
            demand: demand(1),
        };
        let plan = expand(&TEMPLATE, &ActiveWindow::default(), &BTreeSet::new(), &request, date(TODAY)).unwrap();
        assert_eq!(plan.dates.len(), 7);
    }

    #[test]
    fn rejects_dates_outside_window_or_in_past() {
        let window = ActiveWindow { starts_on: Some(date("2030-03-02")), ends_on: Some(date("2030-03-10")) };
        let err = expand(&TEMPLATE, &window, &BTreeSet::new(), &explicit(&["2030-03-11"]), date(TODAY)).unwrap_err();
        assert!(matches!(err, ExpansionError::OutsideWindow { .. }));

        let err = expand(&TEMPLATE, &ActiveWindow::default(), &BTreeSet::new(), &explicit(&["2030-02-28"]), date(TODAY)).unwrap_err();
        assert_eq!(err, ExpansionError::PastDate(date("2030-02-28")));

        assert!(expand(&TEMPLATE, &window, &BTreeSet::new(), &explicit(&["2030-03-10"]), date(TODAY)).is_ok());
    }

    #[test]
    fn window_range_containment() {
        let window = ActiveWindow { starts_on: Some(date("2030-03-01")), ends_on: Some(date("2030-03-10")) };
        assert!(window.contains_range(date("2030-03-01"), date("2030-03-10")));
        assert!(!window.contains_range(date("2030-02-28"), date("2030-03-05")));
        assert!(!window.contains_range(date("2030-03-05"), date("2030-03-11")));
        assert!(ActiveWindow::default().contains_range(date("2000-01-01"), date("2099-12-31")));

        let inverted = ActiveWindow { starts_on: Some(date("2030-03-20")), ends_on: Some(date("2030-03-10")) };
        assert!(!inverted.is_valid());
        assert!(!inverted.contains_range(date("2030-03-12"), date("2030-03-15")));
    }

    #[test]
    fn rejects_bad_demand_and_selection() {
        let mut request = explicit(&["2030-03-05"]);
        request.demand.quantity = 0;
        assert_eq!(expand(&TEMPLATE, &ActiveWindow::default(), &BTreeSet::new(), &request, date(TODAY)).unwrap_err(), ExpansionError::ZeroQuantity);

        let mut request = explicit(&["2030-03-05"]);
        request.demand.salary_override = Some(-5);
        assert_eq!(
            expand(&TEMPLATE, &ActiveWindow::default(), &BTreeSet::new(), &request, date(TODAY)).unwrap_err(),
            ExpansionError::NonPositiveSalaryOverride
        );

        assert_eq!(expand(&TEMPLATE, &ActiveWindow::default(), &BTreeSet::new(), &explicit(&[]), date(TODAY)).unwrap_err(), ExpansionError::EmptySelection);

        let inverted = ExpansionRequest {
            dates: DateSelection::Recurring { from: date("2030-03-10"), until: date("2030-03-01"), weekdays: vec![] },
            demand: demand(1),
        };
        assert!(matches!(expand(&TEMPLATE, &ActiveWindow::default(), &BTreeSet::new(), &inverted, date(TODAY)), Err(ExpansionError::InvertedRange { .. })));
    }

    #[test]
    fn caps_instances_per_call() {
        let request = ExpansionRequest {
            dates: DateSelection::Recurring { from: date("2030-03-01"), until: date("2031-03-05"), weekdays: vec![] },
            demand: demand(1),
        };
        assert_eq!(
            expand(&TEMPLATE, &ActiveWindow::default(), &BTreeSet::new(), &request, date(TODAY)).unwrap_err(),
            ExpansionError::TooManyInstances
        );
    }

    #[test]
    fn request_wire_shape() {
        let request: ExpansionRequest = serde_json::from_value(serde_json::json!({
            "dates": {"mode": "recurring", "from": "2030-03-04", "until": "2030-03-31", "weekdays": ["SATURDAY"]},
            "quantity": 3,
            "gender_requirement": "FEMALE"
        }))
        .unwrap();
        assert_eq!(request.demand.quantity, 3);
        assert_eq!(request.demand.gender_requirement, GenderRequirement::Female);
        assert!(request.demand.salary_override.is_none());
    }
}
