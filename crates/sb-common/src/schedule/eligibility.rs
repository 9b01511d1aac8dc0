use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::availability::AvailabilitySet;
use super::time::ShiftInterval;
use crate::model::{Gender, GenderRequirement, JobPostingStatus, ProfileStatus, RelationshipType};

/// Outcome of one check. `Knockout` excludes the pair outright; `Review`
/// keeps it but flags it for the employer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum CheckDecision {
    Knockout(String),
    Review(String),
    Pass,
}

impl CheckDecision {
    fn knockout(reason: impl Into<String>) -> Self {
        Self::Knockout(reason.into())
    }

    fn review(reason: impl Into<String>) -> Self {
        Self::Review(reason.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityResult {
    pub is_knockout: bool,
    pub needs_review: bool,
    pub decisions: Vec<(&'static str, CheckDecision)>,
}

impl EligibilityResult {
    pub fn new(decisions: Vec<(&'static str, CheckDecision)>) -> Self {
        let is_knockout = decisions
            .iter()
            .any(|(_, d)| matches!(d, CheckDecision::Knockout(_)));
        let needs_review = decisions
            .iter()
            .any(|(_, d)| matches!(d, CheckDecision::Review(_)));
        Self { is_knockout, needs_review, decisions }
    }

    pub fn knockout_reasons(&self) -> Vec<String> {
        self.decisions
            .iter()
            .filter_map(|(_, d)| match d {
                CheckDecision::Knockout(reason) => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn review_reasons(&self) -> Vec<String> {
        self.decisions
            .iter()
            .filter_map(|(_, d)| match d {
                CheckDecision::Review(reason) => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn review_count(&self) -> usize {
        self.decisions
            .iter()
            .filter(|(_, d)| matches!(d, CheckDecision::Review(_)))
            .count()
    }
}

/// Everything the checks need to know about one shift instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftSnapshot {
    pub shift_date_id: i64,
    pub posting_id: i64,
    pub organization_id: i64,
    pub posting_status: JobPostingStatus,
    pub position_id: i64,
    pub province_code: Option<String>,
    pub interval: ShiftInterval,
    pub quantity: i32,
    pub accepted: i32,
    pub gender_requirement: GenderRequirement,
    /// Salary override when set, otherwise the template salary.
    pub salary: i64,
}

impl ShiftSnapshot {
    pub fn remaining(&self) -> i32 {
        (self.quantity - self.accepted).max(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSnapshot {
    pub worker_id: i64,
    pub status: ProfileStatus,
    pub gender: Option<Gender>,
    pub preferred_positions: Vec<i64>,
    pub preferred_locations: Vec<String>,
    pub expected_salary: i64,
    pub reliability_score: i32,
    pub availability: AvailabilitySet,
    /// Relationship tags keyed by organization id.
    pub relationships: HashMap<i64, RelationshipType>,
    /// `(shift_date_id, interval)` of every shift the worker is accepted on.
    pub accepted_shifts: Vec<(i64, ShiftInterval)>,
}

impl WorkerSnapshot {
    pub fn relationship_with(&self, organization_id: i64) -> RelationshipType {
        self.relationships
            .get(&organization_id)
            .copied()
            .unwrap_or(RelationshipType::Normal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityPolicy {
    /// Missing availability knocks a worker out instead of flagging it.
    pub require_availability: bool,
    pub max_candidates: usize,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            require_availability: true,
            max_candidates: 100,
        }
    }
}

/// Runs every check for one worker/shift pair.
pub fn evaluate(
    shift: &ShiftSnapshot,
    worker: &WorkerSnapshot,
    policy: &EligibilityPolicy,
    now: NaiveDateTime,
) -> EligibilityResult {
    let decisions = vec![
        ("relationship", check_relationship(shift, worker)),
        ("profile", check_profile(worker)),
        ("posting", check_posting(shift, now)),
        ("capacity", check_capacity(shift)),
        ("gender", check_gender(shift, worker)),
        ("availability", check_availability(shift, worker, policy)),
        ("double_booking", check_double_booking(shift, worker)),
        ("position", check_position(shift, worker)),
        ("location", check_location(shift, worker)),
        ("salary", check_salary(shift, worker)),
    ];
    EligibilityResult::new(decisions)
}

fn check_relationship(shift: &ShiftSnapshot, worker: &WorkerSnapshot) -> CheckDecision {
    match worker.relationship_with(shift.organization_id) {
        RelationshipType::Blocked => CheckDecision::knockout("blocked: worker is blocked by this organization"),
        RelationshipType::Restricted => CheckDecision::review("restricted: worker is restricted by this organization"),
        RelationshipType::Favorite | RelationshipType::Normal => CheckDecision::Pass,
    }
}

fn check_profile(worker: &WorkerSnapshot) -> CheckDecision {
    if worker.status == ProfileStatus::Suspended {
        CheckDecision::knockout("suspended: worker profile is suspended")
    } else {
        CheckDecision::Pass
    }
}

fn check_posting(shift: &ShiftSnapshot, now: NaiveDateTime) -> CheckDecision {
    if shift.posting_status != JobPostingStatus::Published {
        return CheckDecision::knockout(format!(
            "posting_not_open: posting is {}",
            shift.posting_status.as_ref()
        ));
    }
    if shift.interval.has_started(now) {
        return CheckDecision::knockout("shift_started: shift has already started");
    }
    CheckDecision::Pass
}

fn check_capacity(shift: &ShiftSnapshot) -> CheckDecision {
    if shift.remaining() == 0 {
        CheckDecision::knockout(format!(
            "shift_full: {}/{} accepted",
            shift.accepted, shift.quantity
        ))
    } else {
        CheckDecision::Pass
    }
}

fn check_gender(shift: &ShiftSnapshot, worker: &WorkerSnapshot) -> CheckDecision {
    match shift.gender_requirement.accepts(worker.gender) {
        Some(true) => CheckDecision::Pass,
        Some(false) => CheckDecision::knockout(format!(
            "gender_mismatch: shift requires {}",
            shift.gender_requirement.as_ref()
        )),
        None => CheckDecision::review("gender_unknown: worker has not set a gender"),
    }
}

fn check_availability(
    shift: &ShiftSnapshot,
    worker: &WorkerSnapshot,
    policy: &EligibilityPolicy,
) -> CheckDecision {
    if worker.availability.covers(&shift.interval) {
        return CheckDecision::Pass;
    }
    let reason = if worker.availability.is_empty() {
        "availability_missing: worker has not declared availability"
    } else {
        "availability_uncovered: shift falls outside declared availability"
    };
    if policy.require_availability {
        CheckDecision::knockout(reason)
    } else {
        CheckDecision::review(reason)
    }
}

fn check_double_booking(shift: &ShiftSnapshot, worker: &WorkerSnapshot) -> CheckDecision {
    for (shift_date_id, interval) in &worker.accepted_shifts {
        if *shift_date_id == shift.shift_date_id {
            return CheckDecision::knockout("already_accepted: worker is already on this shift");
        }
        if interval.overlaps(&shift.interval) {
            return CheckDecision::knockout(format!(
                "double_booked: overlaps accepted shift {shift_date_id}"
            ));
        }
    }
    CheckDecision::Pass
}

fn check_position(shift: &ShiftSnapshot, worker: &WorkerSnapshot) -> CheckDecision {
    if worker.preferred_positions.is_empty() || worker.preferred_positions.contains(&shift.position_id) {
        CheckDecision::Pass
    } else {
        CheckDecision::review("position_mismatch: position is not among the worker's preferences")
    }
}

fn check_location(shift: &ShiftSnapshot, worker: &WorkerSnapshot) -> CheckDecision {
    let Some(province) = shift.province_code.as_deref().map(str::trim) else {
        return CheckDecision::Pass;
    };
    if worker.preferred_locations.is_empty()
        || worker
            .preferred_locations
            .iter()
            .any(|code| code.trim().eq_ignore_ascii_case(province))
    {
        CheckDecision::Pass
    } else {
        CheckDecision::review("location_mismatch: province is not among the worker's preferences")
    }
}

fn check_salary(shift: &ShiftSnapshot, worker: &WorkerSnapshot) -> CheckDecision {
    if shift.salary < worker.expected_salary {
        CheckDecision::review(format!(
            "salary_below_expectation: {} < {}",
            shift.salary, worker.expected_salary
        ))
    } else {
        CheckDecision::Pass
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub worker_id: i64,
    pub relationship: RelationshipType,
    pub reliability_score: i32,
    pub result: EligibilityResult,
}

fn compare_candidates(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    a.relationship
        .tier()
        .cmp(&b.relationship.tier())
        .then_with(|| a.result.review_count().cmp(&b.result.review_count()))
        .then_with(|| b.reliability_score.cmp(&a.reliability_score))
        .then_with(|| a.worker_id.cmp(&b.worker_id))
}

/// Workers an employer can offer `shift` to, best first.
///
/// Restricted workers are only listed when favorites and normal workers
/// together cannot fill the remaining slots.
pub fn rank_candidates(
    shift: &ShiftSnapshot,
    workers: &[WorkerSnapshot],
    policy: &EligibilityPolicy,
    now: NaiveDateTime,
) -> Vec<RankedCandidate> {
    let mut candidates: Vec<RankedCandidate> = workers
        .iter()
        .filter_map(|worker| {
            let result = evaluate(shift, worker, policy, now);
            (!result.is_knockout).then(|| RankedCandidate {
                worker_id: worker.worker_id,
                relationship: worker.relationship_with(shift.organization_id),
                reliability_score: worker.reliability_score,
                result,
            })
        })
        .collect();

    let primary = candidates
        .iter()
        .filter(|c| c.relationship != RelationshipType::Restricted)
        .count();
    if primary >= shift.remaining() as usize {
        candidates.retain(|c| c.relationship != RelationshipType::Restricted);
    }

    candidates.sort_by(compare_candidates);
    candidates.truncate(policy.max_candidates);
    candidates
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibleShift {
    pub shift_date_id: i64,
    pub interval: ShiftInterval,
    pub result: EligibilityResult,
}

/// Shifts `worker` could apply to, ordered by start time.
pub fn eligible_shifts(
    worker: &WorkerSnapshot,
    shifts: &[ShiftSnapshot],
    policy: &EligibilityPolicy,
    now: NaiveDateTime,
) -> Vec<EligibleShift> {
    let mut eligible: Vec<EligibleShift> = shifts
        .iter()
        .filter_map(|shift| {
            let result = evaluate(shift, worker, policy, now);
            (!result.is_knockout).then(|| EligibleShift {
                shift_date_id: shift.shift_date_id,
                interval: shift.interval,
                result,
            })
        })
        .collect();
    eligible.sort_by(|a, b| {
        a.interval
            .start
            .cmp(&b.interval.start)
            .then_with(|| a.shift_date_id.cmp(&b.shift_date_id))
    });
    eligible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::availability::{Availability, DayOfWeek, WeeklySlot};
    use chrono::NaiveDate;

    const ORG: i64 = 7;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn at(day: &str, hour: u32) -> NaiveDateTime {
        date(day).and_hms_opt(hour, 0, 0).unwrap()
    }

    // 2030-03-04 is a Monday.
    fn shift() -> ShiftSnapshot {
        ShiftSnapshot {
            shift_date_id: 1,
            posting_id: 10,
            organization_id: ORG,
            posting_status: JobPostingStatus::Published,
            position_id: 3,
            province_code: Some("79".into()),
            interval: ShiftInterval { start: at("2030-03-04", 9), end: at("2030-03-04", 13) },
            quantity: 2,
            accepted: 0,
            gender_requirement: GenderRequirement::Any,
            salary: 250_000,
        }
    }

    fn monday_availability() -> AvailabilitySet {
        AvailabilitySet::new(&[Availability::WeeklyPattern {
            weekly_pattern: vec![WeeklySlot {
                day: DayOfWeek::Monday,
                from: "08:00".parse().unwrap(),
                to: "18:00".parse().unwrap(),
            }],
        }])
        .unwrap()
    }

    fn worker(id: i64) -> WorkerSnapshot {
        WorkerSnapshot {
            worker_id: id,
            status: ProfileStatus::Public,
            gender: Some(Gender::Female),
            preferred_positions: vec![3],
            preferred_locations: vec!["79".into()],
            expected_salary: 200_000,
            reliability_score: 100,
            availability: monday_availability(),
            relationships: HashMap::new(),
            accepted_shifts: vec![],
        }
    }

    fn tagged(id: i64, tag: RelationshipType) -> WorkerSnapshot {
        let mut w = worker(id);
        w.relationships.insert(ORG, tag);
        w
    }

    fn now() -> NaiveDateTime {
        at("2030-03-01", 12)
    }

    fn decision<'a>(result: &'a EligibilityResult, name: &str) -> &'a CheckDecision {
        &result.decisions.iter().find(|(n, _)| *n == name).unwrap().1
    }

    #[test]
    fn clean_pair_passes_every_check() {
        let result = evaluate(&shift(), &worker(1), &EligibilityPolicy::default(), now());
        assert!(!result.is_knockout);
        assert!(!result.needs_review);
    }

    #[test]
    fn blocked_is_knockout_and_restricted_is_review() {
        let policy = EligibilityPolicy::default();
        let blocked = evaluate(&shift(), &tagged(1, RelationshipType::Blocked), &policy, now());
        assert!(blocked.is_knockout);
        let restricted = evaluate(&shift(), &tagged(1, RelationshipType::Restricted), &policy, now());
        assert!(!restricted.is_knockout);
        assert!(restricted.needs_review);
    }

    #[test]
    fn relationship_with_other_organization_is_ignored() {
        let mut w = worker(1);
        w.relationships.insert(ORG + 1, RelationshipType::Blocked);
        assert!(!evaluate(&shift(), &w, &EligibilityPolicy::default(), now()).is_knockout);
    }

    #[test]
    fn closed_posting_started_shift_and_full_shift_knock_out() {
        let policy = EligibilityPolicy::default();
        let mut closed = shift();
        closed.posting_status = JobPostingStatus::Closed;
        assert!(evaluate(&closed, &worker(1), &policy, now()).is_knockout);

        let started = evaluate(&shift(), &worker(1), &policy, at("2030-03-04", 9));
        assert!(matches!(decision(&started, "posting"), CheckDecision::Knockout(_)));

        let mut full = shift();
        full.accepted = 2;
        assert!(matches!(decision(&evaluate(&full, &worker(1), &policy, now()), "capacity"), CheckDecision::Knockout(_)));
    }

    #[test]
    fn gender_requirement() {
        let policy = EligibilityPolicy::default();
        let mut male_only = shift();
        male_only.gender_requirement = GenderRequirement::Male;
        assert!(evaluate(&male_only, &worker(1), &policy, now()).is_knockout);

        let mut unknown = worker(1);
        unknown.gender = None;
        let result = evaluate(&male_only, &unknown, &policy, now());
        assert!(!result.is_knockout);
        assert!(matches!(decision(&result, "gender"), CheckDecision::Review(_)));
    }

    #[test]
    fn availability_follows_policy() {
        let mut busy = worker(1);
        busy.availability = AvailabilitySet::default();
        let strict = EligibilityPolicy::default();
        assert!(evaluate(&shift(), &busy, &strict, now()).is_knockout);

        let lenient = EligibilityPolicy { require_availability: false, ..strict };
        let result = evaluate(&shift(), &busy, &lenient, now());
        assert!(!result.is_knockout);
        assert!(result.review_reasons()[0].starts_with("availability_missing"));
    }

    #[test]
    fn overlapping_accepted_shift_knocks_out() {
        let mut booked = worker(1);
        booked.accepted_shifts = vec![(99, ShiftInterval { start: at("2030-03-04", 12), end: at("2030-03-04", 16) })];
        let result = evaluate(&shift(), &booked, &EligibilityPolicy::default(), now());
        assert!(result.knockout_reasons()[0].starts_with("double_booked"));

        booked.accepted_shifts = vec![(99, ShiftInterval { start: at("2030-03-04", 13), end: at("2030-03-04", 16) })];
        assert!(!evaluate(&shift(), &booked, &EligibilityPolicy::default(), now()).is_knockout);
    }

    #[test]
    fn preference_mismatches_are_reviews() {
        let mut picky = worker(1);
        picky.preferred_positions = vec![4];
        picky.preferred_locations = vec!["01".into()];
        picky.expected_salary = 300_000;
        let result = evaluate(&shift(), &picky, &EligibilityPolicy::default(), now());
        assert!(!result.is_knockout);
        assert_eq!(result.review_count(), 3);
    }

    #[test]
    fn ranking_orders_by_tier_then_reviews_then_reliability() {
        let mut reliable = worker(4);
        reliable.reliability_score = 150;
        let mut off_preference = worker(2);
        off_preference.reliability_score = 200;
        off_preference.preferred_positions = vec![99];
        let workers = vec![
            worker(5),
            off_preference,
            tagged(3, RelationshipType::Favorite),
            reliable,
            tagged(6, RelationshipType::Blocked),
        ];
        let ranked = rank_candidates(&shift(), &workers, &EligibilityPolicy::default(), now());
        let ids: Vec<i64> = ranked.iter().map(|c| c.worker_id).collect();
        assert_eq!(ids, vec![3, 4, 5, 2]);
    }

    #[test]
    fn restricted_only_when_short_of_people() {
        let policy = EligibilityPolicy::default();
        let enough = vec![worker(1), worker(2), tagged(3, RelationshipType::Restricted)];
        let ids: Vec<i64> = rank_candidates(&shift(), &enough, &policy, now()).iter().map(|c| c.worker_id).collect();
        assert_eq!(ids, vec![1, 2]);

        let short = vec![worker(1), tagged(3, RelationshipType::Restricted)];
        let ids: Vec<i64> = rank_candidates(&shift(), &short, &policy, now()).iter().map(|c| c.worker_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn ranking_truncates_to_max_candidates() {
        let workers: Vec<_> = (1..=10).map(worker).collect();
        let policy = EligibilityPolicy { max_candidates: 3, ..EligibilityPolicy::default() };
        assert_eq!(rank_candidates(&shift(), &workers, &policy, now()).len(), 3);
    }

    #[test]
    fn eligible_shifts_sorted_by_start() {
        let mut later = shift();
        later.shift_date_id = 2;
        later.interval = ShiftInterval { start: at("2030-03-04", 14), end: at("2030-03-04", 17) };
        let mut blocked_org = shift();
        blocked_org.shift_date_id = 3;
        blocked_org.organization_id = ORG + 1;

        let mut w = worker(1);
        w.relationships.insert(ORG + 1, RelationshipType::Blocked);

        let shifts = vec![later, shift(), blocked_org];
        let ids: Vec<i64> = eligible_shifts(&w, &shifts, &EligibilityPolicy::default(), now())
            .iter()
            .map(|s| s.shift_date_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
