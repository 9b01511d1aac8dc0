//! Application lifecycle: who may move an application where, and when.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::worker::{MAX_RELIABILITY_SCORE, MIN_RELIABILITY_SCORE};
use crate::model::{JobPostingStatus, ProfileStatus, RelationshipType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
    NoShow,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Cancelled => "cancelled",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::NoShow => "no_show",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Pending or accepted; at most one active application per worker and
    /// shift.
    pub fn is_active(&self) -> bool {
        matches!(self, ApplicationStatus::Pending | ApplicationStatus::Accepted)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pending" => Ok(ApplicationStatus::Pending),
            "accepted" => Ok(ApplicationStatus::Accepted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "cancelled" => Ok(ApplicationStatus::Cancelled),
            "completed" => Ok(ApplicationStatus::Completed),
            "no_show" => Ok(ApplicationStatus::NoShow),
            other => Err(format!("unknown application status {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationAction {
    Accept,
    Reject,
    Cancel,
    Complete,
    NoShow,
}

impl ApplicationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationAction::Accept => "accept",
            ApplicationAction::Reject => "reject",
            ApplicationAction::Cancel => "cancel",
            ApplicationAction::Complete => "complete",
            ApplicationAction::NoShow => "no_show",
        }
    }
}

impl fmt::Display for ApplicationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side acting on an application. Admins act as employers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Worker,
    Employer,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Actor::Worker => "worker",
            Actor::Employer => "employer",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShiftCapacity {
    pub quantity: i32,
    pub accepted: i32,
}

impl ShiftCapacity {
    pub fn remaining(&self) -> i32 {
        (self.quantity - self.accepted).max(0)
    }

    pub fn has_room(&self) -> bool {
        self.accepted < self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("a {actor} cannot {action} an application")]
    NotPermitted { actor: Actor, action: ApplicationAction },
    #[error("cannot {action} an application that is {status}")]
    InvalidTransition {
        status: ApplicationStatus,
        action: ApplicationAction,
    },
    #[error("the shift has already started")]
    ShiftStarted,
    #[error("the shift has not started yet")]
    ShiftNotStarted,
    #[error("the shift is full ({}/{} accepted)", .0.accepted, .0.quantity)]
    CapacityReached(ShiftCapacity),
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
    pub now: NaiveDateTime,
    pub shift_start: NaiveDateTime,
    pub capacity: ShiftCapacity,
}

fn permitted(actor: Actor, action: ApplicationAction) -> bool {
    match actor {
        Actor::Employer => true,
        Actor::Worker => action == ApplicationAction::Cancel,
    }
}

fn target(
    status: ApplicationStatus,
    action: ApplicationAction,
    actor: Actor,
) -> Option<ApplicationStatus> {
    use ApplicationAction as A;
    use ApplicationStatus as S;
    match (status, action, actor) {
        (S::Pending, A::Accept, _) => Some(S::Accepted),
        (S::Pending, A::Reject, _) => Some(S::Rejected),
        (S::Pending, A::Cancel, Actor::Worker) => Some(S::Cancelled),
        (S::Accepted, A::Cancel, _) => Some(S::Cancelled),
        (S::Accepted, A::Complete, _) => Some(S::Completed),
        (S::Accepted, A::NoShow, _) => Some(S::NoShow),
        _ => None,
    }
}

/// Validates `action` by `actor` on an application in `current` and returns
/// the new status.
pub fn transition(
    current: ApplicationStatus,
    action: ApplicationAction,
    actor: Actor,
    ctx: &TransitionContext,
) -> Result<ApplicationStatus, TransitionError> {
    if !permitted(actor, action) {
        return Err(TransitionError::NotPermitted { actor, action });
    }
    let next = target(current, action, actor).ok_or(TransitionError::InvalidTransition {
        status: current,
        action,
    })?;

    let started = ctx.now >= ctx.shift_start;
    match action {
        ApplicationAction::Accept | ApplicationAction::Cancel if started => {
            return Err(TransitionError::ShiftStarted);
        }
        ApplicationAction::Complete | ApplicationAction::NoShow if !started => {
            return Err(TransitionError::ShiftNotStarted);
        }
        _ => {}
    }

    if action == ApplicationAction::Accept && !ctx.capacity.has_room() {
        return Err(TransitionError::CapacityReached(ctx.capacity));
    }

    Ok(next)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("this organization does not accept applications from you")]
    Blocked,
    #[error("your worker profile is suspended")]
    Suspended,
    #[error("your account is inactive")]
    InactiveUser,
    #[error("the shift has already started")]
    ShiftStarted,
    #[error("the posting is not open for applications ({})", .0.as_ref())]
    PostingNotOpen(JobPostingStatus),
    #[error("the shift is full")]
    Full,
    #[error("you already have an active application for this shift")]
    AlreadyApplied,
    #[error("your previous application for this shift was rejected")]
    PreviouslyRejected,
    #[error("not eligible for this shift: {}", .0.join("; "))]
    Ineligible(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct AdmissionContext {
    pub now: NaiveDateTime,
    pub shift_start: NaiveDateTime,
    pub posting_status: JobPostingStatus,
    pub capacity: ShiftCapacity,
    pub user_active: bool,
    pub profile_status: ProfileStatus,
    pub relationship: Option<RelationshipType>,
    /// Statuses of this worker's earlier applications to the same shift.
    pub prior_statuses: Vec<ApplicationStatus>,
}

/// Gate for creating a new application. Eligibility checks (gender,
/// availability, double booking) run separately.
pub fn admit(ctx: &AdmissionContext) -> Result<(), AdmissionError> {
    if ctx.relationship == Some(RelationshipType::Blocked) {
        return Err(AdmissionError::Blocked);
    }
    if !ctx.user_active {
        return Err(AdmissionError::InactiveUser);
    }
    if ctx.profile_status == ProfileStatus::Suspended {
        return Err(AdmissionError::Suspended);
    }
    if ctx.posting_status != JobPostingStatus::Published {
        return Err(AdmissionError::PostingNotOpen(ctx.posting_status));
    }
    if ctx.now >= ctx.shift_start {
        return Err(AdmissionError::ShiftStarted);
    }
    if ctx.prior_statuses.iter().any(ApplicationStatus::is_active) {
        return Err(AdmissionError::AlreadyApplied);
    }
    if ctx.prior_statuses.contains(&ApplicationStatus::Rejected) {
        return Err(AdmissionError::PreviouslyRejected);
    }
    if !ctx.capacity.has_room() {
        return Err(AdmissionError::Full);
    }
    Ok(())
}

/// Counter changes applied to the worker when an application settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliabilityDelta {
    pub score: i32,
    pub completed: i32,
    pub no_shows: i32,
}

impl ReliabilityDelta {
    pub fn for_status(status: ApplicationStatus) -> Option<Self> {
        match status {
            ApplicationStatus::Completed => Some(Self { score: 1, completed: 1, no_shows: 0 }),
            ApplicationStatus::NoShow => Some(Self { score: -10, completed: 0, no_shows: 1 }),
            _ => None,
        }
    }

    pub fn apply_to(&self, score: i32) -> i32 {
        (score + self.score).clamp(MIN_RELIABILITY_SCORE, MAX_RELIABILITY_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 3, 4).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn ctx(now_hour: u32, accepted: i32) -> TransitionContext {
        TransitionContext {
            now: at(now_hour),
            shift_start: at(9),
            capacity: ShiftCapacity { quantity: 2, accepted },
        }
    }

    use ApplicationAction as A;
    use ApplicationStatus as S;

    #[test]
    fn employer_accepts_and_rejects_pending() {
        assert_eq!(transition(S::Pending, A::Accept, Actor::Employer, &ctx(7, 0)), Ok(S::Accepted));
        assert_eq!(transition(S::Pending, A::Reject, Actor::Employer, &ctx(7, 2)), Ok(S::Rejected));
    }

    #[test]
    fn accept_respects_capacity() {
        assert_eq!(
            transition(S::Pending, A::Accept, Actor::Employer, &ctx(7, 2)),
            Err(TransitionError::CapacityReached(ShiftCapacity { quantity: 2, accepted: 2 }))
        );
    }

    #[test]
    fn workers_can_only_cancel() {
        assert!(matches!(
            transition(S::Pending, A::Accept, Actor::Worker, &ctx(7, 0)),
            Err(TransitionError::NotPermitted { .. })
        ));
        assert_eq!(transition(S::Pending, A::Cancel, Actor::Worker, &ctx(7, 0)), Ok(S::Cancelled));
        assert_eq!(transition(S::Accepted, A::Cancel, Actor::Worker, &ctx(7, 0)), Ok(S::Cancelled));
    }

    #[test]
    fn employer_cancels_only_accepted() {
        assert_eq!(transition(S::Accepted, A::Cancel, Actor::Employer, &ctx(7, 1)), Ok(S::Cancelled));
        assert!(matches!(
            transition(S::Pending, A::Cancel, Actor::Employer, &ctx(7, 0)),
            Err(TransitionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn start_time_gates_cancel_accept_and_attendance() {
        assert_eq!(transition(S::Accepted, A::Cancel, Actor::Worker, &ctx(9, 1)), Err(TransitionError::ShiftStarted));
        assert_eq!(transition(S::Pending, A::Accept, Actor::Employer, &ctx(10, 0)), Err(TransitionError::ShiftStarted));
        assert_eq!(transition(S::Accepted, A::Complete, Actor::Employer, &ctx(8, 1)), Err(TransitionError::ShiftNotStarted));
        assert_eq!(transition(S::Accepted, A::Complete, Actor::Employer, &ctx(18, 1)), Ok(S::Completed));
        assert_eq!(transition(S::Accepted, A::NoShow, Actor::Employer, &ctx(9, 1)), Ok(S::NoShow));
    }

    #[test]
    fn terminal_states_do_not_move() {
        for status in [S::Rejected, S::Cancelled, S::Completed, S::NoShow] {
            assert!(status.is_terminal());
            for action in [A::Accept, A::Reject, A::Cancel, A::Complete, A::NoShow] {
                assert!(transition(status, action, Actor::Employer, &ctx(7, 0)).is_err());
            }
        }
    }

    #[test]
    fn status_text_round_trips() {
        for status in [S::Pending, S::Accepted, S::Rejected, S::Cancelled, S::Completed, S::NoShow] {
            assert_eq!(status.as_str().parse::<S>().unwrap(), status);
        }
        assert!("canceled".parse::<S>().is_err());
    }

    fn admission() -> AdmissionContext {
        AdmissionContext {
            now: at(7),
            shift_start: at(9),
            posting_status: JobPostingStatus::Published,
            capacity: ShiftCapacity { quantity: 2, accepted: 0 },
            user_active: true,
            profile_status: ProfileStatus::Public,
            relationship: None,
            prior_statuses: vec![],
        }
    }

    #[test]
    fn admits_a_clean_application() {
        assert_eq!(admit(&admission()), Ok(()));
    }

    #[test]
    fn admission_refusals() {
        let mut c = admission();
        c.relationship = Some(RelationshipType::Blocked);
        assert_eq!(admit(&c), Err(AdmissionError::Blocked));

        let mut c = admission();
        c.profile_status = ProfileStatus::Suspended;
        assert_eq!(admit(&c), Err(AdmissionError::Suspended));

        let mut c = admission();
        c.user_active = false;
        assert_eq!(admit(&c), Err(AdmissionError::InactiveUser));

        let mut c = admission();
        c.posting_status = JobPostingStatus::Draft;
        assert_eq!(admit(&c), Err(AdmissionError::PostingNotOpen(JobPostingStatus::Draft)));

        let mut c = admission();
        c.now = at(9);
        assert_eq!(admit(&c), Err(AdmissionError::ShiftStarted));

        let mut c = admission();
        c.capacity.accepted = 2;
        assert_eq!(admit(&c), Err(AdmissionError::Full));
    }

    #[test]
    fn reapply_after_cancel_but_not_after_reject() {
        let mut c = admission();
        c.prior_statuses = vec![S::Cancelled];
        assert_eq!(admit(&c), Ok(()));

        c.prior_statuses = vec![S::Cancelled, S::Pending];
        assert_eq!(admit(&c), Err(AdmissionError::AlreadyApplied));

        c.prior_statuses = vec![S::Rejected];
        assert_eq!(admit(&c), Err(AdmissionError::PreviouslyRejected));
    }

    #[test]
    fn reliability_is_clamped() {
        let completed = ReliabilityDelta::for_status(S::Completed).unwrap();
        assert_eq!(completed.apply_to(100), 101);
        assert_eq!(completed.apply_to(200), 200);
        let no_show = ReliabilityDelta::for_status(S::NoShow).unwrap();
        assert_eq!(no_show.apply_to(100), 90);
        assert_eq!(no_show.apply_to(5), 0);
        assert!(ReliabilityDelta::for_status(S::Cancelled).is_none());
    }
}
