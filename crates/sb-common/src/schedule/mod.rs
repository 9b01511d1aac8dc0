//! Pure scheduling logic: availability, shift expansion, eligibility and the
//! application lifecycle. Nothing in here touches the database.

pub mod application;
pub mod availability;
pub mod eligibility;
pub mod expander;
pub mod time;

pub use application::{
    admit, transition, Actor, AdmissionContext, AdmissionError, ApplicationAction,
    ApplicationStatus, ReliabilityDelta, ShiftCapacity, TransitionContext, TransitionError,
};
pub use availability::{Availability, AvailabilityError, AvailabilitySet, DatedSlot, DayOfWeek, WeeklySlot};
pub use eligibility::{
    eligible_shifts, evaluate, rank_candidates, CheckDecision, EligibilityPolicy,
    EligibilityResult, EligibleShift, RankedCandidate, ShiftSnapshot, WorkerSnapshot,
};
pub use expander::{
    expand, ActiveWindow, DateSelection, ExpansionError, ExpansionPlan, ExpansionRequest,
    ShiftDemand, ShiftTemplate,
};
pub use time::{ShiftInterval, TimeError, TimeOfDay, TimeWindow};
