// Submission lifecycle state machine
//
// PENDING -> SUBMITTED -> PROCESSING -> {VERIFIED | REJECTED | EXPIRED}, with
// FAILED reachable from every pre-terminal state.

pub mod events;
pub mod states;
pub mod transitions;

pub use events::SubmissionEvent;
pub use states::SubmissionStatus;
pub use transitions::{can_transition, determine_target_status};
