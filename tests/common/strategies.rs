use proptest::prelude::*;
use submission_core::orchestration::ErrorCategory;
use submission_core::state_machine::SubmissionStatus;

/// Subject identifiers shaped like device ids
pub fn subject_id_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{3,5}[0-9]{2}_[0-9]{3}"
}

/// Queue priorities across the trigger range
pub fn priority_strategy() -> impl Strategy<Value = i32> {
    0i32..=2
}

/// (priority, offset in ms from a fixed enqueue instant)
pub fn queue_entries_strategy() -> impl Strategy<Value = Vec<(i32, i64)>> {
    prop::collection::vec((priority_strategy(), 0i64..5_000), 1..40)
}

pub fn error_category_strategy() -> impl Strategy<Value = ErrorCategory> {
    prop_oneof![
        Just(ErrorCategory::Network),
        Just(ErrorCategory::Timeout),
        Just(ErrorCategory::RateLimit),
        Just(ErrorCategory::Authentication),
        Just(ErrorCategory::Authorization),
        Just(ErrorCategory::Validation),
        Just(ErrorCategory::ServerError),
        Just(ErrorCategory::Unknown),
    ]
}

pub fn status_strategy() -> impl Strategy<Value = SubmissionStatus> {
    prop_oneof![
        Just(SubmissionStatus::Pending),
        Just(SubmissionStatus::Submitted),
        Just(SubmissionStatus::Processing),
        Just(SubmissionStatus::Verified),
        Just(SubmissionStatus::Rejected),
        Just(SubmissionStatus::Expired),
        Just(SubmissionStatus::Failed),
    ]
}
