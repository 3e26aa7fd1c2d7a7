use super::{events::SubmissionEvent, states::SubmissionStatus};
use crate::error::{Result, SubmissionError};

/// Resolve the status an event leads to from `current`.
///
/// `Failed` is terminal except for `Requeue`, which the retry sweep uses to
/// re-open submissions that failed transiently.
pub fn determine_target_status(
    current: SubmissionStatus,
    event: &SubmissionEvent,
) -> Result<SubmissionStatus> {
    use SubmissionEvent as E;
    use SubmissionStatus as S;

    let target = match (current, event) {
        // Delivery
        (S::Pending, E::Accept) => S::Submitted,
        (S::Pending, E::ScheduleRetry) => S::Pending,

        // External review
        (S::Submitted, E::StartProcessing) => S::Processing,
        (S::Processing, E::StartProcessing) => S::Processing,
        (S::Submitted | S::Processing, E::Verify) => S::Verified,
        (S::Submitted | S::Processing, E::Reject) => S::Rejected,
        (S::Submitted | S::Processing, E::Expire) => S::Expired,

        // Failure from any pre-terminal state
        (S::Pending | S::Submitted | S::Processing, E::Fail(_)) => S::Failed,

        // Retry sweep
        (S::Failed, E::Requeue) => S::Pending,

        (from, _) => {
            return Err(SubmissionError::StateTransitionError(format!(
                "cannot apply '{}' to a submission in state '{from}'",
                event.event_type()
            )))
        }
    };

    Ok(target)
}

/// Whether `current` may move to `target` through some event
pub fn can_transition(current: SubmissionStatus, target: SubmissionStatus) -> bool {
    match SubmissionEvent::toward(target) {
        Some(event) => determine_target_status(current, &event).is_ok(),
        None => matches!(
            (current, target),
            (SubmissionStatus::Pending, SubmissionStatus::Pending)
                | (SubmissionStatus::Failed, SubmissionStatus::Pending)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut status = SubmissionStatus::Pending;
        for event in [
            SubmissionEvent::Accept,
            SubmissionEvent::StartProcessing,
            SubmissionEvent::Verify,
        ] {
            status = determine_target_status(status, &event).unwrap();
        }
        assert_eq!(status, SubmissionStatus::Verified);
    }

    #[test]
    fn test_terminal_states_reject_events() {
        for terminal in [
            SubmissionStatus::Verified,
            SubmissionStatus::Rejected,
            SubmissionStatus::Expired,
        ] {
            assert!(determine_target_status(terminal, &SubmissionEvent::Accept).is_err());
            assert!(
                determine_target_status(terminal, &SubmissionEvent::Fail("x".into())).is_err()
            );
            assert!(determine_target_status(terminal, &SubmissionEvent::Requeue).is_err());
        }
    }

    #[test]
    fn test_failed_can_only_be_requeued() {
        assert_eq!(
            determine_target_status(SubmissionStatus::Failed, &SubmissionEvent::Requeue).unwrap(),
            SubmissionStatus::Pending
        );
        assert!(determine_target_status(SubmissionStatus::Failed, &SubmissionEvent::Accept).is_err());
    }

    #[test]
    fn test_can_transition() {
        assert!(can_transition(
            SubmissionStatus::Submitted,
            SubmissionStatus::Processing
        ));
        assert!(can_transition(
            SubmissionStatus::Processing,
            SubmissionStatus::Rejected
        ));
        assert!(!can_transition(
            SubmissionStatus::Verified,
            SubmissionStatus::Processing
        ));
        assert!(!can_transition(
            SubmissionStatus::Submitted,
            SubmissionStatus::Pending
        ));
        assert!(!can_transition(
            SubmissionStatus::Pending,
            SubmissionStatus::Verified
        ));
    }
}
