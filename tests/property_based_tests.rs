mod common;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::strategies::*;
use proptest::prelude::*;
use std::time::Duration;
use submission_core::config::RetryConfig;
use submission_core::models::{QueuedSubmission, SubmissionKey, SubmissionTrigger};
use submission_core::orchestration::{RetryPolicy, SubmissionQueue};
use submission_core::state_machine::{can_transition, SubmissionStatus};

proptest! {
    /// Property: dequeue order is priority descending, then enqueue time ascending
    #[test]
    fn queue_dequeues_by_priority_then_time(entries in queue_entries_strategy()) {
        let queue = SubmissionQueue::new();
        let base = Utc.with_ymd_and_hms(2024, 1, 16, 1, 0, 0).unwrap();
        for (i, (priority, offset_ms)) in entries.iter().enumerate() {
            let key = SubmissionKey::new(format!("subject_{i}"), base, "policy_abc");
            let mut item = QueuedSubmission::new(key, SubmissionTrigger::Manual, *priority);
            item.enqueued_at = base + ChronoDuration::milliseconds(*offset_ms);
            prop_assert!(queue.enqueue(item));
        }

        let drained: Vec<QueuedSubmission> = std::iter::from_fn(|| queue.dequeue()).collect();
        prop_assert_eq!(drained.len(), entries.len());
        for pair in drained.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(
                a.priority > b.priority
                    || (a.priority == b.priority && a.enqueued_at <= b.enqueued_at),
                "{:?} dequeued before {:?}", (a.priority, a.enqueued_at), (b.priority, b.enqueued_at)
            );
        }
    }

    /// Property: at most one live item per key no matter how often it is enqueued
    #[test]
    fn queue_holds_one_item_per_key(
        subjects in prop::collection::vec(subject_id_strategy(), 1..30)
    ) {
        let queue = SubmissionQueue::new();
        let period = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        for subject in &subjects {
            queue.enqueue(QueuedSubmission::new(
                SubmissionKey::new(subject.as_str(), period, "policy_abc"),
                SubmissionTrigger::Schedule,
                1,
            ));
        }
        let unique: std::collections::HashSet<&String> = subjects.iter().collect();
        prop_assert_eq!(queue.len(), unique.len());
    }

    /// Property: backoff never drops below the base delay nor exceeds the jittered cap
    #[test]
    fn backoff_stays_within_bounds(
        attempt in 0u32..64,
        category in error_category_strategy(),
    ) {
        let policy = RetryPolicy::new(RetryConfig::default());
        let delay = policy.delay(attempt, category);
        prop_assert!(delay >= Duration::from_secs(1));
        prop_assert!(delay <= Duration::from_secs(72));
    }

    /// Property: without jitter, delays never shrink as attempts grow
    #[test]
    fn backoff_is_monotonic_without_jitter(
        attempt in 0u32..32,
        category in error_category_strategy(),
    ) {
        let policy = RetryPolicy::new(RetryConfig {
            jitter_enabled: false,
            ..RetryConfig::default()
        });
        prop_assert!(policy.delay(attempt, category) <= policy.delay(attempt + 1, category));
    }

    /// Property: nothing leaves a terminal state except a requeued failure
    #[test]
    fn terminal_states_only_reopen_from_failed(
        from in status_strategy(),
        to in status_strategy(),
    ) {
        if from.is_terminal() && from != to && can_transition(from, to) {
            prop_assert_eq!(from, SubmissionStatus::Failed);
            prop_assert_eq!(to, SubmissionStatus::Pending);
        }
    }
}
