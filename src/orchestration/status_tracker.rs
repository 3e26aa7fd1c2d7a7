//! # Status Tracker
//!
//! Latest known record per submission key, indexed by external document id
//! for status polling. Every recorded change is written through to the
//! [`SubmissionRepository`]; persistence failures are logged and never fail
//! the delivery path.
//!
//! Status changes go through the submission state machine: a record whose
//! status cannot follow the current one is refused.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::operations;
use crate::error::{Result, SubmissionError};
use crate::logging::log_error;
use crate::models::{HistoryFilter, SubmissionKey, SubmissionResult};
use crate::resilience::{GuardError, ResilienceGuard};
use crate::services::{ExternalService, SubmissionRepository};
use crate::state_machine::{can_transition, determine_target_status, SubmissionEvent, SubmissionStatus};

pub struct StatusTracker {
    records: DashMap<SubmissionKey, SubmissionResult>,
    external_index: DashMap<String, SubmissionKey>,
    repository: Arc<dyn SubmissionRepository>,
    service: Arc<dyn ExternalService>,
    guard: ResilienceGuard,
}

impl std::fmt::Debug for StatusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusTracker")
            .field("records", &self.records.len())
            .field("external_ids", &self.external_index.len())
            .finish()
    }
}

impl StatusTracker {
    pub fn new(
        repository: Arc<dyn SubmissionRepository>,
        service: Arc<dyn ExternalService>,
        guard: ResilienceGuard,
    ) -> Self {
        Self {
            records: DashMap::new(),
            external_index: DashMap::new(),
            repository,
            service,
            guard,
        }
    }

    /// Store `result` as the latest record for its key and persist it
    pub async fn record(&self, result: SubmissionResult) -> Result<()> {
        if let Some(current) = self.records.get(&result.key) {
            let from = current.status;
            if from != result.status && !can_transition(from, result.status) {
                return Err(SubmissionError::StateTransitionError(format!(
                    "{}: {from} -> {} is not allowed",
                    result.key, result.status
                )));
            }
        }

        self.insert(result.clone());
        self.persist(&result).await;
        Ok(())
    }

    pub fn get(&self, key: &SubmissionKey) -> Option<SubmissionResult> {
        self.records.get(key).map(|entry| entry.value().clone())
    }

    /// Delivered keys must not be submitted again. A key the service accepted
    /// stays delivered whatever status it later reports, FAILED included.
    pub fn is_delivered(&self, key: &SubmissionKey) -> bool {
        self.records
            .get(key)
            .is_some_and(|entry| entry.status.is_delivered() || entry.external_id.is_some())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Matching records, newest first, at most `limit`
    pub fn history(&self, filter: &HistoryFilter, limit: usize) -> Vec<SubmissionResult> {
        let mut matching: Vec<SubmissionResult> = self
            .records
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        matching.truncate(limit);
        matching
    }

    /// Failed records last touched at or after `cutoff`
    pub fn failed_since(&self, cutoff: DateTime<Utc>) -> Vec<SubmissionResult> {
        let mut failed: Vec<SubmissionResult> = self
            .records
            .iter()
            .filter(|entry| entry.status == SubmissionStatus::Failed && entry.submitted_at >= cutoff)
            .map(|entry| entry.value().clone())
            .collect();
        failed.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        failed
    }

    /// Move a failed record back to pending ahead of a new attempt
    pub async fn mark_requeued(&self, key: &SubmissionKey) -> Result<()> {
        let updated = {
            let mut entry = self.records.get_mut(key).ok_or_else(|| {
                SubmissionError::ValidationError(format!("no record for {key}"))
            })?;
            if let Some(external_id) = &entry.external_id {
                return Err(SubmissionError::StateTransitionError(format!(
                    "{key} was accepted as {external_id} and cannot be resubmitted"
                )));
            }
            let target = determine_target_status(entry.status, &SubmissionEvent::Requeue)?;
            entry.status = target;
            entry.submitted_at = Utc::now();
            entry.clone()
        };
        self.persist(&updated).await;
        Ok(())
    }

    /// Put back the failed record a `mark_requeued` replaced, when the new
    /// attempt never made it into the queue. A record that moved on since is
    /// left alone.
    pub async fn undo_requeue(&self, previous: SubmissionResult) {
        let restored = match self.records.get_mut(&previous.key) {
            Some(mut entry) if entry.status == SubmissionStatus::Pending => {
                *entry = previous;
                Some(entry.clone())
            }
            _ => None,
        };
        if let Some(record) = restored {
            debug!(submission_key = %record.key, "Reopened record returned to failed");
            self.persist(&record).await;
        }
    }

    /// Ask the external service for the latest status of a delivered document.
    ///
    /// Unrecognised external statuses map to pending and leave the record
    /// untouched, as does any status the state machine would not accept.
    pub async fn poll(&self, external_id: &str) -> Result<SubmissionStatus> {
        let key = self
            .external_index
            .get(external_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                SubmissionError::ValidationError(format!("unknown external id {external_id}"))
            })?;

        let raw = self
            .guard
            .execute(operations::STATUS_POLL, || {
                self.service.query_status(external_id, &key.destination_id)
            })
            .await
            .map_err(|e| match e {
                GuardError::Failed(service_error) => SubmissionError::from(service_error),
                other => SubmissionError::ServiceError(other.to_string()),
            })?;

        let mapped = SubmissionStatus::from_external(&raw);
        debug!(external_id = external_id, raw_status = %raw, mapped = %mapped, "Polled status");

        let updated = match self.records.get_mut(&key) {
            Some(mut entry) if entry.status != mapped && can_transition(entry.status, mapped) => {
                info!(
                    submission_key = %key,
                    external_id = external_id,
                    from = %entry.status,
                    to = %mapped,
                    "🔄 External status changed"
                );
                entry.status = mapped;
                entry.message = format!("External status {raw}");
                Some(entry.clone())
            }
            Some(entry) => {
                if entry.status != mapped {
                    debug!(
                        submission_key = %key,
                        current = %entry.status,
                        reported = %mapped,
                        "Ignoring external status that does not follow the current one"
                    );
                }
                None
            }
            None => None,
        };

        if let Some(record) = updated {
            self.persist(&record).await;
        }
        Ok(mapped)
    }

    /// Replace in-memory records with what the repository holds
    pub async fn load(&self) -> Result<usize> {
        let stored = self.repository.list().await?;
        self.records.clear();
        self.external_index.clear();
        let count = stored.len();
        for result in stored {
            self.insert(result);
        }
        info!(records = count, "Loaded submission records");
        Ok(count)
    }

    fn insert(&self, result: SubmissionResult) {
        if let Some(external_id) = &result.external_id {
            self.external_index
                .insert(external_id.clone(), result.key.clone());
        }
        self.records.insert(result.key.clone(), result);
    }

    async fn persist(&self, result: &SubmissionResult) {
        if let Err(e) = self.repository.save(result).await {
            warn!(submission_key = %result.key, "Submission record not persisted");
            log_error(
                "status_tracker",
                "persist",
                &e.to_string(),
                Some(&result.key.to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, RateLimitConfig};
    use crate::constants::error_codes;
    use crate::models::{QueuedSubmission, ReportCandidate, SubmissionTrigger};
    use crate::orchestration::error_classifier::ErrorCategory;
    use crate::orchestration::shutdown::ShutdownSignal;
    use crate::resilience::{CircuitBreakerManager, RateLimiter};
    use crate::services::{InMemorySubmissionRepository, ServiceError, SubmitReceipt};
    use chrono::TimeZone;
    use parking_lot::Mutex;

    struct StatusService {
        status: Mutex<String>,
    }

    #[async_trait::async_trait]
    impl ExternalService for StatusService {
        async fn submit(&self, _: &ReportCandidate, _: &str) -> std::result::Result<SubmitReceipt, ServiceError> {
            Err(ServiceError::Other("not used".into()))
        }

        async fn query_status(&self, _: &str, _: &str) -> std::result::Result<String, ServiceError> {
            Ok(self.status.lock().clone())
        }
    }

    struct BrokenRepository;

    #[async_trait::async_trait]
    impl SubmissionRepository for BrokenRepository {
        async fn save(&self, _: &SubmissionResult) -> Result<()> {
            Err(SubmissionError::RepositoryError("disk full".into()))
        }

        async fn list(&self) -> Result<Vec<SubmissionResult>> {
            Ok(vec![])
        }
    }

    fn tracker_with(
        repository: Arc<dyn SubmissionRepository>,
        status: &str,
    ) -> (StatusTracker, Arc<StatusService>) {
        let service = Arc::new(StatusService {
            status: Mutex::new(status.to_string()),
        });
        let guard = ResilienceGuard::new(
            Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default())),
            Arc::new(RateLimiter::new(&RateLimitConfig::default())),
            ShutdownSignal::new(),
        );
        (StatusTracker::new(repository, service.clone(), guard), service)
    }

    fn item(subject: &str) -> QueuedSubmission {
        QueuedSubmission::new(
            SubmissionKey::new(
                subject,
                Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
                "policy_abc",
            ),
            SubmissionTrigger::Schedule,
            1,
        )
    }

    fn failure(item: &QueuedSubmission) -> SubmissionResult {
        SubmissionResult::failed(
            item,
            error_codes::SERVER_ERROR,
            "503",
            ErrorCategory::ServerError,
            true,
        )
    }

    #[tokio::test]
    async fn test_record_persists_and_indexes() {
        let repository = Arc::new(InMemorySubmissionRepository::new());
        let (tracker, _) = tracker_with(repository.clone(), "NEW");
        let item = item("ESP32_001");

        tracker
            .record(SubmissionResult::succeeded(&item, "doc-1".into(), None))
            .await
            .unwrap();

        assert!(tracker.is_delivered(&item.key));
        assert_eq!(repository.len(), 1);
        assert_eq!(tracker.poll("doc-1").await.unwrap(), SubmissionStatus::Submitted);
    }

    #[tokio::test]
    async fn test_illegal_transition_is_refused() {
        let (tracker, _) = tracker_with(Arc::new(InMemorySubmissionRepository::new()), "NEW");
        let item = item("ESP32_001");
        tracker.record(failure(&item)).await.unwrap();

        let late_success = SubmissionResult::succeeded(&item, "doc-1".into(), None);
        let err = tracker.record(late_success).await.unwrap_err();
        assert!(matches!(err, SubmissionError::StateTransitionError(_)));

        tracker.mark_requeued(&item.key).await.unwrap();
        assert_eq!(tracker.get(&item.key).unwrap().status, SubmissionStatus::Pending);
        tracker
            .record(SubmissionResult::succeeded(&item, "doc-1".into(), None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_poll_applies_mapped_status() {
        let (tracker, service) =
            tracker_with(Arc::new(InMemorySubmissionRepository::new()), "IN_PROGRESS");
        let item = item("ESP32_001");
        tracker
            .record(SubmissionResult::succeeded(&item, "doc-7".into(), None))
            .await
            .unwrap();

        assert_eq!(tracker.poll("doc-7").await.unwrap(), SubmissionStatus::Processing);
        assert_eq!(tracker.get(&item.key).unwrap().status, SubmissionStatus::Processing);

        *service.status.lock() = "approved".into();
        assert_eq!(tracker.poll("doc-7").await.unwrap(), SubmissionStatus::Verified);

        // Terminal records ignore later reports
        *service.status.lock() = "REJECTED".into();
        tracker.poll("doc-7").await.unwrap();
        assert_eq!(tracker.get(&item.key).unwrap().status, SubmissionStatus::Verified);
    }

    #[tokio::test]
    async fn test_unknown_external_status_leaves_record() {
        let (tracker, _) = tracker_with(Arc::new(InMemorySubmissionRepository::new()), "QUEUED_FOR_AUDIT");
        let item = item("ESP32_001");
        tracker
            .record(SubmissionResult::succeeded(&item, "doc-9".into(), None))
            .await
            .unwrap();

        assert_eq!(tracker.poll("doc-9").await.unwrap(), SubmissionStatus::Pending);
        assert_eq!(tracker.get(&item.key).unwrap().status, SubmissionStatus::Submitted);
        assert!(tracker.poll("doc-unknown").await.is_err());
    }

    #[tokio::test]
    async fn test_repository_failure_does_not_fail_record() {
        let (tracker, _) = tracker_with(Arc::new(BrokenRepository), "NEW");
        let item = item("ESP32_001");
        assert!(tracker.record(failure(&item)).await.is_ok());
        assert_eq!(tracker.len(), 1);
    }

    #[tokio::test]
    async fn test_history_newest_first_with_limit() {
        let (tracker, _) = tracker_with(Arc::new(InMemorySubmissionRepository::new()), "NEW");
        for (i, subject) in ["a", "b", "c"].into_iter().enumerate() {
            let mut result = failure(&item(subject));
            result.submitted_at = Utc.with_ymd_and_hms(2024, 1, 16, 1, i as u32, 0).unwrap();
            tracker.record(result).await.unwrap();
        }

        let history = tracker.history(&HistoryFilter::default(), 2);
        let subjects: Vec<&str> = history.iter().map(|r| r.key.subject_id.as_str()).collect();
        assert_eq!(subjects, vec!["c", "b"]);
        assert_eq!(tracker.history(&HistoryFilter::for_subject("a"), 10).len(), 1);
    }

    #[tokio::test]
    async fn test_load_restores_records() {
        let repository = Arc::new(InMemorySubmissionRepository::new());
        let item = item("ESP32_001");
        repository
            .save(&SubmissionResult::succeeded(&item, "doc-3".into(), None))
            .await
            .unwrap();

        let (tracker, _) = tracker_with(repository, "VERIFIED");
        assert_eq!(tracker.load().await.unwrap(), 1);
        assert!(tracker.is_delivered(&item.key));
        assert_eq!(tracker.poll("doc-3").await.unwrap(), SubmissionStatus::Verified);
    }

    #[tokio::test]
    async fn test_externally_failed_key_stays_delivered() {
        let (tracker, _) = tracker_with(Arc::new(InMemorySubmissionRepository::new()), "ERROR");
        let item = item("ESP32_001");
        tracker
            .record(SubmissionResult::succeeded(&item, "doc-4".into(), None))
            .await
            .unwrap();

        assert_eq!(tracker.poll("doc-4").await.unwrap(), SubmissionStatus::Failed);
        assert_eq!(tracker.get(&item.key).unwrap().status, SubmissionStatus::Failed);
        assert!(tracker.is_delivered(&item.key));

        let err = tracker.mark_requeued(&item.key).await.unwrap_err();
        assert!(matches!(err, SubmissionError::StateTransitionError(_)));
        assert_eq!(tracker.get(&item.key).unwrap().status, SubmissionStatus::Failed);
    }

    #[tokio::test]
    async fn test_undo_requeue_restores_failed_record() {
        let repository = Arc::new(InMemorySubmissionRepository::new());
        let (tracker, _) = tracker_with(repository.clone(), "NEW");
        let item = item("ESP32_001");
        let failed = failure(&item);
        tracker.record(failed.clone()).await.unwrap();

        tracker.mark_requeued(&item.key).await.unwrap();
        tracker.undo_requeue(failed.clone()).await;
        assert_eq!(tracker.get(&item.key).unwrap(), failed);
        assert_eq!(
            repository.get(&item.key).unwrap().status,
            SubmissionStatus::Failed
        );

        // Only a still-pending record is rolled back
        tracker.mark_requeued(&item.key).await.unwrap();
        tracker
            .record(SubmissionResult::succeeded(&item, "doc-5".into(), None))
            .await
            .unwrap();
        tracker.undo_requeue(failed).await;
        assert_eq!(tracker.get(&item.key).unwrap().status, SubmissionStatus::Submitted);
    }
}
