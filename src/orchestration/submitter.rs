//! # Submitter
//!
//! Executes exactly one delivery attempt for a queued item and turns whatever
//! happened into a [`SubmissionResult`]. Retry decisions belong to the
//! scheduler; the submitter only reports what the attempt looked like.
//!
//! ## Attempt Flow
//!
//! 1. Resolve the payload (carried on the item, or built via the aggregator)
//! 2. Validate it locally; invalid payloads never reach the service
//! 3. Call the service through the [`ResilienceGuard`]
//! 4. Classify failures, refreshing credentials once on authentication errors

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::constants::{error_codes, operations};
use crate::logging::log_submission_operation;
use crate::models::{QueuedSubmission, ReportCandidate, SubmissionResult};
use crate::orchestration::error_classifier::{
    ErrorCategory, ErrorClassifier, ErrorContext, ErrorSeverity,
};
use crate::resilience::{GuardError, ResilienceGuard};
use crate::services::{Aggregator, ExternalService, ServiceError};

/// Single-attempt executor shared by all worker tasks
pub struct Submitter {
    service: Arc<dyn ExternalService>,
    aggregator: Arc<dyn Aggregator>,
    guard: ResilienceGuard,
    classifier: Arc<dyn ErrorClassifier>,
    max_retries: u32,
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("classifier", &self.classifier.classifier_name())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Submitter {
    pub fn new(
        service: Arc<dyn ExternalService>,
        aggregator: Arc<dyn Aggregator>,
        guard: ResilienceGuard,
        classifier: Arc<dyn ErrorClassifier>,
        max_retries: u32,
    ) -> Self {
        Self {
            service,
            aggregator,
            guard,
            classifier,
            max_retries,
        }
    }

    pub fn guard(&self) -> &ResilienceGuard {
        &self.guard
    }

    /// Perform one attempt. Never panics and never returns an error: every
    /// outcome, including local failures, is a `SubmissionResult`.
    pub async fn attempt(&self, item: &QueuedSubmission) -> SubmissionResult {
        let key = item.key.to_string();
        log_submission_operation(
            operations::SUBMIT,
            &key,
            "attempting",
            Some(item.retry_count),
            Some(&item.trigger.to_string()),
        );

        let payload = match self.resolve_payload(item).await {
            Ok(payload) => payload,
            Err(result) => return result,
        };

        if let Err(e) = self.check_payload(item, &payload) {
            warn!(submission_key = %key, error = %e, "Payload failed local validation");
            let mut result = SubmissionResult::failed(
                item,
                error_codes::INVALID_PAYLOAD,
                e,
                ErrorCategory::Validation,
                false,
            );
            result.severity = Some(ErrorSeverity::assess(ErrorCategory::Validation, item.retry_count));
            return result;
        }

        let destination = item.key.destination_id.as_str();
        let outcome = self
            .guard
            .execute(operations::SUBMIT, || self.service.submit(&payload, destination))
            .await;

        match outcome {
            Ok(receipt) => {
                info!(
                    submission_key = %key,
                    external_id = %receipt.external_id,
                    raw_status = %receipt.raw_status,
                    retry_count = item.retry_count,
                    "✅ Submission accepted"
                );
                let snapshot = serde_json::json!({
                    "raw_status": receipt.raw_status,
                    "response": receipt.response,
                });
                SubmissionResult::succeeded(item, receipt.external_id, Some(snapshot))
            }
            Err(GuardError::CircuitOpen { retry_in, .. }) => {
                debug!(submission_key = %key, "Attempt short-circuited by open breaker");
                SubmissionResult::short_circuited(item, retry_in)
            }
            Err(GuardError::Interrupted { .. }) => {
                warn!(submission_key = %key, "Attempt interrupted by shutdown before sending");
                SubmissionResult::failed(
                    item,
                    error_codes::SHUTDOWN_INTERRUPTED,
                    "Shutdown requested before the submission was sent",
                    ErrorCategory::Unknown,
                    true,
                )
            }
            Err(GuardError::Failed(service_error)) => {
                self.classify_failure(item, &service_error).await
            }
        }
    }

    async fn resolve_payload(
        &self,
        item: &QueuedSubmission,
    ) -> Result<Arc<ReportCandidate>, SubmissionResult> {
        if let Some(payload) = &item.payload {
            return Ok(Arc::clone(payload));
        }

        match self
            .aggregator
            .build_candidate(&item.key.subject_id, item.key.period_start)
            .await
        {
            Ok(candidate) => Ok(Arc::new(candidate)),
            Err(e) => {
                warn!(
                    submission_key = %item.key,
                    error = %e,
                    "Could not build report candidate"
                );
                let mut result = SubmissionResult::failed(
                    item,
                    error_codes::CANDIDATE_UNAVAILABLE,
                    format!("Report candidate unavailable: {e}"),
                    ErrorCategory::Unknown,
                    true,
                );
                result.severity = Some(ErrorSeverity::assess(ErrorCategory::Unknown, item.retry_count));
                Err(result)
            }
        }
    }

    fn check_payload(&self, item: &QueuedSubmission, payload: &ReportCandidate) -> Result<(), String> {
        payload.validate().map_err(|e| e.to_string())?;
        if payload.subject_id != item.key.subject_id || payload.period_start != item.key.period_start
        {
            return Err(format!(
                "payload for {}@{} does not match key {}",
                payload.subject_id, payload.period_start, item.key
            ));
        }
        Ok(())
    }

    async fn classify_failure(
        &self,
        item: &QueuedSubmission,
        service_error: &ServiceError,
    ) -> SubmissionResult {
        let context = ErrorContext::new(
            operations::SUBMIT,
            item.key.to_string(),
            item.retry_count,
            self.max_retries,
        );
        let classification = self.classifier.classify_error(service_error, &context);

        let mut error_code = classification.error_code.clone();
        let mut message = classification.error_message.clone();
        let mut retryable = classification.is_retryable;

        if classification.error_category == ErrorCategory::Authentication
            && !matches!(service_error, ServiceError::CredentialRefresh(_))
        {
            if item.auth_retry_used {
                retryable = false;
                message = format!("{message} (already retried after credential refresh)");
            } else {
                match self.service.refresh_credentials(&item.key.destination_id).await {
                    Ok(()) => {
                        info!(
                            submission_key = %item.key,
                            destination_id = %item.key.destination_id,
                            "🔑 Credentials refreshed, submission will be retried once"
                        );
                        retryable = true;
                    }
                    Err(refresh_error) => {
                        error_code = error_codes::AUTH_REFRESH_FAILED.to_string();
                        message = format!("{message}; credential refresh failed: {refresh_error}");
                        retryable = false;
                    }
                }
            }
        }

        let mut result = SubmissionResult::failed(
            item,
            error_code,
            message,
            classification.error_category,
            retryable,
        );
        result.severity = Some(classification.severity);
        result.retry_after = classification.retry_after;

        match classification.severity {
            ErrorSeverity::Critical | ErrorSeverity::High => error!(
                submission_key = %item.key,
                category = %classification.error_category,
                error_code = ?result.error_code,
                retryable = result.retryable,
                retry_count = item.retry_count,
                error = %service_error,
                "❌ Submission attempt failed"
            ),
            ErrorSeverity::Medium => warn!(
                submission_key = %item.key,
                category = %classification.error_category,
                error_code = ?result.error_code,
                retryable = result.retryable,
                retry_count = item.retry_count,
                error = %service_error,
                "Submission attempt failed"
            ),
            ErrorSeverity::Low => info!(
                submission_key = %item.key,
                category = %classification.error_category,
                error_code = ?result.error_code,
                retry_count = item.retry_count,
                error = %service_error,
                "Submission attempt failed"
            ),
        }

        result
    }
}
