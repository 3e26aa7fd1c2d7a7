//! # Submission Scheduler
//!
//! Owns the queue and drives delivery. Two background loops run while the
//! scheduler is started:
//!
//! - **Daily loop**: sleeps until the configured UTC time of day, enqueues the
//!   previous day's eligible reports, then sweeps recent failures back into
//!   the queue
//! - **Processor loop**: dispatches queued items to worker tasks, bounded by
//!   `max_concurrent_submissions`
//!
//! Workers hold a concurrency permit only for the attempt itself. Backoff
//! before a retry is slept without a permit while the key stays in flight,
//! after which the item goes back through [`SubmissionQueue::requeue`].
//!
//! [`SubmissionScheduler::stop`] requests shutdown, cuts every pending sleep
//! short and waits for in-flight workers. Items still waiting for a retry
//! are recorded as failed so the next retry sweep can pick them up.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::SubmissionConfig;
use crate::constants::{
    error_codes, operations, priorities, LOOP_ERROR_BACKOFF_SECONDS, MAX_DAILY_SLEEP_SECONDS,
};
use crate::error::{Result, SubmissionError};
use crate::logging::{log_error, log_submission_operation};
use crate::models::{
    HistoryFilter, QueuedSubmission, SubmissionKey, SubmissionResult, SubmissionTrigger,
};
use crate::orchestration::error_classifier::{ErrorCategory, StandardErrorClassifier};
use crate::orchestration::queue::SubmissionQueue;
use crate::orchestration::retry_policy::{BackoffHints, RetryPolicy};
use crate::orchestration::shutdown::ShutdownSignal;
use crate::orchestration::statistics::{StatisticsSnapshot, SubmissionStatistics};
use crate::orchestration::status_tracker::StatusTracker;
use crate::orchestration::submitter::Submitter;
use crate::resilience::{CircuitBreakerManager, RateLimiter, ResilienceGuard};
use crate::services::{Aggregator, ExternalService, ReadinessGate, SubmissionRepository};
use crate::state_machine::SubmissionStatus;

/// External collaborators the scheduler is wired to
#[derive(Clone)]
pub struct SchedulerDependencies {
    pub aggregator: Arc<dyn Aggregator>,
    pub gate: Arc<dyn ReadinessGate>,
    pub service: Arc<dyn ExternalService>,
    pub repository: Arc<dyn SubmissionRepository>,
}

/// Outcome of one daily run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRunReport {
    pub run_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub total_subjects: usize,
    pub queued: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Outcome of one retry sweep over failed records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySweepReport {
    pub total_failed: usize,
    pub requeued: usize,
    /// Retry budget already spent
    pub exhausted: usize,
    /// Failures that must not be retried as-is
    pub permanent: usize,
    /// Backoff since the last attempt has not elapsed yet
    pub too_soon: usize,
}

/// Serializable summary of one queued item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItemSummary {
    pub key: SubmissionKey,
    pub trigger: SubmissionTrigger,
    pub priority: i32,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl From<&QueuedSubmission> for QueueItemSummary {
    fn from(item: &QueuedSubmission) -> Self {
        Self {
            key: item.key.clone(),
            trigger: item.trigger,
            priority: item.priority,
            enqueued_at: item.enqueued_at,
            retry_count: item.retry_count,
            last_error: item.last_error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub queue_length: usize,
    pub in_flight: usize,
    pub active_workers: usize,
    pub max_concurrent_submissions: usize,
    /// Head of the queue in dequeue order
    pub items: Vec<QueueItemSummary>,
}

struct SchedulerCore {
    config: SubmissionConfig,
    queue: SubmissionQueue,
    submitter: Submitter,
    tracker: StatusTracker,
    retry_policy: RetryPolicy,
    aggregator: Arc<dyn Aggregator>,
    gate: Arc<dyn ReadinessGate>,
    statistics: SubmissionStatistics,
    guard: ResilienceGuard,
    shutdown: ShutdownSignal,
    permits: Arc<Semaphore>,
    active_workers: AtomicUsize,
    work_available: Notify,
    workers: Mutex<JoinSet<()>>,
}

/// Scheduled and on-demand delivery of report submissions
pub struct SubmissionScheduler {
    core: Arc<SchedulerCore>,
    loops: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl std::fmt::Debug for SubmissionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionScheduler")
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("queue_length", &self.core.queue.len())
            .field("in_flight", &self.core.queue.in_flight_count())
            .finish()
    }
}

impl SubmissionScheduler {
    pub fn new(config: SubmissionConfig, deps: SchedulerDependencies) -> Result<Self> {
        config.validate()?;

        let shutdown = ShutdownSignal::new();
        let guard = ResilienceGuard::new(
            Arc::new(CircuitBreakerManager::new(config.circuit_breaker.clone())),
            Arc::new(RateLimiter::new(&config.rate_limit)),
            shutdown.clone(),
        );
        let submitter = Submitter::new(
            Arc::clone(&deps.service),
            Arc::clone(&deps.aggregator),
            guard.clone(),
            Arc::new(StandardErrorClassifier::new()),
            config.retry.max_retries,
        );
        let tracker = StatusTracker::new(
            Arc::clone(&deps.repository),
            Arc::clone(&deps.service),
            guard.clone(),
        );

        let core = SchedulerCore {
            queue: SubmissionQueue::new(),
            submitter,
            tracker,
            retry_policy: RetryPolicy::new(config.retry.clone()),
            aggregator: deps.aggregator,
            gate: deps.gate,
            statistics: SubmissionStatistics::new(),
            guard,
            shutdown,
            permits: Arc::new(Semaphore::new(config.scheduler.max_concurrent_submissions)),
            active_workers: AtomicUsize::new(0),
            work_available: Notify::new(),
            workers: Mutex::new(JoinSet::new()),
            config,
        };

        Ok(Self {
            core: Arc::new(core),
            loops: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Load stored records and spawn the daily and processor loops
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        if self.core.shutdown.is_requested() {
            return Err(SubmissionError::ShuttingDown(
                "scheduler has been stopped".to_string(),
            ));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SubmissionError::SchedulerError(
                "scheduler is already running".to_string(),
            ));
        }

        if let Err(e) = self.core.tracker.load().await {
            warn!(error = %e, "Starting without stored submission records");
        }

        let scheduler = &self.core.config.scheduler;
        info!(
            daily_time = %scheduler.daily_submission_time(),
            poll_interval_ms = scheduler.poll_interval_ms,
            max_concurrent = scheduler.max_concurrent_submissions,
            submission_enabled = scheduler.submission_enabled,
            "🚀 Starting submission scheduler"
        );

        let mut loops = self.loops.lock();
        let processor = Arc::clone(&self.core);
        loops.push(tokio::spawn(async move { processor.run_processor_loop().await }));
        if scheduler.submission_enabled {
            let daily = Arc::clone(&self.core);
            loops.push(tokio::spawn(async move { daily.run_daily_loop().await }));
        } else {
            info!("Scheduled submissions disabled, daily loop not started");
        }
        Ok(())
    }

    /// Request shutdown and wait for the loops and every worker to finish
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        info!("🛑 Stopping submission scheduler");
        self.core.shutdown.request();
        self.core.work_available.notify_one();

        let loops: Vec<JoinHandle<()>> = std::mem::take(&mut *self.loops.lock());
        for joined in join_all(loops).await {
            if let Err(e) = joined {
                error!(error = %e, "Scheduler loop panicked");
            }
        }

        let mut workers = std::mem::take(&mut *self.core.workers.lock());
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Submission worker panicked");
            }
        }

        self.started.store(false, Ordering::SeqCst);
        let stats = self.statistics();
        info!(
            total_attempts = stats.total_attempts,
            successful = stats.successful,
            failed = stats.failed,
            queue_length = stats.queue_length,
            open_circuits = ?stats.resilience.open_operations(),
            "Submission scheduler stopped"
        );
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.core.shutdown.is_requested()
    }

    /// Queue a submission. `destination_id` falls back to the configured
    /// default and `priority` to the trigger's default. Returns false when
    /// the key is already queued, in flight, delivered, or filtered out.
    pub async fn enqueue(
        &self,
        subject_id: &str,
        period_start: DateTime<Utc>,
        destination_id: Option<&str>,
        trigger: SubmissionTrigger,
        priority: Option<i32>,
    ) -> bool {
        let destination = match destination_id
            .map(str::to_string)
            .or_else(|| self.core.config.scheduler.default_destination.clone())
        {
            Some(destination) => destination,
            None => {
                warn!(
                    subject_id = subject_id,
                    "No destination given and no default destination configured"
                );
                return false;
            }
        };

        let key = SubmissionKey::new(subject_id, period_start, destination);
        let priority = priority.unwrap_or_else(|| trigger.default_priority());
        self.core
            .enqueue_item(QueuedSubmission::new(key, trigger, priority))
            .await
    }

    /// Remove a queued item. In-flight attempts are not interrupted.
    pub fn cancel(&self, key: &SubmissionKey) -> bool {
        let removed = self.core.queue.remove(key).is_some();
        if removed {
            log_submission_operation(operations::SUBMIT, &key.to_string(), "cancelled", None, None);
        }
        removed
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        let core = &self.core;
        QueueSnapshot {
            queue_length: core.queue.len(),
            in_flight: core.queue.in_flight_count(),
            active_workers: core.active_workers.load(Ordering::SeqCst),
            max_concurrent_submissions: core.config.scheduler.max_concurrent_submissions,
            items: core
                .queue
                .snapshot(core.config.scheduler.snapshot_limit)
                .iter()
                .map(QueueItemSummary::from)
                .collect(),
        }
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        let core = &self.core;
        core.statistics.snapshot(
            core.queue.len(),
            core.queue.in_flight_count(),
            core.active_workers.load(Ordering::SeqCst),
            core.guard.snapshot(),
        )
    }

    pub fn get_status(&self, key: &SubmissionKey) -> Option<SubmissionResult> {
        self.core.tracker.get(key)
    }

    pub fn history(&self, filter: &HistoryFilter, limit: usize) -> Vec<SubmissionResult> {
        self.core.tracker.history(filter, limit)
    }

    /// Refresh one delivered document's status from the external service
    pub async fn poll_status(&self, external_id: &str) -> Result<SubmissionStatus> {
        self.core.tracker.poll(external_id).await
    }

    /// Enqueue eligible reports for `period_start` (default: the previous UTC day)
    pub async fn run_daily_submissions(
        &self,
        period_start: Option<DateTime<Utc>>,
    ) -> Result<DailyRunReport> {
        self.core.run_daily_submissions(period_start).await
    }

    /// Re-enqueue failed records younger than `max_age` that still have retry budget
    pub async fn retry_failed_submissions(&self, max_age: Duration) -> RetrySweepReport {
        self.core.retry_failed_submissions(max_age).await
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.core.config
    }
}

impl SchedulerCore {
    async fn enqueue_item(&self, item: QueuedSubmission) -> bool {
        let key_display = item.key.to_string();
        if self.shutdown.is_requested() {
            debug!(submission_key = %key_display, "Refusing enqueue during shutdown");
            return false;
        }
        if !self.config.scheduler.submission_enabled {
            debug!(submission_key = %key_display, "Submissions disabled, enqueue refused");
            return false;
        }
        if !self.config.scheduler.is_subject_enabled(&item.key.subject_id) {
            debug!(submission_key = %key_display, "Subject filtered out, enqueue refused");
            return false;
        }

        if self.tracker.is_delivered(&item.key) {
            debug!(submission_key = %key_display, "Key already delivered, enqueue refused");
            return false;
        }

        let reopened = match self.tracker.get(&item.key) {
            Some(record) if record.status == SubmissionStatus::Failed => {
                if let Err(e) = self.tracker.mark_requeued(&item.key).await {
                    warn!(submission_key = %key_display, error = %e, "Could not reopen failed record");
                    return false;
                }
                Some(record)
            }
            Some(record) if record.status == SubmissionStatus::Pending => None,
            None => None,
            Some(record) => {
                debug!(
                    submission_key = %key_display,
                    status = %record.status,
                    "Key already has a final record, enqueue refused"
                );
                return false;
            }
        };

        match self.queue.try_enqueue(item) {
            Ok(()) => {
                log_submission_operation(operations::SUBMIT, &key_display, "queued", None, None);
                self.work_available.notify_one();
                true
            }
            Err(rejection) => {
                debug!(submission_key = %key_display, reason = %rejection, "Enqueue refused");
                if let Some(previous) = reopened {
                    self.tracker.undo_requeue(previous).await;
                }
                false
            }
        }
    }

    async fn run_processor_loop(self: Arc<Self>) {
        info!(
            poll_interval_ms = self.config.scheduler.poll_interval_ms,
            "Starting submission processor loop"
        );
        let poll_interval = self.config.scheduler.poll_interval();

        loop {
            if self.shutdown.is_requested() {
                break;
            }
            self.dispatch_ready();

            tokio::select! {
                _ = self.work_available.notified() => {}
                _ = tokio::time::sleep(poll_interval) => {}
                _ = self.shutdown.wait() => break,
            }
        }
        debug!("Submission processor loop exited");
    }

    /// Spawn workers for queued items while permits are available
    fn dispatch_ready(self: &Arc<Self>) {
        let mut workers = self.workers.lock();
        while let Some(joined) = workers.try_join_next() {
            if let Err(e) = joined {
                error!(error = %e, "Submission worker panicked");
            }
        }

        while let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            let Some(item) = self.queue.dequeue() else {
                break;
            };
            debug!(
                submission_key = %item.key,
                priority = item.priority,
                retry_count = item.retry_count,
                "Dispatching submission"
            );
            self.active_workers.fetch_add(1, Ordering::SeqCst);
            let core = Arc::clone(self);
            workers.spawn(async move { core.process(item, permit).await });
        }
    }

    async fn process(self: Arc<Self>, item: QueuedSubmission, permit: OwnedSemaphorePermit) {
        let result = self.submitter.attempt(&item).await;
        drop(permit);
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
        self.work_available.notify_one();

        self.statistics.record_attempt(&result);
        self.handle_outcome(item, result).await;
    }

    async fn handle_outcome(&self, item: QueuedSubmission, result: SubmissionResult) {
        let key = item.key.clone();

        // Keys stay in flight until the tracker holds their outcome
        if result.success {
            log_submission_operation(
                operations::SUBMIT,
                &key.to_string(),
                "submitted",
                Some(result.retry_count),
                result.external_id.as_deref(),
            );
            self.track(result).await;
            self.queue.complete(&key);
            return;
        }

        let shutting_down = self.shutdown.is_requested();

        if result.is_circuit_open() && !shutting_down {
            let delay = result
                .retry_after
                .filter(|wait| !wait.is_zero())
                .unwrap_or_else(|| self.config.scheduler.poll_interval());
            debug!(
                submission_key = %key,
                delay_ms = delay.as_millis() as u64,
                "Circuit open, holding submission until cooldown ends"
            );
            let mut held = result;
            held.status = SubmissionStatus::Pending;
            self.track(held).await;
            self.requeue_after(item, delay, false).await;
            return;
        }

        let category = result.category.unwrap_or(ErrorCategory::Unknown);
        if !shutting_down
            && result.retryable
            && self.retry_policy.should_retry(category, item.retry_count)
        {
            let hints = BackoffHints {
                rate_limit_wait: Some(self.guard.rate_limiter().wait_time()),
                retry_after: result.retry_after,
            };
            let delay = self
                .retry_policy
                .delay_with_hints(item.retry_count, category, hints);
            let next = item.into_retry(&result);

            let mut pending = result;
            pending.status = SubmissionStatus::Pending;
            pending.retry_count = next.retry_count;
            pending.message = format!(
                "{} (retry {}/{} in {}ms)",
                pending.message,
                next.retry_count,
                self.retry_policy.max_retries(),
                delay.as_millis()
            );

            self.statistics.record_retry_scheduled();
            log_submission_operation(
                operations::SUBMIT,
                &key.to_string(),
                "retry_scheduled",
                Some(next.retry_count),
                Some(&category.to_string()),
            );
            self.track(pending).await;
            self.requeue_after(next, delay, true).await;
            return;
        }

        let mut failed = result;
        failed.status = SubmissionStatus::Failed;
        if failed.retryable && !shutting_down {
            failed.message = format!(
                "{} (retries exhausted after {} attempts)",
                failed.message,
                item.retry_count + 1
            );
        }
        self.statistics.record_terminal_failure();
        log_submission_operation(
            operations::SUBMIT,
            &key.to_string(),
            "failed",
            Some(failed.retry_count),
            failed.error_code.as_deref(),
        );
        self.track(failed).await;
        self.queue.complete(&key);
    }

    /// Sleep out a backoff, then hand the item back to the queue. Shutdown
    /// during the sleep records the item as failed instead; `counted` says
    /// whether the item's retry count already includes the attempt it was
    /// waiting for.
    async fn requeue_after(&self, item: QueuedSubmission, delay: Duration, counted: bool) {
        if self.shutdown.sleep(delay).await {
            let key = item.key.clone();
            match self.queue.requeue(item) {
                Ok(()) => self.work_available.notify_one(),
                Err(rejection) => {
                    warn!(submission_key = %key, reason = %rejection, "Retry not requeued")
                }
            }
            return;
        }

        let category = item.last_category.unwrap_or(ErrorCategory::Unknown);
        let mut interrupted = SubmissionResult::failed(
            &item,
            error_codes::SHUTDOWN_INTERRUPTED,
            "Shutdown requested while waiting to retry",
            category,
            true,
        );
        interrupted.retry_count = item.retry_count.saturating_sub(u32::from(counted));
        interrupted.message = match &item.last_error {
            Some(last) => format!("{}; last error: {last}", interrupted.message),
            None => interrupted.message,
        };
        self.statistics.record_terminal_failure();
        self.track(interrupted).await;
        self.queue.complete(&item.key);
    }

    async fn track(&self, result: SubmissionResult) {
        let key = result.key.clone();
        if let Err(e) = self.tracker.record(result).await {
            warn!(submission_key = %key, error = %e, "Submission record not updated");
        }
    }

    async fn run_daily_loop(self: Arc<Self>) {
        let daily_time = self.config.scheduler.daily_submission_time();
        info!(daily_time = %daily_time, "Starting daily submission loop");

        loop {
            let next = next_daily_run(Utc::now(), daily_time);
            info!(next_run = %next, "Next scheduled submission run");
            if !self.sleep_until(next).await {
                break;
            }

            let outcome = match self.run_daily_submissions(None).await {
                Ok(_) => {
                    self.retry_failed_submissions(self.config.scheduler.retry_max_age())
                        .await;
                    Ok(())
                }
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                log_error("scheduler", "daily_run", &e.to_string(), None);
                if !self
                    .shutdown
                    .sleep(Duration::from_secs(LOOP_ERROR_BACKOFF_SECONDS))
                    .await
                {
                    break;
                }
            }
        }
        debug!("Daily submission loop exited");
    }

    /// Sleep in bounded slices until `deadline`, re-reading the wall clock
    /// each slice. False if shutdown cut the wait short.
    async fn sleep_until(&self, deadline: DateTime<Utc>) -> bool {
        let max_slice = Duration::from_secs(MAX_DAILY_SLEEP_SECONDS);
        loop {
            let remaining = deadline
                .signed_duration_since(Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            if remaining.is_zero() {
                return !self.shutdown.is_requested();
            }
            if !self.shutdown.sleep(remaining.min(max_slice)).await {
                return false;
            }
        }
    }

    #[instrument(skip(self))]
    async fn run_daily_submissions(
        &self,
        period_start: Option<DateTime<Utc>>,
    ) -> Result<DailyRunReport> {
        let period = period_start.unwrap_or_else(|| previous_day_start(Utc::now()));
        let destination = self
            .config
            .scheduler
            .default_destination
            .clone()
            .ok_or_else(|| {
                SubmissionError::ConfigurationError(
                    "scheduler.default_destination is required for scheduled runs".to_string(),
                )
            })?;

        let subjects = self.aggregator.active_subjects(period).await?;
        let mut report = DailyRunReport {
            run_id: Uuid::new_v4(),
            period_start: period,
            total_subjects: subjects.len(),
            queued: 0,
            skipped: 0,
            errors: Vec::new(),
        };

        for subject in subjects {
            if !self.config.scheduler.is_subject_enabled(&subject) {
                report.skipped += 1;
                continue;
            }

            let key = SubmissionKey::new(subject.as_str(), period, destination.as_str());
            if self.tracker.is_delivered(&key) || self.queue.contains(&key) {
                report.skipped += 1;
                continue;
            }

            let candidate = match self.aggregator.build_candidate(&subject, period).await {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(subject_id = %subject, error = %e, "Could not build report candidate");
                    report.errors.push(format!("{subject}: {e}"));
                    continue;
                }
            };

            let decision = self.gate.evaluate(&candidate).await;
            if !decision.eligible {
                debug!(
                    subject_id = %subject,
                    reasons = ?decision.reasons,
                    "Report not ready for submission"
                );
                report.skipped += 1;
                continue;
            }

            let item = QueuedSubmission::new(key, SubmissionTrigger::Schedule, priorities::SCHEDULE)
                .with_payload(candidate);
            if self.enqueue_item(item).await {
                report.queued += 1;
            } else {
                report.skipped += 1;
            }
        }

        info!(
            run_id = %report.run_id,
            period_start = %report.period_start,
            total_subjects = report.total_subjects,
            queued = report.queued,
            skipped = report.skipped,
            errors = report.errors.len(),
            "📅 Daily submission run complete"
        );
        Ok(report)
    }

    #[instrument(skip(self))]
    async fn retry_failed_submissions(&self, max_age: Duration) -> RetrySweepReport {
        let mut report = RetrySweepReport::default();
        if self.shutdown.is_requested() {
            return report;
        }

        let now = Utc::now();
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        for record in self.tracker.failed_since(cutoff) {
            report.total_failed += 1;

            if !record.retryable || self.tracker.is_delivered(&record.key) {
                report.permanent += 1;
                continue;
            }
            if record.retry_count >= self.retry_policy.max_retries() {
                report.exhausted += 1;
                continue;
            }
            let category = record.category.unwrap_or(ErrorCategory::Unknown);
            if !self
                .retry_policy
                .is_due(record.retry_count, category, record.submitted_at, now)
            {
                report.too_soon += 1;
                continue;
            }

            if self.queue.contains(&record.key) {
                warn!(submission_key = %record.key, "Failed record already queued or in flight");
                continue;
            }
            if let Err(e) = self.tracker.mark_requeued(&record.key).await {
                warn!(submission_key = %record.key, error = %e, "Could not reopen failed record");
                continue;
            }

            let mut item =
                QueuedSubmission::new(record.key.clone(), SubmissionTrigger::Retry, priorities::RETRY);
            item.retry_count = record.retry_count + 1;
            item.last_attempt_at = Some(record.submitted_at);
            item.last_error = Some(record.message.clone());
            item.last_category = record.category;

            match self.queue.try_enqueue(item) {
                Ok(()) => report.requeued += 1,
                Err(rejection) => {
                    warn!(submission_key = %record.key, reason = %rejection, "Failed record not requeued");
                    self.tracker.undo_requeue(record).await;
                }
            }
        }

        if report.requeued > 0 {
            self.work_available.notify_one();
        }
        info!(
            total_failed = report.total_failed,
            requeued = report.requeued,
            exhausted = report.exhausted,
            permanent = report.permanent,
            too_soon = report.too_soon,
            "🔁 Retry sweep complete"
        );
        report
    }
}

/// Next occurrence of `time` (UTC) strictly after `now`
pub fn next_daily_run(now: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(time));
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Midnight UTC at the start of the day before `now`
pub fn previous_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let yesterday = (now - chrono::Duration::days(1)).date_naive();
    Utc.from_utc_datetime(&yesterday.and_time(NaiveTime::MIN))
}
