//! Fixtures for scheduler integration tests.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use submission_core::config::SubmissionConfig;
use submission_core::models::{ReportCandidate, SubmissionKey};
use submission_core::orchestration::{SchedulerDependencies, SubmissionScheduler};
use submission_core::services::InMemorySubmissionRepository;

use super::doubles::{ScriptedService, StaticAggregator, ThresholdGate};

pub const DESTINATION: &str = "policy_abc";

pub fn period() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
}

pub fn key(subject: &str) -> SubmissionKey {
    SubmissionKey::new(subject, period(), DESTINATION)
}

pub fn candidate(subject_id: &str, period_start: DateTime<Utc>) -> ReportCandidate {
    ReportCandidate {
        subject_id: subject_id.to_string(),
        period_start,
        period_end: period_start + chrono::Duration::days(1),
        total_output_kwh: 18.4,
        data_completeness_percent: 99.3,
        reading_count: 1430,
        data_hash: format!("sha256:{subject_id}"),
        peak_output_w: Some(3200.0),
        average_output_w: Some(766.0),
        capacity_factor: Some(0.19),
    }
}

/// Defaults with jitter off and a short poll interval
pub fn test_config() -> SubmissionConfig {
    let mut config = SubmissionConfig::default();
    config.scheduler.poll_interval_ms = 100;
    config.scheduler.default_destination = Some(DESTINATION.to_string());
    config.retry.jitter_enabled = false;
    config
}

/// Scheduler wired to test doubles, plus handles on each double
pub struct Harness {
    pub scheduler: SubmissionScheduler,
    pub service: Arc<ScriptedService>,
    pub aggregator: Arc<StaticAggregator>,
    pub repository: Arc<InMemorySubmissionRepository>,
}

impl Harness {
    pub fn new(config: SubmissionConfig, service: ScriptedService) -> Self {
        Self::with_parts(
            config,
            service,
            StaticAggregator::new(Vec::<String>::new()),
            InMemorySubmissionRepository::new(),
        )
    }

    pub fn with_parts(
        config: SubmissionConfig,
        service: ScriptedService,
        aggregator: StaticAggregator,
        repository: InMemorySubmissionRepository,
    ) -> Self {
        let service = Arc::new(service);
        let aggregator = Arc::new(aggregator);
        let repository = Arc::new(repository);
        let deps = SchedulerDependencies {
            aggregator: aggregator.clone(),
            gate: Arc::new(ThresholdGate::new(90.0)),
            service: service.clone(),
            repository: repository.clone(),
        };
        let scheduler = SubmissionScheduler::new(config, deps).expect("valid test config");
        Self {
            scheduler,
            service,
            aggregator,
            repository,
        }
    }
}
