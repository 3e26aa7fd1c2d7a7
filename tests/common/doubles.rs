//! Test doubles for the external collaborators.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use submission_core::models::{GateDecision, ReportCandidate};
use submission_core::services::{
    Aggregator, ExternalService, ReadinessGate, ServiceError, SubmitReceipt,
};
use tokio::time::Instant;

use super::builders::candidate;

/// External service that replays a script of submit outcomes, then accepts
/// everything. Records when and for whom each submit happened.
#[derive(Default)]
pub struct ScriptedService {
    script: Mutex<VecDeque<Result<(), ServiceError>>>,
    latency: Duration,
    statuses: Mutex<HashMap<String, String>>,
    refresh_fails: bool,
    next_id: AtomicU32,
    pub calls: Mutex<Vec<(String, Instant)>>,
    current: AtomicUsize,
    pub peak_concurrency: AtomicUsize,
}

impl ScriptedService {
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn scripted(outcomes: Vec<Result<(), ServiceError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_failing_refresh(mut self) -> Self {
        self.refresh_fails = true;
        self
    }

    pub fn set_status(&self, external_id: &str, status: &str) {
        self.statuses
            .lock()
            .insert(external_id.to_string(), status.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait::async_trait]
impl ExternalService for ScriptedService {
    async fn submit(
        &self,
        payload: &ReportCandidate,
        _destination_id: &str,
    ) -> Result<SubmitReceipt, ServiceError> {
        self.calls
            .lock()
            .push((payload.subject_id.clone(), Instant::now()));
        let running = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_concurrency.fetch_max(running, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.current.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(Err(error)) => Err(error),
            Some(Ok(())) | None => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(SubmitReceipt {
                    external_id: format!("doc-{n}"),
                    raw_status: "NEW".to_string(),
                    response: Some(serde_json::json!({ "id": format!("doc-{n}") })),
                })
            }
        }
    }

    async fn query_status(
        &self,
        external_id: &str,
        _destination_id: &str,
    ) -> Result<String, ServiceError> {
        self.statuses
            .lock()
            .get(external_id)
            .cloned()
            .ok_or_else(|| ServiceError::http(404, format!("unknown document {external_id}")))
    }

    async fn refresh_credentials(&self, destination_id: &str) -> Result<(), ServiceError> {
        if self.refresh_fails {
            Err(ServiceError::CredentialRefresh(format!(
                "token endpoint unavailable for {destination_id}"
            )))
        } else {
            Ok(())
        }
    }
}

/// Aggregator over a fixed subject list
pub struct StaticAggregator {
    subjects: Vec<String>,
    low_completeness: HashSet<String>,
    broken: HashSet<String>,
}

impl StaticAggregator {
    pub fn new<S: Into<String>>(subjects: Vec<S>) -> Self {
        Self {
            subjects: subjects.into_iter().map(Into::into).collect(),
            low_completeness: HashSet::new(),
            broken: HashSet::new(),
        }
    }

    /// Candidates for `subject` report 50% completeness
    pub fn with_low_completeness(mut self, subject: &str) -> Self {
        self.low_completeness.insert(subject.to_string());
        self
    }

    /// Building a candidate for `subject` fails
    pub fn with_broken(mut self, subject: &str) -> Self {
        self.broken.insert(subject.to_string());
        self
    }
}

#[async_trait::async_trait]
impl Aggregator for StaticAggregator {
    async fn build_candidate(
        &self,
        subject_id: &str,
        period_start: DateTime<Utc>,
    ) -> Result<ReportCandidate, ServiceError> {
        if self.broken.contains(subject_id) {
            return Err(ServiceError::Other(format!("no readings for {subject_id}")));
        }
        let mut report = candidate(subject_id, period_start);
        if self.low_completeness.contains(subject_id) {
            report.data_completeness_percent = 50.0;
        }
        Ok(report)
    }

    async fn active_subjects(&self, _period_start: DateTime<Utc>) -> Result<Vec<String>, ServiceError> {
        Ok(self.subjects.clone())
    }
}

/// Minimum data completeness gate
pub struct ThresholdGate {
    min_completeness: f64,
}

impl ThresholdGate {
    pub fn new(min_completeness: f64) -> Self {
        Self { min_completeness }
    }
}

#[async_trait::async_trait]
impl ReadinessGate for ThresholdGate {
    async fn evaluate(&self, candidate: &ReportCandidate) -> GateDecision {
        if candidate.data_completeness_percent >= self.min_completeness {
            GateDecision::eligible()
        } else {
            GateDecision::ineligible(vec![format!(
                "completeness {:.1}% below {:.1}%",
                candidate.data_completeness_percent, self.min_completeness
            )])
        }
    }
}
