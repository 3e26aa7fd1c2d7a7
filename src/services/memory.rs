use dashmap::DashMap;

use super::SubmissionRepository;
use crate::error::Result;
use crate::models::{SubmissionKey, SubmissionResult};

/// Process-local repository, one record per submission key
#[derive(Debug, Default)]
pub struct InMemorySubmissionRepository {
    records: DashMap<SubmissionKey, SubmissionResult>,
}

impl InMemorySubmissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &SubmissionKey) -> Option<SubmissionResult> {
        self.records.get(key).map(|entry| entry.value().clone())
    }
}

#[async_trait::async_trait]
impl SubmissionRepository for InMemorySubmissionRepository {
    async fn save(&self, result: &SubmissionResult) -> Result<()> {
        self.records.insert(result.key.clone(), result.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SubmissionResult>> {
        Ok(self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}
