use crate::workflows::catalogue::PolicyId;
use crate::workflows::repository::RepositoryError;

use super::domain::{GuidelineDocument, IngestionSummary, IngestionTask, TaskId};

/// Task plus the document it was created for.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionRecord {
    pub task: IngestionTask,
    pub document: GuidelineDocument,
}

/// Storage abstraction for ingestion tasks.
pub trait IngestionRepository: Send + Sync {
    fn insert(&self, record: IngestionRecord) -> Result<IngestionTask, RepositoryError>;
    fn fetch(&self, id: &TaskId) -> Result<Option<IngestionRecord>, RepositoryError>;
    /// Records still in `Processing`, oldest first.
    fn pending(&self, limit: usize) -> Result<Vec<IngestionRecord>, RepositoryError>;
    fn complete(
        &self,
        id: &TaskId,
        policy_id: PolicyId,
        summary: IngestionSummary,
        dropped: Vec<String>,
    ) -> Result<IngestionTask, RepositoryError>;
    fn fail(&self, id: &TaskId, reason: String) -> Result<IngestionTask, RepositoryError>;
}
