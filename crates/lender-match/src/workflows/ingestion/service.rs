use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::schema::ParameterRegistry;
use crate::workflows::catalogue::{CatalogueRepository, LenderId, Policy, PolicyId};
use crate::workflows::dispatch::WorkflowDispatcher;
use crate::workflows::repository::RepositoryError;

use super::domain::{GuidelineDocument, IngestionSummary, IngestionTask, TaskId};
use super::extraction::{ExtractionAdapter, ExtractionError};
use super::reconcile::{reconcile, DropReason, DroppedRule};
use super::repository::{IngestionRecord, IngestionRepository};

/// Turns lender guideline documents into policies, growing the registry as needed.
pub struct IngestionService<T, C> {
    registry: Arc<ParameterRegistry>,
    tasks: Arc<T>,
    catalogue: Arc<C>,
    extractor: Arc<dyn ExtractionAdapter>,
    dispatcher: WorkflowDispatcher,
    timeout: Duration,
}

impl<T, C> IngestionService<T, C>
where
    T: IngestionRepository + 'static,
    C: CatalogueRepository + 'static,
{
    pub fn new(
        registry: Arc<ParameterRegistry>,
        tasks: Arc<T>,
        catalogue: Arc<C>,
        extractor: Arc<dyn ExtractionAdapter>,
        dispatcher: WorkflowDispatcher,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            tasks,
            catalogue,
            extractor,
            dispatcher,
            timeout,
        }
    }

    /// Persist a `Processing` task for the document. The lender must exist
    /// and the document must be a non-empty PDF.
    pub fn submit(
        &self,
        lender_id: LenderId,
        document: GuidelineDocument,
    ) -> Result<IngestionTask, IngestionError> {
        if !document.is_pdf() {
            return Err(IngestionError::InvalidDocument(
                "only PDF files are supported".to_string(),
            ));
        }
        if document.bytes.is_empty() {
            return Err(IngestionError::InvalidDocument("document is empty".to_string()));
        }
        self.catalogue
            .lender(&lender_id)?
            .ok_or(RepositoryError::NotFound)?;

        let task = IngestionTask::processing(lender_id, document.file_name.clone());
        let stored = self.tasks.insert(IngestionRecord { task, document })?;
        info!(task_id = %stored.id, %lender_id, file_name = %stored.file_name, "guideline ingestion queued");
        Ok(stored)
    }

    pub fn schedule(self: &Arc<Self>, task_id: TaskId) -> JoinHandle<()> {
        let service = Arc::clone(self);
        self.dispatcher.spawn("ingestion", async move {
            // Failures are already recorded on the task.
            let _ = service.run(&task_id).await;
        })
    }

    /// Extract, reconcile and commit one task. A failure before the commit
    /// leaves the registry and catalogue untouched and marks the task
    /// `Failed`. A failure to record completion after the commit is only
    /// logged, since the policy already exists.
    pub async fn run(&self, task_id: &TaskId) -> Result<IngestionTask, IngestionError> {
        match self.extract_and_commit(task_id).await {
            Ok(task) => Ok(task),
            Err(error @ IngestionError::StatusNotRecorded { .. }) => {
                error!(%task_id, %error, "guideline ingestion committed; task status write failed");
                Err(error)
            }
            Err(error) => {
                warn!(%task_id, %error, "guideline ingestion failed");
                if let Err(mark_error) = self.tasks.fail(task_id, error.to_string()) {
                    warn!(%task_id, error = %mark_error, "unable to record ingestion failure");
                }
                Err(error)
            }
        }
    }

    async fn extract_and_commit(&self, task_id: &TaskId) -> Result<IngestionTask, IngestionError> {
        let IngestionRecord { task, document } = self
            .tasks
            .fetch(task_id)?
            .ok_or(RepositoryError::NotFound)?;

        let schema = self.registry.active();
        let extraction = tokio::time::timeout(self.timeout, self.extractor.extract(&document, &schema))
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout.as_secs()))??;

        let reconciliation = reconcile(&extraction, &self.registry.snapshot());
        let mut dropped = reconciliation.dropped;
        let staged = reconciliation.new_definitions;
        let candidate_rules = reconciliation.bound_rules;
        let policy_name = format!("Policy from {}", task.file_name);

        let (policy, extension) = self.registry.extend_with(staged, |_, schema| {
            let mut rules = Vec::with_capacity(candidate_rules.len());
            for rule in candidate_rules {
                if schema.resolves(&rule.parameter_key) {
                    rules.push(rule);
                } else {
                    dropped.push(DroppedRule {
                        index: None,
                        parameter_key: Some(rule.parameter_key.clone()),
                        reason: DropReason::UnknownParameter(rule.parameter_key),
                    });
                }
            }
            self.catalogue
                .insert_policy(Policy::new(task.lender_id, policy_name, 0, rules))
        })?;

        let summary = IngestionSummary {
            rules_bound: policy.rules.len(),
            rules_dropped: dropped.len(),
            definitions_created: extension.created.len(),
            definitions_rebound: extension.rebound.len(),
        };
        let dropped: Vec<String> = dropped.iter().map(ToString::to_string).collect();
        let completed = self
            .tasks
            .complete(task_id, policy.id, summary, dropped)
            .map_err(|source| IngestionError::StatusNotRecorded {
                policy_id: policy.id,
                source,
            })?;

        info!(
            %task_id,
            policy_id = %policy.id,
            rules = summary.rules_bound,
            dropped = summary.rules_dropped,
            created = summary.definitions_created,
            "guideline ingestion completed"
        );
        Ok(completed)
    }

    pub fn get(&self, task_id: &TaskId) -> Result<IngestionTask, IngestionError> {
        let record = self
            .tasks
            .fetch(task_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record.task)
    }

    /// Re-dispatch tasks left in `Processing`, e.g. after a restart.
    pub fn resume_pending(self: &Arc<Self>, limit: usize) -> Result<usize, IngestionError> {
        let pending = self.tasks.pending(limit)?;
        for record in &pending {
            self.schedule(record.task.id);
        }
        if !pending.is_empty() {
            info!(count = pending.len(), "resumed pending guideline ingestions");
        }
        Ok(pending.len())
    }
}

/// Error raised by the ingestion service.
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("policy {policy_id} was created but the task status could not be recorded: {source}")]
    StatusNotRecorded {
        policy_id: PolicyId,
        source: RepositoryError,
    },
}
