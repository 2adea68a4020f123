use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use lender_match::config::ExtractionConfig;
use lender_match::schema::ParameterRegistry;
use lender_match::workflows::catalogue::{
    CatalogueRepository, CatalogueService, Lender, LenderId, Policy, PolicyId,
};
use lender_match::workflows::ingestion::{
    DisabledExtractor, ExtractionAdapter, GeminiExtractionAdapter, IngestionRecord,
    IngestionRepository, IngestionService, IngestionStatus, IngestionSummary, IngestionTask,
    TaskId,
};
use lender_match::workflows::matching::{
    ApplicationId, ApplicationRecord, ApplicationRepository, ApplicationStatus, MatchResult,
    MatchingService,
};
use lender_match::workflows::{RepositoryError, WorkflowDispatcher};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCatalogueRepository {
    lenders: Arc<Mutex<HashMap<LenderId, Lender>>>,
    policies: Arc<Mutex<BTreeMap<PolicyId, Policy>>>,
}

impl CatalogueRepository for InMemoryCatalogueRepository {
    fn insert_lender(&self, lender: Lender) -> Result<Lender, RepositoryError> {
        let mut guard = self.lenders.lock().expect("catalogue mutex poisoned");
        if guard.contains_key(&lender.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(lender.id, lender.clone());
        Ok(lender)
    }

    fn lender(&self, id: &LenderId) -> Result<Option<Lender>, RepositoryError> {
        let guard = self.lenders.lock().expect("catalogue mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn lenders(&self) -> Result<Vec<Lender>, RepositoryError> {
        let guard = self.lenders.lock().expect("catalogue mutex poisoned");
        let mut lenders: Vec<Lender> = guard.values().cloned().collect();
        lenders.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(lenders)
    }

    fn insert_policy(&self, policy: Policy) -> Result<Policy, RepositoryError> {
        if self.lender(&policy.lender_id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        let mut guard = self.policies.lock().expect("catalogue mutex poisoned");
        if guard.contains_key(&policy.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(policy.id, policy.clone());
        Ok(policy)
    }

    fn policy(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError> {
        let guard = self.policies.lock().expect("catalogue mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn policies(&self) -> Result<Vec<Policy>, RepositoryError> {
        let guard = self.policies.lock().expect("catalogue mutex poisoned");
        let mut policies: Vec<Policy> = guard.values().cloned().collect();
        policies.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(policies)
    }

    fn modify_policy<T, E, F>(&self, id: &PolicyId, edit: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut Policy) -> Result<T, E>,
    {
        let mut guard = self.policies.lock().expect("catalogue mutex poisoned");
        let slot = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        let mut edited = slot.clone();
        let value = edit(&mut edited)?;
        *slot = edited;
        Ok(value)
    }

    fn delete_policy(&self, id: &PolicyId) -> Result<Policy, RepositoryError> {
        let mut guard = self.policies.lock().expect("catalogue mutex poisoned");
        guard.remove(id).ok_or(RepositoryError::NotFound)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl InMemoryApplicationRepository {
    fn modify<F>(&self, id: &ApplicationId, apply: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut ApplicationRecord),
    {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        apply(record);
        Ok(())
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.application.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.application.id, record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn pending(&self, limit: usize) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut pending: Vec<ApplicationRecord> = guard
            .values()
            .filter(|record| record.status == ApplicationStatus::Processing)
            .cloned()
            .collect();
        pending.sort_by_key(|record| record.application.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    fn reopen(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        self.modify(id, |record| {
            record.status = ApplicationStatus::Processing;
            record.matches.clear();
            record.error = None;
        })
    }

    fn commit_matches<F>(
        &self,
        id: &ApplicationId,
        matches: Vec<MatchResult>,
        policy_exists: F,
    ) -> Result<Vec<MatchResult>, RepositoryError>
    where
        F: Fn(&PolicyId) -> Result<bool, RepositoryError>,
    {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        let mut stored = Vec::with_capacity(matches.len());
        for result in matches {
            if policy_exists(&result.policy_id)? {
                stored.push(result);
            }
        }
        record.status = ApplicationStatus::Completed;
        record.matches = stored.clone();
        record.error = None;
        Ok(stored)
    }

    fn mark_failed(&self, id: &ApplicationId, reason: String) -> Result<(), RepositoryError> {
        self.modify(id, |record| {
            record.status = ApplicationStatus::Failed;
            record.matches.clear();
            record.error = Some(reason);
        })
    }

    fn remove_matches_for_policy(&self, policy_id: &PolicyId) -> Result<usize, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let mut removed = 0;
        for record in guard.values_mut() {
            let before = record.matches.len();
            record.matches.retain(|result| &result.policy_id != policy_id);
            removed += before - record.matches.len();
        }
        Ok(removed)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryTaskRepository {
    records: Arc<Mutex<HashMap<TaskId, IngestionRecord>>>,
}

impl InMemoryTaskRepository {
    fn finish<F>(&self, id: &TaskId, apply: F) -> Result<IngestionTask, RepositoryError>
    where
        F: FnOnce(&mut IngestionTask),
    {
        let mut guard = self.records.lock().expect("task mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        apply(&mut record.task);
        record.task.finished_at = Some(Utc::now());
        Ok(record.task.clone())
    }
}

impl IngestionRepository for InMemoryTaskRepository {
    fn insert(&self, record: IngestionRecord) -> Result<IngestionTask, RepositoryError> {
        let mut guard = self.records.lock().expect("task mutex poisoned");
        if guard.contains_key(&record.task.id) {
            return Err(RepositoryError::Conflict);
        }
        let task = record.task.clone();
        guard.insert(task.id, record);
        Ok(task)
    }

    fn fetch(&self, id: &TaskId) -> Result<Option<IngestionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("task mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn pending(&self, limit: usize) -> Result<Vec<IngestionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("task mutex poisoned");
        let mut pending: Vec<IngestionRecord> = guard
            .values()
            .filter(|record| record.task.status == IngestionStatus::Processing)
            .cloned()
            .collect();
        pending.sort_by_key(|record| record.task.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    fn complete(
        &self,
        id: &TaskId,
        policy_id: PolicyId,
        summary: IngestionSummary,
        dropped: Vec<String>,
    ) -> Result<IngestionTask, RepositoryError> {
        self.finish(id, |task| {
            task.status = IngestionStatus::Completed;
            task.policy_id = Some(policy_id);
            task.summary = summary;
            task.dropped = dropped;
            task.error = None;
        })
    }

    fn fail(&self, id: &TaskId, reason: String) -> Result<IngestionTask, RepositoryError> {
        self.finish(id, |task| {
            task.status = IngestionStatus::Failed;
            task.error = Some(reason);
        })
    }
}

pub(crate) type Catalogue =
    CatalogueService<InMemoryCatalogueRepository, InMemoryApplicationRepository>;
pub(crate) type Matching =
    MatchingService<InMemoryApplicationRepository, InMemoryCatalogueRepository>;
pub(crate) type Ingestion = IngestionService<InMemoryTaskRepository, InMemoryCatalogueRepository>;

/// Workflow services wired over shared in-memory stores.
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) catalogue: Arc<Catalogue>,
    pub(crate) matching: Arc<Matching>,
    pub(crate) ingestion: Arc<Ingestion>,
}

impl Services {
    pub(crate) fn in_memory(
        registry: Arc<ParameterRegistry>,
        extractor: Arc<dyn ExtractionAdapter>,
        dispatcher: WorkflowDispatcher,
        extraction_timeout: Duration,
    ) -> Self {
        let catalogue = Arc::new(InMemoryCatalogueRepository::default());
        let applications = Arc::new(InMemoryApplicationRepository::default());
        let tasks = Arc::new(InMemoryTaskRepository::default());

        Self {
            catalogue: Arc::new(CatalogueService::new(
                Arc::clone(&registry),
                Arc::clone(&catalogue),
                Arc::clone(&applications),
            )),
            matching: Arc::new(MatchingService::new(
                Arc::clone(&registry),
                applications,
                Arc::clone(&catalogue),
                dispatcher.clone(),
            )),
            ingestion: Arc::new(IngestionService::new(
                registry,
                tasks,
                catalogue,
                extractor,
                dispatcher,
                extraction_timeout,
            )),
        }
    }
}

/// Gemini when an API key is configured, otherwise an adapter that fails
/// every extraction as unconfigured.
pub(crate) fn extraction_adapter(config: &ExtractionConfig) -> Arc<dyn ExtractionAdapter> {
    match GeminiExtractionAdapter::from_config(config) {
        Some(adapter) => {
            info!(model = adapter.model(), "guideline extraction enabled");
            Arc::new(adapter)
        }
        None => {
            warn!("no Gemini API key configured; guideline ingestion will fail");
            Arc::new(DisabledExtractor)
        }
    }
}
