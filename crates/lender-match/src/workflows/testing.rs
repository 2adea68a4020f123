//! In-memory repositories shared by the workflow test suites.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::workflows::catalogue::{CatalogueRepository, Lender, LenderId, Policy, PolicyId};
use crate::workflows::ingestion::{
    IngestionRecord, IngestionRepository, IngestionStatus, IngestionSummary, IngestionTask, TaskId,
};
use crate::workflows::matching::{
    ApplicationId, ApplicationRecord, ApplicationRepository, ApplicationStatus, MatchResult,
};
use crate::workflows::repository::RepositoryError;

#[derive(Default, Clone)]
pub(crate) struct MemoryCatalogue {
    lenders: Arc<Mutex<HashMap<LenderId, Lender>>>,
    policies: Arc<Mutex<BTreeMap<PolicyId, Policy>>>,
}

impl CatalogueRepository for MemoryCatalogue {
    fn insert_lender(&self, lender: Lender) -> Result<Lender, RepositoryError> {
        let mut guard = self.lenders.lock().expect("repository mutex poisoned");
        if guard.contains_key(&lender.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(lender.id, lender.clone());
        Ok(lender)
    }

    fn lender(&self, id: &LenderId) -> Result<Option<Lender>, RepositoryError> {
        let guard = self.lenders.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn lenders(&self) -> Result<Vec<Lender>, RepositoryError> {
        let guard = self.lenders.lock().expect("repository mutex poisoned");
        let mut lenders: Vec<Lender> = guard.values().cloned().collect();
        lenders.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(lenders)
    }

    fn insert_policy(&self, policy: Policy) -> Result<Policy, RepositoryError> {
        if self.lender(&policy.lender_id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        let mut guard = self.policies.lock().expect("repository mutex poisoned");
        if guard.contains_key(&policy.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(policy.id, policy.clone());
        Ok(policy)
    }

    fn policy(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError> {
        let guard = self.policies.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn policies(&self) -> Result<Vec<Policy>, RepositoryError> {
        let guard = self.policies.lock().expect("repository mutex poisoned");
        let mut policies: Vec<Policy> = guard.values().cloned().collect();
        policies.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(policies)
    }

    fn modify_policy<T, E, F>(&self, id: &PolicyId, edit: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut Policy) -> Result<T, E>,
    {
        let mut guard = self.policies.lock().expect("repository mutex poisoned");
        let existing = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        let mut edited = existing.clone();
        let value = edit(&mut edited)?;
        *existing = edited;
        Ok(value)
    }

    fn delete_policy(&self, id: &PolicyId) -> Result<Policy, RepositoryError> {
        let mut guard = self.policies.lock().expect("repository mutex poisoned");
        guard.remove(id).ok_or(RepositoryError::NotFound)
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryApplications {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl MemoryApplications {
    fn with_record<F>(&self, id: &ApplicationId, update: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut ApplicationRecord),
    {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        update(record);
        Ok(())
    }
}

impl ApplicationRepository for MemoryApplications {
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
        pending.sort_by(|left, right| left.application.created_at.cmp(&right.application.created_at));
        pending.truncate(limit);
        Ok(pending)
    }

    fn reopen(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        self.with_record(id, |record| {
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
        let mut kept = Vec::with_capacity(matches.len());
        for result in matches {
            if policy_exists(&result.policy_id)? {
                kept.push(result);
            }
        }
        record.status = ApplicationStatus::Completed;
        record.matches = kept.clone();
        record.error = None;
        Ok(kept)
    }

    fn mark_failed(&self, id: &ApplicationId, reason: String) -> Result<(), RepositoryError> {
        self.with_record(id, |record| {
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
pub(crate) struct MemoryTasks {
    records: Arc<Mutex<HashMap<TaskId, IngestionRecord>>>,
}

impl MemoryTasks {
    fn finish<F>(&self, id: &TaskId, update: F) -> Result<IngestionTask, RepositoryError>
    where
        F: FnOnce(&mut IngestionTask),
    {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        update(&mut record.task);
        record.task.finished_at = Some(Utc::now());
        Ok(record.task.clone())
    }
}

impl IngestionRepository for MemoryTasks {
    fn insert(&self, record: IngestionRecord) -> Result<IngestionTask, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.task.id) {
            return Err(RepositoryError::Conflict);
        }
        let task = record.task.clone();
        guard.insert(task.id, record);
        Ok(task)
    }

    fn fetch(&self, id: &TaskId) -> Result<Option<IngestionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn pending(&self, limit: usize) -> Result<Vec<IngestionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut pending: Vec<IngestionRecord> = guard
            .values()
            .filter(|record| record.task.status == IngestionStatus::Processing)
            .cloned()
            .collect();
        pending.sort_by(|left, right| left.task.created_at.cmp(&right.task.created_at));
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

/// Repository whose every call fails, for exercising error paths.
pub(crate) struct UnavailableStore;

impl CatalogueRepository for UnavailableStore {
    fn insert_lender(&self, _lender: Lender) -> Result<Lender, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn lender(&self, _id: &LenderId) -> Result<Option<Lender>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn lenders(&self) -> Result<Vec<Lender>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_policy(&self, _policy: Policy) -> Result<Policy, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn policy(&self, _id: &PolicyId) -> Result<Option<Policy>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn policies(&self) -> Result<Vec<Policy>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn modify_policy<T, E, F>(&self, _id: &PolicyId, _edit: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut Policy) -> Result<T, E>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }

    fn delete_policy(&self, _id: &PolicyId) -> Result<Policy, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}
