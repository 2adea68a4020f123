use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::catalogue::PolicyId;
use crate::workflows::repository::RepositoryError;

use super::domain::{ApplicationId, ApplicationStatus, LoanApplication, MatchResult};

/// Repository record holding the application, its run status and its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub application: LoanApplication,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub matches: Vec<MatchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplicationRecord {
    pub fn processing(application: LoanApplication) -> Self {
        Self {
            application,
            status: ApplicationStatus::Processing,
            matches: Vec::new(),
            error: None,
        }
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.application.id,
            applicant_name: self.application.applicant_name.clone(),
            status: self.status.label(),
            match_count: self.matches.len(),
            eligible_count: self.matches.iter().filter(|result| result.eligible).count(),
            error: self.error.clone(),
            created_at: self.application.created_at,
        }
    }
}

/// Storage abstraction for applications and their match results.
///
/// `commit_matches` and `mark_failed` are the only ways results change, and
/// each must apply its whole effect atomically.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn list(&self) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    /// Records still in `Processing`, oldest first.
    fn pending(&self, limit: usize) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    /// Returns the record to `Processing`, clearing prior results and errors.
    fn reopen(&self, id: &ApplicationId) -> Result<(), RepositoryError>;
    /// Replaces all results and marks the record `Completed`.
    ///
    /// `policy_exists` is consulted under the store's lock and results for
    /// policies it rejects are discarded, so a policy deleted while the run
    /// was evaluating never leaves a result behind. Returns what was stored.
    fn commit_matches<F>(
        &self,
        id: &ApplicationId,
        matches: Vec<MatchResult>,
        policy_exists: F,
    ) -> Result<Vec<MatchResult>, RepositoryError>
    where
        F: Fn(&PolicyId) -> Result<bool, RepositoryError>;
    /// Discards all results and marks the record `Failed`.
    fn mark_failed(&self, id: &ApplicationId, reason: String) -> Result<(), RepositoryError>;
    /// Drops results belonging to a deleted policy; returns how many were removed.
    fn remove_matches_for_policy(&self, policy_id: &PolicyId) -> Result<usize, RepositoryError>;
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub applicant_name: String,
    pub status: &'static str,
    pub match_count: usize,
    pub eligible_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
