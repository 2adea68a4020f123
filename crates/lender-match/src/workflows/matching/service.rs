use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::schema::{validate_form_data, ParameterRegistry, SchemaValidationError};
use crate::workflows::catalogue::CatalogueRepository;
use crate::workflows::dispatch::WorkflowDispatcher;
use crate::workflows::repository::RepositoryError;

use super::domain::{ApplicationId, ApplicationSubmission, LoanApplication, MatchResult, MatchView};
use super::evaluation::MatchEngine;
use super::repository::{ApplicationRecord, ApplicationRepository};

const UNKNOWN_LENDER: &str = "Unknown Lender";

/// Service composing the registry, the policy catalogue and the application store.
pub struct MatchingService<A, C> {
    registry: Arc<ParameterRegistry>,
    applications: Arc<A>,
    catalogue: Arc<C>,
    dispatcher: WorkflowDispatcher,
}

impl<A, C> MatchingService<A, C>
where
    A: ApplicationRepository + 'static,
    C: CatalogueRepository + 'static,
{
    pub fn new(
        registry: Arc<ParameterRegistry>,
        applications: Arc<A>,
        catalogue: Arc<C>,
        dispatcher: WorkflowDispatcher,
    ) -> Self {
        Self {
            registry,
            applications,
            catalogue,
            dispatcher,
        }
    }

    /// Validate and persist a submission as `Processing`. Nothing is stored
    /// when validation fails.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<ApplicationRecord, MatchingServiceError> {
        let applicant_name = submission.applicant_name.trim();
        if applicant_name.is_empty() {
            return Err(MatchingServiceError::MissingApplicantName);
        }

        let form_data = validate_form_data(submission.form_data, &self.registry)?;
        let application = LoanApplication::new(applicant_name, form_data);
        let stored = self
            .applications
            .insert(ApplicationRecord::processing(application))?;

        info!(
            application_id = %stored.application.id,
            fields = stored.application.form_data.len(),
            "application submitted"
        );
        Ok(stored)
    }

    /// Run matching on the dispatcher pool.
    pub fn schedule(self: &Arc<Self>, application_id: ApplicationId) -> JoinHandle<()> {
        let service = Arc::clone(self);
        self.dispatcher.spawn("matching", async move {
            // Failures are already recorded on the application.
            let _ = service.run_matching(&application_id);
        })
    }

    /// Evaluate the application against every policy and commit the batch.
    ///
    /// Either every result is committed together with `Completed`, or none is
    /// and the application ends `Failed`.
    pub fn run_matching(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<MatchResult>, MatchingServiceError> {
        match self.evaluate_and_commit(application_id) {
            Ok(results) => {
                info!(
                    %application_id,
                    policies = results.len(),
                    eligible = results.iter().filter(|result| result.eligible).count(),
                    "matching completed"
                );
                Ok(results)
            }
            Err(error) => {
                warn!(%application_id, %error, "matching failed");
                if let Err(mark_error) = self
                    .applications
                    .mark_failed(application_id, error.to_string())
                {
                    warn!(%application_id, error = %mark_error, "unable to record matching failure");
                }
                Err(error)
            }
        }
    }

    fn evaluate_and_commit(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<MatchResult>, MatchingServiceError> {
        let record = self
            .applications
            .fetch(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        let policies = self.catalogue.policies()?;

        let engine = MatchEngine::new(self.registry.labels());
        let results = engine.match_application(&record.application, &policies, Utc::now());
        let evaluated = results.len();

        let stored = self
            .applications
            .commit_matches(application_id, results, |policy_id| {
                Ok(self.catalogue.policy(policy_id)?.is_some())
            })?;
        if stored.len() < evaluated {
            debug!(
                %application_id,
                discarded = evaluated - stored.len(),
                "results for policies deleted during matching discarded"
            );
        }
        Ok(stored)
    }

    /// Reset the application to `Processing` and run matching again.
    pub fn rematch(
        self: &Arc<Self>,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, MatchingServiceError> {
        self.applications.reopen(application_id)?;
        let record = self.get(application_id)?;
        self.schedule(*application_id);
        Ok(record)
    }

    /// Re-dispatch applications left in `Processing`, e.g. after a restart.
    pub fn resume_pending(self: &Arc<Self>, limit: usize) -> Result<usize, MatchingServiceError> {
        let pending = self.applications.pending(limit)?;
        for record in &pending {
            self.schedule(record.application.id);
        }
        if !pending.is_empty() {
            info!(count = pending.len(), "resumed pending matching runs");
        }
        Ok(pending.len())
    }

    pub fn get(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, MatchingServiceError> {
        let record = self
            .applications
            .fetch(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// All applications, newest first.
    pub fn list(&self) -> Result<Vec<ApplicationRecord>, MatchingServiceError> {
        let mut records = self.applications.list()?;
        records.sort_by(|left, right| right.application.created_at.cmp(&left.application.created_at));
        Ok(records)
    }

    /// Results annotated with lender and program names, best fit first.
    pub fn matches(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<MatchView>, MatchingServiceError> {
        let record = self.get(application_id)?;

        let mut views = Vec::with_capacity(record.matches.len());
        for result in record.matches {
            let Some(policy) = self.catalogue.policy(&result.policy_id)? else {
                continue;
            };
            let lender_name = self
                .catalogue
                .lender(&policy.lender_id)?
                .map(|lender| lender.name)
                .unwrap_or_else(|| UNKNOWN_LENDER.to_string());

            views.push(MatchView {
                policy_id: policy.id,
                lender_name,
                program_name: policy.name,
                min_fit_score: policy.min_fit_score,
                eligible: result.eligible,
                fit_score: result.fit_score,
                evaluations: result.evaluations,
                matched_at: result.matched_at,
            });
        }

        views.sort_by(|left, right| right.fit_score.cmp(&left.fit_score));
        Ok(views)
    }
}

/// Error raised by the matching service.
#[derive(Debug, thiserror::Error)]
pub enum MatchingServiceError {
    #[error("applicant name must not be empty")]
    MissingApplicantName,
    #[error(transparent)]
    Validation(#[from] SchemaValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
