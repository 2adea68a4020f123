use std::sync::{Arc, Mutex};

use axum::body::to_bytes;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::schema::{default_parameters, FieldValue, FormData, ParameterRegistry};
use crate::workflows::catalogue::{
    CatalogueRepository, Lender, LenderId, Policy, PolicyId, RuleDraft, RuleOperator,
};
use crate::workflows::dispatch::WorkflowDispatcher;
use crate::workflows::matching::{
    ApplicationRepository, ApplicationSubmission, LoanApplication, MatchingService,
};
use crate::workflows::repository::RepositoryError;

pub(super) use crate::workflows::testing::{MemoryApplications, MemoryCatalogue, UnavailableStore};

pub(super) type MemoryService = MatchingService<MemoryApplications, MemoryCatalogue>;

pub(super) fn registry() -> Arc<ParameterRegistry> {
    Arc::new(ParameterRegistry::with_definitions(default_parameters()))
}

pub(super) struct Harness {
    pub(super) service: Arc<MemoryService>,
    pub(super) applications: MemoryApplications,
    pub(super) catalogue: MemoryCatalogue,
}

pub(super) fn harness() -> Harness {
    let applications = MemoryApplications::default();
    let catalogue = MemoryCatalogue::default();
    let service = Arc::new(MatchingService::new(
        registry(),
        Arc::new(applications.clone()),
        Arc::new(catalogue.clone()),
        WorkflowDispatcher::new(2),
    ));
    Harness {
        service,
        applications,
        catalogue,
    }
}

/// Catalogue that deletes one policy, cascading to its match results,
/// right after a matching run has read the policy list.
pub(super) struct DeletesAfterListing {
    pub(super) inner: MemoryCatalogue,
    pub(super) applications: MemoryApplications,
    pub(super) doomed: Mutex<Option<PolicyId>>,
}

impl CatalogueRepository for DeletesAfterListing {
    fn insert_lender(&self, lender: Lender) -> Result<Lender, RepositoryError> {
        self.inner.insert_lender(lender)
    }

    fn lender(&self, id: &LenderId) -> Result<Option<Lender>, RepositoryError> {
        self.inner.lender(id)
    }

    fn lenders(&self) -> Result<Vec<Lender>, RepositoryError> {
        self.inner.lenders()
    }

    fn insert_policy(&self, policy: Policy) -> Result<Policy, RepositoryError> {
        self.inner.insert_policy(policy)
    }

    fn policy(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError> {
        self.inner.policy(id)
    }

    fn policies(&self) -> Result<Vec<Policy>, RepositoryError> {
        let policies = self.inner.policies()?;
        let doomed = self.doomed.lock().expect("doomed mutex poisoned").take();
        if let Some(id) = doomed {
            self.inner.delete_policy(&id)?;
            self.applications.remove_matches_for_policy(&id)?;
        }
        Ok(policies)
    }

    fn modify_policy<T, E, F>(&self, id: &PolicyId, edit: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut Policy) -> Result<T, E>,
    {
        self.inner.modify_policy(id, edit)
    }

    fn delete_policy(&self, id: &PolicyId) -> Result<Policy, RepositoryError> {
        self.inner.delete_policy(id)
    }
}

/// Registers a lender with a single program built from `rules`.
pub(super) fn seed_policy(
    catalogue: &MemoryCatalogue,
    lender_name: &str,
    program: &str,
    min_fit_score: u8,
    rules: Vec<RuleDraft>,
) -> Policy {
    let lender = catalogue
        .insert_lender(Lender::new(lender_name, None))
        .expect("lender stored");
    catalogue
        .insert_policy(Policy::new(lender.id, program, min_fit_score, rules))
        .expect("policy stored")
}

pub(super) fn fico_gate() -> Vec<RuleDraft> {
    vec![RuleDraft::eligibility("fico_score", RuleOperator::Gte, 650)]
}

pub(super) fn submission(form_data: Value) -> ApplicationSubmission {
    ApplicationSubmission {
        applicant_name: "Acme Freight LLC".to_string(),
        form_data: serde_json::from_value(form_data).expect("object literal"),
    }
}

pub(super) fn application(fields: &[(&str, FieldValue)]) -> LoanApplication {
    let form_data: FormData = fields
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    LoanApplication::new("Acme Freight LLC", form_data)
}

pub(super) fn matched_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn trucking_form() -> Value {
    json!({
        "fico_score": 700,
        "annual_revenue": 250000,
        "years_in_business": 3,
        "business_type": "Trucking",
        "has_bankruptcy": false,
    })
}

pub(super) async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
