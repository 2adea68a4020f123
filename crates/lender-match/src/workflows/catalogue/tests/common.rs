use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use serde_json::Value;

use crate::schema::{default_parameters, ParameterDefinition, ParameterRegistry};
use crate::workflows::catalogue::{
    CatalogueError, CatalogueRepository, CatalogueService, Lender, LenderDraft, LenderId, Policy,
    PolicyDraft, PolicyId, RuleDraft, RuleOperator,
};
use crate::workflows::repository::RepositoryError;

pub(super) use crate::workflows::testing::{MemoryApplications, MemoryCatalogue};

pub(super) type MemoryService = CatalogueService<MemoryCatalogue, MemoryApplications>;

pub(super) struct Harness {
    pub(super) service: Arc<MemoryService>,
    pub(super) registry: Arc<ParameterRegistry>,
    pub(super) applications: MemoryApplications,
}

pub(super) fn harness() -> Harness {
    let registry = Arc::new(ParameterRegistry::with_definitions(default_parameters()));
    let applications = MemoryApplications::default();
    let service = Arc::new(CatalogueService::new(
        Arc::clone(&registry),
        Arc::new(MemoryCatalogue::default()),
        Arc::new(applications.clone()),
    ));
    Harness {
        service,
        registry,
        applications,
    }
}

/// Catalogue that starts a hard delete of `key` on another thread whenever a
/// policy is edited, giving it time to run before the edit is written.
pub(super) struct DeletesKeyDuringEdit {
    pub(super) inner: MemoryCatalogue,
    pub(super) registry: Arc<ParameterRegistry>,
    pub(super) key: &'static str,
    pub(super) deletion: Mutex<Option<JoinHandle<Result<ParameterDefinition, CatalogueError>>>>,
}

impl CatalogueRepository for DeletesKeyDuringEdit {
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
        self.inner.policies()
    }

    fn modify_policy<T, E, F>(&self, id: &PolicyId, edit: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut Policy) -> Result<T, E>,
    {
        let registry = Arc::clone(&self.registry);
        let catalogue = self.inner.clone();
        let key = self.key;
        let deletion = thread::spawn(move || {
            registry.remove_checked(key, |key| {
                if catalogue.references_parameter(key)? {
                    return Err(CatalogueError::ParameterInUse(key.to_string()));
                }
                Ok(())
            })
        });
        *self.deletion.lock().expect("deletion mutex poisoned") = Some(deletion);
        thread::sleep(Duration::from_millis(50));
        self.inner.modify_policy(id, edit)
    }

    fn delete_policy(&self, id: &PolicyId) -> Result<Policy, RepositoryError> {
        self.inner.delete_policy(id)
    }
}

pub(super) fn lender(service: &MemoryService, name: &str) -> Lender {
    service
        .create_lender(LenderDraft {
            name: name.to_string(),
            description: None,
        })
        .expect("lender created")
}

pub(super) fn tier_a(service: &MemoryService, lender: &Lender) -> Policy {
    service
        .create_policy(
            lender.id,
            PolicyDraft {
                name: "Tier A".to_string(),
                min_fit_score: 70,
                rules: vec![
                    RuleDraft::eligibility("fico_score", RuleOperator::Gte, 650),
                    RuleDraft::scoring("years_in_business", RuleOperator::Gte, 2, 10),
                ],
            },
        )
        .expect("policy created")
}

pub(super) fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request builds")
}

pub(super) async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
