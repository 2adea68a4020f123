use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::schema::{
    LiveSchema, ParameterDefinition, ParameterPatch, ParameterRegistry, RegistryError,
};
use crate::workflows::matching::ApplicationRepository;
use crate::workflows::repository::RepositoryError;

use super::domain::{Lender, LenderId, Policy, PolicyId, PolicyRule, RuleDraft, RuleId};
use super::repository::CatalogueRepository;

/// Payload for registering a lender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LenderDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Payload for creating a policy by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDraft {
    pub name: String,
    #[serde(default)]
    pub min_fit_score: u8,
    #[serde(default)]
    pub rules: Vec<RuleDraft>,
}

/// Partial update of a policy's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub min_fit_score: Option<u8>,
}

/// Administration of parameters, lenders, policies and rules.
pub struct CatalogueService<C, A> {
    registry: Arc<ParameterRegistry>,
    catalogue: Arc<C>,
    applications: Arc<A>,
}

impl<C, A> CatalogueService<C, A>
where
    C: CatalogueRepository + 'static,
    A: ApplicationRepository + 'static,
{
    pub fn new(registry: Arc<ParameterRegistry>, catalogue: Arc<C>, applications: Arc<A>) -> Self {
        Self {
            registry,
            catalogue,
            applications,
        }
    }

    pub fn parameters(&self, active_only: bool) -> Vec<ParameterDefinition> {
        if active_only {
            self.registry.active()
        } else {
            self.registry.all()
        }
    }

    pub fn parameter(&self, key: &str) -> Result<ParameterDefinition, CatalogueError> {
        Ok(self.registry.lookup(key)?)
    }

    pub fn create_parameter(
        &self,
        definition: ParameterDefinition,
    ) -> Result<ParameterDefinition, CatalogueError> {
        Ok(self.registry.create(definition)?)
    }

    pub fn update_parameter(
        &self,
        key: &str,
        patch: ParameterPatch,
    ) -> Result<ParameterDefinition, CatalogueError> {
        Ok(self.registry.update(key, patch)?)
    }

    /// Soft delete deactivates; hard delete removes the definition and is
    /// refused while any rule references the key.
    pub fn delete_parameter(
        &self,
        key: &str,
        hard_delete: bool,
    ) -> Result<ParameterDefinition, CatalogueError> {
        if !hard_delete {
            return Ok(self.registry.deactivate(key)?);
        }

        let removed = self.registry.remove_checked(key, |key| {
            if self.catalogue.references_parameter(key)? {
                return Err(CatalogueError::ParameterInUse(key.to_string()));
            }
            Ok(())
        })?;
        info!(%key, "parameter removed");
        Ok(removed)
    }

    pub fn create_lender(&self, draft: LenderDraft) -> Result<Lender, CatalogueError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(CatalogueError::EmptyName);
        }
        let lender = self
            .catalogue
            .insert_lender(Lender::new(name, draft.description))?;
        info!(lender_id = %lender.id, name = %lender.name, "lender created");
        Ok(lender)
    }

    pub fn lenders(&self) -> Result<Vec<Lender>, CatalogueError> {
        Ok(self.catalogue.lenders()?)
    }

    pub fn lender(&self, id: &LenderId) -> Result<Lender, CatalogueError> {
        Ok(self.catalogue.lender(id)?.ok_or(RepositoryError::NotFound)?)
    }

    pub fn lender_policies(&self, id: &LenderId) -> Result<Vec<Policy>, CatalogueError> {
        self.lender(id)?;
        Ok(self.catalogue.policies_for_lender(id)?)
    }

    pub fn create_policy(
        &self,
        lender_id: LenderId,
        draft: PolicyDraft,
    ) -> Result<Policy, CatalogueError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(CatalogueError::EmptyName);
        }

        let (policy, _) = self.registry.extend_with(Vec::new(), |_, schema| {
            check_rules(schema, &draft.rules)?;
            let policy = Policy::new(lender_id, name, draft.min_fit_score, draft.rules);
            Ok::<_, CatalogueError>(self.catalogue.insert_policy(policy)?)
        })?;
        info!(policy_id = %policy.id, %lender_id, rules = policy.rules.len(), "policy created");
        Ok(policy)
    }

    pub fn policies(&self, lender_id: Option<LenderId>) -> Result<Vec<Policy>, CatalogueError> {
        match lender_id {
            Some(lender_id) => Ok(self.catalogue.policies_for_lender(&lender_id)?),
            None => Ok(self.catalogue.policies()?),
        }
    }

    pub fn policy(&self, id: &PolicyId) -> Result<Policy, CatalogueError> {
        Ok(self.catalogue.policy(id)?.ok_or(RepositoryError::NotFound)?)
    }

    pub fn update_policy(&self, id: &PolicyId, patch: PolicyPatch) -> Result<Policy, CatalogueError> {
        let name = match patch.name {
            Some(name) if name.trim().is_empty() => return Err(CatalogueError::EmptyName),
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        self.catalogue.modify_policy(id, |policy| {
            if let Some(name) = name {
                policy.name = name;
            }
            if let Some(min_fit_score) = patch.min_fit_score {
                policy.min_fit_score = min_fit_score.min(100);
            }
            Ok(touch(policy))
        })
    }

    /// Replaces every rule of the policy, keeping the given order.
    pub fn replace_rules(
        &self,
        id: &PolicyId,
        drafts: Vec<RuleDraft>,
    ) -> Result<Policy, CatalogueError> {
        let (policy, _) = self.registry.extend_with(Vec::new(), |_, schema| {
            check_rules(schema, &drafts)?;
            self.catalogue.modify_policy::<_, CatalogueError, _>(id, |policy| {
                let policy_id = policy.id;
                policy.rules = drafts
                    .into_iter()
                    .map(|draft| draft.attach(policy_id))
                    .collect();
                Ok(touch(policy))
            })
        })?;
        Ok(policy)
    }

    /// Appends one rule. The key check and the write happen under the
    /// registry writer lock, so a concurrent hard delete either sees the new
    /// rule or removes the key before the check rejects it.
    pub fn add_rule(&self, id: &PolicyId, draft: RuleDraft) -> Result<PolicyRule, CatalogueError> {
        let (rule, _) = self.registry.extend_with(Vec::new(), |_, schema| {
            check_rules(schema, std::slice::from_ref(&draft))?;
            self.catalogue.modify_policy::<_, CatalogueError, _>(id, |policy| {
                let rule = draft.attach(policy.id);
                policy.rules.push(rule.clone());
                touch(policy);
                Ok(rule)
            })
        })?;
        Ok(rule)
    }

    pub fn delete_rule(&self, policy_id: &PolicyId, rule_id: &RuleId) -> Result<(), CatalogueError> {
        self.catalogue.modify_policy(policy_id, |policy| {
            let before = policy.rules.len();
            policy.rules.retain(|rule| &rule.id != rule_id);
            if policy.rules.len() == before {
                return Err(RepositoryError::NotFound.into());
            }
            touch(policy);
            Ok(())
        })
    }

    /// Deletes the policy, its rules and every match result produced for it.
    pub fn delete_policy(&self, id: &PolicyId) -> Result<Policy, CatalogueError> {
        let policy = self.catalogue.delete_policy(id)?;
        let removed = self.applications.remove_matches_for_policy(id)?;
        info!(policy_id = %id, match_results = removed, "policy deleted");
        Ok(policy)
    }
}

fn touch(policy: &mut Policy) -> Policy {
    policy.updated_at = Utc::now();
    policy.clone()
}

fn check_rules(schema: &LiveSchema<'_>, drafts: &[RuleDraft]) -> Result<(), CatalogueError> {
    match drafts
        .iter()
        .find(|draft| !schema.resolves(&draft.parameter_key))
    {
        Some(draft) => Err(CatalogueError::UnknownParameter(draft.parameter_key.clone())),
        None => Ok(()),
    }
}

/// Error raised by catalogue administration.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("rule references unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("parameter '{0}' is referenced by policy rules and cannot be removed")]
    ParameterInUse(String),
    #[error("name must not be empty")]
    EmptyName,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
