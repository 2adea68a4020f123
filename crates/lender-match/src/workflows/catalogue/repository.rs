use crate::workflows::repository::RepositoryError;

use super::domain::{Lender, LenderId, Policy, PolicyId};

/// Storage abstraction for lenders and their programs.
///
/// Policies own their rules: `insert_policy`, `modify_policy` and
/// `delete_policy` always write the complete rule list with the policy.
pub trait CatalogueRepository: Send + Sync {
    fn insert_lender(&self, lender: Lender) -> Result<Lender, RepositoryError>;
    fn lender(&self, id: &LenderId) -> Result<Option<Lender>, RepositoryError>;
    fn lenders(&self) -> Result<Vec<Lender>, RepositoryError>;

    /// Fails with `NotFound` when the owning lender does not exist.
    fn insert_policy(&self, policy: Policy) -> Result<Policy, RepositoryError>;
    fn policy(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError>;
    fn policies(&self) -> Result<Vec<Policy>, RepositoryError>;
    /// Applies `edit` to the stored policy under the store's lock. The edit
    /// works on a copy that replaces the stored policy only when it returns
    /// `Ok`, so concurrent edits of one policy never overwrite each other.
    fn modify_policy<T, E, F>(&self, id: &PolicyId, edit: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut Policy) -> Result<T, E>;
    fn delete_policy(&self, id: &PolicyId) -> Result<Policy, RepositoryError>;

    fn policies_for_lender(&self, id: &LenderId) -> Result<Vec<Policy>, RepositoryError> {
        Ok(self
            .policies()?
            .into_iter()
            .filter(|policy| &policy.lender_id == id)
            .collect())
    }

    /// Whether any rule of any policy references `key`.
    fn references_parameter(&self, key: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .policies()?
            .iter()
            .any(|policy| policy.references_parameter(key)))
    }
}
