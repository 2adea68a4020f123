//! Lenders, their programs (policies) and parameter administration.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Lender, LenderId, Policy, PolicyId, PolicyRule, RuleDraft, RuleId, RuleOperator, RuleType,
};
pub use repository::CatalogueRepository;
pub use router::catalogue_router;
pub use service::{CatalogueError, CatalogueService, LenderDraft, PolicyDraft, PolicyPatch};
