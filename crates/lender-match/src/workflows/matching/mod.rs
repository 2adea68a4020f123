//! Application intake and lender matching.
//!
//! Submissions are validated against the parameter registry, stored as
//! `Processing`, and matched in the background against every policy in the
//! catalogue. A run commits all of its results at once or marks the
//! application failed.

pub mod domain;
pub mod evaluation;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, EvaluationRecord, LoanApplication,
    MatchResult, MatchView,
};
pub use evaluation::{fit_score, MatchEngine};
pub use repository::{ApplicationRecord, ApplicationRepository, ApplicationStatusView};
pub use router::matching_router;
pub use service::{MatchingService, MatchingServiceError};
