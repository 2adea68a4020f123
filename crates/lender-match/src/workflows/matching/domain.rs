use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{FieldValue, FormData};
use crate::workflows::catalogue::{PolicyId, RuleId, RuleOperator, RuleType};
use crate::workflows::ids::uuid_id;

uuid_id!(
    /// Identifier wrapper for submitted loan applications.
    ApplicationId
);

/// Raw submission as received from the form; validated before anything is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub applicant_name: String,
    #[serde(default)]
    pub form_data: BTreeMap<String, Value>,
}

/// Applicant attributes after schema validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: ApplicationId,
    pub applicant_name: String,
    pub form_data: FormData,
    pub created_at: DateTime<Utc>,
}

impl LoanApplication {
    pub fn new(applicant_name: impl Into<String>, form_data: FormData) -> Self {
        Self {
            id: ApplicationId::new(),
            applicant_name: applicant_name.into(),
            form_data,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle of the background matching run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Processing,
    Completed,
    Failed,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Processing => "processing",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Failed => "failed",
        }
    }
}

/// Explainable outcome of one rule against one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub rule_id: RuleId,
    pub parameter_key: String,
    pub parameter_label: String,
    pub operator: RuleOperator,
    pub rule_type: RuleType,
    pub passed: bool,
    /// `None` when the application did not supply the field.
    pub actual_value: Option<FieldValue>,
    pub threshold_value: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Verdict for one (application, policy) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub application_id: ApplicationId,
    pub policy_id: PolicyId,
    pub eligible: bool,
    pub fit_score: u8,
    pub evaluations: Vec<EvaluationRecord>,
    pub matched_at: DateTime<Utc>,
}

/// Match result annotated for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchView {
    pub policy_id: PolicyId,
    pub lender_name: String,
    pub program_name: String,
    pub min_fit_score: u8,
    pub eligible: bool,
    pub fit_score: u8,
    pub evaluations: Vec<EvaluationRecord>,
    pub matched_at: DateTime<Utc>,
}
