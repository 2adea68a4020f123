use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::catalogue::{LenderId, PolicyId};
use crate::workflows::ids::uuid_id;

uuid_id!(
    /// Identifier wrapper for guideline ingestion tasks.
    TaskId
);

/// Lender guideline document awaiting extraction.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidelineDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl GuidelineDocument {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        "application/pdf"
    }

    pub(crate) fn is_pdf(&self) -> bool {
        self.file_name.to_ascii_lowercase().ends_with(".pdf")
    }
}

impl std::fmt::Debug for GuidelineDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidelineDocument")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Processing,
    Completed,
    Failed,
}

impl IngestionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            IngestionStatus::Processing => "processing",
            IngestionStatus::Completed => "completed",
            IngestionStatus::Failed => "failed",
        }
    }
}

/// Counts reported once a document has been turned into a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionSummary {
    pub rules_bound: usize,
    pub rules_dropped: usize,
    pub definitions_created: usize,
    pub definitions_rebound: usize,
}

/// Durable record the ingestion workflow is driven from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionTask {
    pub id: TaskId,
    pub lender_id: LenderId,
    pub file_name: String,
    pub status: IngestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<PolicyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub summary: IngestionSummary,
    /// Reasons for every extracted rule that was not bound.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl IngestionTask {
    pub fn processing(lender_id: LenderId, file_name: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            lender_id,
            file_name: file_name.into(),
            status: IngestionStatus::Processing,
            policy_id: None,
            error: None,
            summary: IngestionSummary::default(),
            dropped: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}
