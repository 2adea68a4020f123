use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::FieldValue;
use crate::workflows::ids::uuid_id;

uuid_id!(
    /// Identifier wrapper for lenders.
    LenderId
);
uuid_id!(
    /// Identifier wrapper for lender programs.
    PolicyId
);
uuid_id!(
    /// Identifier wrapper for policy rules.
    RuleId
);

/// Institution offering one or more programs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lender {
    pub id: LenderId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Lender {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: LenderId::new(),
            name: name.into(),
            description,
            created_at: Utc::now(),
        }
    }
}

/// Comparison applied between a form value and a rule threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Gt,
    Lt,
    Eq,
    Neq,
    Gte,
    Lte,
    In,
    Contains,
}

impl RuleOperator {
    pub const fn as_str(self) -> &'static str {
        match self {
            RuleOperator::Gt => "gt",
            RuleOperator::Lt => "lt",
            RuleOperator::Eq => "eq",
            RuleOperator::Neq => "neq",
            RuleOperator::Gte => "gte",
            RuleOperator::Lte => "lte",
            RuleOperator::In => "in",
            RuleOperator::Contains => "contains",
        }
    }
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleOperator {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gt" => Ok(RuleOperator::Gt),
            "lt" => Ok(RuleOperator::Lt),
            "eq" => Ok(RuleOperator::Eq),
            "neq" => Ok(RuleOperator::Neq),
            "gte" => Ok(RuleOperator::Gte),
            "lte" => Ok(RuleOperator::Lte),
            "in" => Ok(RuleOperator::In),
            "contains" => Ok(RuleOperator::Contains),
            other => Err(format!("unknown operator '{other}'")),
        }
    }
}

/// Whether a rule gates eligibility or contributes weighted points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Eligibility,
    Scoring,
}

impl RuleType {
    pub const fn label(self) -> &'static str {
        match self {
            RuleType::Eligibility => "eligibility",
            RuleType::Scoring => "scoring",
        }
    }
}

impl FromStr for RuleType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "eligibility" => Ok(RuleType::Eligibility),
            "scoring" => Ok(RuleType::Scoring),
            other => Err(format!("unknown rule type '{other}'")),
        }
    }
}

/// One comparison clause of a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: RuleId,
    pub policy_id: PolicyId,
    pub parameter_key: String,
    pub operator: RuleOperator,
    pub value_comparison: FieldValue,
    pub rule_type: RuleType,
    /// Points awarded when a scoring rule passes; ignored for eligibility rules.
    pub weight: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Rule content before it is attached to a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub parameter_key: String,
    pub operator: RuleOperator,
    pub value_comparison: FieldValue,
    pub rule_type: RuleType,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl RuleDraft {
    pub fn eligibility(
        parameter_key: impl Into<String>,
        operator: RuleOperator,
        value_comparison: impl Into<FieldValue>,
    ) -> Self {
        Self {
            parameter_key: parameter_key.into(),
            operator,
            value_comparison: value_comparison.into(),
            rule_type: RuleType::Eligibility,
            weight: 0,
            failure_reason: None,
        }
    }

    pub fn scoring(
        parameter_key: impl Into<String>,
        operator: RuleOperator,
        value_comparison: impl Into<FieldValue>,
        weight: u32,
    ) -> Self {
        Self {
            parameter_key: parameter_key.into(),
            operator,
            value_comparison: value_comparison.into(),
            rule_type: RuleType::Scoring,
            weight,
            failure_reason: None,
        }
    }

    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    pub fn attach(self, policy_id: PolicyId) -> PolicyRule {
        PolicyRule {
            id: RuleId::new(),
            policy_id,
            parameter_key: self.parameter_key,
            operator: self.operator,
            value_comparison: self.value_comparison,
            rule_type: self.rule_type,
            weight: self.weight,
            failure_reason: self.failure_reason,
        }
    }
}

/// A lender program: ordered rules plus an advisory minimum fit score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub lender_id: LenderId,
    pub name: String,
    /// Advisory threshold for presentation layers; never enforced by scoring.
    pub min_fit_score: u8,
    pub rules: Vec<PolicyRule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    pub fn new(
        lender_id: LenderId,
        name: impl Into<String>,
        min_fit_score: u8,
        drafts: Vec<RuleDraft>,
    ) -> Self {
        let id = PolicyId::new();
        let now = Utc::now();
        Self {
            id,
            lender_id,
            name: name.into(),
            min_fit_score: min_fit_score.min(100),
            rules: drafts.into_iter().map(|draft| draft.attach(id)).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn references_parameter(&self, key: &str) -> bool {
        self.rules.iter().any(|rule| rule.parameter_key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operators_parse_case_insensitively_and_reject_unknown_names() {
        assert_eq!("GTE".parse::<RuleOperator>(), Ok(RuleOperator::Gte));
        assert_eq!(" contains ".parse::<RuleOperator>(), Ok(RuleOperator::Contains));
        assert!("between".parse::<RuleOperator>().is_err());
        assert_eq!(RuleOperator::Neq.to_string(), "neq");
    }

    #[test]
    fn rule_draft_accepts_snake_case_wire_names() {
        let draft: RuleDraft = serde_json::from_value(json!({
            "parameter_key": "business_type",
            "operator": "in",
            "value_comparison": ["Trucking", "Retail"],
            "rule_type": "eligibility",
        }))
        .expect("draft parses");

        assert_eq!(draft.operator, RuleOperator::In);
        assert_eq!(draft.weight, 0);
        assert_eq!(
            draft.value_comparison,
            FieldValue::list(["Trucking", "Retail"])
        );
    }

    #[test]
    fn policy_attaches_rules_in_order() {
        let lender = LenderId::new();
        let policy = Policy::new(
            lender,
            "Tier A",
            150,
            vec![
                RuleDraft::eligibility("fico_score", RuleOperator::Gte, 650),
                RuleDraft::scoring("years_in_business", RuleOperator::Gte, 2, 10),
            ],
        );

        assert_eq!(policy.min_fit_score, 100);
        assert_eq!(policy.rules.len(), 2);
        assert!(policy.rules.iter().all(|rule| rule.policy_id == policy.id));
        assert_eq!(policy.rules[0].parameter_key, "fico_score");
        assert!(policy.references_parameter("years_in_business"));
        assert!(!policy.references_parameter("loan_amount"));
    }
}
