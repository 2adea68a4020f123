use std::collections::BTreeSet;

use serde_json::Value;

use crate::schema::{FieldValue, ParameterDefinition, RegistrySnapshot};
use crate::workflows::catalogue::{RuleDraft, RuleOperator, RuleType};

use super::extraction::{ExtractedRule, ExtractionResult};

/// Why an extracted rule was not bound.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DropReason {
    #[error("rule names no parameter")]
    MissingParameter,
    #[error("parameter '{0}' is not registered and no usable definition was supplied")]
    UnknownParameter(String),
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error("unknown rule type '{0}'")]
    UnknownRuleType(String),
    #[error("threshold must be a scalar or a list of scalars, got {0}")]
    InvalidThreshold(&'static str),
    #[error("weight must be a non-negative integer, got {0}")]
    InvalidWeight(String),
    #[error("malformed rule: {0}")]
    Malformed(String),
}

/// Extracted rule that was rejected, with its position in the extraction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRule {
    pub index: Option<usize>,
    pub parameter_key: Option<String>,
    pub reason: DropReason,
}

impl std::fmt::Display for DroppedRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.index, &self.parameter_key) {
            (Some(index), Some(key)) => write!(f, "rule #{index} ({key}): {}", self.reason),
            (Some(index), None) => write!(f, "rule #{index}: {}", self.reason),
            _ => write!(f, "{}", self.reason),
        }
    }
}

/// Registry growth plus rules bound to canonical keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub new_definitions: Vec<ParameterDefinition>,
    pub bound_rules: Vec<RuleDraft>,
    pub dropped: Vec<DroppedRule>,
}

/// Merges extraction output into the schema captured by `snapshot`.
///
/// Existing keys are never redefined, a key is materialized at most once per
/// batch, and every bound rule references a key that is either in the
/// snapshot or in `new_definitions`.
pub fn reconcile(result: &ExtractionResult, snapshot: &RegistrySnapshot) -> Reconciliation {
    let mut reconciliation = Reconciliation::default();
    let mut materialized: BTreeSet<String> = BTreeSet::new();

    for message in &result.malformed {
        reconciliation.dropped.push(DroppedRule {
            index: None,
            parameter_key: None,
            reason: DropReason::Malformed(message.clone()),
        });
    }

    for (index, rule) in result.rules.iter().enumerate() {
        let own_key = rule
            .parameter_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty());

        let draft = match rule_content(rule) {
            Ok(draft) => draft,
            Err(reason) => {
                reconciliation.dropped.push(DroppedRule {
                    index: Some(index),
                    parameter_key: own_key.map(str::to_string),
                    reason,
                });
                continue;
            }
        };

        let known = |key: &str, materialized: &BTreeSet<String>| {
            snapshot.contains(key) || materialized.contains(key)
        };

        let inline = rule
            .new_parameter_def
            .as_ref()
            .and_then(|parameter| parameter.to_definition());

        let key = match (own_key, inline) {
            (Some(key), _) if known(key, &materialized) => key.to_string(),
            (_, Some(definition)) => {
                if !known(&definition.key, &materialized) {
                    materialized.insert(definition.key.clone());
                    reconciliation.new_definitions.push(definition.clone());
                }
                definition.key
            }
            (own, None) => {
                let reason = match own {
                    Some(key) => DropReason::UnknownParameter(key.to_string()),
                    None => DropReason::MissingParameter,
                };
                reconciliation.dropped.push(DroppedRule {
                    index: Some(index),
                    parameter_key: own.map(str::to_string),
                    reason,
                });
                continue;
            }
        };

        reconciliation.bound_rules.push(RuleDraft {
            parameter_key: key,
            ..draft
        });
    }

    reconciliation
}

/// Validates everything except the parameter key.
fn rule_content(rule: &ExtractedRule) -> Result<RuleDraft, DropReason> {
    let operator = match rule.operator.as_deref() {
        Some(raw) => raw
            .parse::<RuleOperator>()
            .map_err(|_| DropReason::UnknownOperator(raw.to_string()))?,
        None => return Err(DropReason::UnknownOperator(String::new())),
    };

    let rule_type = match rule.rule_type.as_deref() {
        Some(raw) => raw
            .parse::<RuleType>()
            .map_err(|_| DropReason::UnknownRuleType(raw.to_string()))?,
        None => RuleType::Eligibility,
    };

    let value_comparison = FieldValue::try_from(rule.value.clone())
        .map_err(|kind| DropReason::InvalidThreshold(kind.label()))?;

    let weight = parse_weight(&rule.weight)?;

    let failure_reason = rule
        .failure_reason
        .as_deref()
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .map(str::to_string);

    Ok(RuleDraft {
        parameter_key: String::new(),
        operator,
        value_comparison,
        rule_type,
        weight,
        failure_reason,
    })
}

fn parse_weight(raw: &Value) -> Result<u32, DropReason> {
    let invalid = || DropReason::InvalidWeight(raw.to_string());
    match raw {
        Value::Null => Ok(0),
        Value::Number(number) => {
            if let Some(weight) = number.as_u64() {
                return u32::try_from(weight).map_err(|_| invalid());
            }
            match number.as_f64() {
                Some(weight) if weight >= 0.0 && weight.fract() == 0.0 && weight <= f64::from(u32::MAX) => {
                    Ok(weight as u32)
                }
                _ => Err(invalid()),
            }
        }
        _ => Err(invalid()),
    }
}
