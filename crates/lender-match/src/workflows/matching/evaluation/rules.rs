use std::cmp::Ordering;

use crate::schema::{FieldValue, FormData, ParameterLabels};
use crate::workflows::catalogue::{PolicyRule, RuleOperator};
use crate::workflows::matching::domain::EvaluationRecord;

pub(crate) fn evaluate_rule(
    rule: &PolicyRule,
    form_data: &FormData,
    labels: &ParameterLabels,
) -> EvaluationRecord {
    let label = labels.label_for(&rule.parameter_key);

    let Some(actual) = form_data.get(&rule.parameter_key) else {
        return EvaluationRecord {
            rule_id: rule.id,
            parameter_key: rule.parameter_key.clone(),
            parameter_label: label.to_string(),
            operator: rule.operator,
            rule_type: rule.rule_type,
            passed: false,
            actual_value: None,
            threshold_value: rule.value_comparison.clone(),
            failure_reason: Some(format!("Missing required field: {label}")),
        };
    };

    let passed = apply_operator(rule.operator, actual, &rule.value_comparison);
    let failure_reason = if passed {
        None
    } else {
        Some(rule.failure_reason.clone().unwrap_or_else(|| {
            format!(
                "{label}: {actual} does not meet requirement ({} {})",
                rule.operator, rule.value_comparison
            )
        }))
    };

    EvaluationRecord {
        rule_id: rule.id,
        parameter_key: rule.parameter_key.clone(),
        parameter_label: label.to_string(),
        operator: rule.operator,
        rule_type: rule.rule_type,
        passed,
        actual_value: Some(actual.clone()),
        threshold_value: rule.value_comparison.clone(),
        failure_reason,
    }
}

/// Applies `operator` to `(actual, threshold)`. Combinations the operator has
/// no meaning for evaluate to `false`.
pub(crate) fn apply_operator(
    operator: RuleOperator,
    actual: &FieldValue,
    threshold: &FieldValue,
) -> bool {
    match operator {
        RuleOperator::Gt => actual.numeric_cmp(threshold) == Some(Ordering::Greater),
        RuleOperator::Lt => actual.numeric_cmp(threshold) == Some(Ordering::Less),
        RuleOperator::Gte => matches!(
            actual.numeric_cmp(threshold),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        RuleOperator::Lte => matches!(
            actual.numeric_cmp(threshold),
            Some(Ordering::Less | Ordering::Equal)
        ),
        RuleOperator::Eq => actual.loosely_equals(threshold),
        RuleOperator::Neq => !actual.loosely_equals(threshold),
        RuleOperator::In => actual.is_member_of(threshold).unwrap_or(false),
        RuleOperator::Contains => actual.to_string().contains(&threshold.to_string()),
    }
}
