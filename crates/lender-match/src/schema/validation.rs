use std::collections::BTreeMap;

use serde_json::Value;

use super::domain::ParameterDefinition;
use super::registry::ParameterRegistry;
use super::value::{FieldValue, FormData};

/// Submission rejected before any workflow starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("unknown parameter '{key}': this field is not in the parameter registry")]
    UnknownField { key: String },
    #[error("invalid type for parameter '{key}': expected {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid value '{value}' for parameter '{key}': must be one of {allowed:?}")]
    InvalidOption {
        key: String,
        value: String,
        allowed: Vec<String>,
    },
}

/// Checks raw form data against the active definitions and converts it into
/// typed values. Keys missing from the form are fine; unknown keys are not.
pub fn validate_form_data(
    raw: BTreeMap<String, Value>,
    registry: &ParameterRegistry,
) -> Result<FormData, SchemaValidationError> {
    let active: BTreeMap<String, ParameterDefinition> = registry
        .active()
        .into_iter()
        .map(|definition| (definition.key.clone(), definition))
        .collect();

    raw.into_iter()
        .map(|(key, value)| {
            let definition = active
                .get(&key)
                .ok_or_else(|| SchemaValidationError::UnknownField { key: key.clone() })?;
            let value = check_value(definition, value)?;
            Ok((key, value))
        })
        .collect()
}

fn check_value(
    definition: &ParameterDefinition,
    raw: Value,
) -> Result<FieldValue, SchemaValidationError> {
    let value = FieldValue::try_from(raw).map_err(|kind| SchemaValidationError::TypeMismatch {
        key: definition.key.clone(),
        expected: definition.data_type.label(),
        found: kind.label(),
    })?;

    if !definition.accepts_kind(&value) {
        return Err(SchemaValidationError::TypeMismatch {
            key: definition.key.clone(),
            expected: definition.data_type.label(),
            found: value.kind(),
        });
    }

    if !definition.accepts_option(&value) {
        return Err(SchemaValidationError::InvalidOption {
            key: definition.key.clone(),
            value: value.to_string(),
            allowed: definition.options.clone(),
        });
    }

    Ok(value)
}
