use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{ParameterDefinition, ParameterType};

use super::domain::GuidelineDocument;

/// Turns a guideline document into candidate rules.
///
/// Output is untrusted: every field is optional here and checked during
/// reconciliation.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    async fn extract(
        &self,
        document: &GuidelineDocument,
        schema: &[ParameterDefinition],
    ) -> Result<ExtractionResult, ExtractionError>;
}

/// Error raised when a document cannot be turned into candidate rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("document extraction is not configured: set GEMINI_API_KEY or GOOGLE_API_KEY")]
    NotConfigured,
    #[error("extraction request failed: {0}")]
    Transport(String),
    #[error("extraction provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("extraction provider returned no content")]
    EmptyResponse,
    #[error("failed to parse extraction output as JSON: {0}")]
    UnparsableOutput(String),
    #[error("extraction timed out after {0} seconds")]
    Timeout(u64),
}

/// Candidate rules extracted from one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub rules: Vec<ExtractedRule>,
    /// Entries of the `rules` array that did not have a rule's shape.
    pub malformed: Vec<String>,
}

/// One candidate rule, accepting both the field names used by the prompt and
/// the stored rule names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRule {
    #[serde(default, alias = "parameter")]
    pub parameter_key: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default, alias = "value_comparison")]
    pub value: Value,
    #[serde(default, alias = "type")]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub weight: Value,
    #[serde(default, alias = "reason")]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub new_parameter_def: Option<ExtractedParameter>,
}

/// Inline definition proposed for a field the schema does not know yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedParameter {
    #[serde(default, alias = "key_name")]
    pub key: Option<String>,
    #[serde(default, alias = "display_label")]
    pub label: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    /// Either a list of values or `{"values": [...]}`.
    #[serde(default)]
    pub options: Value,
    #[serde(default)]
    pub description: Option<String>,
}

impl ExtractedParameter {
    pub fn key(&self) -> Option<&str> {
        self.key
            .as_deref()
            .map(str::trim)
            .filter(|key| crate::schema::registry::is_valid_key(key))
    }

    /// Builds a definition; `None` when the key is missing or malformed.
    /// Missing types default to `string`.
    pub fn to_definition(&self) -> Option<ParameterDefinition> {
        let key = self.key()?;
        let label = self
            .label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .unwrap_or(key);
        let data_type = self
            .data_type
            .as_deref()
            .map(ParameterType::parse_lenient)
            .unwrap_or(ParameterType::String);

        let mut definition =
            ParameterDefinition::new(key, label, data_type).with_options(option_values(&self.options));
        if let Some(description) = self.description.as_deref().map(str::trim) {
            if !description.is_empty() {
                definition = definition.with_description(description);
            }
        }
        Some(definition)
    }
}

fn option_values(raw: &Value) -> Vec<String> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("values") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        })
        .collect()
}

/// Parses provider output: plain JSON first, then the first fenced ```json
/// block. The payload is either `{"rules": [...]}` or a bare rule array.
pub fn parse_extraction_payload(text: &str) -> Result<ExtractionResult, ExtractionError> {
    let payload = match serde_json::from_str::<Value>(text.trim()) {
        Ok(payload) => payload,
        Err(direct) => {
            let fenced = fenced_json(text)
                .ok_or_else(|| ExtractionError::UnparsableOutput(direct.to_string()))?;
            serde_json::from_str::<Value>(fenced)
                .map_err(|error| ExtractionError::UnparsableOutput(error.to_string()))?
        }
    };

    let entries = match payload {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("rules") {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(ExtractionError::UnparsableOutput(
                    "`rules` must be an array".to_string(),
                ))
            }
        },
        _ => {
            return Err(ExtractionError::UnparsableOutput(
                "expected an object with a `rules` array".to_string(),
            ))
        }
    };

    let mut result = ExtractionResult::default();
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<ExtractedRule>(entry) {
            Ok(rule) => result.rules.push(rule),
            Err(error) => result.malformed.push(format!("rule #{index}: {error}")),
        }
    }
    Ok(result)
}

fn fenced_json(text: &str) -> Option<&str> {
    const OPEN: &str = "```json";
    let start = text.find(OPEN)? + OPEN.len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// Adapter used when no provider is configured; every extraction fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledExtractor;

#[async_trait]
impl ExtractionAdapter for DisabledExtractor {
    async fn extract(
        &self,
        _document: &GuidelineDocument,
        _schema: &[ParameterDefinition],
    ) -> Result<ExtractionResult, ExtractionError> {
        Err(ExtractionError::NotConfigured)
    }
}
