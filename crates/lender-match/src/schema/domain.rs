use serde::{Deserialize, Serialize};

use super::value::FieldValue;

/// Declared value type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Select,
    Currency,
    /// Any type name this build does not know; accepts every value.
    #[serde(other)]
    Unrecognized,
}

impl ParameterType {
    pub const fn label(self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Select => "select",
            ParameterType::Currency => "currency",
            ParameterType::Unrecognized => "unrecognized",
        }
    }

    /// Lenient parse used for untrusted input; unknown names map to `Unrecognized`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "string" | "text" => ParameterType::String,
            "number" | "integer" | "float" => ParameterType::Number,
            "boolean" | "bool" => ParameterType::Boolean,
            "select" => ParameterType::Select,
            "currency" => ParameterType::Currency,
            _ => ParameterType::Unrecognized,
        }
    }
}

/// Typed field in the global schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub key: String,
    pub label: String,
    pub data_type: ParameterType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ParameterDefinition {
    pub fn new(key: impl Into<String>, label: impl Into<String>, data_type: ParameterType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            data_type,
            options: Vec::new(),
            description: None,
            active: true,
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether `value` conforms to the declared type.
    pub fn type_check(&self, value: &FieldValue) -> bool {
        self.accepts_kind(value) && self.accepts_option(value)
    }

    pub(crate) fn accepts_kind(&self, value: &FieldValue) -> bool {
        match self.data_type {
            ParameterType::String | ParameterType::Select => matches!(value, FieldValue::Text(_)),
            ParameterType::Number | ParameterType::Currency => {
                matches!(value, FieldValue::Number(_))
            }
            ParameterType::Boolean => matches!(value, FieldValue::Boolean(_)),
            ParameterType::Unrecognized => true,
        }
    }

    pub(crate) fn accepts_option(&self, value: &FieldValue) -> bool {
        match (self.data_type, value) {
            (ParameterType::Select, FieldValue::Text(text)) if !self.options.is_empty() => {
                self.options.iter().any(|option| option == text)
            }
            _ => true,
        }
    }
}

/// Partial update for an existing definition; the key itself is immutable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterPatch {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub data_type: Option<ParameterType>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl ParameterPatch {
    pub(crate) fn apply(self, definition: &mut ParameterDefinition) {
        if let Some(label) = self.label {
            definition.label = label;
        }
        if let Some(data_type) = self.data_type {
            definition.data_type = data_type;
        }
        if let Some(options) = self.options {
            definition.options = options;
        }
        if let Some(description) = self.description {
            definition.description = Some(description);
        }
        if let Some(active) = self.active {
            definition.active = active;
        }
    }
}
