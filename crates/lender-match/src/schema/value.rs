use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Typed application attributes keyed by parameter key.
pub type FormData = BTreeMap<String, FieldValue>;

/// Scalar member of a list value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Boolean(bool),
    Number(Number),
    Text(String),
}

/// Value carried by a form field or a rule threshold.
///
/// Serialized without a tag so the wire form is plain JSON (`700`, `"Retail"`,
/// `true`, `["A", "B"]`). `null` and objects are not representable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Number(Number),
    Text(String),
    List(Vec<Scalar>),
}

/// JSON kinds that have no `FieldValue` representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedKind {
    Null,
    Object,
    NestedList,
}

impl UnsupportedKind {
    pub const fn label(self) -> &'static str {
        match self {
            UnsupportedKind::Null => "null",
            UnsupportedKind::Object => "object",
            UnsupportedKind::NestedList => "nested list",
        }
    }
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn integer(value: i64) -> Self {
        FieldValue::Number(Number::from(value))
    }

    /// Builds a float value; non-finite input has no JSON form and yields `None`.
    pub fn float(value: f64) -> Option<Self> {
        Number::from_f64(value).map(FieldValue::Number)
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Name of the value's kind, used in validation messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "string",
            FieldValue::List(_) => "list",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(number) => number.as_f64(),
            _ => None,
        }
    }

    /// Ordering between two numeric values; any other pairing has no ordering.
    pub fn numeric_cmp(&self, other: &FieldValue) -> Option<Ordering> {
        let left = self.as_f64()?;
        let right = other.as_f64()?;
        left.partial_cmp(&right)
    }

    /// Equality without coercion: numbers compare by value regardless of their
    /// integer or float spelling, and values of different kinds are never equal.
    pub fn loosely_equals(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Boolean(left), FieldValue::Boolean(right)) => left == right,
            (FieldValue::Number(_), FieldValue::Number(_)) => {
                self.numeric_cmp(other) == Some(Ordering::Equal)
            }
            (FieldValue::Text(left), FieldValue::Text(right)) => left == right,
            (FieldValue::List(left), FieldValue::List(right)) => {
                left.len() == right.len()
                    && left
                        .iter()
                        .zip(right)
                        .all(|(l, r)| FieldValue::from(l.clone()).loosely_equals(&r.clone().into()))
            }
            _ => false,
        }
    }

    /// Membership of a scalar in a list value. A list is never a member.
    pub fn is_member_of(&self, list: &FieldValue) -> Option<bool> {
        let FieldValue::List(items) = list else {
            return None;
        };
        if matches!(self, FieldValue::List(_)) {
            return None;
        }

        Some(
            items
                .iter()
                .any(|item| self.loosely_equals(&FieldValue::from(item.clone()))),
        )
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Boolean(value) => write!(f, "{value}"),
            Scalar::Number(value) => write!(f, "{value}"),
            Scalar::Text(value) => f.write_str(value),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Boolean(value) => write!(f, "{value}"),
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Text(value) => f.write_str(value),
            FieldValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

impl From<Scalar> for FieldValue {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Boolean(value) => FieldValue::Boolean(value),
            Scalar::Number(value) => FieldValue::Number(value),
            Scalar::Text(value) => FieldValue::Text(value),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(Number::from(value))
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(Number::from(value))
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Boolean(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(Number::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl TryFrom<Value> for FieldValue {
    type Error = UnsupportedKind;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(value) => Ok(FieldValue::Boolean(value)),
            Value::Number(value) => Ok(FieldValue::Number(value)),
            Value::String(value) => Ok(FieldValue::Text(value)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Bool(value) => Ok(Scalar::Boolean(value)),
                    Value::Number(value) => Ok(Scalar::Number(value)),
                    Value::String(value) => Ok(Scalar::Text(value)),
                    Value::Null => Err(UnsupportedKind::Null),
                    Value::Object(_) => Err(UnsupportedKind::Object),
                    Value::Array(_) => Err(UnsupportedKind::NestedList),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::List),
            Value::Null => Err(UnsupportedKind::Null),
            Value::Object(_) => Err(UnsupportedKind::Object),
        }
    }
}
