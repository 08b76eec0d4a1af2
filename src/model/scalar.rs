use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A loosely typed parameter or default value as it appears in a job document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value.into())
    }
}

impl From<Scalar> for serde_json::Value {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Bool(b) => serde_json::Value::Bool(b),
            Scalar::Number(n) => serde_json::Value::Number(n),
            Scalar::String(s) => serde_json::Value::String(s),
        }
    }
}

/// Reserved default meaning "the extraction timestamp".
pub const NOW_SENTINEL: &str = "NOW()";

/// A default value for an extracted field.
///
/// `"NOW()"` in a document is not a literal string: it becomes [`DefaultValue::Now`]
/// and is rendered as the extraction timestamp. It serializes back to `"NOW()"`.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Now,
    Value(Scalar),
}

impl Serialize for DefaultValue {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match self {
            DefaultValue::Now => serializer.serialize_str(NOW_SENTINEL),
            DefaultValue::Value(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DefaultValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Scalar::deserialize(deserializer)?;
        Ok(match value {
            Scalar::String(s) if s == NOW_SENTINEL => DefaultValue::Now,
            other => DefaultValue::Value(other),
        })
    }
}

impl From<Scalar> for DefaultValue {
    fn from(value: Scalar) -> Self {
        DefaultValue::Value(value)
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        if value == NOW_SENTINEL {
            DefaultValue::Now
        } else {
            DefaultValue::Value(value.into())
        }
    }
}
