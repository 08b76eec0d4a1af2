use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WriteOperation {
    Insert,
    Update,
    #[default]
    Upsert,
    Replace,
}

impl WriteOperation {
    /// Whether rows are addressed by `key_fields`.
    pub fn is_keyed(&self) -> bool {
        !matches!(self, WriteOperation::Insert)
    }
}

/// Where and how extracted fields are stored.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DatabaseSpec {
    pub table: String,
    #[serde(default)]
    pub operation: WriteOperation,
    /// natural key used for conflict resolution
    #[serde(default)]
    pub key_fields: Vec<String>,
    /// column type hints for the storage layer, values are never coerced here
    #[serde(default)]
    pub field_types: HashMap<String, String>,
    #[serde(default)]
    pub indexes: Vec<String>,
}
