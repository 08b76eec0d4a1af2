//! Regex-based extraction of fields from raw command output.

mod extractor;

use std::collections::BTreeMap;

use serde::Serialize;

pub use extractor::ResultExtractor;

/// Extracted field values, still untyped strings.
pub type Fields = BTreeMap<String, String>;

/// Why a pattern produced nothing.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum PatternCondition {
    NoMatch,
    CompileError(String),
}

/// Diagnostics for one pattern of one extraction.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PatternResult {
    pub name: String,
    pub regex: String,
    /// field map of every match, in match order
    pub matches: Vec<Fields>,
    /// at least one match was found
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<PatternCondition>,
}

/// Merged fields plus per-pattern diagnostics.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub fields: Fields,
    pub patterns: Vec<PatternResult>,
}
