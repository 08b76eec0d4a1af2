use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::DefaultValue;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParserType {
    #[default]
    Regex,
    Json,
    Xml,
    Csv,
    Custom,
}

/// A named regex and the fields it produces per match.
///
/// A `field_mapping` value of the form `$N` (N >= 1) takes capture group N;
/// any other value is stored literally.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Pattern {
    pub name: String,
    pub regex: String,
    #[serde(default)]
    pub field_mapping: HashMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResultParsing {
    #[serde(default)]
    pub parser_type: ParserType,
    /// priority order, later patterns win on key collision
    #[serde(default)]
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub default_values: HashMap<String, DefaultValue>,
}

impl Pattern {
    pub fn new(
        name: &str,
        regex: &str,
        field_mapping: &[(&str, &str)],
    ) -> Self {
        Self {
            name: name.to_string(),
            regex: regex.to_string(),
            field_mapping: field_mapping.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }
}
