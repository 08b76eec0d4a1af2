use serde::{Deserialize, Serialize};

/// Where the targets of an action come from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetSource {
    NetworkRange,
    #[default]
    TargetList,
    CustomGroups,
    NetworkGroups,
    DatabaseQuery,
    File,
}

/// Last-known reachability a group member must have to be selected.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Online,
    Offline,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GroupFilter {
    #[serde(default)]
    pub include_empty: bool,
    #[serde(default)]
    pub status_filter: StatusFilter,
    /// members must carry every listed tag
    #[serde(default)]
    pub tag_filter: Vec<String>,
}

/// Target selection for one action.
///
/// Only the field named by `source` is interpreted. The other source fields are
/// carried as-is so a builder can switch sources without losing input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Targeting {
    pub source: TargetSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_range: Option<String>,
    /// newline-delimited targets, also holds uploaded file contents for `file`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_groups: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_groups: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_query: Option<String>,
    #[serde(default)]
    pub group_filter: GroupFilter,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
    #[serde(default)]
    pub retry_count: u32,
    /// seconds between attempts
    #[serde(default)]
    pub retry_delay: u64,
}

fn default_max_concurrent() -> u32 {
    10
}

impl Default for Targeting {
    fn default() -> Self {
        Self {
            source: TargetSource::default(),
            network_range: None,
            target_list: None,
            exclude_list: None,
            custom_groups: None,
            network_groups: None,
            database_query: None,
            group_filter: GroupFilter::default(),
            max_concurrent: default_max_concurrent(),
            retry_count: 0,
            retry_delay: 0,
        }
    }
}

impl Targeting {
    /// Targeting over an explicit newline-delimited list.
    pub fn list(targets: &str) -> Self {
        Self {
            source: TargetSource::TargetList,
            target_list: Some(targets.to_string()),
            ..Default::default()
        }
    }

    /// Targeting over a network range expression.
    pub fn range(range: &str) -> Self {
        Self {
            source: TargetSource::NetworkRange,
            network_range: Some(range.to_string()),
            ..Default::default()
        }
    }
}
