//! Collaborators that resolve group references and database queries to targets.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{JobflowError, Result};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GroupKind {
    Custom,
    Network,
}

/// Last-known reachability of a group member.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MemberStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub target: String,
    #[serde(default)]
    pub status: MemberStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl GroupMember {
    pub fn new(
        target: &str,
        status: MemberStatus,
        tags: &[&str],
    ) -> Self {
        Self {
            target: target.to_string(),
            status,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub members: Vec<GroupMember>,
}

/// Resolves a group reference to its members.
#[async_trait]
pub trait GroupResolver: Send + Sync {
    /// Returns the members of the named group, or an error when the group does not exist.
    async fn resolve_group(
        &self,
        kind: GroupKind,
        name: &str,
    ) -> Result<Group>;
}

/// Resolves a `database_query` targeting source.
#[async_trait]
pub trait QueryResolver: Send + Sync {
    async fn query_targets(
        &self,
        query: &str,
    ) -> Result<Vec<String>>;
}

/// Group resolver backed by a fixed in-memory table.
#[derive(Debug, Clone, Default)]
pub struct MemGroupResolver {
    groups: HashMap<(GroupKind, String), Group>,
}

impl MemGroupResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(
        mut self,
        kind: GroupKind,
        name: &str,
        members: Vec<GroupMember>,
    ) -> Self {
        self.groups.insert((kind, name.to_string()), Group {
            members,
        });
        self
    }
}

#[async_trait]
impl GroupResolver for MemGroupResolver {
    async fn resolve_group(
        &self,
        kind: GroupKind,
        name: &str,
    ) -> Result<Group> {
        self.groups
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| JobflowError::TargetResolution(format!("{} group '{}' not found", kind.as_ref(), name)))
    }
}
