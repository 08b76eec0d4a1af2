use std::{collections::HashSet, sync::Arc};

use serde::Serialize;
use tracing::debug;

use crate::{
    JobflowError, Result,
    model::{GroupFilter, StatusFilter, TargetSource, Targeting},
};

use super::{
    group::{GroupKind, GroupMember, GroupResolver, MemberStatus, QueryResolver},
    range::expand_network_range,
};

/// Summary of one resolved group reference.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub name: String,
    pub kind: GroupKind,
    /// members before filtering
    pub members: usize,
    /// members left after status and tag filters
    pub selected: usize,
}

/// Outcome of expanding a targeting descriptor.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    pub targets: Vec<String>,
    /// group references that were resolved, empty groups only when `include_empty` is set
    pub groups: Vec<GroupSummary>,
}

/// Turns a [`Targeting`] descriptor into an ordered, deduplicated list of targets.
#[derive(Clone)]
pub struct TargetExpander {
    groups: Option<Arc<dyn GroupResolver>>,
    queries: Option<Arc<dyn QueryResolver>>,
    max_range_hosts: usize,
}

impl TargetExpander {
    pub fn new(max_range_hosts: usize) -> Self {
        Self {
            groups: None,
            queries: None,
            max_range_hosts,
        }
    }

    pub fn with_group_resolver(
        mut self,
        groups: Arc<dyn GroupResolver>,
    ) -> Self {
        self.groups = Some(groups);
        self
    }

    pub fn with_query_resolver(
        mut self,
        queries: Arc<dyn QueryResolver>,
    ) -> Self {
        self.queries = Some(queries);
        self
    }

    pub async fn expand(
        &self,
        targeting: &Targeting,
    ) -> Result<Vec<String>> {
        Ok(self.expand_detailed(targeting).await?.targets)
    }

    /// Resolves the source named by `targeting.source`, then removes excluded targets.
    pub async fn expand_detailed(
        &self,
        targeting: &Targeting,
    ) -> Result<Expansion> {
        let mut expansion = Expansion::default();

        let candidates = match targeting.source {
            TargetSource::NetworkRange => {
                let range = targeting.network_range.as_deref().filter(|r| !r.trim().is_empty()).ok_or_else(|| missing_field("network_range"))?;
                expand_network_range(range, self.max_range_hosts)?
            }
            TargetSource::TargetList | TargetSource::File => parse_target_list(targeting.target_list.as_deref().unwrap_or_default()),
            TargetSource::CustomGroups => {
                let names = targeting.custom_groups.as_deref().ok_or_else(|| missing_field("custom_groups"))?;
                self.expand_groups(GroupKind::Custom, names, &targeting.group_filter, &mut expansion.groups).await?
            }
            TargetSource::NetworkGroups => {
                let names = targeting.network_groups.as_deref().ok_or_else(|| missing_field("network_groups"))?;
                self.expand_groups(GroupKind::Network, names, &targeting.group_filter, &mut expansion.groups).await?
            }
            TargetSource::DatabaseQuery => {
                let query = targeting.database_query.as_deref().filter(|q| !q.trim().is_empty()).ok_or_else(|| missing_field("database_query"))?;
                let queries = self.queries.as_ref().ok_or_else(|| JobflowError::TargetResolution("no query resolver configured for database_query targeting".to_string()))?;
                queries.query_targets(query).await?.into_iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect()
            }
        };

        let excluded: HashSet<String> = parse_target_list(targeting.exclude_list.as_deref().unwrap_or_default()).into_iter().collect();

        let mut seen = HashSet::new();
        expansion.targets = candidates.into_iter().filter(|t| !excluded.contains(t) && seen.insert(t.clone())).collect();

        debug!(
            "expanded {} targeting to {} targets ({} excluded)",
            targeting.source.as_ref(),
            expansion.targets.len(),
            excluded.len()
        );
        Ok(expansion)
    }

    async fn expand_groups(
        &self,
        kind: GroupKind,
        names: &[String],
        filter: &GroupFilter,
        summaries: &mut Vec<GroupSummary>,
    ) -> Result<Vec<String>> {
        let resolver = self.groups.as_ref().ok_or_else(|| JobflowError::TargetResolution(format!("no group resolver configured for {} groups", kind.as_ref())))?;

        let mut targets = Vec::new();
        for name in names {
            let group = resolver.resolve_group(kind, name).await?;
            let members = group.members.len();
            if members == 0 {
                debug!("{} group '{}' has no members", kind.as_ref(), name);
                if filter.include_empty {
                    summaries.push(GroupSummary {
                        name: name.clone(),
                        kind,
                        members: 0,
                        selected: 0,
                    });
                }
                continue;
            }

            let selected: Vec<String> = group.members.into_iter().filter(|m| member_matches(m, filter)).map(|m| m.target.trim().to_string()).filter(|t| !t.is_empty()).collect();
            summaries.push(GroupSummary {
                name: name.clone(),
                kind,
                members,
                selected: selected.len(),
            });
            targets.extend(selected);
        }
        Ok(targets)
    }
}

fn member_matches(
    member: &GroupMember,
    filter: &GroupFilter,
) -> bool {
    let status_ok = match filter.status_filter {
        StatusFilter::All => true,
        StatusFilter::Online => member.status == MemberStatus::Online,
        StatusFilter::Offline => member.status == MemberStatus::Offline,
    };
    status_ok && filter.tag_filter.iter().all(|tag| member.tags.contains(tag))
}

fn missing_field(field: &str) -> JobflowError {
    JobflowError::TargetResolution(format!("targeting.{} is required for this source", field))
}

/// Splits a newline-delimited list: trims, drops blank lines, keeps the first occurrence of duplicates.
pub fn parse_target_list(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines().map(str::trim).filter(|line| !line.is_empty()).filter(|line| seen.insert(*line)).map(str::to_string).collect()
}
