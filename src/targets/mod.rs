//! Target-set expansion.

mod expander;
mod group;
mod range;

pub use expander::{Expansion, GroupSummary, TargetExpander, parse_target_list};
pub use group::{Group, GroupKind, GroupMember, GroupResolver, MemGroupResolver, MemberStatus, QueryResolver};
pub use range::expand_network_range;
