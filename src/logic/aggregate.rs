//! Per-level counts and branch summaries over an expanded network.

use anyhow::Result;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashSet;

use crate::logic::error::LogicError;
use crate::logic::network::{snapshot, NetworkMember, ReferralGraph};
use crate::model::{Id, MemberRecord, MemberType};
use crate::store::traits::MemberStore;

/// Lowest and highest dashboard level a branch can be drilled into.
pub const MIN_BRANCH_LEVEL: usize = 2;
pub const MAX_BRANCH_LEVEL: usize = 6;

/// Classification of one person from all of their records.
pub fn classify(records: &[MemberRecord]) -> MemberType {
    records
        .iter()
        .map(MemberRecord::effective_type)
        .reduce(MemberType::merge)
        .unwrap_or(MemberType::Customer)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelCount {
    #[serde(skip)]
    pub level: usize,
    pub total: usize,
    pub cp: usize,
    pub customer: usize,
}

impl LevelCount {
    fn add(&mut self, other: &LevelCount) {
        self.total += other.total;
        self.cp += other.cp;
        self.customer += other.customer;
    }
}

/// A `Both` member adds to `cp` and to `customer`; `total` counts people.
pub fn count_level(level: usize, members: &[NetworkMember]) -> LevelCount {
    members.iter().fold(
        LevelCount {
            level,
            total: members.len(),
            ..Default::default()
        },
        |mut count, member| {
            if member.user_type.is_channel_partner() {
                count.cp += 1;
            }
            if member.user_type.is_customer() {
                count.customer += 1;
            }
            count
        },
    )
}

/// Counts below a branch root, labelled from level 2 onwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchSummary {
    pub levels: Vec<LevelCount>,
    pub total_cp: usize,
    pub total_customer: usize,
    pub total_members: usize,
    pub grand_total: usize,
}

impl BranchSummary {
    pub fn from_levels(levels: Vec<LevelCount>) -> Self {
        let total_cp = levels.iter().map(|l| l.cp).sum();
        let total_customer = levels.iter().map(|l| l.customer).sum();
        let total_members = levels.iter().map(|l| l.total).sum();
        Self {
            levels,
            total_cp,
            total_customer,
            total_members,
            grand_total: total_cp + total_customer,
        }
    }

    pub fn level(&self, level: usize) -> Option<&LevelCount> {
        self.levels.iter().find(|l| l.level == level)
    }
}

// Serialized flat: `level2`..`levelN` keys followed by the totals.
impl Serialize for BranchSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.levels.len() + 4))?;
        for level in &self.levels {
            map.serialize_entry(&format!("level{}", level.level), level)?;
        }
        map.serialize_entry("totalCp", &self.total_cp)?;
        map.serialize_entry("totalCustomer", &self.total_customer)?;
        map.serialize_entry("totalMembers", &self.total_members)?;
        map.serialize_entry("grandTotal", &self.grand_total)?;
        map.end()
    }
}

/// Summarise `depth` levels below `root`. Levels that were not reached are
/// reported with zero counts.
pub async fn branch_summary<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    root: &NetworkMember,
    depth: usize,
) -> Result<BranchSummary> {
    let expanded = graph.expand(root, depth).await?;
    let levels = (1..=depth)
        .map(|hops| {
            let members = expanded
                .iter()
                .find(|level| level.depth == hops)
                .map(|level| level.members.as_slice())
                .unwrap_or(&[]);
            count_level(hops + 1, members)
        })
        .collect();
    Ok(BranchSummary::from_levels(levels))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    #[serde(flatten)]
    pub member: NetworkMember,
    pub is_root: bool,
    #[serde(flatten)]
    pub summary: BranchSummary,
}

/// A member's dashboard: their own branch first, then one per direct referral.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberNetwork {
    pub user: NetworkMember,
    pub branches: Vec<Branch>,
    pub total_branches: usize,
}

pub async fn network_for<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    root: &NetworkMember,
    depth: usize,
) -> Result<MemberNetwork> {
    let mut branches = vec![Branch {
        member: root.clone(),
        is_root: true,
        summary: branch_summary(graph, root, depth).await?,
    }];

    for child in graph.direct_referrals(&root.aliases).await? {
        if child.aliases.iter().any(|id| root.is_known_as(id)) {
            continue;
        }
        let summary = branch_summary(graph, &child, depth).await?;
        branches.push(Branch {
            member: child,
            is_root: false,
            summary,
        });
    }

    Ok(MemberNetwork {
        user: root.clone(),
        total_branches: branches.len(),
        branches,
    })
}

/// Totals over every root of the admin view. `levels` starts at level 1
/// (direct referrals of each root).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrandTotals(pub BranchSummary);

impl Serialize for GrandTotals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminNetwork {
    pub data: Vec<MemberNetwork>,
    pub grand_totals: GrandTotals,
    pub total_root_users: usize,
}

/// Every member who introduced someone (or only `root_id`) with their
/// branches. Level 1 of the grand totals counts each root's direct
/// referrals; deeper levels sum every branch.
pub async fn admin_network<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    root_id: Option<&Id>,
    depth: usize,
) -> Result<AdminNetwork> {
    let local = snapshot(graph.store(), graph.options()).await?;
    let local_graph = ReferralGraph::new(&local, graph.options().clone());

    let roots = match root_id {
        Some(id) => {
            let root = local_graph
                .find_member(id)
                .await?
                .ok_or_else(|| LogicError::not_found("User not found"))?;
            vec![root]
        }
        None => {
            let everyone = local_graph.all_members().await?;
            let introducers: HashSet<&Id> =
                everyone.iter().filter_map(|m| m.introducer_id.as_ref()).collect();
            everyone
                .iter()
                .filter(|m| m.aliases.iter().any(|id| introducers.contains(id)))
                .cloned()
                .collect()
        }
    };

    let mut totals: Vec<LevelCount> = (1..=depth + 1)
        .map(|level| LevelCount {
            level,
            ..Default::default()
        })
        .collect();
    let mut data = Vec::with_capacity(roots.len());

    for root in &roots {
        let network = network_for(&local_graph, root, depth).await?;
        let direct: Vec<NetworkMember> = network
            .branches
            .iter()
            .filter(|b| !b.is_root)
            .map(|b| b.member.clone())
            .collect();
        totals[0].add(&count_level(1, &direct));

        for branch in &network.branches {
            for level in &branch.summary.levels {
                if let Some(slot) = totals.iter_mut().find(|t| t.level == level.level) {
                    slot.add(level);
                }
            }
        }
        data.push(network);
    }

    Ok(AdminNetwork {
        total_root_users: data.len(),
        data,
        grand_totals: GrandTotals(BranchSummary::from_levels(totals)),
    })
}

/// Members at one dashboard level of a branch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelMembers {
    pub branch_user: NetworkMember,
    pub level: usize,
    pub users: Vec<NetworkMember>,
    pub total_users: usize,
    pub user_type: String,
}

/// Members exactly `level - 1` links below the branch root, newest first.
/// A `Both` member matches either filter.
pub async fn level_members<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    branch_root_id: &Id,
    level: usize,
    type_filter: Option<MemberType>,
) -> Result<LevelMembers> {
    if !(MIN_BRANCH_LEVEL..=MAX_BRANCH_LEVEL).contains(&level) {
        return Err(LogicError::invalid(format!(
            "Level must be between {} and {}",
            MIN_BRANCH_LEVEL, MAX_BRANCH_LEVEL
        ))
        .into());
    }

    let branch_user = graph
        .find_member(branch_root_id)
        .await?
        .ok_or_else(|| LogicError::not_found("Branch user not found"))?;

    let mut users: Vec<NetworkMember> = graph
        .members_at_depth(&branch_user, level - 1)
        .await?
        .into_iter()
        .filter(|m| match type_filter {
            Some(MemberType::ChannelPartner) => m.user_type.is_channel_partner(),
            Some(MemberType::Customer) => m.user_type.is_customer(),
            _ => true,
        })
        .collect();
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(LevelMembers {
        branch_user,
        level,
        total_users: users.len(),
        users,
        user_type: type_filter
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| "All".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::network::tests::add;
    use crate::model::Collection;
    use crate::store::MemoryStore;

    /// Root -> {A (CP), B (Both)}; A -> A1 (Customer); B -> B1 (CP) -> B1a (untyped legacy-style customer)
    async fn sample() -> (MemoryStore, MemberRecord, MemberRecord, MemberRecord) {
        let store = MemoryStore::new();
        let root = add(&store, Collection::ChannelPartner, "Root", "9000000000", Some(MemberType::ChannelPartner), None).await;
        let a = add(&store, Collection::ChannelPartner, "A", "9000000001", Some(MemberType::ChannelPartner), Some(&root)).await;
        let b = add(&store, Collection::ChannelPartner, "B", "9000000002", Some(MemberType::Both), Some(&root)).await;
        add(&store, Collection::Customer, "A1", "9000000003", Some(MemberType::Customer), Some(&a)).await;
        let b1 = add(&store, Collection::ChannelPartner, "B1", "9000000004", Some(MemberType::ChannelPartner), Some(&b)).await;
        add(&store, Collection::Customer, "B1a", "9000000005", None, Some(&b1)).await;
        (store, root, a, b)
    }

    #[test]
    fn test_classify_unions_records() {
        let cp = MemberRecord::new(Collection::ChannelPartner, "X".into(), "X".into(), "1".into(), String::new(), Some(MemberType::ChannelPartner), None);
        let legacy = MemberRecord::new(Collection::LegacyUser, "X".into(), "X".into(), "1".into(), String::new(), None, None);
        assert_eq!(classify(&[cp.clone()]), MemberType::ChannelPartner);
        assert_eq!(classify(&[legacy.clone()]), MemberType::Customer);
        assert_eq!(classify(&[cp, legacy]), MemberType::Both);
        assert_eq!(classify(&[]), MemberType::Customer);
    }

    #[tokio::test]
    async fn test_branch_summary_counts_both_twice() {
        let (store, root, _, _) = sample().await;
        let graph = ReferralGraph::member_view(&store);
        let root = graph.find_member(&root.id).await.unwrap().unwrap();

        let summary = branch_summary(&graph, &root, 5).await.unwrap();
        assert_eq!(summary.levels.len(), 5);

        let level2 = summary.level(2).unwrap();
        assert_eq!((level2.total, level2.cp, level2.customer), (2, 2, 1));
        let level3 = summary.level(3).unwrap();
        assert_eq!((level3.total, level3.cp, level3.customer), (2, 1, 1));
        let level4 = summary.level(4).unwrap();
        assert_eq!((level4.total, level4.cp, level4.customer), (1, 0, 1));
        assert_eq!(summary.level(6).unwrap().total, 0);

        assert_eq!(summary.total_members, 5);
        assert_eq!(summary.total_cp, 3);
        assert_eq!(summary.total_customer, 3);
        assert_eq!(summary.grand_total, 6);
    }

    #[tokio::test]
    async fn test_branch_summary_serializes_flat() {
        let (store, root, _, _) = sample().await;
        let graph = ReferralGraph::member_view(&store);
        let root = graph.find_member(&root.id).await.unwrap().unwrap();
        let summary = branch_summary(&graph, &root, 5).await.unwrap();

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["level2"]["total"], 2);
        assert_eq!(json["level6"]["cp"], 0);
        assert_eq!(json["grandTotal"], 6);
        assert!(json.get("level1").is_none());
    }

    #[tokio::test]
    async fn test_network_for_lists_root_then_direct_referrals() {
        let (store, root, a, b) = sample().await;
        let graph = ReferralGraph::member_view(&store);
        let root = graph.find_member(&root.id).await.unwrap().unwrap();

        let network = network_for(&graph, &root, 5).await.unwrap();
        assert_eq!(network.total_branches, 3);
        assert!(network.branches[0].is_root);
        assert_eq!(network.branches[0].summary.total_members, 5);

        let branch_a = network.branches.iter().find(|br| br.member.id == a.id).unwrap();
        assert_eq!(branch_a.summary.total_members, 1);
        let branch_b = network.branches.iter().find(|br| br.member.id == b.id).unwrap();
        assert_eq!(branch_b.summary.level(2).unwrap().cp, 1);
        assert_eq!(branch_b.summary.level(3).unwrap().customer, 1);

        let json = serde_json::to_value(&network).unwrap();
        assert_eq!(json["branches"][0]["isRoot"], true);
        assert_eq!(json["branches"][0]["level2"]["total"], 2);
        assert_eq!(json["totalBranches"], 3);
    }

    #[tokio::test]
    async fn test_admin_network_grand_totals() {
        let (store, root, _, _) = sample().await;
        let graph = ReferralGraph::admin_view(&store);

        let single = admin_network(&graph, Some(&root.id), 5).await.unwrap();
        assert_eq!(single.total_root_users, 1);
        let totals = &single.grand_totals.0;
        // Two direct referrals of Root
        assert_eq!(totals.level(1).unwrap().total, 2);
        // Root's level 2 (2) plus A's (1) plus B's (1)
        assert_eq!(totals.level(2).unwrap().total, 4);

        let everyone = admin_network(&graph, None, 5).await.unwrap();
        // Root, A, B and B1 introduced someone
        assert_eq!(everyone.total_root_users, 4);

        let missing = admin_network(&graph, Some(&"nobody".to_string()), 5)
            .await
            .unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<LogicError>(),
            Some(LogicError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_level_members_filters_and_validates() {
        let (store, root, _, _) = sample().await;
        let graph = ReferralGraph::member_view(&store);

        let level3 = level_members(&graph, &root.id, 3, None).await.unwrap();
        assert_eq!(level3.total_users, 2);
        assert_eq!(level3.user_type, "All");
        // Newest first
        assert_eq!(level3.users[0].name, "B1");

        let cp_only = level_members(&graph, &root.id, 2, Some(MemberType::ChannelPartner))
            .await
            .unwrap();
        assert_eq!(cp_only.total_users, 2);
        let customers = level_members(&graph, &root.id, 2, Some(MemberType::Customer))
            .await
            .unwrap();
        assert_eq!(customers.total_users, 1);
        assert_eq!(customers.users[0].name, "B");

        for bad in [1, 7] {
            let err = level_members(&graph, &root.id, bad, None).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<LogicError>(),
                Some(LogicError::Invalid(_))
            ));
        }
    }
}
