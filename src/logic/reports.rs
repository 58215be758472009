//! Whole-network reports: chains, trees, rankings and introducer statistics.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use log::warn;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::logic::error::LogicError;
use crate::logic::network::{snapshot, Level, NetworkMember, ReferralGraph};
use crate::model::{start_of_day, start_of_month, Collection, Id};
use crate::store::traits::MemberStore;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEntry {
    pub id: Id,
    pub name: String,
    pub joined_date: DateTime<Utc>,
    pub level: usize,
    pub introducer_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    pub direct_referrals: usize,
    pub total_referrals: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralChain {
    pub referral_chain: Vec<ChainEntry>,
    pub stats: ChainStats,
}

/// Depth-first flattening of everything below `root`, each referral followed
/// by its own downline.
pub async fn referral_chain<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    root: &NetworkMember,
    max_depth: usize,
) -> Result<ReferralChain> {
    let mut visited: HashSet<Id> = root.aliases.iter().cloned().collect();
    let mut stack: Vec<(NetworkMember, usize, Option<String>)> = Vec::new();
    let mut chain = Vec::new();

    if max_depth > 0 {
        let children = graph.direct_referrals(&root.aliases).await?;
        push_unvisited(&mut stack, &mut visited, children, 1, None);
    }

    while let Some((member, level, introducer_name)) = stack.pop() {
        let label = member.label().to_string();
        chain.push(ChainEntry {
            id: member.id.clone(),
            name: label.clone(),
            joined_date: member.created_at,
            level,
            introducer_name,
        });

        if level < max_depth {
            let children = graph.direct_referrals(&member.aliases).await?;
            push_unvisited(&mut stack, &mut visited, children, level + 1, Some(label));
        }
    }

    let stats = ChainStats {
        direct_referrals: chain.iter().filter(|e| e.level == 1).count(),
        total_referrals: chain.len(),
    };
    Ok(ReferralChain {
        referral_chain: chain,
        stats,
    })
}

fn push_unvisited(
    stack: &mut Vec<(NetworkMember, usize, Option<String>)>,
    visited: &mut HashSet<Id>,
    children: Vec<NetworkMember>,
    level: usize,
    introducer_name: Option<String>,
) {
    let fresh: Vec<NetworkMember> = children
        .into_iter()
        .filter(|c| !c.aliases.iter().any(|id| visited.contains(id)))
        .collect();
    for child in &fresh {
        visited.extend(child.aliases.iter().cloned());
    }
    // Reversed so the newest referral is popped first
    for child in fresh.into_iter().rev() {
        stack.push((child, level, introducer_name.clone()));
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    #[serde(flatten)]
    pub member: NetworkMember,
    pub level: usize,
    pub direct_referral_count: usize,
    pub next_level_referrals: Vec<HierarchyNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hierarchy {
    pub root_user: NetworkMember,
    pub hierarchical_chain: Vec<HierarchyNode>,
    pub level_totals: BTreeMap<usize, usize>,
    pub total_users: usize,
    pub max_levels: usize,
}

fn members_at(levels: &[Level], depth: usize) -> &[NetworkMember] {
    levels
        .iter()
        .find(|l| l.depth == depth)
        .map(|l| l.members.as_slice())
        .unwrap_or(&[])
}

/// Any record of `child` naming any id of `parent` counts as a link.
fn introduced_by(child: &NetworkMember, parent: &NetworkMember) -> bool {
    child.introducer_ids.iter().any(|id| parent.is_known_as(id))
}

/// Nested tree of `max_levels` levels below `root`. Direct-referral counts of
/// the deepest nodes look one level further than the tree itself.
pub async fn hierarchy<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    root: &NetworkMember,
    max_levels: usize,
) -> Result<Hierarchy> {
    let levels = graph.expand(root, max_levels + 1).await?;

    // Assemble bottom-up so each level can adopt its already built children
    let mut below: Vec<HierarchyNode> = Vec::new();
    for depth in (1..=max_levels).rev() {
        let deeper = members_at(&levels, depth + 1);
        let mut nodes = Vec::new();
        for member in members_at(&levels, depth) {
            let (children, rest): (Vec<HierarchyNode>, Vec<HierarchyNode>) = below
                .into_iter()
                .partition(|node| introduced_by(&node.member, member));
            below = rest;
            nodes.push(HierarchyNode {
                member: member.clone(),
                level: depth,
                direct_referral_count: deeper.iter().filter(|c| introduced_by(c, member)).count(),
                next_level_referrals: children,
            });
        }
        if !below.is_empty() {
            warn!(
                "{} members at level {} matched no introducer at level {}",
                below.len(),
                depth + 1,
                depth
            );
        }
        below = nodes;
    }

    let level_totals: BTreeMap<usize, usize> = levels
        .iter()
        .filter(|l| l.depth <= max_levels)
        .map(|l| (l.depth, l.members.len()))
        .collect();

    Ok(Hierarchy {
        root_user: root.clone(),
        hierarchical_chain: below,
        total_users: level_totals.values().sum(),
        level_totals,
        max_levels,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedMember {
    #[serde(flatten)]
    pub member: NetworkMember,
    pub total_referrals: usize,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_users: usize,
    pub limit: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, total_users: usize) -> Self {
        let total_pages = total_users.div_ceil(limit);
        Self {
            current_page: page,
            total_pages,
            total_users,
            limit,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelEntry {
    #[serde(flatten)]
    pub member: NetworkMember,
    pub level: usize,
    pub referral_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyLevel {
    pub root_user: NetworkMember,
    pub level: usize,
    pub users: Vec<LevelEntry>,
    pub total_users: usize,
}

/// Members exactly `level` links below `root`, newest first, with their
/// direct-referral counts.
pub async fn hierarchy_level<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    root: &NetworkMember,
    level: usize,
) -> Result<HierarchyLevel> {
    if level == 0 {
        return Err(LogicError::invalid("Level must be at least 1").into());
    }
    let levels = graph.expand(root, level + 1).await?;
    let deeper = members_at(&levels, level + 1);

    let users: Vec<LevelEntry> = members_at(&levels, level)
        .iter()
        .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
        .map(|member| LevelEntry {
            member: member.clone(),
            level,
            referral_count: deeper.iter().filter(|c| introduced_by(c, member)).count(),
        })
        .collect();

    Ok(HierarchyLevel {
        root_user: root.clone(),
        level,
        total_users: users.len(),
        users,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Ranking {
    pub users: Vec<RankedMember>,
    pub pagination: Pagination,
}

/// Everyone ranked by referrals over `depth` levels. Page numbers start at 1;
/// zero page or limit fall back to the defaults.
pub async fn ranking<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    depth: usize,
    page: usize,
    limit: usize,
) -> Result<Ranking> {
    let page = page.max(1);
    let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };

    let local = snapshot(graph.store(), graph.options()).await?;
    let local_graph = ReferralGraph::new(&local, graph.options().clone());

    let mut scored = Vec::new();
    for member in local_graph.all_members().await? {
        let total: usize = local_graph
            .expand(&member, depth)
            .await?
            .iter()
            .map(|l| l.members.len())
            .sum();
        scored.push((member, total));
    }
    scored.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| b.0.created_at.cmp(&a.0.created_at))
            .then_with(|| a.0.id.cmp(&b.0.id))
    });

    let pagination = Pagination::new(page, limit, scored.len());
    let users = scored
        .into_iter()
        .enumerate()
        .skip((page - 1) * limit)
        .take(limit)
        .map(|(index, (member, total_referrals))| RankedMember {
            member,
            total_referrals,
            rank: index + 1,
        })
        .collect();

    Ok(Ranking { users, pagination })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroducerCount {
    #[serde(flatten)]
    pub member: NetworkMember,
    pub referral_count: usize,
}

/// Direct-referral count per person, keyed by the person's primary id.
fn direct_counts(everyone: &[NetworkMember]) -> HashMap<Id, usize> {
    let by_introducer = everyone
        .iter()
        .filter_map(|m| m.introducer_id.clone())
        .counts();
    everyone
        .iter()
        .map(|m| {
            let count = m.aliases.iter().filter_map(|id| by_introducer.get(id)).sum();
            (m.id.clone(), count)
        })
        .collect()
}

/// Members ordered by direct referrals, most first; members without
/// referrals are left out. `None` lists every introducer.
pub async fn top_introducers<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    limit: Option<usize>,
) -> Result<Vec<IntroducerCount>> {
    let everyone = graph.all_members().await?;
    let counts = direct_counts(&everyone);

    let ranked = everyone
        .into_iter()
        .map(|member| {
            let referral_count = counts.get(&member.id).copied().unwrap_or(0);
            IntroducerCount {
                member,
                referral_count,
            }
        })
        .filter(|entry| entry.referral_count > 0)
        .sorted_by(|a, b| b.referral_count.cmp(&a.referral_count));

    Ok(match limit {
        Some(limit) => ranked.take(limit).collect(),
        None => ranked.collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntroducerLookup {
    Id(Id),
    Mobile(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(flatten)]
    pub member: NetworkMember,
    pub introducer_mobile: Option<String>,
    pub referral_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub total_users: usize,
    pub users_with_referrals: usize,
    pub total_connections: usize,
    /// Two decimals, e.g. `"1.50"`
    pub average_referrals_per_user: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connections {
    pub connections: Vec<Connection>,
    pub introducer_info: Option<NetworkMember>,
    pub stats: ConnectionStats,
}

/// Members with their direct-referral counts, optionally only the direct
/// referrals of one introducer.
pub async fn connections<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    introducer: Option<IntroducerLookup>,
) -> Result<Connections> {
    let everyone = graph.all_members().await?;
    let counts = direct_counts(&everyone);

    let introducer_info = match introducer {
        Some(IntroducerLookup::Id(id)) => Some(
            graph
                .find_member(&id)
                .await?
                .ok_or_else(|| LogicError::not_found("Introducer not found"))?,
        ),
        Some(IntroducerLookup::Mobile(mobile)) => Some(
            graph
                .find_member_by_mobile(&mobile)
                .await?
                .ok_or_else(|| LogicError::not_found("Introducer not found with this mobile number"))?,
        ),
        None => None,
    };

    let mut members = match &introducer_info {
        Some(introducer) => graph.direct_referrals(&introducer.aliases).await?,
        None => everyone.clone(),
    };
    members.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mobiles: HashMap<&Id, &str> = everyone
        .iter()
        .flat_map(|m| m.aliases.iter().map(move |id| (id, m.mobile.as_str())))
        .collect();

    let connections: Vec<Connection> = members
        .into_iter()
        .map(|member| Connection {
            introducer_mobile: member
                .introducer_id
                .as_ref()
                .and_then(|id| mobiles.get(id))
                .map(|m| m.to_string()),
            referral_count: counts.get(&member.id).copied().unwrap_or(0),
            member,
        })
        .collect();

    let total_users = connections.len();
    let total_connections: usize = connections.iter().map(|c| c.referral_count).sum();
    let average = if total_users > 0 {
        total_connections as f64 / total_users as f64
    } else {
        0.0
    };

    Ok(Connections {
        stats: ConnectionStats {
            total_users,
            users_with_referrals: connections.iter().filter(|c| c.referral_count > 0).count(),
            total_connections,
            average_referrals_per_user: format!("{:.2}", average),
        },
        connections,
        introducer_info,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStats {
    pub total_users: usize,
    pub users_today: usize,
    pub users_this_week: usize,
    pub users_this_month: usize,
    pub top_introducers: Vec<IntroducerCount>,
    /// Raw record count per collection
    pub collections: BTreeMap<String, usize>,
}

pub async fn member_stats<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    now: DateTime<Utc>,
) -> Result<MemberStats> {
    let everyone = graph.all_members().await?;
    let joined_since = |since: DateTime<Utc>| everyone.iter().filter(|m| m.created_at >= since).count();

    let mut collections = BTreeMap::new();
    for &collection in Collection::ALL.iter() {
        let count = graph.store().count_members_since(collection, None).await?;
        collections.insert(collection.as_str().to_string(), count);
    }

    Ok(MemberStats {
        total_users: everyone.len(),
        users_today: joined_since(start_of_day(now)),
        users_this_week: joined_since(now - Duration::days(7)),
        users_this_month: joined_since(start_of_month(now)),
        top_introducers: top_introducers(graph, Some(5)).await?,
        collections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::network::tests::add;
    use crate::model::{MemberRecord, MemberType};
    use crate::store::MemoryStore;

    /// Root -> {A, B}; A -> {A1, A2}; A1 -> A1a
    async fn sample() -> (MemoryStore, MemberRecord, MemberRecord) {
        let store = MemoryStore::new();
        let root = add(&store, Collection::ChannelPartner, "Root", "9000000000", Some(MemberType::ChannelPartner), None).await;
        let a = add(&store, Collection::ChannelPartner, "A", "9000000001", Some(MemberType::ChannelPartner), Some(&root)).await;
        add(&store, Collection::ChannelPartner, "B", "9000000002", Some(MemberType::ChannelPartner), Some(&root)).await;
        let a1 = add(&store, Collection::ChannelPartner, "A1", "9000000003", Some(MemberType::ChannelPartner), Some(&a)).await;
        add(&store, Collection::Customer, "A2", "9000000004", Some(MemberType::Customer), Some(&a)).await;
        add(&store, Collection::Customer, "A1a", "9000000005", Some(MemberType::Customer), Some(&a1)).await;
        (store, root, a)
    }

    #[tokio::test]
    async fn test_referral_chain_is_depth_first() {
        let (store, root, _) = sample().await;
        let graph = ReferralGraph::member_view(&store);
        let root = graph.find_member(&root.id).await.unwrap().unwrap();

        let chain = referral_chain(&graph, &root, 20).await.unwrap();
        assert_eq!(chain.stats, ChainStats { direct_referrals: 2, total_referrals: 5 });

        let order: Vec<&str> = chain.referral_chain.iter().map(|e| e.name.as_str()).collect();
        let a_pos = order.iter().position(|n| *n == "A").unwrap();
        let a1_pos = order.iter().position(|n| *n == "A1").unwrap();
        let a1a_pos = order.iter().position(|n| *n == "A1a").unwrap();
        assert!(a_pos < a1_pos && a1_pos < a1a_pos);
        assert_eq!(a1a_pos, a1_pos + 1);

        let first = &chain.referral_chain[0];
        assert_eq!(first.level, 1);
        assert!(first.introducer_name.is_none());
        let a1a = &chain.referral_chain[a1a_pos];
        assert_eq!(a1a.level, 3);
        assert_eq!(a1a.introducer_name.as_deref(), Some("A1"));

        let shallow = referral_chain(&graph, &root, 1).await.unwrap();
        assert_eq!(shallow.stats.total_referrals, 2);
    }

    #[tokio::test]
    async fn test_hierarchy_nests_children_under_introducers() {
        let (store, root, a) = sample().await;
        let graph = ReferralGraph::member_view(&store);
        let root = graph.find_member(&root.id).await.unwrap().unwrap();

        let tree = hierarchy(&graph, &root, 5).await.unwrap();
        assert_eq!(tree.total_users, 5);
        assert_eq!(tree.level_totals.get(&1), Some(&2));
        assert_eq!(tree.level_totals.get(&3), Some(&1));
        assert_eq!(tree.hierarchical_chain.len(), 2);

        let node_a = tree
            .hierarchical_chain
            .iter()
            .find(|n| n.member.id == a.id)
            .unwrap();
        assert_eq!(node_a.direct_referral_count, 2);
        assert_eq!(node_a.next_level_referrals.len(), 2);

        // Counts look one level past the cut-off
        let cut = hierarchy(&graph, &root, 1).await.unwrap();
        assert_eq!(cut.total_users, 2);
        let cut_a = cut.hierarchical_chain.iter().find(|n| n.member.id == a.id).unwrap();
        assert!(cut_a.next_level_referrals.is_empty());
        assert_eq!(cut_a.direct_referral_count, 2);
    }

    #[tokio::test]
    async fn test_hierarchy_level_lists_one_depth() {
        let (store, root, a) = sample().await;
        let graph = ReferralGraph::member_view(&store);
        let root = graph.find_member(&root.id).await.unwrap().unwrap();

        let first = hierarchy_level(&graph, &root, 1).await.unwrap();
        assert_eq!(first.total_users, 2);
        // Newest first: B joined after A
        assert_eq!(first.users[0].member.name, "B");
        let entry_a = first.users.iter().find(|u| u.member.id == a.id).unwrap();
        assert_eq!(entry_a.referral_count, 2);

        let third = hierarchy_level(&graph, &root, 3).await.unwrap();
        assert_eq!(third.total_users, 1);
        assert_eq!(third.users[0].member.name, "A1a");
        assert_eq!(third.users[0].referral_count, 0);

        assert!(hierarchy_level(&graph, &root, 7).await.unwrap().users.is_empty());
        assert!(hierarchy_level(&graph, &root, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_ranking_orders_and_paginates() {
        let (store, root, a) = sample().await;
        let graph = ReferralGraph::member_view(&store);

        let first_page = ranking(&graph, 6, 1, 2).await.unwrap();
        assert_eq!(first_page.users.len(), 2);
        assert_eq!(first_page.users[0].member.id, root.id);
        assert_eq!(first_page.users[0].total_referrals, 5);
        assert_eq!(first_page.users[0].rank, 1);
        assert_eq!(first_page.users[1].member.id, a.id);
        assert_eq!(
            first_page.pagination,
            Pagination {
                current_page: 1,
                total_pages: 3,
                total_users: 6,
                limit: 2,
                has_next_page: true,
                has_prev_page: false,
            }
        );

        let last_page = ranking(&graph, 6, 3, 2).await.unwrap();
        assert_eq!(last_page.users[0].rank, 5);
        assert!(!last_page.pagination.has_next_page);

        let defaults = ranking(&graph, 6, 0, 0).await.unwrap();
        assert_eq!(defaults.pagination.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(defaults.pagination.current_page, 1);
    }

    #[tokio::test]
    async fn test_ranking_ties_are_newest_first_across_collections() {
        let store = MemoryStore::new();
        let base = Utc::now();
        let mut older = MemberRecord::new(
            Collection::ChannelPartner,
            "Old Partner".into(),
            "Old Partner".into(),
            "9000000011".into(),
            String::new(),
            Some(MemberType::ChannelPartner),
            None,
        );
        older.created_at = base;
        let mut newer = MemberRecord::new(
            Collection::Customer,
            "New Customer".into(),
            "New Customer".into(),
            "9000000012".into(),
            String::new(),
            Some(MemberType::Customer),
            None,
        );
        newer.created_at = base + Duration::seconds(60);
        store.insert_member(older.clone()).await.unwrap();
        store.insert_member(newer.clone()).await.unwrap();

        let graph = ReferralGraph::member_view(&store);
        let ranked = ranking(&graph, 6, 1, 10).await.unwrap();
        let names: Vec<&str> = ranked.users.iter().map(|u| u.member.name.as_str()).collect();
        assert_eq!(names, vec!["New Customer", "Old Partner"]);
    }

    /// A person stored in both collections whose records name different
    /// introducers on the same level is still placed in the tree.
    #[tokio::test]
    async fn test_hierarchy_places_members_linked_through_any_record() {
        let store = MemoryStore::new();
        let root = add(&store, Collection::ChannelPartner, "Root", "9000000000", Some(MemberType::ChannelPartner), None).await;
        let left = add(&store, Collection::ChannelPartner, "Left", "9000000001", Some(MemberType::ChannelPartner), Some(&root)).await;
        let right = add(&store, Collection::ChannelPartner, "Right", "9000000002", Some(MemberType::ChannelPartner), Some(&root)).await;
        add(&store, Collection::ChannelPartner, "Dual", "9000000003", Some(MemberType::ChannelPartner), Some(&left)).await;
        add(&store, Collection::Customer, "Dual", "9000000003", Some(MemberType::Customer), Some(&right)).await;

        let graph = ReferralGraph::member_view(&store);
        let root = graph.find_member(&root.id).await.unwrap().unwrap();
        let tree = hierarchy(&graph, &root, 5).await.unwrap();

        fn count(nodes: &[HierarchyNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.next_level_referrals)).sum()
        }
        assert_eq!(tree.total_users, 3);
        assert_eq!(count(&tree.hierarchical_chain), tree.total_users);

        let right_node = tree
            .hierarchical_chain
            .iter()
            .find(|n| n.member.id == right.id)
            .unwrap();
        assert_eq!(right_node.direct_referral_count, 1);
    }

    #[tokio::test]
    async fn test_top_introducers_and_connections() {
        let (store, root, a) = sample().await;
        let graph = ReferralGraph::member_view(&store);

        let top = top_introducers(&graph, Some(10)).await.unwrap();
        assert_eq!(top.len(), 3);
        assert!(top[0].member.id == root.id || top[0].member.id == a.id);
        assert_eq!(top[0].referral_count, 2);
        assert_eq!(top[2].referral_count, 1);

        let all = connections(&graph, None).await.unwrap();
        assert_eq!(all.stats.total_users, 6);
        assert_eq!(all.stats.users_with_referrals, 3);
        assert_eq!(all.stats.total_connections, 5);
        assert_eq!(all.stats.average_referrals_per_user, "0.83");

        let of_a = connections(&graph, Some(IntroducerLookup::Mobile("9000000001".into())))
            .await
            .unwrap();
        assert_eq!(of_a.connections.len(), 2);
        assert_eq!(of_a.introducer_info.unwrap().id, a.id);
        assert!(of_a
            .connections
            .iter()
            .all(|c| c.introducer_mobile.as_deref() == Some("9000000001")));

        let missing = connections(&graph, Some(IntroducerLookup::Id("nobody".into())))
            .await
            .unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<LogicError>(),
            Some(LogicError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_member_stats_dedups_by_mobile() {
        let (store, root, _) = sample().await;
        // Root also holds a customer record
        add(&store, Collection::Customer, "Root", "9000000000", Some(MemberType::Customer), None).await;
        let graph = ReferralGraph::member_view(&store);

        let stats = member_stats(&graph, Utc::now()).await.unwrap();
        assert_eq!(stats.total_users, 6);
        assert_eq!(stats.users_this_week, 6);
        assert_eq!(stats.collections.get("ChannelPartner"), Some(&4));
        assert_eq!(stats.collections.get("Customer"), Some(&3));
        assert_eq!(stats.top_introducers[0].referral_count, 2);
        assert!(stats.top_introducers.iter().any(|t| t.member.id == root.id));
    }
}
