//! Introducer graph traversal.
//!
//! Referral links point upward (each member names its introducer), so walking
//! down the tree means asking every source collection for the members whose
//! introducer is in the current frontier. Records found in several
//! collections are merged into one [`NetworkMember`] according to the
//! configured [`Dedup`] policy.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::model::{Collection, Id, MemberRecord, MemberType};
use crate::store::traits::MemberStore;

/// How records from different collections are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dedup {
    /// Same mobile number means same person
    ByMobile,
    /// Same id means same person
    ById,
    /// Every record stands alone
    Keep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkOptions {
    /// Collections read, in priority order
    pub sources: Vec<Collection>,
    pub dedup: Dedup,
}

impl NetworkOptions {
    /// Current collections merged by mobile, as members see their network.
    pub fn member_view() -> Self {
        Self {
            sources: Collection::CURRENT.to_vec(),
            dedup: Dedup::ByMobile,
        }
    }

    /// Every collection including legacy users, merged by id.
    pub fn admin_view() -> Self {
        Self {
            sources: Collection::ALL.to_vec(),
            dedup: Dedup::ById,
        }
    }
}

/// A person in the referral network, possibly backed by several records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMember {
    pub id: Id,
    /// Every id this person is stored under, `id` first
    #[serde(skip)]
    pub aliases: Vec<Id>,
    pub name: String,
    pub display_name: String,
    pub mobile: String,
    pub user_type: MemberType,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introducer_id: Option<Id>,
    /// Introducers named by any of the merged records
    #[serde(skip)]
    pub introducer_ids: Vec<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introducer_name: Option<String>,
    pub collections: Vec<Collection>,
}

impl NetworkMember {
    fn from_record(record: &MemberRecord) -> Self {
        Self {
            id: record.id.clone(),
            aliases: vec![record.id.clone()],
            name: record.name.clone(),
            display_name: record.display_name.clone(),
            mobile: record.mobile.clone(),
            user_type: record.effective_type(),
            created_at: record.created_at,
            introducer_id: record.introducer_id().cloned(),
            introducer_ids: record.introducer_id().cloned().into_iter().collect(),
            introducer_name: record.introducer.as_ref().and_then(|i| i.name.clone()),
            collections: vec![record.collection],
        }
    }

    fn absorb(&mut self, record: &MemberRecord) {
        if !self.aliases.contains(&record.id) {
            self.aliases.push(record.id.clone());
        }
        if !self.collections.contains(&record.collection) {
            self.collections.push(record.collection);
        }
        self.user_type = self.user_type.merge(record.effective_type());
        if let Some(id) = record.introducer_id() {
            if !self.introducer_ids.contains(id) {
                self.introducer_ids.push(id.clone());
            }
        }
        if self.introducer_id.is_none() {
            self.introducer_id = record.introducer_id().cloned();
            self.introducer_name = record.introducer.as_ref().and_then(|i| i.name.clone());
        }
    }

    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    pub fn is_known_as(&self, id: &Id) -> bool {
        self.aliases.contains(id)
    }
}

/// Merge records into people. The first record of a person wins for display
/// fields; classification is the union over all records.
pub fn merge_records(records: &[MemberRecord], dedup: Dedup) -> Vec<NetworkMember> {
    let mut merged: Vec<NetworkMember> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = match dedup {
            Dedup::ByMobile => Some(record.mobile.clone()),
            Dedup::ById => Some(record.id.clone()),
            Dedup::Keep => None,
        };

        match key.as_ref().and_then(|k| index.get(k)) {
            Some(&position) => merged[position].absorb(record),
            None => {
                if let Some(key) = key {
                    index.insert(key, merged.len());
                }
                merged.push(NetworkMember::from_record(record));
            }
        }
    }

    merged
}

/// Members found at one depth below the root (depth 1 = direct referrals).
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub depth: usize,
    pub members: Vec<NetworkMember>,
}

/// Read access to the introducer graph held in a [`MemberStore`].
pub struct ReferralGraph<'a, S: MemberStore + ?Sized> {
    store: &'a S,
    options: NetworkOptions,
}

impl<'a, S: MemberStore + ?Sized> ReferralGraph<'a, S> {
    pub fn new(store: &'a S, options: NetworkOptions) -> Self {
        Self { store, options }
    }

    pub fn member_view(store: &'a S) -> Self {
        Self::new(store, NetworkOptions::member_view())
    }

    pub fn admin_view(store: &'a S) -> Self {
        Self::new(store, NetworkOptions::admin_view())
    }

    pub fn options(&self) -> &NetworkOptions {
        &self.options
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    /// Look a person up by id in every source collection.
    pub async fn find_member(&self, id: &Id) -> Result<Option<NetworkMember>> {
        let mut records = Vec::new();
        for &collection in &self.options.sources {
            if let Some(record) = self.store.get_member(collection, id).await? {
                records.push(record);
            }
        }
        // Records under one id always describe one person
        Ok(merge_records(&records, Dedup::ById).into_iter().next())
    }

    /// Look a person up by mobile number in every source collection.
    pub async fn find_member_by_mobile(&self, mobile: &str) -> Result<Option<NetworkMember>> {
        let mut records = Vec::new();
        for &collection in &self.options.sources {
            if let Some(record) = self.store.find_member_by_mobile(collection, mobile).await? {
                records.push(record);
            }
        }
        Ok(merge_records(&records, Dedup::ByMobile).into_iter().next())
    }

    /// Every person in the source collections, merged.
    pub async fn all_members(&self) -> Result<Vec<NetworkMember>> {
        let mut records = Vec::new();
        for &collection in &self.options.sources {
            records.extend(self.store.list_members(collection).await?);
        }
        Ok(merge_records(&records, self.options.dedup))
    }

    /// Direct referrals of any of `introducer_ids`.
    pub async fn direct_referrals(&self, introducer_ids: &[Id]) -> Result<Vec<NetworkMember>> {
        if introducer_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for &collection in &self.options.sources {
            records.extend(self.store.list_referrals(collection, introducer_ids).await?);
        }
        Ok(merge_records(&records, self.options.dedup))
    }

    /// Breadth-first expansion below `root`, at most `depth` levels.
    ///
    /// Stops at the first empty level. A person already seen (the root
    /// included) is never listed again, so introducer cycles terminate.
    pub async fn expand(&self, root: &NetworkMember, depth: usize) -> Result<Vec<Level>> {
        let mut visited: HashSet<Id> = root.aliases.iter().cloned().collect();
        let mut frontier: Vec<Id> = root.aliases.clone();
        let mut levels = Vec::new();

        for current in 1..=depth {
            let found = self.direct_referrals(&frontier).await?;
            let members: Vec<NetworkMember> = found
                .into_iter()
                .filter(|m| !m.aliases.iter().any(|id| visited.contains(id)))
                .collect();

            if members.is_empty() {
                break;
            }

            frontier = members.iter().flat_map(|m| m.aliases.iter().cloned()).collect();
            visited.extend(frontier.iter().cloned());
            levels.push(Level {
                depth: current,
                members,
            });
        }

        Ok(levels)
    }

    /// Members exactly `depth` links below `root`.
    pub async fn members_at_depth(
        &self,
        root: &NetworkMember,
        depth: usize,
    ) -> Result<Vec<NetworkMember>> {
        let levels = self.expand(root, depth).await?;
        Ok(levels
            .into_iter()
            .find(|level| level.depth == depth)
            .map(|level| level.members)
            .unwrap_or_default())
    }

    /// Whether `member_id` sits somewhere below `ancestor` (following
    /// introducer links upward from the member).
    pub async fn is_in_downline(&self, ancestor: &NetworkMember, member_id: &Id) -> Result<bool> {
        let mut seen: HashSet<Id> = HashSet::new();
        let mut current = self.find_member(member_id).await?;

        while let Some(member) = current {
            let Some(introducer_id) = member.introducer_id.clone() else {
                return Ok(false);
            };
            if ancestor.is_known_as(&introducer_id) {
                return Ok(true);
            }
            if !seen.insert(introducer_id.clone()) {
                // Introducer cycle that does not pass through the ancestor
                return Ok(false);
            }
            current = self.find_member(&introducer_id).await?;
        }

        Ok(false)
    }
}

/// Copy the source collections of `store` into a fresh in-memory store so
/// that whole-network reports do not hit the backing database once per member.
pub async fn snapshot<S: MemberStore + ?Sized>(
    store: &S,
    options: &NetworkOptions,
) -> Result<crate::store::MemoryStore> {
    let snapshot = crate::store::MemoryStore::new();
    for &collection in &options.sources {
        for record in store.list_members(collection).await? {
            snapshot.insert_member(record).await?;
        }
    }
    Ok(snapshot)
}
