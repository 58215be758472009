use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::model::{Collection, Id, MemberRecord, PromoImage};
use crate::store::traits::{MemberStore, PromoImageStore, SearchFields, Store, StoreError};

/// In-process store used for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    members: RwLock<HashMap<Collection, HashMap<Id, MemberRecord>>>,
    images: RwLock<HashMap<Id, PromoImage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_newest_first<'a>(
        members: impl Iterator<Item = &'a MemberRecord>,
    ) -> Vec<MemberRecord> {
        let mut members: Vec<MemberRecord> = members.cloned().collect();
        members.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        members
    }
}

#[async_trait::async_trait]
impl MemberStore for MemoryStore {
    async fn get_member(&self, collection: Collection, id: &Id) -> Result<Option<MemberRecord>> {
        let members = self.members.read();
        Ok(members.get(&collection).and_then(|c| c.get(id)).cloned())
    }

    async fn find_member_by_mobile(
        &self,
        collection: Collection,
        mobile: &str,
    ) -> Result<Option<MemberRecord>> {
        let members = self.members.read();
        Ok(members
            .get(&collection)
            .and_then(|c| c.values().find(|m| m.mobile == mobile))
            .cloned())
    }

    async fn list_members(&self, collection: Collection) -> Result<Vec<MemberRecord>> {
        let members = self.members.read();
        Ok(members
            .get(&collection)
            .map(|c| Self::collect_newest_first(c.values()))
            .unwrap_or_default())
    }

    async fn list_referrals(
        &self,
        collection: Collection,
        introducer_ids: &[Id],
    ) -> Result<Vec<MemberRecord>> {
        if introducer_ids.is_empty() {
            return Ok(Vec::new());
        }
        let members = self.members.read();
        Ok(members
            .get(&collection)
            .map(|c| {
                Self::collect_newest_first(c.values().filter(|m| {
                    m.introducer_id()
                        .is_some_and(|id| introducer_ids.contains(id))
                }))
            })
            .unwrap_or_default())
    }

    async fn search_members(
        &self,
        collection: Collection,
        query: &str,
        fields: SearchFields,
        limit: usize,
    ) -> Result<Vec<MemberRecord>> {
        let members = self.members.read();
        let mut found: Vec<MemberRecord> = members
            .get(&collection)
            .map(|c| c.values().filter(|m| fields.matches(m, query)).cloned().collect())
            .unwrap_or_default();
        found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        found.truncate(limit);
        Ok(found)
    }

    async fn count_members_since(
        &self,
        collection: Collection,
        since: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        let members = self.members.read();
        Ok(members
            .get(&collection)
            .map(|c| {
                c.values()
                    .filter(|m| since.map_or(true, |since| m.created_at >= since))
                    .count()
            })
            .unwrap_or(0))
    }

    async fn insert_member(&self, member: MemberRecord) -> Result<()> {
        let mut members = self.members.write();
        let collection = members.entry(member.collection).or_default();

        if collection.contains_key(&member.id) {
            return Err(StoreError::DuplicateId {
                collection: member.collection,
                id: member.id,
            }
            .into());
        }
        if collection.values().any(|m| m.mobile == member.mobile) {
            return Err(StoreError::DuplicateMobile {
                collection: member.collection,
                mobile: member.mobile,
            }
            .into());
        }

        collection.insert(member.id.clone(), member);
        Ok(())
    }

    async fn update_member(&self, member: MemberRecord) -> Result<bool> {
        let mut members = self.members.write();
        let Some(collection) = members.get_mut(&member.collection) else {
            return Ok(false);
        };
        if !collection.contains_key(&member.id) {
            return Ok(false);
        }
        if collection
            .values()
            .any(|m| m.id != member.id && m.mobile == member.mobile)
        {
            return Err(StoreError::DuplicateMobile {
                collection: member.collection,
                mobile: member.mobile,
            }
            .into());
        }
        collection.insert(member.id.clone(), member);
        Ok(true)
    }

    async fn delete_member(&self, collection: Collection, id: &Id) -> Result<bool> {
        let mut members = self.members.write();
        Ok(members
            .get_mut(&collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }
}

#[async_trait::async_trait]
impl PromoImageStore for MemoryStore {
    async fn get_promo_image(&self, id: &Id) -> Result<Option<PromoImage>> {
        Ok(self.images.read().get(id).cloned())
    }

    async fn list_promo_images(&self, active_only: bool) -> Result<Vec<PromoImage>> {
        let images = self.images.read();
        let mut listed: Vec<PromoImage> = images
            .values()
            .filter(|img| !active_only || img.is_active)
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.event_date.cmp(&a.event_date).then_with(|| a.id.cmp(&b.id)));
        Ok(listed)
    }

    async fn upsert_promo_image(&self, image: PromoImage) -> Result<()> {
        self.images.write().insert(image.id.clone(), image);
        Ok(())
    }

    async fn delete_promo_image(&self, id: &Id) -> Result<bool> {
        Ok(self.images.write().remove(id).is_some())
    }

    async fn activate_promo_image(&self, id: &Id) -> Result<bool> {
        let mut images = self.images.write();
        if !images.contains_key(id) {
            return Ok(false);
        }
        let now = Utc::now();
        for image in images.values_mut() {
            let active = &image.id == id;
            if image.is_active != active {
                image.is_active = active;
                image.updated_at = now;
            }
        }
        Ok(true)
    }
}

impl Store for MemoryStore {}
