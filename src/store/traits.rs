use crate::model::{Collection, Id, MemberRecord, PromoImage};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Errors a store reports for constraint violations. Other failures travel as
/// plain `anyhow` errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("mobile {mobile} is already registered in {collection}")]
    DuplicateMobile { collection: Collection, mobile: String },
    #[error("id {id} already exists in {collection}")]
    DuplicateId { collection: Collection, id: Id },
}

/// Which member fields a text search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFields {
    MobileOnly,
    NameOrMobile,
}

impl SearchFields {
    /// Case-insensitive substring match.
    pub fn matches(&self, member: &MemberRecord, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        match self {
            SearchFields::MobileOnly => member.mobile.to_lowercase().contains(&needle),
            SearchFields::NameOrMobile => {
                member.mobile.to_lowercase().contains(&needle)
                    || member.name.to_lowercase().contains(&needle)
                    || member.display_name.to_lowercase().contains(&needle)
            }
        }
    }
}

#[async_trait::async_trait]
pub trait MemberStore: Send + Sync {
    async fn get_member(&self, collection: Collection, id: &Id) -> Result<Option<MemberRecord>>;
    async fn find_member_by_mobile(
        &self,
        collection: Collection,
        mobile: &str,
    ) -> Result<Option<MemberRecord>>;
    /// All members of a collection, newest first
    async fn list_members(&self, collection: Collection) -> Result<Vec<MemberRecord>>;
    /// Members whose introducer is any of `introducer_ids`, newest first
    async fn list_referrals(
        &self,
        collection: Collection,
        introducer_ids: &[Id],
    ) -> Result<Vec<MemberRecord>>;
    /// Text search ordered by name
    async fn search_members(
        &self,
        collection: Collection,
        query: &str,
        fields: SearchFields,
        limit: usize,
    ) -> Result<Vec<MemberRecord>>;
    /// Number of members created at or after `since` (all members when `None`)
    async fn count_members_since(
        &self,
        collection: Collection,
        since: Option<DateTime<Utc>>,
    ) -> Result<usize>;
    /// Fails with `StoreError` when the id or mobile is taken in the collection
    async fn insert_member(&self, member: MemberRecord) -> Result<()>;
    async fn update_member(&self, member: MemberRecord) -> Result<bool>;
    async fn delete_member(&self, collection: Collection, id: &Id) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait PromoImageStore: Send + Sync {
    async fn get_promo_image(&self, id: &Id) -> Result<Option<PromoImage>>;
    /// Newest event first
    async fn list_promo_images(&self, active_only: bool) -> Result<Vec<PromoImage>>;
    async fn upsert_promo_image(&self, image: PromoImage) -> Result<()>;
    async fn delete_promo_image(&self, id: &Id) -> Result<bool>;
    /// Activate one image and deactivate every other one
    async fn activate_promo_image(&self, id: &Id) -> Result<bool>;
}

pub trait Store: MemberStore + PromoImageStore + Send + Sync {}
