use anyhow::Result;

use crate::config::SeedConfig;
use crate::logic::accounts::find_account_by_mobile;
use crate::logic::credentials::hash_password;
use crate::model::{Collection, MemberRecord, MemberType};
use crate::store::traits::MemberStore;

/// Make sure the default introducer exists so the very first signup has
/// someone to name. Returns `true` when it was created.
pub async fn ensure_default_introducer<S: MemberStore + ?Sized>(
    store: &S,
    seed: &SeedConfig,
) -> Result<bool> {
    if find_account_by_mobile(store, &seed.introducer_mobile)
        .await?
        .is_some()
    {
        return Ok(false);
    }

    let introducer = MemberRecord::new(
        Collection::ChannelPartner,
        seed.introducer_name.clone(),
        seed.introducer_name.clone(),
        seed.introducer_mobile.clone(),
        hash_password(&seed.introducer_password)?,
        Some(MemberType::ChannelPartner),
        None,
    );
    store.insert_member(introducer).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::credentials::verify_password;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_default_introducer_is_created_once() {
        let store = MemoryStore::new();
        let seed = SeedConfig::default();

        assert!(ensure_default_introducer(&store, &seed).await.unwrap());
        assert!(!ensure_default_introducer(&store, &seed).await.unwrap());

        let record = store
            .find_member_by_mobile(Collection::ChannelPartner, "9867477227")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.name, "System Admin");
        assert!(record.introducer.is_none());
        assert!(verify_password("123456", &record.password_hash));
    }
}
