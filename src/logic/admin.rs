use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;

use crate::config::AuthConfig;
use crate::logic::credentials::TokenIssuer;
use crate::logic::error::LogicError;
use crate::model::{Collection, Id, IntroducerRef, MemberRecord, MemberSummary};
use crate::store::traits::MemberStore;

/// Check the configured admin credentials and issue an admin token.
pub fn admin_login(
    config: &AuthConfig,
    tokens: &TokenIssuer,
    username: &str,
    password: &str,
) -> Result<String> {
    if username != config.admin_username || password != config.admin_password {
        warn!("Rejected admin login for {:?}", username);
        return Err(LogicError::invalid("Invalid admin credentials").into());
    }
    tokens.issue_admin(&config.admin_username)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedMember {
    pub deleted_user: MemberSummary,
    pub reassigned_referrals_count: usize,
}

async fn find_anywhere<S: MemberStore + ?Sized>(store: &S, id: &Id) -> Result<Option<MemberRecord>> {
    for collection in Collection::ALL {
        if let Some(record) = store.get_member(collection, id).await? {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

/// Delete every record of `id`. Its direct referrals move up to the deleted
/// member's introducer when that introducer still exists; otherwise they keep
/// their dangling link.
pub async fn delete_member<S: MemberStore + ?Sized>(store: &S, id: &Id) -> Result<DeletedMember> {
    let mut records = Vec::new();
    for collection in Collection::ALL {
        if let Some(record) = store.get_member(collection, id).await? {
            records.push(record);
        }
    }
    let Some(deleted) = records.first().cloned() else {
        return Err(LogicError::not_found("User not found").into());
    };

    let new_introducer = match deleted.introducer_id() {
        Some(introducer_id) => find_anywhere(store, introducer_id).await?,
        None => None,
    };

    let mut referrals = Vec::new();
    for collection in Collection::ALL {
        referrals.extend(store.list_referrals(collection, &[id.clone()]).await?);
    }

    if let Some(introducer) = &new_introducer {
        let link = IntroducerRef::to(introducer);
        let now = Utc::now();
        for mut referral in referrals.clone() {
            referral.introducer = Some(link.clone());
            referral.updated_at = now;
            store.update_member(referral).await?;
        }
    }

    for record in &records {
        store.delete_member(record.collection, &record.id).await?;
    }
    info!(
        "Deleted member {} ({} referral records reassigned)",
        id,
        if new_introducer.is_some() { referrals.len() } else { 0 }
    );

    Ok(DeletedMember {
        deleted_user: deleted.summary(),
        reassigned_referrals_count: referrals.len(),
    })
}
