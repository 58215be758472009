use anyhow::Result;
use chrono::Utc;
use log::{error, info};
use serde::Serialize;

use crate::model::{Collection, MemberType};
use crate::store::traits::MemberStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Copy every legacy user into ChannelPartner under its original id so that
/// existing referral links keep resolving. Users whose id or mobile is
/// already taken there are skipped.
pub async fn migrate_legacy_users<S: MemberStore + ?Sized>(store: &S) -> Result<MigrationReport> {
    let mut legacy = store.list_members(Collection::LegacyUser).await?;
    // Oldest first, so introducers land in ChannelPartner before their referrals
    legacy.reverse();
    let mut report = MigrationReport::default();
    info!("Found {} legacy users to migrate", legacy.len());

    for user in legacy {
        let taken = store
            .get_member(Collection::ChannelPartner, &user.id)
            .await?
            .is_some()
            || store
                .find_member_by_mobile(Collection::ChannelPartner, &user.mobile)
                .await?
                .is_some();
        if taken {
            report.skipped += 1;
            continue;
        }

        let mut partner = user.copy_into(Collection::ChannelPartner);
        partner.user_type = Some(user.user_type.unwrap_or(MemberType::ChannelPartner));
        if partner.display_name.is_empty() {
            partner.display_name = partner.name.clone();
        }
        if let Some(link) = partner.introducer.as_mut() {
            let in_partners = store
                .get_member(Collection::ChannelPartner, &link.id)
                .await?
                .is_some();
            link.collection = Some(if in_partners {
                Collection::ChannelPartner
            } else {
                Collection::LegacyUser
            });
        }
        partner.updated_at = Utc::now();

        match store.insert_member(partner).await {
            Ok(()) => report.migrated += 1,
            Err(e) => {
                error!("Failed to migrate {} ({}): {}", user.name, user.mobile, e);
                report.errors += 1;
            }
        }
    }

    info!(
        "Legacy migration finished: {} migrated, {} skipped, {} errors",
        report.migrated, report.skipped, report.errors
    );
    Ok(report)
}
