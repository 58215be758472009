//! Member accounts: signup, login, profile and referral links.

use anyhow::Result;
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::logic::credentials::{hash_password, verify_password, TokenIssuer};
use crate::logic::error::LogicError;
use crate::logic::network::{merge_records, Dedup, NetworkMember, ReferralGraph};
use crate::model::{Collection, Id, IntroducerRef, MemberRecord, MemberSummary, MemberType};
use crate::store::traits::{MemberStore, SearchFields};

pub const SEARCH_LIMIT: usize = 10;
pub const SEARCH_ALL_LIMIT: usize = 20;
pub const MIN_QUERY_LEN: usize = 2;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupRequest {
    pub name: String,
    pub mobile: String,
    pub display_name: String,
    pub password: String,
    pub introducer_id: Option<String>,
    pub introducer_mobile: Option<String>,
    pub introducer_name: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub mobile: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthOutcome {
    pub token: String,
    pub user: MemberSummary,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), LogicError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(LogicError::invalid(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

pub fn validate_mobile(mobile: &str) -> Result<(), LogicError> {
    if mobile.len() != 10 || !mobile.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LogicError::invalid("Please enter a valid 10-digit mobile number"));
    }
    Ok(())
}

/// Signup form type names: `channelpartner`, `customer`, `both`.
fn parse_signup_type(value: Option<&str>) -> Result<MemberType, LogicError> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("channelpartner") => Ok(MemberType::ChannelPartner),
        Some("customer") => Ok(MemberType::Customer),
        Some("both") => Ok(MemberType::Both),
        _ => Err(LogicError::invalid("Please select your user type")),
    }
}

/// Account record for `id`, ChannelPartner first.
pub async fn find_account<S: MemberStore + ?Sized>(
    store: &S,
    id: &Id,
) -> Result<Option<MemberRecord>> {
    for collection in Collection::CURRENT {
        if let Some(record) = store.get_member(collection, id).await? {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

/// Every current record stored under `id`.
async fn account_records<S: MemberStore + ?Sized>(store: &S, id: &Id) -> Result<Vec<MemberRecord>> {
    let mut records = Vec::new();
    for collection in Collection::CURRENT {
        if let Some(record) = store.get_member(collection, id).await? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Account record for `mobile`, ChannelPartner first.
pub async fn find_account_by_mobile<S: MemberStore + ?Sized>(
    store: &S,
    mobile: &str,
) -> Result<Option<MemberRecord>> {
    for collection in Collection::CURRENT {
        if let Some(record) = store.find_member_by_mobile(collection, mobile).await? {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

pub async fn signup<S: MemberStore + ?Sized>(
    store: &S,
    tokens: &TokenIssuer,
    request: SignupRequest,
) -> Result<AuthOutcome> {
    let name = request.name.trim().to_string();
    let display_name = request.display_name.trim().to_string();
    let mobile = request.mobile.trim().to_string();

    check_length("Name", &name, 2, 50)?;
    validate_mobile(&mobile)?;
    check_length("Display name", &display_name, 2, 50)?;
    if request.password.chars().count() < 6 {
        return Err(LogicError::invalid("Password must be at least 6 characters").into());
    }
    if !(present(&request.introducer_id)
        && present(&request.introducer_mobile)
        && present(&request.introducer_name))
    {
        return Err(LogicError::invalid(
            "Introducer is required. Please select a referral member.",
        )
        .into());
    }
    let user_type = parse_signup_type(request.user_type.as_deref())?;

    if find_account_by_mobile(store, &mobile).await?.is_some() {
        return Err(LogicError::invalid("User with this mobile number already exists").into());
    }

    let introducer_id = request.introducer_id.unwrap_or_default();
    let introducer = find_account(store, &introducer_id).await?.ok_or_else(|| {
        LogicError::invalid("Introducer not found. Please select a valid referral member.")
    })?;

    let password_hash = hash_password(&request.password)?;
    let first = user_type.collections()[0];
    let record = MemberRecord::new(
        first,
        name,
        display_name,
        mobile,
        password_hash,
        Some(user_type),
        Some(IntroducerRef::to(&introducer)),
    );

    // A Both member is stored once per collection under one id
    for &collection in user_type.collections() {
        store.insert_member(record.copy_into(collection)).await?;
    }
    info!(
        "Registered {} ({}) under introducer {}",
        record.mobile, user_type, introducer.id
    );

    Ok(AuthOutcome {
        token: tokens.issue_member(&record.id)?,
        user: record.summary(),
    })
}

pub async fn login<S: MemberStore + ?Sized>(
    store: &S,
    tokens: &TokenIssuer,
    mobile: &str,
    password: &str,
) -> Result<AuthOutcome> {
    if mobile.trim().is_empty() || password.is_empty() {
        return Err(LogicError::invalid("Mobile number and password are required").into());
    }
    let record = find_account_by_mobile(store, mobile.trim())
        .await?
        .filter(|r| verify_password(password, &r.password_hash))
        .ok_or_else(|| LogicError::invalid("Invalid credentials"))?;

    Ok(AuthOutcome {
        token: tokens.issue_member(&record.id)?,
        user: record.summary(),
    })
}

/// Make the records of `id` match `user_type`: present in exactly the
/// collections the type requires, all under the same id.
pub async fn set_member_type<S: MemberStore + ?Sized>(
    store: &S,
    id: &Id,
    user_type: MemberType,
) -> Result<MemberRecord> {
    let records = account_records(store, id).await?;
    let base = records
        .first()
        .cloned()
        .ok_or_else(|| LogicError::not_found("User not found"))?;
    let wanted = user_type.collections();

    // Create missing records before dropping unwanted ones
    for &collection in wanted {
        match records.iter().find(|r| r.collection == collection) {
            Some(existing) => {
                let mut updated = existing.clone();
                updated.user_type = Some(user_type);
                updated.updated_at = Utc::now();
                store.update_member(updated).await?;
            }
            None => {
                let mut copy = base.copy_into(collection);
                copy.user_type = Some(user_type);
                store.insert_member(copy).await?;
            }
        }
    }
    for record in records.iter().filter(|r| !wanted.contains(&r.collection)) {
        store.delete_member(record.collection, &record.id).await?;
    }

    let mut result = base.copy_into(wanted[0]);
    result.user_type = Some(user_type);
    Ok(result)
}

/// Whether `caller` may change links of `target_id`: the member itself or
/// anyone in its upline.
async fn may_manage<S: MemberStore + ?Sized>(
    store: &S,
    caller: &MemberRecord,
    target_id: &Id,
) -> Result<bool> {
    if &caller.id == target_id {
        return Ok(true);
    }
    let graph = ReferralGraph::member_view(store);
    match graph.find_member(&caller.id).await? {
        Some(caller_member) => graph.is_in_downline(&caller_member, target_id).await,
        None => Ok(false),
    }
}

pub async fn update_user_type<S: MemberStore + ?Sized>(
    store: &S,
    caller: &MemberRecord,
    target_id: &Id,
    user_type: &str,
) -> Result<MemberType> {
    let user_type = match user_type {
        "CP" => MemberType::ChannelPartner,
        "Customer" => MemberType::Customer,
        "Both" => MemberType::Both,
        _ => return Err(LogicError::invalid("Invalid user type").into()),
    };
    if find_account(store, target_id).await?.is_none() {
        return Err(LogicError::not_found("User not found").into());
    }
    if !may_manage(store, caller, target_id).await? {
        return Err(LogicError::forbidden("Not allowed to change this member").into());
    }
    set_member_type(store, target_id, user_type).await?;
    info!("Member {} is now {}", target_id, user_type);
    Ok(user_type)
}

pub async fn update_introducer<S: MemberStore + ?Sized>(
    store: &S,
    caller: &MemberRecord,
    target_id: &Id,
    introducer_id: &Id,
) -> Result<MemberRecord> {
    let records = account_records(store, target_id).await?;
    if records.is_empty() {
        return Err(LogicError::not_found("User not found").into());
    }
    if !may_manage(store, caller, target_id).await? {
        return Err(LogicError::forbidden("Not allowed to change this member").into());
    }
    if introducer_id == target_id {
        return Err(LogicError::invalid("A member cannot introduce themselves").into());
    }
    let introducer = find_account(store, introducer_id)
        .await?
        .ok_or_else(|| LogicError::not_found("Introducer not found"))?;

    let graph = ReferralGraph::member_view(store);
    if let Some(target) = graph.find_member(target_id).await? {
        if target.is_known_as(&introducer.id)
            || graph.is_in_downline(&target, &introducer.id).await?
        {
            return Err(LogicError::invalid(
                "The new introducer is part of this member's own network",
            )
            .into());
        }
    }

    let link = IntroducerRef::to(&introducer);
    let now = Utc::now();
    let mut updated = None;
    for mut record in records {
        record.introducer = Some(link.clone());
        record.updated_at = now;
        store.update_member(record.clone()).await?;
        updated.get_or_insert(record);
    }
    info!("Member {} moved under introducer {}", target_id, introducer.id);
    updated.ok_or_else(|| LogicError::not_found("User not found").into())
}

pub async fn update_profile<S: MemberStore + ?Sized>(
    store: &S,
    id: &Id,
    update: ProfileUpdate,
) -> Result<MemberRecord> {
    let records = account_records(store, id).await?;
    if records.is_empty() {
        return Err(LogicError::not_found("User not found").into());
    }

    let name = update.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let display_name = update
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let mobile = update.mobile.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
    let user_type = match update.user_type.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(raw) => Some(
            MemberType::parse(raw).ok_or_else(|| LogicError::invalid("Invalid user type"))?,
        ),
        None => None,
    };

    if let Some(name) = &name {
        check_length("Name", name, 2, 50)?;
    }
    if let Some(display_name) = &display_name {
        check_length("Display name", display_name, 2, 50)?;
    }
    if let Some(mobile) = &mobile {
        validate_mobile(mobile)?;
        if let Some(other) = find_account_by_mobile(store, mobile).await? {
            if &other.id != id {
                return Err(LogicError::invalid("User with this mobile number already exists").into());
            }
        }
    }

    let now = Utc::now();
    for mut record in records {
        if let Some(name) = &name {
            record.name = name.clone();
        }
        if let Some(display_name) = &display_name {
            record.display_name = display_name.clone();
        }
        if let Some(mobile) = &mobile {
            record.mobile = mobile.clone();
        }
        record.updated_at = now;
        store.update_member(record).await?;
    }

    match user_type {
        Some(user_type) => set_member_type(store, id, user_type).await,
        None => find_account(store, id)
            .await?
            .ok_or_else(|| LogicError::not_found("User not found").into()),
    }
}

/// Public mobile search, merged by id.
pub async fn search_by_mobile<S: MemberStore + ?Sized>(
    store: &S,
    mobile: &str,
) -> Result<Vec<MemberSummary>> {
    if mobile.trim().is_empty() {
        return Err(LogicError::invalid("Mobile number is required").into());
    }
    search(store, &Collection::CURRENT, mobile.trim(), SearchFields::MobileOnly, SEARCH_LIMIT, Dedup::ById).await
}

/// Introducer picker: short queries return nothing.
pub async fn search_introducers<S: MemberStore + ?Sized>(
    store: &S,
    query: &str,
) -> Result<Vec<MemberSummary>> {
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_LEN {
        return Ok(Vec::new());
    }
    search(store, &Collection::CURRENT, query, SearchFields::NameOrMobile, SEARCH_LIMIT, Dedup::ByMobile).await
}

/// Network search over every collection, legacy users included.
pub async fn search_all<S: MemberStore + ?Sized>(
    store: &S,
    query: &str,
) -> Result<Vec<MemberSummary>> {
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_LEN {
        return Err(LogicError::invalid("Search query must be at least 2 characters").into());
    }
    let mut found = search(store, &Collection::ALL, query, SearchFields::NameOrMobile, SEARCH_ALL_LIMIT, Dedup::ById).await?;
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

async fn search<S: MemberStore + ?Sized>(
    store: &S,
    collections: &[Collection],
    query: &str,
    fields: SearchFields,
    limit: usize,
    dedup: Dedup,
) -> Result<Vec<MemberSummary>> {
    let mut records = Vec::new();
    for &collection in collections {
        records.extend(store.search_members(collection, query, fields, limit).await?);
    }

    let mut seen = HashSet::new();
    Ok(records
        .into_iter()
        .filter(|r| match dedup {
            Dedup::ByMobile => seen.insert(r.mobile.clone()),
            Dedup::ById => seen.insert(r.id.clone()),
            Dedup::Keep => true,
        })
        .take(limit)
        .map(|r| r.summary())
        .collect())
}

/// The caller's direct referrals, newest first, each labelled with the caller
/// as introducer.
pub async fn referred_members<S: MemberStore + ?Sized>(
    store: &S,
    caller: &MemberRecord,
) -> Result<Vec<NetworkMember>> {
    let mut records = Vec::new();
    for collection in Collection::CURRENT {
        records.extend(store.list_referrals(collection, &[caller.id.clone()]).await?);
    }
    let mut members = merge_records(&records, Dedup::ByMobile);
    for member in &mut members {
        member.introducer_name = Some(caller.label().to_string());
    }
    members.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(members)
}
