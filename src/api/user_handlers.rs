use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult};
use crate::api::handlers::SharedState;
use crate::api::user_extractor::AuthMember;
use crate::logic::accounts::{self, ProfileUpdate};
use crate::logic::reports::{Ranking, ReferralChain};
use crate::logic::{
    level_members, network_for, ranking, referral_chain, LevelMembers, MemberNetwork,
    NetworkMember, ReferralGraph,
};
use crate::model::{Id, MemberRecord, MemberType};
use crate::store::traits::{MemberStore, Store};

#[derive(Debug, Default, Deserialize)]
pub struct IntroducerSearch {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MobileSearch {
    #[serde(default)]
    pub mobile: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NetworkSearch {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroducerChange {
    pub introducer_id: Id,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypeChange {
    pub user_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelFilter {
    pub user_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// The caller as a network node; a token for a deleted account fails here.
async fn caller_node<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    caller: &MemberRecord,
) -> ApiResult<NetworkMember> {
    graph
        .find_member(&caller.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

pub async fn all_users<S: Store>(
    State(state): State<SharedState<S>>,
    AuthMember(caller): AuthMember,
) -> ApiResult<Json<Value>> {
    let users = accounts::referred_members(&state.store, &caller).await?;
    Ok(Json(json!({ "users": users })))
}

pub async fn search_introducers<S: Store>(
    State(state): State<SharedState<S>>,
    _caller: AuthMember,
    Query(params): Query<IntroducerSearch>,
) -> ApiResult<Json<Value>> {
    let users = accounts::search_introducers(&state.store, &params.q).await?;
    Ok(Json(json!({ "users": users })))
}

pub async fn update_introducer<S: Store>(
    State(state): State<SharedState<S>>,
    AuthMember(caller): AuthMember,
    Path(user_id): Path<Id>,
    Json(change): Json<IntroducerChange>,
) -> ApiResult<Json<Value>> {
    let updated =
        accounts::update_introducer(&state.store, &caller, &user_id, &change.introducer_id).await?;
    Ok(Json(json!({
        "message": "Introducer updated successfully. Network relationships have been refreshed.",
        "user": updated.summary(),
    })))
}

pub async fn update_user_type<S: Store>(
    State(state): State<SharedState<S>>,
    AuthMember(caller): AuthMember,
    Path(user_id): Path<Id>,
    Json(change): Json<UserTypeChange>,
) -> ApiResult<Json<Value>> {
    accounts::update_user_type(&state.store, &caller, &user_id, &change.user_type).await?;
    Ok(Json(json!({
        "message": format!("User type updated to {} successfully", change.user_type),
        "userType": change.user_type,
    })))
}

pub async fn search<S: Store>(
    State(state): State<SharedState<S>>,
    Query(params): Query<MobileSearch>,
) -> ApiResult<Json<Value>> {
    let users = accounts::search_by_mobile(&state.store, &params.mobile).await?;
    Ok(Json(json!({ "users": users })))
}

pub async fn get_profile(AuthMember(member): AuthMember) -> Json<Value> {
    Json(json!({ "user": member.summary() }))
}

pub async fn update_profile<S: Store>(
    State(state): State<SharedState<S>>,
    AuthMember(caller): AuthMember,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<Value>> {
    let updated = accounts::update_profile(&state.store, &caller.id, update).await?;
    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": updated.summary(),
    })))
}

pub async fn my_referral_chain<S: Store>(
    State(state): State<SharedState<S>>,
    AuthMember(caller): AuthMember,
) -> ApiResult<Json<ReferralChain>> {
    let graph = ReferralGraph::member_view(&state.store);
    let root = caller_node(&graph, &caller).await?;
    let chain = referral_chain(&graph, &root, state.config.network.chain_max_depth).await?;
    Ok(Json(chain))
}

pub async fn search_all<S: Store>(
    State(state): State<SharedState<S>>,
    _caller: AuthMember,
    Query(params): Query<NetworkSearch>,
) -> ApiResult<Json<Value>> {
    let users = accounts::search_all(&state.store, &params.query).await?;
    Ok(Json(json!({ "users": users })))
}

pub async fn referral_network<S: Store>(
    State(state): State<SharedState<S>>,
    _caller: AuthMember,
    Path(user_id): Path<Id>,
) -> ApiResult<Json<MemberNetwork>> {
    let graph = ReferralGraph::member_view(&state.store);
    let root = graph
        .find_member(&user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let network = network_for(&graph, &root, state.config.network.branch_depth).await?;
    Ok(Json(network))
}

/// `CP` or `Customer` narrows the list; anything else means everyone.
pub(crate) fn parse_level_filter(raw: Option<&str>) -> Option<MemberType> {
    match raw.and_then(MemberType::parse) {
        Some(MemberType::Both) | None => None,
        other => other,
    }
}

#[derive(Debug, Serialize)]
pub struct LevelUsersResponse {
    pub success: bool,
    #[serde(flatten)]
    pub members: LevelMembers,
}

pub async fn level_users<S: Store>(
    State(state): State<SharedState<S>>,
    _caller: AuthMember,
    Path((branch_user_id, level)): Path<(Id, usize)>,
    Query(filter): Query<LevelFilter>,
) -> ApiResult<Json<LevelUsersResponse>> {
    let graph = ReferralGraph::member_view(&state.store);
    let members = level_members(
        &graph,
        &branch_user_id,
        level,
        parse_level_filter(filter.user_type.as_deref()),
    )
    .await?;
    Ok(Json(LevelUsersResponse {
        success: true,
        members,
    }))
}

pub async fn get_ranking<S: Store>(
    State(state): State<SharedState<S>>,
    _caller: AuthMember,
    Query(params): Query<PageQuery>,
) -> ApiResult<Json<Ranking>> {
    let graph = ReferralGraph::member_view(&state.store);
    let ranked = ranking(
        &graph,
        state.config.network.ranking_depth,
        params.page.unwrap_or(1),
        params.limit.unwrap_or(0),
    )
    .await?;
    Ok(Json(ranked))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_parsing() {
        assert_eq!(parse_level_filter(Some("CP")), Some(MemberType::ChannelPartner));
        assert_eq!(parse_level_filter(Some("Customer")), Some(MemberType::Customer));
        assert_eq!(parse_level_filter(Some("Both")), None);
        assert_eq!(parse_level_filter(Some("whatever")), None);
        assert_eq!(parse_level_filter(None), None);
    }
}
