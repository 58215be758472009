use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    response::Json,
};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult};
use crate::api::handlers::{SharedState, WithMessage};
use crate::api::user_extractor::AdminAuth;
use crate::api::user_handlers::{parse_level_filter, LevelFilter, LevelUsersResponse};
use crate::logic::admin::{self, DeletedMember};
use crate::logic::promo::{self, CleanupReport, Upload};
use crate::logic::reports::{Hierarchy, HierarchyLevel};
use crate::logic::{
    admin_network, connections, hierarchy, hierarchy_level, level_members, member_stats,
    referral_chain, top_introducers, AdminNetwork, IntroducerLookup, NetworkMember,
    ReferralGraph,
};
use crate::model::{Id, PromoImage, PromoImageView, ADMIN_ROLE};
use crate::store::traits::{MemberStore, Store};

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkQuery {
    #[serde(alias = "rootUserId")]
    pub root_id: Option<Id>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionQuery {
    pub introducer_id: Option<Id>,
    pub introducer_mobile: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyQuery {
    pub max_levels: Option<usize>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::BadRequest(err.body_text())
}

async fn require_member<S: MemberStore + ?Sized>(
    graph: &ReferralGraph<'_, S>,
    id: &Id,
    message: &str,
) -> ApiResult<NetworkMember> {
    graph
        .find_member(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(message.to_string()))
}

pub async fn login<S: Store>(
    State(state): State<SharedState<S>>,
    Json(request): Json<AdminLoginRequest>,
) -> ApiResult<Json<Value>> {
    let token = admin::admin_login(
        &state.config.auth,
        &state.tokens,
        &request.username,
        &request.password,
    )?;
    Ok(Json(json!({
        "message": "Admin login successful",
        "token": token,
        "admin": {
            "username": state.config.auth.admin_username,
            "role": ADMIN_ROLE,
        },
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoImageBody {
    pub promo_image: PromoImageView,
}

#[derive(Debug, Serialize)]
pub struct PromoImageList {
    pub images: Vec<PromoImageView>,
}

/// Multipart fields: `promoImage` (file), `title` and `description`.
pub async fn upload_promo_image<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    mut multipart: Multipart,
) -> ApiResult<Json<WithMessage<PromoImageBody>>> {
    let mut upload = None;
    let mut title = None;
    let mut description = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("promoImage") => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some(Upload {
                    bytes: bytes.to_vec(),
                    content_type,
                    original_name,
                });
            }
            Some("title") => title = Some(field.text().await.map_err(multipart_error)?),
            Some("description") => {
                description = Some(field.text().await.map_err(multipart_error)?)
            }
            _ => {}
        }
    }

    let upload =
        upload.ok_or_else(|| ApiError::BadRequest("Please upload an image file".to_string()))?;
    let image = promo::store_upload(
        &state.store,
        upload,
        title,
        description,
        state.config.images.max_upload_bytes,
    )
    .await?;

    Ok(WithMessage::new(
        "Promotional image uploaded successfully",
        PromoImageBody {
            promo_image: image.view(),
        },
    ))
}

pub async fn promo_images<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
) -> ApiResult<Json<WithMessage<PromoImageList>>> {
    let images = state
        .store
        .list_promo_images(false)
        .await?
        .iter()
        .map(PromoImage::view)
        .collect();
    Ok(WithMessage::new(
        "Promotional images retrieved successfully",
        PromoImageList { images },
    ))
}

pub async fn activate_promo_image<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    Path(image_id): Path<Id>,
) -> ApiResult<Json<WithMessage<PromoImageBody>>> {
    if !state.store.activate_promo_image(&image_id).await? {
        return Err(ApiError::NotFound("Promotional image not found".to_string()));
    }
    let image = state
        .store
        .get_promo_image(&image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Promotional image not found".to_string()))?;
    info!("Activated promotional image {}", image_id);
    Ok(WithMessage::new(
        "Promotional image activated successfully",
        PromoImageBody {
            promo_image: image.view(),
        },
    ))
}

pub async fn delete_promo_image<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    Path(image_id): Path<Id>,
) -> ApiResult<Json<Value>> {
    if !state.store.delete_promo_image(&image_id).await? {
        return Err(ApiError::NotFound("Promotional image not found".to_string()));
    }
    info!("Deleted promotional image {}", image_id);
    Ok(Json(json!({ "message": "Promotional image deleted successfully" })))
}

pub async fn public_images<S: Store>(
    State(state): State<SharedState<S>>,
) -> ApiResult<Json<WithMessage<PromoImageList>>> {
    let images = promo::public_images(&state.store).await?;
    Ok(WithMessage::new(
        "Promotional images retrieved successfully",
        PromoImageList { images },
    ))
}

pub async fn public_top_introducers<S: Store>(
    State(state): State<SharedState<S>>,
) -> ApiResult<Json<Value>> {
    let graph = ReferralGraph::admin_view(&state.store);
    let top = top_introducers(&graph, Some(10)).await?;
    Ok(Json(json!({
        "message": "Top introducers retrieved successfully",
        "topIntroducers": top,
    })))
}

pub async fn all_users<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
) -> ApiResult<Json<Value>> {
    let graph = ReferralGraph::admin_view(&state.store);
    let listing = connections(&graph, None).await?;
    Ok(Json(json!({
        "message": "All users retrieved successfully",
        "users": listing.connections,
    })))
}

pub async fn users<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
) -> ApiResult<Json<Value>> {
    let graph = ReferralGraph::admin_view(&state.store);
    let listing = connections(&graph, None).await?;
    Ok(Json(json!({
        "message": "Users retrieved successfully",
        "users": listing.connections,
        "stats": listing.stats,
    })))
}

pub async fn user_referrals<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    Path(user_id): Path<Id>,
) -> ApiResult<Json<Value>> {
    let graph = ReferralGraph::admin_view(&state.store);
    let introducer = require_member(&graph, &user_id, "User not found").await?;
    let listing = connections(&graph, Some(IntroducerLookup::Id(introducer.id.clone()))).await?;
    Ok(Json(json!({
        "message": "Referrals retrieved successfully",
        "introducer": introducer,
        "totalReferrals": listing.connections.len(),
        "referrals": listing.connections,
    })))
}

pub async fn delete_user<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    Path(user_id): Path<Id>,
) -> ApiResult<Json<WithMessage<DeletedMember>>> {
    let deleted = admin::delete_member(&state.store, &user_id).await?;
    Ok(WithMessage::new("User deleted successfully", deleted))
}

pub async fn user_stats<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
) -> ApiResult<Json<Value>> {
    let graph = ReferralGraph::admin_view(&state.store);
    let stats = member_stats(&graph, Utc::now()).await?;
    Ok(Json(json!({
        "message": "User statistics retrieved successfully",
        "stats": stats,
    })))
}

pub async fn referral_network<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    Query(query): Query<NetworkQuery>,
) -> ApiResult<Json<WithMessage<AdminNetwork>>> {
    let graph = ReferralGraph::admin_view(&state.store);
    let network = admin_network(
        &graph,
        query.root_id.as_ref(),
        state.config.network.branch_depth,
    )
    .await?;
    Ok(WithMessage::new(
        "Hierarchical referral network retrieved successfully",
        network,
    ))
}

pub async fn level_users<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    Path((branch_user_id, level)): Path<(Id, usize)>,
    Query(filter): Query<LevelFilter>,
) -> ApiResult<Json<LevelUsersResponse>> {
    let graph = ReferralGraph::admin_view(&state.store);
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

pub async fn member_referral_chain<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    Path(user_id): Path<Id>,
) -> ApiResult<Json<Value>> {
    let graph = ReferralGraph::admin_view(&state.store);
    let root = require_member(&graph, &user_id, "User not found").await?;
    let chain = referral_chain(&graph, &root, state.config.network.chain_max_depth).await?;
    Ok(Json(json!({
        "message": "Referral chain retrieved successfully",
        "user": root,
        "referralChain": chain.referral_chain,
        "stats": chain.stats,
    })))
}

pub async fn referral_connections<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    Query(query): Query<ConnectionQuery>,
) -> ApiResult<Json<Value>> {
    let lookup = match (query.introducer_id, query.introducer_mobile) {
        (Some(id), _) if !id.is_empty() => Some(IntroducerLookup::Id(id)),
        (_, Some(mobile)) if !mobile.is_empty() => Some(IntroducerLookup::Mobile(mobile)),
        _ => None,
    };
    let graph = ReferralGraph::admin_view(&state.store);
    let listing = connections(&graph, lookup).await?;
    Ok(Json(json!({
        "message": "Referral connections retrieved successfully",
        "connections": listing.connections,
        "introducerInfo": listing.introducer_info,
        "stats": listing.stats,
    })))
}

pub async fn all_users_with_introducers<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
) -> ApiResult<Json<Value>> {
    let graph = ReferralGraph::admin_view(&state.store);
    let introducers = top_introducers(&graph, None).await?;
    Ok(Json(json!({
        "message": "Introducers list retrieved successfully",
        "introducers": introducers,
    })))
}

pub async fn hierarchical_chain<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    Path(user_id): Path<Id>,
    Query(query): Query<HierarchyQuery>,
) -> ApiResult<Json<WithMessage<Hierarchy>>> {
    let graph = ReferralGraph::admin_view(&state.store);
    let root = require_member(&graph, &user_id, "User not found").await?;
    let max_levels = query
        .max_levels
        .filter(|&levels| levels > 0)
        .unwrap_or(state.config.network.hierarchy_levels);
    let tree = hierarchy(&graph, &root, max_levels).await?;
    Ok(WithMessage::new(
        "Hierarchical chain retrieved successfully",
        tree,
    ))
}

pub async fn level_users_hierarchical<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    Path((user_id, level)): Path<(Id, usize)>,
) -> ApiResult<Json<WithMessage<HierarchyLevel>>> {
    let graph = ReferralGraph::admin_view(&state.store);
    let root = require_member(&graph, &user_id, "Root user not found").await?;
    let members = hierarchy_level(&graph, &root, level).await?;
    Ok(WithMessage::new(
        format!("Level {} users retrieved successfully", level),
        members,
    ))
}

pub async fn user_by_mobile<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
    Path(mobile): Path<String>,
) -> ApiResult<Json<Value>> {
    let graph = ReferralGraph::admin_view(&state.store);
    let user = graph
        .find_member_by_mobile(&mobile)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found with this mobile number".to_string()))?;
    let referrals = graph.direct_referrals(&user.aliases).await?;
    Ok(Json(json!({
        "message": "User and referrals found",
        "user": user,
        "count": referrals.len(),
        "directReferrals": referrals,
    })))
}

pub async fn cleanup_orphaned_images<S: Store>(
    State(state): State<SharedState<S>>,
    _admin: AdminAuth,
) -> ApiResult<Json<WithMessage<CleanupReport>>> {
    let report = promo::cleanup_images(&state.store).await?;
    Ok(WithMessage::new("Cleanup completed successfully", report))
}
