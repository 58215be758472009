use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use log::warn;

use crate::api::error::{ApiError, USER_NOT_FOUND};
use crate::api::handlers::SharedState;
use crate::logic::accounts::find_account;
use crate::model::{AdminClaims, MemberRecord};
use crate::store::traits::Store;

/// The member behind the bearer token.
///
/// The token subject is looked up in ChannelPartner first, then Customer.
pub struct AuthMember(pub MemberRecord);

/// Claims of a valid admin token.
pub struct AdminAuth(pub AdminClaims);

#[async_trait]
impl<S> FromRequestParts<SharedState<S>> for AuthMember
where
    S: Store + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(ApiError::no_token)?;
        let claims = state.tokens.verify_member(token)?;

        match find_account(&state.store, &claims.sub).await? {
            Some(member) => Ok(AuthMember(member)),
            None => Err(ApiError::unauthorized(
                "User not found. Please login again.",
                Some(USER_NOT_FOUND),
            )),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<SharedState<S>> for AdminAuth
where
    S: Store + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(ApiError::no_token)?;
        let claims = state.tokens.verify_admin(token)?;
        if !claims.is_admin() {
            warn!("Rejected non-admin token on an admin route");
            return Err(ApiError::unauthorized("Access denied. Admin only.", None));
        }
        Ok(AdminAuth(claims))
    }
}

/// Token from `Authorization: Bearer <token>`; an empty value counts as missing.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim())
        .filter(|token| !token.is_empty())
}
