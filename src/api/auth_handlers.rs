use axum::{extract::State, http::StatusCode, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiResult;
use crate::api::handlers::SharedState;
use crate::api::user_extractor::AuthMember;
use crate::logic::accounts::{self, SignupRequest};
use crate::store::traits::Store;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub password: String,
}

pub async fn signup<S: Store>(
    State(state): State<SharedState<S>>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let outcome = accounts::signup(&state.store, &state.tokens, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "token": outcome.token,
            "user": outcome.user,
        })),
    ))
}

pub async fn login<S: Store>(
    State(state): State<SharedState<S>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let outcome =
        accounts::login(&state.store, &state.tokens, &request.mobile, &request.password).await?;
    Ok(Json(json!({
        "message": "Login successful",
        "token": outcome.token,
        "user": outcome.user,
    })))
}

pub async fn me(AuthMember(member): AuthMember) -> Json<Value> {
    Json(json!({ "user": member.summary() }))
}
