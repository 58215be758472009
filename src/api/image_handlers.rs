use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiResult;
use crate::api::handlers::SharedState;
use crate::api::user_extractor::AuthMember;
use crate::logic::promo::{self, GeneratedImage};
use crate::model::Id;
use crate::store::traits::Store;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub image_id: Id,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "english".to_string()
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub image: GeneratedImage,
}

pub async fn generate_image<S: Store>(
    State(state): State<SharedState<S>>,
    AuthMember(member): AuthMember,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let image = promo::generate(
        &state.store,
        &state.renderer,
        &member,
        &request.image_id,
        &request.language,
    )
    .await?;
    Ok(Json(GenerateResponse {
        message: "Personalized image generated successfully",
        image,
    }))
}
