use axum::response::Json;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::logic::{PromoRenderer, TokenIssuer};

/// Everything a handler needs besides the request.
pub struct AppState<S> {
    pub store: S,
    pub config: AppConfig,
    pub tokens: TokenIssuer,
    pub renderer: PromoRenderer,
}

impl<S> AppState<S> {
    pub fn new(store: S, config: AppConfig) -> anyhow::Result<Self> {
        let tokens = TokenIssuer::new(&config.auth);
        let renderer = PromoRenderer::from_config(&config.images)?;
        Ok(Self {
            store,
            config,
            tokens,
            renderer,
        })
    }
}

pub type SharedState<S> = Arc<AppState<S>>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Promo network API is running" }))
}

/// A response body with a leading human-readable `message`.
#[derive(Debug, Serialize)]
pub struct WithMessage<T> {
    pub message: String,
    #[serde(flatten)]
    pub body: T,
}

impl<T> WithMessage<T> {
    pub fn new(message: impl Into<String>, body: T) -> Json<Self> {
        Json(Self {
            message: message.into(),
            body,
        })
    }
}
