use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use log::warn;
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers::SharedState;
use crate::api::{admin_handlers, auth_handlers, handlers, image_handlers, user_handlers};
use crate::config::{AppConfig, ServerConfig};
use crate::store::traits::Store;

/// Room for multipart framing and text fields around the image itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn create_router<S: Store + 'static>(config: &AppConfig) -> Router<SharedState<S>> {
    Router::new()
        // Health check
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .nest("/api/auth", auth_routes::<S>())
        .nest("/api/users", user_routes::<S>())
        .nest("/api/images", image_routes::<S>())
        .nest(
            "/api/admin",
            admin_routes::<S>(config.images.max_upload_bytes + MULTIPART_OVERHEAD),
        )
        .layer(cors_layer(&config.server))
}

fn auth_routes<S: Store + 'static>() -> Router<SharedState<S>> {
    Router::new()
        .route("/signup", post(auth_handlers::signup::<S>))
        .route("/login", post(auth_handlers::login::<S>))
        .route("/me", get(auth_handlers::me))
}

fn user_routes<S: Store + 'static>() -> Router<SharedState<S>> {
    Router::new()
        .route("/all-users", get(user_handlers::all_users::<S>))
        .route(
            "/search-introducers",
            get(user_handlers::search_introducers::<S>),
        )
        .route(
            "/update-introducer/:user_id",
            put(user_handlers::update_introducer::<S>),
        )
        .route(
            "/update-user-type/:user_id",
            put(user_handlers::update_user_type::<S>),
        )
        // Public mobile lookup used by the signup form
        .route("/search", get(user_handlers::search::<S>))
        .route(
            "/profile",
            get(user_handlers::get_profile).put(user_handlers::update_profile::<S>),
        )
        .route(
            "/my-referral-chain",
            get(user_handlers::my_referral_chain::<S>),
        )
        .route("/search-all", get(user_handlers::search_all::<S>))
        .route(
            "/referral-network/:user_id",
            get(user_handlers::referral_network::<S>),
        )
        .route(
            "/level-users/:branch_user_id/:level",
            get(user_handlers::level_users::<S>),
        )
        .route("/ranking", get(user_handlers::get_ranking::<S>))
}

fn image_routes<S: Store + 'static>() -> Router<SharedState<S>> {
    Router::new().route("/generate", post(image_handlers::generate_image::<S>))
}

fn admin_routes<S: Store + 'static>(upload_limit: usize) -> Router<SharedState<S>> {
    Router::new()
        .route("/login", post(admin_handlers::login::<S>))
        // Promotional images
        .route(
            "/upload-promo-image",
            post(admin_handlers::upload_promo_image::<S>)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/promo-images", get(admin_handlers::promo_images::<S>))
        .route(
            "/promo-image/:id/activate",
            put(admin_handlers::activate_promo_image::<S>),
        )
        .route(
            "/promo-image/:id",
            delete(admin_handlers::delete_promo_image::<S>),
        )
        .route(
            "/cleanup-orphaned-images",
            delete(admin_handlers::cleanup_orphaned_images::<S>),
        )
        // Public endpoints (no token)
        .route("/public-images", get(admin_handlers::public_images::<S>))
        .route(
            "/public-top-introducers",
            get(admin_handlers::public_top_introducers::<S>),
        )
        // Member management
        .route("/all-users", get(admin_handlers::all_users::<S>))
        .route("/users", get(admin_handlers::users::<S>))
        .route("/users/stats", get(admin_handlers::user_stats::<S>))
        .route(
            "/users/by-mobile/:mobile",
            get(admin_handlers::user_by_mobile::<S>),
        )
        .route("/users/:user_id", delete(admin_handlers::delete_user::<S>))
        .route(
            "/users/:user_id/referrals",
            get(admin_handlers::user_referrals::<S>),
        )
        // Network reports
        .route(
            "/referral-network",
            get(admin_handlers::referral_network::<S>),
        )
        .route(
            "/level-users/:branch_user_id/:level",
            get(admin_handlers::level_users::<S>),
        )
        .route(
            "/referral-chain/:user_id",
            get(admin_handlers::member_referral_chain::<S>),
        )
        .route(
            "/referral-connections",
            get(admin_handlers::referral_connections::<S>),
        )
        .route(
            "/all-users-with-introducers",
            get(admin_handlers::all_users_with_introducers::<S>),
        )
        .route(
            "/hierarchical-chain/:user_id",
            get(admin_handlers::hierarchical_chain::<S>),
        )
        .route(
            "/level-users-hierarchical/:user_id/:level",
            get(admin_handlers::level_users_hierarchical::<S>),
        )
}

/// An empty origin list allows any origin.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}
