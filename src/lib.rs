pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::routes;
pub use api::{AppState, SharedState};

// Export logic types
pub use logic::{
    BranchSummary, LevelCount, LogicError, NetworkMember, NetworkOptions, ReferralGraph,
    TokenIssuer,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

use axum::Router;
use std::sync::Arc;

use crate::config::AppConfig;

/// Router with state attached, ready to serve.
pub fn build_app<S: Store + 'static>(store: S, config: AppConfig) -> anyhow::Result<Router> {
    let router = api::routes::create_router::<S>(&config);
    let state = Arc::new(AppState::new(store, config)?);
    Ok(router.with_state(state))
}

/// Seed the default introducer when enabled, then serve until the listener fails.
pub async fn run_server<S: Store + 'static>(store: S, config: AppConfig) -> anyhow::Result<()> {
    use tokio::net::TcpListener;

    let load_seed = config.seed.enabled
        || std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true";
    if load_seed {
        println!("Loading seed data...");
        if seed::ensure_default_introducer(&store, &config.seed).await? {
            println!("Default introducer {} created", config.seed.introducer_mobile);
        } else {
            println!("Default introducer already present");
        }
    }

    let bind_address = config.server_address();
    let app = build_app(store, config)?;
    let listener = TcpListener::bind(&bind_address).await?;
    println!("Promo network server running on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
