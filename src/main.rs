use promo_network::config::{AppConfig, StorageBackend};
use promo_network::run_server;
use promo_network::store::{MemoryStore, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with explicit filter to suppress sqlx debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info) // Default to Info for everything
        .filter_module("sqlx", LevelFilter::Warn) // Suppress sqlx Debug logs
        .parse_default_env()
        .init();

    println!("Promo network: referral and promotion server");

    // Load configuration
    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}",
        config.server.host, config.server.port
    );
    if config.images.font_path.is_none() {
        println!("No font configured (images.font_path); image generation is disabled");
    }

    match config.storage.backend {
        StorageBackend::Postgres => {
            println!("Connecting to PostgreSQL...");
            let database_url = config.database_url()?;
            let store = PostgresStore::new(
                &database_url,
                config.database.max_connections.unwrap_or(20),
            )
            .await?;

            println!("Running database migrations...");
            store.migrate().await?;
            println!("Database ready");

            run_server(store, config).await
        }
        StorageBackend::Memory => {
            println!("Using in-memory storage; data is lost on exit");
            run_server(MemoryStore::new(), config).await
        }
    }
}
