use anyhow::{Context, Result};
use promo_network::config::AppConfig;
use promo_network::logic::migrate::migrate_legacy_users;
use promo_network::store::PostgresStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    let database_url = config.database_url()?;
    let store = PostgresStore::new(
        &database_url,
        config.database.max_connections.unwrap_or(5),
    )
    .await
    .context("failed to connect to PostgreSQL")?;
    store.migrate().await?;

    println!("Connected to database. Copying legacy users into channel partners...");

    let report = migrate_legacy_users(&store).await?;

    println!("\nMigration summary:");
    println!("  migrated: {}", report.migrated);
    println!("  skipped (already present): {}", report.skipped);
    println!("  errors: {}", report.errors);

    if report.errors > 0 {
        anyhow::bail!("{} legacy users could not be migrated", report.errors);
    }
    println!("Legacy user migration completed!");
    Ok(())
}
