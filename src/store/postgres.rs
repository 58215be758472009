use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};

use crate::model::{Collection, Id, IntroducerRef, MemberRecord, MemberType, PromoImage};
use crate::store::traits::{MemberStore, PromoImageStore, SearchFields, Store, StoreError};

const MEMBER_COLUMNS: &str = "collection, id, name, display_name, mobile, password_hash, \
     introducer_id, introducer_collection, introducer_mobile, introducer_name, \
     user_type, created_at, updated_at";

const PROMO_COLUMNS: &str = "id, filename, original_name, image_data, mime_type, title, \
     description, is_active, event_date, created_at, updated_at";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS members (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        name TEXT NOT NULL,
        display_name TEXT NOT NULL,
        mobile TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        introducer_id TEXT,
        introducer_collection TEXT,
        introducer_mobile TEXT,
        introducer_name TEXT,
        user_type TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (collection, id),
        CONSTRAINT members_collection_mobile_key UNIQUE (collection, mobile)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS members_introducer_idx ON members (collection, introducer_id)",
    r#"
    CREATE TABLE IF NOT EXISTS promo_images (
        id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        original_name TEXT NOT NULL,
        image_data TEXT,
        mime_type TEXT,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        is_active BOOLEAN NOT NULL,
        event_date TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create tables and indexes that do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema")?;
        }
        log::info!("Database schema is up to date");
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn member_from_row(row: &PgRow) -> Result<MemberRecord> {
    let collection: String = row.try_get("collection")?;
    let collection = Collection::parse(&collection)
        .with_context(|| format!("Unknown member collection '{}'", collection))?;

    let introducer = match row.try_get::<Option<String>, _>("introducer_id")? {
        Some(id) => {
            let introducer_collection: Option<String> = row.try_get("introducer_collection")?;
            Some(IntroducerRef {
                id,
                collection: introducer_collection.as_deref().and_then(Collection::parse),
                mobile: row.try_get("introducer_mobile")?,
                name: row.try_get("introducer_name")?,
            })
        }
        None => None,
    };

    let user_type: Option<String> = row.try_get("user_type")?;

    Ok(MemberRecord {
        id: row.try_get("id")?,
        collection,
        name: row.try_get("name")?,
        display_name: row.try_get("display_name")?,
        mobile: row.try_get("mobile")?,
        password_hash: row.try_get("password_hash")?,
        introducer,
        user_type: user_type.as_deref().and_then(MemberType::parse),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn promo_from_row(row: &PgRow) -> Result<PromoImage> {
    Ok(PromoImage {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        original_name: row.try_get("original_name")?,
        image_data: row.try_get("image_data")?,
        mime_type: row.try_get("mime_type")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        event_date: row.try_get("event_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Translate unique violations on the members table into `StoreError`.
fn map_member_write_error(err: sqlx::Error, member: &MemberRecord) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return if db_err.constraint() == Some("members_collection_mobile_key") {
                StoreError::DuplicateMobile {
                    collection: member.collection,
                    mobile: member.mobile.clone(),
                }
                .into()
            } else {
                StoreError::DuplicateId {
                    collection: member.collection,
                    id: member.id.clone(),
                }
                .into()
            };
        }
    }
    anyhow::Error::new(err).context("Failed to write member")
}

/// Escape LIKE wildcards so the query is matched literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait::async_trait]
impl MemberStore for PostgresStore {
    async fn get_member(&self, collection: Collection, id: &Id) -> Result<Option<MemberRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM members WHERE collection = $1 AND id = $2",
            MEMBER_COLUMNS
        ))
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch member")?;

        row.as_ref().map(member_from_row).transpose()
    }

    async fn find_member_by_mobile(
        &self,
        collection: Collection,
        mobile: &str,
    ) -> Result<Option<MemberRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM members WHERE collection = $1 AND mobile = $2",
            MEMBER_COLUMNS
        ))
        .bind(collection.as_str())
        .bind(mobile)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch member by mobile")?;

        row.as_ref().map(member_from_row).transpose()
    }

    async fn list_members(&self, collection: Collection) -> Result<Vec<MemberRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM members WHERE collection = $1 ORDER BY created_at DESC, id",
            MEMBER_COLUMNS
        ))
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list members")?;

        rows.iter().map(member_from_row).collect()
    }

    async fn list_referrals(
        &self,
        collection: Collection,
        introducer_ids: &[Id],
    ) -> Result<Vec<MemberRecord>> {
        if introducer_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {} FROM members WHERE collection = $1 AND introducer_id = ANY($2) \
             ORDER BY created_at DESC, id",
            MEMBER_COLUMNS
        ))
        .bind(collection.as_str())
        .bind(introducer_ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list referrals")?;

        rows.iter().map(member_from_row).collect()
    }

    async fn search_members(
        &self,
        collection: Collection,
        query: &str,
        fields: SearchFields,
        limit: usize,
    ) -> Result<Vec<MemberRecord>> {
        let condition = match fields {
            SearchFields::MobileOnly => "mobile ILIKE $2",
            SearchFields::NameOrMobile => {
                "(mobile ILIKE $2 OR name ILIKE $2 OR display_name ILIKE $2)"
            }
        };

        let rows = sqlx::query(&format!(
            "SELECT {} FROM members WHERE collection = $1 AND {} ORDER BY name, id LIMIT $3",
            MEMBER_COLUMNS, condition
        ))
        .bind(collection.as_str())
        .bind(like_pattern(query))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search members")?;

        rows.iter().map(member_from_row).collect()
    }

    async fn count_members_since(
        &self,
        collection: Collection,
        since: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM members WHERE collection = $1 \
             AND ($2::timestamptz IS NULL OR created_at >= $2)",
        )
        .bind(collection.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count members")?;

        Ok(count as usize)
    }

    async fn insert_member(&self, member: MemberRecord) -> Result<()> {
        let introducer = member.introducer.as_ref();
        sqlx::query(&format!(
            "INSERT INTO members ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            MEMBER_COLUMNS
        ))
        .bind(member.collection.as_str())
        .bind(&member.id)
        .bind(&member.name)
        .bind(&member.display_name)
        .bind(&member.mobile)
        .bind(&member.password_hash)
        .bind(introducer.map(|i| i.id.clone()))
        .bind(introducer.and_then(|i| i.collection).map(|c| c.as_str()))
        .bind(introducer.and_then(|i| i.mobile.clone()))
        .bind(introducer.and_then(|i| i.name.clone()))
        .bind(member.user_type.map(|t| t.as_str()))
        .bind(member.created_at)
        .bind(member.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_member_write_error(e, &member))?;

        Ok(())
    }

    async fn update_member(&self, member: MemberRecord) -> Result<bool> {
        let introducer = member.introducer.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE members SET
                name = $3,
                display_name = $4,
                mobile = $5,
                password_hash = $6,
                introducer_id = $7,
                introducer_collection = $8,
                introducer_mobile = $9,
                introducer_name = $10,
                user_type = $11,
                updated_at = $12
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(member.collection.as_str())
        .bind(&member.id)
        .bind(&member.name)
        .bind(&member.display_name)
        .bind(&member.mobile)
        .bind(&member.password_hash)
        .bind(introducer.map(|i| i.id.clone()))
        .bind(introducer.and_then(|i| i.collection).map(|c| c.as_str()))
        .bind(introducer.and_then(|i| i.mobile.clone()))
        .bind(introducer.and_then(|i| i.name.clone()))
        .bind(member.user_type.map(|t| t.as_str()))
        .bind(member.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_member_write_error(e, &member))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_member(&self, collection: Collection, id: &Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM members WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete member")?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl PromoImageStore for PostgresStore {
    async fn get_promo_image(&self, id: &Id) -> Result<Option<PromoImage>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM promo_images WHERE id = $1",
            PROMO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch promo image")?;

        row.as_ref().map(promo_from_row).transpose()
    }

    async fn list_promo_images(&self, active_only: bool) -> Result<Vec<PromoImage>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM promo_images WHERE ($1 = FALSE OR is_active) \
             ORDER BY event_date DESC, id",
            PROMO_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list promo images")?;

        rows.iter().map(promo_from_row).collect()
    }

    async fn upsert_promo_image(&self, image: PromoImage) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO promo_images ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                filename = EXCLUDED.filename,
                original_name = EXCLUDED.original_name,
                image_data = EXCLUDED.image_data,
                mime_type = EXCLUDED.mime_type,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                is_active = EXCLUDED.is_active,
                event_date = EXCLUDED.event_date,
                updated_at = EXCLUDED.updated_at
            "#,
            PROMO_COLUMNS
        ))
        .bind(&image.id)
        .bind(&image.filename)
        .bind(&image.original_name)
        .bind(&image.image_data)
        .bind(&image.mime_type)
        .bind(&image.title)
        .bind(&image.description)
        .bind(image.is_active)
        .bind(image.event_date)
        .bind(image.created_at)
        .bind(image.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert promo image")?;

        Ok(())
    }

    async fn delete_promo_image(&self, id: &Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM promo_images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete promo image")?;

        Ok(result.rows_affected() > 0)
    }

    async fn activate_promo_image(&self, id: &Id) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM promo_images WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to fetch promo image")?;
        if exists.is_none() {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE promo_images SET is_active = (id = $1), updated_at = NOW() \
             WHERE is_active <> (id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to activate promo image")?;

        tx.commit().await.context("Failed to commit activation")?;
        Ok(true)
    }
}

impl Store for PostgresStore {}
