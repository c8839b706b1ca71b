
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use sqlx::SqlitePool;
use sqlx::types::Json;
use tracing::{debug, warn};

const ITEM_COLUMNS: &str = "id, url, name, price_before, price_after, discount, category, \
                            sub_category, description, images, harvested_on";

const EMBEDDING_COLUMNS: &str = "id, modality, item_url, vector, model, created_at";

pub struct ItemQueries;

impl ItemQueries {
    #[inline]
    pub async fn find_by_url(pool: &SqlitePool, url: &str) -> Result<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(pool)
        .await
        .context("Failed to get item by url")?;

        Ok(row.map(Item::from))
    }

    #[inline]
    pub async fn exists(pool: &SqlitePool, url: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM items WHERE url = ?")
            .bind(url)
            .fetch_optional(pool)
            .await
            .context("Failed to check item existence")?;

        Ok(found.is_some())
    }

    /// Insert a new item; an existing URL is reported, never overwritten
    #[inline]
    pub async fn insert(pool: &SqlitePool, new_item: &NewItem) -> Result<InsertOutcome> {
        let result = sqlx::query(
            "INSERT INTO items (url, name, price_before, price_after, discount, category, \
             sub_category, description, images, harvested_on) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_item.url)
        .bind(&new_item.name)
        .bind(&new_item.price_before)
        .bind(&new_item.price_after)
        .bind(&new_item.discount)
        .bind(&new_item.category)
        .bind(&new_item.sub_category)
        .bind(&new_item.description)
        .bind(Json(&new_item.images))
        .bind(new_item.harvested_on)
        .execute(pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Inserted {
                id: done.last_insert_rowid(),
            }),
            Err(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => {
                debug!("Item already present: {}", new_item.url);
                Ok(InsertOutcome::AlreadyPresent)
            }
            Err(e) => Err(anyhow::Error::from(e).context("Failed to insert item")),
        }
    }

    /// Full scan in insertion order
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY id"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list items")?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(pool)
            .await
            .context("Failed to count items")
    }

    /// Apply image-list replacements one by one; a failing operation is
    /// counted and the remaining ones still run
    #[inline]
    pub async fn update_images_bulk(
        pool: &SqlitePool,
        updates: &[ImageUpdate],
    ) -> Result<BulkWriteResult> {
        let mut result = BulkWriteResult::default();

        for update in updates {
            match Self::update_images(pool, update).await {
                Ok(Some(changed)) => {
                    result.matched += 1;
                    if changed {
                        result.modified += 1;
                    }
                }
                Ok(None) => {
                    debug!("No item matched image update for {}", update.url);
                }
                Err(e) => {
                    warn!("Image update failed for {}: {:#}", update.url, e);
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }

    /// Returns `None` when no item has the URL, otherwise whether the value changed
    async fn update_images(pool: &SqlitePool, update: &ImageUpdate) -> Result<Option<bool>> {
        let current: Option<Option<Json<Vec<String>>>> =
            sqlx::query_scalar("SELECT images FROM items WHERE url = ?")
                .bind(&update.url)
                .fetch_optional(pool)
                .await
                .context("Failed to read current images")?;

        let Some(current) = current else {
            return Ok(None);
        };

        if current.is_some_and(|images| images.0 == update.images) {
            return Ok(Some(false));
        }

        sqlx::query("UPDATE items SET images = ? WHERE url = ?")
            .bind(Json(&update.images))
            .bind(&update.url)
            .execute(pool)
            .await
            .context("Failed to update images")?;

        Ok(Some(true))
    }
}

pub struct EmbeddingQueries;

impl EmbeddingQueries {
    /// Insert or replace the vector for `(modality, item_url)`; a replaced
    /// record keeps its row position
    #[inline]
    pub async fn upsert(pool: &SqlitePool, embedding: &NewEmbedding) -> Result<()> {
        sqlx::query(
            "INSERT INTO embeddings (modality, item_url, vector, model, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (modality, item_url) DO UPDATE SET \
             vector = excluded.vector, model = excluded.model, created_at = excluded.created_at",
        )
        .bind(embedding.modality)
        .bind(&embedding.item_url)
        .bind(encode_vector(&embedding.vector))
        .bind(&embedding.model)
        .bind(Utc::now())
        .execute(pool)
        .await
        .with_context(|| {
            format!(
                "Failed to upsert {} embedding for {}",
                embedding.modality, embedding.item_url
            )
        })?;

        Ok(())
    }

    /// Every record of one modality in row order
    #[inline]
    pub async fn list_by_modality(
        pool: &SqlitePool,
        modality: Modality,
    ) -> Result<Vec<EmbeddingRecord>> {
        let query = format!("SELECT {EMBEDDING_COLUMNS} FROM embeddings WHERE modality = ? ORDER BY id");
        let mut rows = sqlx::query_as::<_, EmbeddingRow>(&query)
            .bind(modality)
            .fetch(pool);

        let mut records = Vec::new();
        while let Some(row) = rows
            .try_next()
            .await
            .context("Failed to read embedding rows")?
        {
            records.push(EmbeddingRecord::try_from(row)?);
        }

        debug!("Read {} {} embeddings", records.len(), modality);
        Ok(records)
    }

    #[inline]
    pub async fn find(
        pool: &SqlitePool,
        modality: Modality,
        item_url: &str,
    ) -> Result<Option<EmbeddingRecord>> {
        let row = sqlx::query_as::<_, EmbeddingRow>(&format!(
            "SELECT {EMBEDDING_COLUMNS} FROM embeddings WHERE modality = ? AND item_url = ?"
        ))
        .bind(modality)
        .bind(item_url)
        .fetch_optional(pool)
        .await
        .context("Failed to get embedding")?;

        row.map(EmbeddingRecord::try_from)
            .transpose()
            .map_err(anyhow::Error::from)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool, modality: Modality) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM embeddings WHERE modality = ?")
            .bind(modality)
            .fetch_one(pool)
            .await
            .context("Failed to count embeddings")
    }
}
