use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{Config, StoreConfig};


pub mod models;
pub mod queries;

pub use models::*;
pub use queries::*;

pub type DbPool = Pool<Sqlite>;

/// Keyed document store holding the `items` collection and the per-modality
/// embedding collections
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P, store: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(store.busy_timeout_seconds));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(store.connect_timeout_seconds))
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    /// Open the database configured for this project root
    pub async fn connect(config: &Config) -> Result<Self> {
        let db_path = config.database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        info!("Opening database {}", db_path.display());
        Self::new(&db_path, &config.store).await
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    // Item operations
    pub async fn item_exists(&self, url: &str) -> Result<bool> {
        ItemQueries::exists(&self.pool, url).await
    }

    pub async fn find_item(&self, url: &str) -> Result<Option<Item>> {
        ItemQueries::find_by_url(&self.pool, url).await
    }

    pub async fn insert_item(&self, item: &NewItem) -> Result<InsertOutcome> {
        ItemQueries::insert(&self.pool, item).await
    }

    pub async fn list_items(&self) -> Result<Vec<Item>> {
        ItemQueries::list_all(&self.pool).await
    }

    pub async fn count_items(&self) -> Result<i64> {
        ItemQueries::count(&self.pool).await
    }

    pub async fn update_item_images(&self, updates: &[ImageUpdate]) -> Result<BulkWriteResult> {
        ItemQueries::update_images_bulk(&self.pool, updates).await
    }

    // Embedding operations
    pub async fn upsert_embedding(&self, embedding: &NewEmbedding) -> Result<()> {
        EmbeddingQueries::upsert(&self.pool, embedding).await
    }

    pub async fn list_embeddings(&self, modality: Modality) -> Result<Vec<EmbeddingRecord>> {
        EmbeddingQueries::list_by_modality(&self.pool, modality).await
    }

    pub async fn find_embedding(
        &self,
        modality: Modality,
        item_url: &str,
    ) -> Result<Option<EmbeddingRecord>> {
        EmbeddingQueries::find(&self.pool, modality, item_url).await
    }

    pub async fn count_embeddings(&self, modality: Modality) -> Result<i64> {
        EmbeddingQueries::count(&self.pool, modality).await
    }
}
