
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type};

use crate::PipelineError;

/// A harvested catalog entry keyed by its source URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    /// Canonical identifier shared with every embedding of this item
    pub url: String,
    pub name: String,
    pub price_before: Option<String>,
    pub price_after: Option<String>,
    pub discount: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub description: Option<String>,
    /// Image paths relative to the project root, in page order
    pub images: Vec<String>,
    pub harvested_on: NaiveDate,
}

/// Raw `items` row; defaults are applied when converting into [`Item`]
#[derive(Debug, FromRow)]
pub(crate) struct ItemRow {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub price_before: Option<String>,
    pub price_after: Option<String>,
    pub discount: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub description: Option<String>,
    pub images: Option<Json<Vec<String>>>,
    pub harvested_on: NaiveDate,
}

impl From<ItemRow> for Item {
    #[inline]
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            name: row.name,
            price_before: row.price_before,
            price_after: row.price_after,
            discount: row.discount,
            category: row.category,
            sub_category: row.sub_category,
            description: row.description,
            images: row.images.map(|images| images.0).unwrap_or_default(),
            harvested_on: row.harvested_on,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub url: String,
    pub name: String,
    pub price_before: Option<String>,
    pub price_after: Option<String>,
    pub discount: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub harvested_on: NaiveDate,
}

/// Result of inserting an item under the unique URL constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { id: i64 },
    AlreadyPresent,
}

/// Replacement image list for one item, applied by URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpdate {
    pub url: String,
    pub images: Vec<String>,
}

/// Counts from an unordered bulk update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    /// Operations whose URL matched an item
    pub matched: u64,
    /// Matched operations that changed the stored value
    pub modified: u64,
    /// Operations that errored; the rest of the batch still applied
    pub failed: u64,
}

impl BulkWriteResult {
    #[inline]
    pub fn merge(&mut self, other: Self) {
        self.matched += other.matched;
        self.modified += other.modified;
        self.failed += other.failed;
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, clap::ValueEnum,
)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    pub const ALL: [Modality; 2] = [Modality::Text, Modality::Image];

    /// Name of the logical embedding collection for this modality
    #[inline]
    pub fn collection_name(self) -> &'static str {
        match self {
            Modality::Text => "embeddings_text",
            Modality::Image => "embeddings_image",
        }
    }

    /// Default artifact name used by index builds
    #[inline]
    pub fn index_name(self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
        }
    }
}

impl std::fmt::Display for Modality {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Modality::Text => write!(f, "text"),
            Modality::Image => write!(f, "image"),
        }
    }
}

/// A stored, already-normalized vector for one item and modality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: i64,
    pub modality: Modality,
    pub item_url: String,
    pub vector: Vec<f32>,
    /// Provenance tag of the model that produced the vector
    pub model: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct EmbeddingRow {
    pub id: i64,
    pub modality: Modality,
    pub item_url: String,
    pub vector: Vec<u8>,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EmbeddingRow> for EmbeddingRecord {
    type Error = PipelineError;

    #[inline]
    fn try_from(row: EmbeddingRow) -> Result<Self, Self::Error> {
        let vector = decode_vector(&row.vector).map_err(|e| {
            PipelineError::Database(format!(
                "Corrupt {} vector for {}: {}",
                row.modality, row.item_url, e
            ))
        })?;

        Ok(Self {
            id: row.id,
            modality: row.modality,
            item_url: row.item_url,
            vector,
            model: row.model,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEmbedding {
    pub modality: Modality,
    pub item_url: String,
    pub vector: Vec<f32>,
    pub model: String,
}

/// Serialize a vector as packed little-endian `f32`s
#[inline]
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`]
#[inline]
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!(
            "blob length {} is not a multiple of 4",
            bytes.len()
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
