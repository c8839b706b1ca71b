// Embeddings module
// Encoders, input extraction and the batch engine that writes vector collections

pub mod batch;
#[cfg(feature = "image-encoder")]
pub mod clip;
pub mod inputs;
pub mod normalize;
pub mod ollama;


use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::database::sqlite::{Database, Item, Modality, NewEmbedding};

pub use batch::{BatchReport, Extraction, SkipReason, run_batches};
#[cfg(feature = "image-encoder")]
pub use clip::ClipImageEmbedder;
pub use inputs::{ImageInput, ImageInputResolver, text_input};
pub use normalize::{l2_normalize, l2_normalized, normalize_rows};
pub use ollama::OllamaEmbedder;

/// A pretrained model turning a batch of inputs into fixed-length vectors.
///
/// Implementations must return exactly one vector per input, in input order.
pub trait Embedder {
    type Input;

    /// Provenance tag stored next to every vector
    fn model_name(&self) -> &str;

    fn embed_batch(&mut self, inputs: &[&Self::Input]) -> Result<Vec<Vec<f32>>>;
}

/// Destination for normalized vectors, keyed by item identifier
#[async_trait]
pub trait EmbeddingSink {
    async fn upsert(&self, item_url: &str, vector: Vec<f32>, model: &str) -> Result<()>;
}

/// One modality's embedding collection in the store
#[derive(Debug, Clone)]
pub struct EmbeddingCollection {
    database: Database,
    modality: Modality,
}

impl EmbeddingCollection {
    #[inline]
    pub fn new(database: Database, modality: Modality) -> Self {
        Self { database, modality }
    }

    #[inline]
    pub fn modality(&self) -> Modality {
        self.modality
    }
}

#[async_trait]
impl EmbeddingSink for EmbeddingCollection {
    #[inline]
    async fn upsert(&self, item_url: &str, vector: Vec<f32>, model: &str) -> Result<()> {
        let embedding = NewEmbedding {
            modality: self.modality,
            item_url: item_url.to_string(),
            vector,
            model: model.to_string(),
        };
        self.database.upsert_embedding(&embedding).await
    }
}

/// Run one modality over the store's current items and write its collection
#[inline]
pub async fn run_stage<E, F>(
    database: &Database,
    modality: Modality,
    batch_size: usize,
    extract: F,
    embedder: &mut E,
) -> crate::Result<BatchReport>
where
    E: Embedder + Send,
    E::Input: Send,
    F: FnMut(&Item) -> Extraction<E::Input> + Send,
{
    let items: Vec<Item> = database.list_items().await?;
    info!(
        "Embedding {} items into {} with {}",
        items.len(),
        modality.collection_name(),
        embedder.model_name()
    );

    let sink = EmbeddingCollection::new(database.clone(), modality);
    run_batches(&items, batch_size, extract, embedder, &sink).await
}
