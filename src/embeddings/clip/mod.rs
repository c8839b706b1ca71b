#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use fastembed::{ImageEmbedding, ImageEmbeddingModel, ImageInitOptions};
use std::path::Path;
use tracing::info;

use super::Embedder;
use super::inputs::ImageInput;

/// Image encoder running a fastembed vision model locally
pub struct ClipImageEmbedder {
    model: ImageEmbedding,
    model_name: String,
}

impl std::fmt::Debug for ClipImageEmbedder {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipImageEmbedder")
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

impl ClipImageEmbedder {
    /// Load the model, downloading it into `cache_dir` on first use
    #[inline]
    pub fn new(model_name: &str, cache_dir: &Path) -> Result<Self> {
        let model_enum = parse_model_name(model_name)?;

        std::fs::create_dir_all(cache_dir).with_context(|| {
            format!("Failed to create model cache {}", cache_dir.display())
        })?;

        info!("Loading image model {} from {}", model_name, cache_dir.display());
        let options = ImageInitOptions::new(model_enum)
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(console::user_attended_stderr());

        let model = ImageEmbedding::try_new(options)
            .map_err(|e| anyhow!("Failed to load image model {}: {}", model_name, e))?;

        Ok(Self {
            model,
            model_name: model_name.to_string(),
        })
    }
}

/// Map a configured model name onto a fastembed vision model
#[inline]
pub fn parse_model_name(name: &str) -> Result<ImageEmbeddingModel> {
    match name.to_lowercase().as_str() {
        "clip-vit-b32" | "clip-vit-b-32" => Ok(ImageEmbeddingModel::ClipVitB32),
        "resnet50" => Ok(ImageEmbeddingModel::Resnet50),
        "unicom-vit-b16" => Ok(ImageEmbeddingModel::UnicomVitB16),
        "unicom-vit-b32" => Ok(ImageEmbeddingModel::UnicomVitB32),
        "nomic-embed-vision-v1.5" => Ok(ImageEmbeddingModel::NomicEmbedVisionV15),
        _ => Err(anyhow!(
            "Unknown image model: {}. Supported models: clip-vit-b32, resnet50, unicom-vit-b16, unicom-vit-b32, nomic-embed-vision-v1.5",
            name
        )),
    }
}

impl Embedder for ClipImageEmbedder {
    type Input = ImageInput;

    #[inline]
    fn model_name(&self) -> &str {
        &self.model_name
    }

    #[inline]
    fn embed_batch(&mut self, inputs: &[&ImageInput]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let images = inputs.iter().map(|input| input.image.clone()).collect();
        self.model
            .embed_images(images)
            .map_err(|e| anyhow!("Image embedding failed: {}", e))
    }
}
