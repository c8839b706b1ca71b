#[cfg(test)]
mod tests;

use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::batch::{Extraction, SkipReason};
use crate::config::Config;
use crate::database::sqlite::Item;

/// Text encoder input: the name and the description on separate lines
#[inline]
pub fn text_input(item: &Item) -> Extraction<String> {
    let description = item.description.as_deref().unwrap_or_default();
    let text = format!("{}\n{}", item.name, description);
    Extraction::Ready(text.trim().to_string())
}

/// A decoded item image, handed to the image encoder as is
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub path: PathBuf,
    pub image: DynamicImage,
}

/// Finds the file behind an item's first stored image path.
///
/// Stored paths are relative to the project root. Older records were written
/// relative to the dataset folder, so `<root>/<legacy_root>/<path>` is tried
/// second. Absolute paths are used as they are.
#[derive(Debug, Clone)]
pub struct ImageInputResolver {
    root: PathBuf,
    legacy_root: PathBuf,
}

impl ImageInputResolver {
    #[inline]
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(root: P, legacy_root: Q) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            legacy_root: legacy_root.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.root, config.legacy_image_root())
    }

    /// Candidate locations in lookup order
    #[inline]
    pub fn candidates(&self, stored_path: &str) -> Vec<PathBuf> {
        let path = Path::new(stored_path);
        if path.is_absolute() {
            return vec![path.to_path_buf()];
        }
        vec![self.root.join(path), self.legacy_root.join(path)]
    }

    /// First candidate that exists as a file
    #[inline]
    pub fn resolve(&self, stored_path: &str) -> Option<PathBuf> {
        self.candidates(stored_path)
            .into_iter()
            .find(|candidate| candidate.is_file())
    }

    /// Image encoder input: the item's first image, decoded once here
    #[inline]
    pub fn extract(&self, item: &Item) -> Extraction<ImageInput> {
        let Some(first) = item.images.first() else {
            return Extraction::Skipped(SkipReason::NoImages);
        };

        let Some(path) = self.resolve(first) else {
            return Extraction::Skipped(SkipReason::MissingFile(PathBuf::from(first)));
        };

        match image::open(&path) {
            Ok(image) => {
                debug!(
                    "Loaded {} ({}x{})",
                    path.display(),
                    image.width(),
                    image.height()
                );
                Extraction::Ready(ImageInput { path, image })
            }
            Err(e) => Extraction::Skipped(SkipReason::Unreadable(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }
}
