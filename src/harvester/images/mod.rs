
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Resolve a gallery `src` against its detail page; path segments come out
/// percent-encoded
#[inline]
pub fn resolve_image_url(src: &str, page_url: &Url) -> Option<Url> {
    match page_url.join(src.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
        Ok(url) => {
            debug!("Ignoring non-HTTP image source {}", url);
            None
        }
        Err(e) => {
            debug!("Failed to resolve image source '{}': {}", src, e);
            None
        }
    }
}

/// Local file name for an image source: the last path segment with only
/// `[A-Za-z0-9._-]` kept. `None` when nothing usable is left.
#[inline]
pub fn image_file_name(src: &str) -> Option<String> {
    let path = src.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();

    let name: String = segment
        .replace('\u{2011}', "-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    if name.chars().all(|c| c == '.') {
        return None;
    }
    Some(name)
}

/// Content storage for downloaded images under `<root>/<relative_dir>`
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    relative_dir: PathBuf,
}

impl ImageStore {
    #[inline]
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(root: P, relative_dir: Q) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            relative_dir: relative_dir.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn directory(&self) -> PathBuf {
        self.root.join(&self.relative_dir)
    }

    /// Root-relative path recorded on the item, always with `/` separators
    #[inline]
    pub fn relative_path(&self, file_name: &str) -> String {
        let mut parts: Vec<String> = self
            .relative_dir
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        parts.push(file_name.to_string());
        parts.join("/")
    }

    /// Write the image bytes and return the root-relative path
    #[inline]
    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        let directory = self.directory();
        tokio::fs::create_dir_all(&directory)
            .await
            .with_context(|| format!("Failed to create image directory {}", directory.display()))?;

        let target = directory.join(file_name);
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("Failed to write image {}", target.display()))?;

        debug!("Saved {} bytes to {}", bytes.len(), target.display());
        Ok(self.relative_path(file_name))
    }

    /// Whether a file with this name is already present in the image directory
    #[inline]
    pub fn contains(&self, file_name: &str) -> bool {
        self.directory().join(file_name).is_file()
    }
}
