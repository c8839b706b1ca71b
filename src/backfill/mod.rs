// Backfill module
// CSV export of the item store and bulk repair of stored image paths


use anyhow::{Context, Result};
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::database::sqlite::{BulkWriteResult, Database, ImageUpdate};
use crate::harvester::images::ImageStore;

static QUOTED_ITEM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)""#).expect("valid regex")
});

/// One exported item; images are a JSON array in a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ExportRow<'a> {
    url: &'a str,
    name: &'a str,
    price_before: Option<&'a str>,
    price_after: Option<&'a str>,
    discount: Option<&'a str>,
    category: Option<&'a str>,
    sub_category: Option<&'a str>,
    description: Option<&'a str>,
    images: String,
    harvested_on: String,
}

/// The two columns the backfill reads; every other column is ignored
#[derive(Debug, Deserialize)]
struct BackfillRow {
    url: Option<String>,
    images: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub rows: usize,
    /// Rows without a URL, without images, or with no image present on disk
    pub rows_skipped: usize,
    pub updates_sent: usize,
    pub writes: BulkWriteResult,
    /// Image names listed in the CSV but absent from the image directory
    pub missing_images: usize,
}

/// Write every item to `out_path`, returning the number of rows written
#[inline]
pub async fn export_csv(database: &Database, out_path: &Path) -> Result<usize> {
    let items = database.list_items().await?;
    if items.is_empty() {
        info!("No items to export");
        return Ok(0);
    }

    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(out_path)
        .with_context(|| format!("Failed to create CSV {}", out_path.display()))?;

    for item in &items {
        writer.serialize(ExportRow {
            url: &item.url,
            name: &item.name,
            price_before: item.price_before.as_deref(),
            price_after: item.price_after.as_deref(),
            discount: item.discount.as_deref(),
            category: item.category.as_deref(),
            sub_category: item.sub_category.as_deref(),
            description: item.description.as_deref(),
            images: serde_json::to_string(&item.images)?,
            harvested_on: item.harvested_on.format("%d-%m-%Y").to_string(),
        })?;
    }
    writer.flush()?;

    info!("Exported {} items to {}", items.len(), out_path.display());
    Ok(items.len())
}

/// Parse an image list cell: a JSON array, or a Python list literal such as
/// `['a.jpg', "b.jpg"]`. Anything else yields an empty list.
#[inline]
pub fn parse_image_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if let Ok(images) = serde_json::from_str::<Vec<String>>(raw) {
        return images;
    }

    if !(raw.starts_with('[') && raw.ends_with(']')) {
        return Vec::new();
    }

    QUOTED_ITEM_REGEX
        .captures_iter(raw)
        .filter_map(|captures| {
            let captures = captures.ok()?;
            captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|m| m.as_str().replace("\\'", "'").replace("\\\"", "\""))
        })
        .collect()
}

/// Re-point items at image files that exist in the image directory, reading
/// `url,images` rows from a CSV and writing in unordered batches
#[inline]
pub async fn backfill_images(
    database: &Database,
    images: &ImageStore,
    csv_path: &Path,
    batch_size: usize,
) -> Result<BackfillReport> {
    let directory = images.directory();
    if !directory.is_dir() {
        warn!("Image directory {} does not exist", directory.display());
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV {}", csv_path.display()))?;

    let batch_size = batch_size.max(1);
    let mut report = BackfillReport::default();
    let mut pending: Vec<ImageUpdate> = Vec::with_capacity(batch_size);

    for row in reader.deserialize::<BackfillRow>() {
        let row = row.context("Failed to read CSV row")?;
        report.rows += 1;

        let (Some(url), Some(raw_images)) = (row.url, row.images) else {
            report.rows_skipped += 1;
            continue;
        };
        if url.trim().is_empty() || raw_images.trim().is_empty() {
            report.rows_skipped += 1;
            continue;
        }

        let mut paths = Vec::new();
        for listed in parse_image_list(&raw_images) {
            let name = Path::new(&listed)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            if images.contains(&name) {
                paths.push(images.relative_path(&name));
            } else {
                debug!("Image {} not found in {}", name, directory.display());
                report.missing_images += 1;
            }
        }

        if paths.is_empty() {
            report.rows_skipped += 1;
            continue;
        }

        pending.push(ImageUpdate { url, images: paths });
        if pending.len() >= batch_size {
            flush(database, &mut pending, &mut report).await?;
        }
    }

    if !pending.is_empty() {
        flush(database, &mut pending, &mut report).await?;
    }

    info!(
        "Backfill finished: {} rows, {} items matched, {} modified, {} failed, {} missing image files",
        report.rows,
        report.writes.matched,
        report.writes.modified,
        report.writes.failed,
        report.missing_images
    );
    Ok(report)
}

async fn flush(
    database: &Database,
    pending: &mut Vec<ImageUpdate>,
    report: &mut BackfillReport,
) -> Result<()> {
    let result = database.update_item_images(pending).await?;
    report.updates_sent += pending.len();
    report.writes.merge(result);
    pending.clear();

    info!(
        "Processed rows: {} -- updated: {} -- missing images so far: {}",
        report.rows, report.writes.matched, report.missing_images
    );
    Ok(())
}
