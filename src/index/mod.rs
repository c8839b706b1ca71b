// Index module
// Builds exact inner-product indexes and their row-to-identifier mappings

pub mod flat;


use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use flat::{FlatIpIndex, IndexError};

use crate::PipelineError;
use crate::database::sqlite::{Database, Modality};
use crate::embeddings::normalize_rows;

/// Paths and sizes of one finished build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub index_name: String,
    pub vectors: usize,
    pub dimension: usize,
    pub index_path: PathBuf,
    pub mapping_path: PathBuf,
}

/// `<output_dir>/<name>.index`
#[inline]
pub fn index_path(output_dir: &Path, index_name: &str) -> PathBuf {
    output_dir.join(format!("{}.index", index_name))
}

/// `<output_dir>/<name>_mapping.json`
#[inline]
pub fn mapping_path(output_dir: &Path, index_name: &str) -> PathBuf {
    output_dir.join(format!("{}_mapping.json", index_name))
}

/// Read a mapping artifact back as row position to identifier
#[inline]
pub fn read_mapping(path: &Path) -> crate::Result<BTreeMap<u64, String>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| PipelineError::Index(format!("Invalid mapping {}: {}", path.display(), e)))
}

/// Load an index artifact
#[inline]
pub fn read_index(path: &Path) -> crate::Result<FlatIpIndex> {
    let file = std::fs::File::open(path)?;
    FlatIpIndex::read_from(std::io::BufReader::new(file))
        .map_err(|e| PipelineError::Index(format!("Invalid index {}: {}", path.display(), e)))
}

/// Rebuilds index artifacts from the store's embedding collections
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    database: Database,
    output_dir: PathBuf,
}

impl IndexBuilder {
    #[inline]
    pub fn new<P: AsRef<Path>>(database: Database, output_dir: P) -> Self {
        Self {
            database,
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Full rebuild of `<index_name>.index` and `<index_name>_mapping.json`
    /// from the `modality` collection. An empty collection writes nothing and
    /// returns `None`.
    #[inline]
    pub async fn build_index(
        &self,
        modality: Modality,
        index_name: &str,
    ) -> crate::Result<Option<IndexSummary>> {
        let records = self.database.list_embeddings(modality).await?;

        if records.is_empty() {
            info!(
                "Collection {} is empty, skipping index {}",
                modality.collection_name(),
                index_name
            );
            return Ok(None);
        }

        let dimension = records[0].vector.len();
        let mut matrix = Vec::with_capacity(records.len() * dimension);
        let mut mapping = BTreeMap::new();

        for (position, record) in records.iter().enumerate() {
            if record.vector.len() != dimension {
                return Err(PipelineError::Index(format!(
                    "{} has dimension {} but the first vector has {}",
                    record.item_url,
                    record.vector.len(),
                    dimension
                )));
            }
            matrix.extend_from_slice(&record.vector);
            mapping.insert(position as u64, record.item_url.clone());
        }

        normalize_rows(&mut matrix, dimension);

        let mut index = FlatIpIndex::new(dimension)
            .map_err(|e| PipelineError::Index(format!("{}: {}", index_name, e)))?;
        index
            .add(&matrix)
            .map_err(|e| PipelineError::Index(format!("{}: {}", index_name, e)))?;

        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create index directory {}",
                self.output_dir.display()
            )
        })?;

        let index_path = index_path(&self.output_dir, index_name);
        let mapping_path = mapping_path(&self.output_dir, index_name);

        let index_temp = write_temp(&index_path, |writer| {
            index
                .write_to(writer)
                .map_err(|e| PipelineError::Index(e.to_string()))
        })?;
        let mapping_temp = match write_temp(&mapping_path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, &mapping)
                .map_err(|e| PipelineError::Index(format!("Failed to write mapping: {}", e)))?;
            writer.flush()?;
            Ok(())
        }) {
            Ok(path) => path,
            Err(e) => {
                let _ = std::fs::remove_file(&index_temp);
                return Err(e);
            }
        };

        commit_pair(
            (&index_temp, &index_path),
            (&mapping_temp, &mapping_path),
        )?;

        info!(
            "Index {} built: {} vectors of dimension {} -> {}",
            index_name,
            index.len(),
            dimension,
            index_path.display()
        );

        Ok(Some(IndexSummary {
            index_name: index_name.to_string(),
            vectors: index.len(),
            dimension,
            index_path,
            mapping_path,
        }))
    }

    /// Build `text` then `image`, each under its default name
    #[inline]
    pub async fn build_all(&self) -> crate::Result<Vec<(Modality, Option<IndexSummary>)>> {
        let mut summaries = Vec::with_capacity(Modality::ALL.len());
        for modality in Modality::ALL {
            let summary = self.build_index(modality, modality.index_name()).await?;
            summaries.push((modality, summary));
        }
        Ok(summaries)
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let mut temp_name = target.as_os_str().to_owned();
    temp_name.push(".tmp");
    PathBuf::from(temp_name)
}

/// Write `<target>.tmp` and return its path; the target is left untouched
fn write_temp<F>(target: &Path, write: F) -> crate::Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<std::fs::File>) -> crate::Result<()>,
{
    let temp_path = temp_path(target);

    let file = std::fs::File::create(&temp_path)?;
    let mut writer = BufWriter::new(file);

    if let Err(e) = write(&mut writer) {
        drop(writer);
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    let synced = writer
        .into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))
        .and_then(|file| file.sync_all().map_err(PipelineError::Io));
    if let Err(e) = synced {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    debug!("Wrote {}", temp_path.display());
    Ok(temp_path)
}

/// Move both finished temp files over their targets. The old mapping is
/// removed before the index is swapped so a partial commit never leaves a
/// new index next to a stale mapping.
fn commit_pair(index: (&Path, &Path), mapping: (&Path, &Path)) -> crate::Result<()> {
    let (index_temp, index_target) = index;
    let (mapping_temp, mapping_target) = mapping;

    let result = (|| -> std::io::Result<()> {
        match std::fs::remove_file(mapping_target) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        std::fs::rename(index_temp, index_target)?;
        std::fs::rename(mapping_temp, mapping_target)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(index_temp);
        let _ = std::fs::remove_file(mapping_temp);
        return Err(PipelineError::Io(e));
    }

    debug!(
        "Committed {} and {}",
        index_target.display(),
        mapping_target.display()
    );
    Ok(())
}
