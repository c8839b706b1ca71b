#[cfg(test)]
mod tests;

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::normalize::l2_normalized;
use super::{Embedder, EmbeddingSink};
use crate::PipelineError;
use crate::database::sqlite::Item;

/// Why an item produced no model input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The item references no image at all
    NoImages,
    /// None of the candidate paths exists
    MissingFile(PathBuf),
    /// The file exists but cannot be decoded
    Unreadable(String),
}

impl SkipReason {
    /// Stable label used when counting skips
    #[inline]
    pub fn label(&self) -> &'static str {
        match *self {
            SkipReason::NoImages => "no_images",
            SkipReason::MissingFile(_) => "missing_file",
            SkipReason::Unreadable(_) => "unreadable",
        }
    }
}

impl std::fmt::Display for SkipReason {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            SkipReason::NoImages => write!(f, "no images"),
            SkipReason::MissingFile(ref path) => write!(f, "file not found: {}", path.display()),
            SkipReason::Unreadable(ref reason) => write!(f, "unreadable: {}", reason),
        }
    }
}

/// Result of turning one item into a model input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<T> {
    Ready(T),
    Skipped(SkipReason),
}

/// Per-run summary of a batch stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub items_seen: usize,
    pub batches_total: usize,
    /// Batches where every input was skipped
    pub batches_skipped: usize,
    pub inputs_skipped: usize,
    /// Skip counts keyed by [`SkipReason::label`]
    pub skip_reasons: BTreeMap<&'static str, usize>,
    pub vectors_written: usize,
}

impl BatchReport {
    fn record_skip(&mut self, reason: &SkipReason) {
        self.inputs_skipped += 1;
        *self.skip_reasons.entry(reason.label()).or_default() += 1;
    }
}

/// Embed `items` in batches of `batch_size` and upsert each normalized vector.
///
/// Items whose extraction is skipped are left out of their batch; a batch
/// with nothing left is skipped. Inputs travel with their identifier from
/// extraction to the sink so vectors can never be attached to the wrong item.
/// An embedding failure or a vector count that differs from the input count
/// aborts the run.
#[inline]
pub async fn run_batches<E, S, F>(
    items: &[Item],
    batch_size: usize,
    mut extract: F,
    embedder: &mut E,
    sink: &S,
) -> crate::Result<BatchReport>
where
    E: Embedder + Send,
    E::Input: Send,
    S: EmbeddingSink + Sync,
    F: FnMut(&Item) -> Extraction<E::Input> + Send,
{
    if batch_size == 0 {
        return Err(PipelineError::Config(
            "batch size must be at least 1".to_string(),
        ));
    }

    let mut report = BatchReport {
        items_seen: items.len(),
        batches_total: items.len().div_ceil(batch_size),
        ..BatchReport::default()
    };

    if items.is_empty() {
        info!("No items to embed");
        return Ok(report);
    }

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(report.batches_total as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(embedder.model_name().to_string());

    for (index, chunk) in items.chunks(batch_size).enumerate() {
        info!("batch {} / {}", index + 1, report.batches_total);

        let mut ready: Vec<(&str, E::Input)> = Vec::with_capacity(chunk.len());
        for item in chunk {
            match extract(item) {
                Extraction::Ready(input) => ready.push((item.url.as_str(), input)),
                Extraction::Skipped(reason) => {
                    warn!("Skipping {}: {}", item.url, reason);
                    report.record_skip(&reason);
                }
            }
        }

        if ready.is_empty() {
            info!("Batch {} has no usable inputs, skipping", index + 1);
            report.batches_skipped += 1;
            bar.inc(1);
            continue;
        }

        let vectors = {
            let inputs: Vec<&E::Input> = ready.iter().map(|(_, input)| input).collect();
            embedder.embed_batch(&inputs)
        }
        .map_err(|e| PipelineError::Embedding(format!("batch {} failed: {:#}", index + 1, e)))?;

        if vectors.len() != ready.len() {
            return Err(PipelineError::Embedding(format!(
                "batch {} returned {} vectors for {} inputs",
                index + 1,
                vectors.len(),
                ready.len()
            )));
        }

        let written = ready.len();
        for ((item_url, _), vector) in ready.into_iter().zip(vectors) {
            sink.upsert(item_url, l2_normalized(vector), embedder.model_name())
                .await?;
            report.vectors_written += 1;
        }

        debug!(
            "Batch {} wrote {} vectors ({} total)",
            index + 1,
            written,
            report.vectors_written
        );
        bar.inc(1);
    }

    bar.finish_and_clear();
    info!(
        "Embedding finished: {} vectors written, {} inputs skipped, {} of {} batches skipped",
        report.vectors_written, report.inputs_skipped, report.batches_skipped, report.batches_total
    );

    Ok(report)
}
