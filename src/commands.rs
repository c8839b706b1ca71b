use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use tracing::{info, warn};

use crate::backfill::{backfill_images, export_csv};
use crate::config::Config;
use crate::database::sqlite::{Database, Modality};
use crate::embeddings::ollama::OllamaEmbedder;
use crate::embeddings::{BatchReport, run_stage, text_input};
use crate::harvester::Harvester;
use crate::harvester::images::ImageStore;
use crate::index::{IndexBuilder, index_path};

async fn open_database(config: &Config) -> Result<Database> {
    Database::connect(config).await.with_context(|| {
        format!(
            "Failed to open database {}",
            config.database_path().display()
        )
    })
}

/// Crawl the catalog into the item store. `database` overrides the
/// configured store name for this run only.
#[inline]
pub async fn harvest(
    config: &Config,
    base_url: Option<&str>,
    pages: Option<u32>,
    database: Option<&str>,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(name) = database {
        config.store.database = name.to_string();
    }

    let base_url = base_url.unwrap_or(&config.harvest.default_base_url);
    let pages = pages.unwrap_or(config.harvest.default_pages);

    let database = open_database(&config).await?;
    let harvester = Harvester::new(database, &config);
    let stats = harvester.harvest(base_url, pages).await?;

    eprintln!("{}", style("Harvest finished").bold().green());
    eprintln!("  Pages visited: {}", stats.pages_visited);
    eprintln!("  Item links found: {}", stats.links_found);
    eprintln!("  Inserted: {}", style(stats.inserted).cyan());
    eprintln!("  Already present: {}", stats.already_present);
    if stats.failed > 0 {
        eprintln!("  Failed: {}", style(stats.failed).red());
    }
    eprintln!(
        "  Images: {} saved, {} failed",
        stats.images_saved, stats.images_failed
    );
    eprintln!("  Stopped: {}", stats.stop_reason);
    eprintln!("  Duration: {:.1?}", stats.duration);

    Ok(())
}

/// Compute one modality's vectors for every stored item
#[inline]
pub async fn embed(config: &Config, modality: Modality) -> Result<()> {
    let database = open_database(config).await?;

    let report = match modality {
        Modality::Text => embed_text(config, &database).await?,
        Modality::Image => embed_images(config, &database).await?,
    };

    print_batch_report(modality, &report);
    Ok(())
}

async fn embed_text(config: &Config, database: &Database) -> Result<BatchReport> {
    let mut embedder = OllamaEmbedder::new(&config.embeddings.ollama)
        .context("Failed to create Ollama client")?;
    embedder.health_check().with_context(|| {
        format!(
            "Ollama is not reachable at {}:{}",
            config.embeddings.ollama.host, config.embeddings.ollama.port
        )
    })?;

    let report = run_stage(
        database,
        Modality::Text,
        config.embeddings.text_batch_size,
        text_input,
        &mut embedder,
    )
    .await?;
    Ok(report)
}

#[cfg(feature = "image-encoder")]
async fn embed_images(config: &Config, database: &Database) -> Result<BatchReport> {
    use crate::embeddings::ImageInputResolver;
    use crate::embeddings::clip::ClipImageEmbedder;

    let mut embedder =
        ClipImageEmbedder::new(&config.embeddings.image_model, &config.root.join("models"))?;
    let resolver = ImageInputResolver::from_config(config);

    let report = run_stage(
        database,
        Modality::Image,
        config.embeddings.image_batch_size,
        |item| resolver.extract(item),
        &mut embedder,
    )
    .await?;
    Ok(report)
}

#[cfg(not(feature = "image-encoder"))]
#[expect(clippy::unused_async, reason = "mirrors the encoder-enabled signature")]
async fn embed_images(_config: &Config, _database: &Database) -> Result<BatchReport> {
    Err(anyhow::anyhow!(
        "Image embeddings need the `image-encoder` feature"
    ))
}

fn print_batch_report(modality: Modality, report: &BatchReport) {
    eprintln!(
        "{} {}",
        style("Embedding finished:").bold().green(),
        modality.collection_name()
    );
    eprintln!("  Items: {}", report.items_seen);
    eprintln!(
        "  Batches: {} ({} skipped)",
        report.batches_total, report.batches_skipped
    );
    eprintln!("  Vectors written: {}", style(report.vectors_written).cyan());
    if report.inputs_skipped > 0 {
        eprintln!("  Inputs skipped: {}", style(report.inputs_skipped).yellow());
        for (reason, count) in &report.skip_reasons {
            eprintln!("    {}: {}", reason, count);
        }
    }
}

/// Rebuild both index artifacts from the stored vectors
#[inline]
pub async fn build_indexes(config: &Config) -> Result<()> {
    let database = open_database(config).await?;
    let builder = IndexBuilder::new(database, config.index_dir());

    for (modality, summary) in builder.build_all().await? {
        match summary {
            Some(summary) => eprintln!(
                "{} {}: {} vectors, dimension {} -> {}",
                style("Built").bold().green(),
                summary.index_name,
                summary.vectors,
                summary.dimension,
                summary.index_path.display()
            ),
            None => eprintln!(
                "{} {}: {} is empty",
                style("Skipped").yellow(),
                modality.index_name(),
                modality.collection_name()
            ),
        }
    }

    Ok(())
}

/// Re-point stored items at image files listed in `csv_path`
#[inline]
pub async fn backfill(config: &Config, csv_path: &Path) -> Result<()> {
    let database = open_database(config).await?;
    let images = ImageStore::new(&config.root, &config.harvest.image_dir);

    let report =
        backfill_images(&database, &images, csv_path, config.backfill.batch_size).await?;

    eprintln!("{}", style("Backfill finished").bold().green());
    eprintln!(
        "  Rows: {} ({} skipped)",
        report.rows, report.rows_skipped
    );
    eprintln!("  Updates sent: {}", report.updates_sent);
    eprintln!(
        "  Matched: {}, modified: {}, failed: {}",
        style(report.writes.matched).cyan(),
        report.writes.modified,
        report.writes.failed
    );
    if report.missing_images > 0 {
        eprintln!(
            "  Missing image files: {}",
            style(report.missing_images).yellow()
        );
    }

    Ok(())
}

/// Dump the item store to CSV
#[inline]
pub async fn export(config: &Config, out_path: &Path) -> Result<()> {
    let database = open_database(config).await?;
    let rows = export_csv(&database, out_path).await?;

    if rows == 0 {
        eprintln!("No items to export.");
    } else {
        eprintln!(
            "Exported {} items to {}",
            style(rows).cyan(),
            out_path.display()
        );
    }
    Ok(())
}

/// Counts per collection and the state of the index artifacts
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    eprintln!("{}", style("SmartSearch Status").bold().cyan());
    eprintln!("  Root: {}", config.root.display());
    eprintln!();

    eprintln!("{}", style("Store:").bold().yellow());
    let database = match Database::connect(config).await {
        Ok(database) => {
            eprintln!(
                "  {} {}",
                style("Connected").green(),
                config.database_path().display()
            );
            Some(database)
        }
        Err(e) => {
            eprintln!("  {} {}", style("Failed to connect:").red(), e);
            None
        }
    };

    if let Some(database) = database {
        eprintln!("  items: {}", database.count_items().await?);
        for modality in Modality::ALL {
            eprintln!(
                "  {}: {}",
                modality.collection_name(),
                database.count_embeddings(modality).await?
            );
        }
    }

    eprintln!("{}", style("Indexes:").bold().yellow());
    for modality in Modality::ALL {
        let path = index_path(&config.index_dir(), modality.index_name());
        if path.exists() {
            eprintln!("  {}: {}", modality.index_name(), path.display());
        } else {
            eprintln!(
                "  {}: {}",
                modality.index_name(),
                style("not built").dim()
            );
        }
    }

    eprintln!("{}", style("Ollama:").bold().yellow());
    match OllamaEmbedder::new(&config.embeddings.ollama) {
        Ok(client) => match client.health_check() {
            Ok(()) => eprintln!(
                "  {} {}:{} ({})",
                style("Connected").green(),
                config.embeddings.ollama.host,
                config.embeddings.ollama.port,
                config.embeddings.ollama.model
            ),
            Err(e) => {
                warn!("Ollama health check failed: {}", e);
                eprintln!("  {} {}", style("Unreachable:").red(), e);
            }
        },
        Err(e) => eprintln!("  {} {}", style("Misconfigured:").red(), e),
    }

    info!("Status report complete");
    Ok(())
}
