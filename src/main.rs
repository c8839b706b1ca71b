use anyhow::Result;
use clap::{Parser, Subcommand};
use smartsearch::commands::{backfill, build_indexes, embed, export, harvest, show_status};
use smartsearch::config::{load_config, show_config};
use smartsearch::database::sqlite::Modality;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smartsearch")]
#[command(about = "Catalog harvesting, embedding and similarity index builder")]
#[command(version)]
struct Cli {
    /// Project root holding config.toml, the database, images and indexes
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the resolved configuration to `<root>/config.toml`
    Config {
        /// Show current configuration instead of writing it
        #[arg(long)]
        show: bool,
    },
    /// Crawl catalog listing pages into the item store
    Harvest {
        /// Listing base URL; pages are fetched from `<base>/page/<n>/`
        #[arg(long)]
        base: Option<String>,
        /// Maximum number of listing pages to visit
        #[arg(long)]
        pages: Option<u32>,
        /// Store name to write into instead of the configured one
        #[arg(long)]
        db: Option<String>,
    },
    /// Compute embeddings for every stored item
    Embed {
        #[arg(value_enum)]
        modality: Modality,
    },
    /// Rebuild the text and image indexes from stored embeddings
    BuildIndex,
    /// Re-point items at image files listed in a CSV export
    BackfillImages {
        /// CSV with `url` and `images` columns
        #[arg(long)]
        csv: PathBuf,
    },
    /// Write every item to a CSV file
    ExportCsv {
        #[arg(long)]
        out: PathBuf,
    },
    /// Show item and embedding counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.root.as_deref())?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                config.save()?;
                eprintln!("Wrote {}", config.config_file_path().display());
            }
        }
        Commands::Harvest { base, pages, db } => {
            harvest(&config, base.as_deref(), pages, db.as_deref()).await?;
        }
        Commands::Embed { modality } => {
            embed(&config, modality).await?;
        }
        Commands::BuildIndex => {
            build_indexes(&config).await?;
        }
        Commands::BackfillImages { csv } => {
            backfill(&config, &csv).await?;
        }
        Commands::ExportCsv { out } => {
            export(&config, &out).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn harvest_flags() {
        let cli = Cli::try_parse_from([
            "smartsearch",
            "harvest",
            "--base",
            "https://shop.example/boutique/",
            "--pages",
            "3",
            "--db",
            "Staging",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Harvest { base, pages, db } = parsed.command {
                assert_eq!(base.as_deref(), Some("https://shop.example/boutique/"));
                assert_eq!(pages, Some(3));
                assert_eq!(db.as_deref(), Some("Staging"));
            } else {
                panic!("expected harvest");
            }
        }
    }

    #[test]
    fn harvest_defaults_come_from_config() {
        let cli = Cli::try_parse_from(["smartsearch", "harvest"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Harvest { base, pages, db } = parsed.command {
                assert!(base.is_none() && pages.is_none() && db.is_none());
            }
        }
    }

    #[test]
    fn embed_modality() {
        let cli = Cli::try_parse_from(["smartsearch", "embed", "image"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Embed { modality } = parsed.command {
                assert_eq!(modality, Modality::Image);
            }
        }

        let cli = Cli::try_parse_from(["smartsearch", "embed", "audio"]);
        assert!(cli.is_err());
    }

    #[test]
    fn global_root() {
        let cli = Cli::try_parse_from(["smartsearch", "build-index", "--root", "/srv/ss"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.root, Some(PathBuf::from("/srv/ss")));
            assert!(matches!(parsed.command, Commands::BuildIndex));
        }
    }

    #[test]
    fn backfill_requires_csv() {
        let cli = Cli::try_parse_from(["smartsearch", "backfill-images"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["smartsearch", "serve"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["smartsearch", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
