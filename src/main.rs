//! image-suggestions CLI entry point

use clap::{Parser, Subcommand};
use image_suggestions::{
    config::Config,
    error::Result,
    ingest,
    mediasearch::MediaSearchClient,
    models::Source,
    rowcount::RowCountIndex,
    store::SuggestionDb,
    suggestions::{PageQuery, SuggestionService},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "image-suggestions")]
#[command(version, about = "Suggested media for under-illustrated wiki pages", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Load algorithm result TSV files into the suggestion store
    Ingest {
        /// Directory of per-partition TSV files (defaults to config)
        #[arg(long)]
        tsv_dir: Option<PathBuf>,
    },

    /// Query suggestions for a wiki/language pair, printed as JSON
    Pages {
        /// Wiki property (e.g. wikipedia)
        wiki: String,

        /// Language code (e.g. ar, en)
        lang: String,

        /// Number of pages to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Pages to skip
        #[arg(short, long)]
        offset: Option<usize>,

        /// Seed for reproducible random ordering; 0 means natural order
        #[arg(short, long)]
        seed: Option<u64>,

        /// Explicit page ids (mutually exclusive with seed/limit/offset)
        #[arg(long)]
        id: Option<Vec<i64>>,

        /// Restrict to one suggestion source (ima or ms)
        #[arg(long)]
        source: Option<String>,

        /// Keep pages with zero suggestions in the response
        #[arg(long)]
        no_filter: bool,
    },

    /// List ingested partitions and their row counts
    Status,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force);
    }

    let config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::load_from(None)?,
    };

    let db = SuggestionDb::new(&config.paths.db_file).await?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),

        Commands::Ingest { tsv_dir } => {
            let dir = tsv_dir.unwrap_or_else(|| config.ingest.tsv_dir.clone());
            let mut index = RowCountIndex::new();
            ingest::populate_database(&db, &mut index, &dir, config.ingest.insert_chunk).await?;
        }

        Commands::Pages {
            wiki,
            lang,
            limit,
            offset,
            seed,
            id,
            source,
            no_filter,
        } => {
            let source = source.map(|s| s.parse::<Source>()).transpose()?;
            let index = RowCountIndex::scan(&db).await?;
            let provider = Arc::new(MediaSearchClient::new(&config.media_search)?);
            let service = SuggestionService::new(db, index, provider, &config);

            let query = PageQuery {
                ids: id,
                limit,
                offset,
                seed,
                source,
                no_filter,
            };
            match service.get_pages(&wiki, &lang, &query).await {
                Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                Err(e) => {
                    println!("{}", serde_json::to_string_pretty(&e.to_body())?);
                    std::process::exit(1);
                }
            }
        }

        Commands::Status => {
            for wiki in db.list_partitions().await? {
                let counts = db.max_row_counts(&wiki).await?;
                println!(
                    "{}: {} pages, {} with suggestions",
                    wiki, counts.max_row_num, counts.max_row_num_ima
                );
            }
        }
    }

    Ok(())
}

fn handle_init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let base = config_path
        .as_deref()
        .and_then(|p| p.parent())
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_base_dir);

    let mut config = Config::default();
    config.paths.config_file = base.join("config.toml");
    config.paths.db_file = base.join("suggestions.db");
    config.paths.base_dir = base;

    if config.paths.config_file.exists() && !force {
        eprintln!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            config.paths.config_file.display()
        );
        std::process::exit(1);
    }

    config.save()?;
    println!("Config written to {}", config.paths.config_file.display());
    Ok(())
}
