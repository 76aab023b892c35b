//! Picture of the Day fetcher
//!
//! Single-invocation commands meant to be run by a scheduler:
//! - `fetch`: pull a picture from one source, resolve image metadata and
//!   enrich the text
//! - `cleanup`: retention sweep
//! - `init-sources`: create per-source configuration rows

macro_rules! regex {
    ($pattern:expr) => {{
        static RE: std::sync::OnceLock<regex_lite::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex_lite::Regex::new($pattern).expect("static pattern"))
    }};
}

mod enrichment;
mod errors;
mod fetchers;
mod images;
mod processor;
mod retention;
mod sources;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use potd_common::{
    config::{AppConfig, ObservabilityConfig},
    db::{enabled_sources, DbPool, PictureStore, Repository},
    llm::{ChatModel, OpenAiChat},
    source::{parse_iso_date, today},
    Source, VERSION,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::enrichment::TextProcessor;
use crate::fetchers::FetcherRegistry;
use crate::images::HttpImageResolver;
use crate::processor::{FetchOptions, PictureProcessor};
use crate::retention::RetentionPolicy;

#[derive(Parser, Debug)]
#[command(name = "fetch-picture")]
#[command(about = "Fetch, enrich and maintain pictures of the day")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the picture of the day from a source
    Fetch {
        /// Source identifier (apod, wikipedia, bing)
        #[arg(long, default_value = "apod")]
        source: String,

        /// Date in YYYY-MM-DD format, today if omitted
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// Overwrite an existing picture and reprocess it
        #[arg(long)]
        force: bool,

        /// Download the image to the media root
        #[arg(long)]
        download_image: bool,

        /// Skip language model processing
        #[arg(long)]
        no_process_text: bool,

        /// Fetch every picture the source still serves (Bing only)
        #[arg(long)]
        fetch_all: bool,
    },

    /// Remove old pictures
    Cleanup {
        /// Keep pictures from the last N days
        #[arg(long)]
        days: Option<i64>,

        /// Minimum number of recent pictures to keep per source
        #[arg(long)]
        keep_min: Option<usize>,

        /// Only clean up one source
        #[arg(long, value_parser = parse_source)]
        source: Option<Source>,

        /// Show what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Create configuration rows for every source
    InitSources {
        /// Sources to create (or switch) as disabled
        #[arg(long = "disable", value_parser = parse_source)]
        disabled: Vec<Source>,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_iso_date(value).map_err(|e| e.to_string())
}

fn parse_source(value: &str) -> Result<Source, String> {
    value.parse().map_err(|e: potd_common::AppError| e.to_string())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    if config.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.observability);
    info!("Starting picture fetcher v{}", VERSION);

    let db = DbPool::new(&config.database).await?;
    db.migrate().await?;
    let store: Arc<dyn PictureStore> = Arc::new(Repository::new(db));

    match cli.command {
        Command::Fetch {
            source,
            date,
            force,
            download_image,
            no_process_text,
            fetch_all,
        } => {
            let options = FetchOptions {
                force,
                download_image,
                process_text: !no_process_text,
            };
            fetch(&config, store, &source, date.unwrap_or_else(today), fetch_all, options).await
        }
        Command::Cleanup {
            days,
            keep_min,
            source,
            dry_run,
        } => {
            let policy = RetentionPolicy {
                days: days.unwrap_or(config.retention.days),
                keep_min: keep_min.unwrap_or(config.retention.keep_min),
            };
            cleanup(store.as_ref(), policy, source, dry_run).await
        }
        Command::InitSources { disabled } => {
            let report = sources::init_sources(store.as_ref(), &disabled).await?;
            println!(
                "Source initialization complete: {} created, {} updated",
                report.created, report.updated
            );

            let enabled = enabled_sources(store.as_ref()).await?;
            for source in Source::ALL {
                let status = if enabled.contains(&source) { "enabled" } else { "disabled" };
                println!("  {:<10} {:<40} {}", source.as_str(), source.label(), status);
            }
            Ok(())
        }
    }
}

async fn fetch(
    config: &AppConfig,
    store: Arc<dyn PictureStore>,
    source: &str,
    date: NaiveDate,
    fetch_all: bool,
    options: FetchOptions,
) -> anyhow::Result<()> {
    let registry = FetcherRegistry::from_config(&config.sources)?;
    let images = Arc::new(HttpImageResolver::from_config(&config.sources)?);
    let mut processor =
        PictureProcessor::new(store, registry, images, config.storage.media_root.clone());

    if options.process_text {
        let model = OpenAiChat::from_config(&config.llm)?;
        info!(model = %model.model_name(), "Language model ready");
        processor = processor.with_text_processor(
            TextProcessor::new(Arc::new(model)),
            config.llm.enrichment_mode,
        );
    }

    let report = match processor.run(source, date, fetch_all, options).await {
        Ok(report) => report,
        Err(e) => {
            error!(source = %source, date = %date, error = %e, "Fetch failed");
            return Err(e.into());
        }
    };

    for record in &report.records {
        let date = record.date.map(|d| d.to_string()).unwrap_or_default();
        match &record.error {
            Some(e) => println!("  {} {} failed: {}", date, record.title, e),
            None => println!(
                "  {} {}{}{}",
                date,
                record.title,
                if record.created { " (new)" } else { "" },
                if record.text_processed { " [processed]" } else { "" }
            ),
        }
    }
    println!(
        "{}: {} pictures, {} new, {} failed",
        report.source.label(),
        report.records.len(),
        report.created(),
        report.failed()
    );

    if report.failed() > 0 {
        warn!(failed = report.failed(), "Some pictures failed to process");
    }
    Ok(())
}

async fn cleanup(
    store: &dyn PictureStore,
    policy: RetentionPolicy,
    source: Option<Source>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let sources: Vec<Source> = match source {
        Some(source) => vec![source],
        None => Source::ALL.to_vec(),
    };

    let results = retention::sweep(store, &sources, policy, today(), dry_run).await?;

    let verb = if dry_run { "Would delete" } else { "Deleted" };
    let mut removed = 0;
    let mut kept = 0;
    for sweep in &results {
        if sweep.removed.is_empty() {
            println!(
                "[{}] No cleanup needed ({} pictures, all within retention period)",
                sweep.source.as_str().to_uppercase(),
                sweep.total
            );
        } else {
            println!(
                "[{}] {} {} pictures (keeping {})",
                sweep.source.as_str().to_uppercase(),
                verb,
                sweep.removed.len(),
                sweep.kept()
            );
            for (date, title) in sweep.removed.iter().take(5) {
                println!("  - {} {}", date, title.chars().take(50).collect::<String>());
            }
            if sweep.removed.len() > 5 {
                println!("  ... and {} more", sweep.removed.len() - 5);
            }
        }
        removed += sweep.removed.len();
        kept += sweep.kept();
    }

    println!("{} {} pictures, kept {}", verb, removed, kept);
    Ok(())
}
