use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use neuroimg_core::analysis::{DatasetAnalyzer, Searcher};
use neuroimg_core::cli::report::{AnalysisReport, FilesReport, IngestReport, SearchReport};
use neuroimg_core::cli::{Cli, Command, OutputFormat};
use neuroimg_core::ingest::Ingestor;
use neuroimg_core::store::{DocumentStore, EntityStore, FileStore};
use neuroimg_core::{IngestConfig, IngestEvent, Result};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = IngestConfig::load(cli.config.as_deref())?;
    let store = Arc::new(FileStore::open(&cli.store)?);
    info!("Using store {}", store.dir().display());

    match cli.command {
        Command::Ingest {
            path,
            format,
            workers,
        } => {
            let config = match workers {
                Some(workers) => config.with_workers(workers),
                None => config,
            };
            ingest(config, store, path, format)
        }
        Command::Analyze { report } => analyze(store, report.as_deref()),
        Command::Search {
            query,
            limit,
            threshold,
        } => {
            let hits = Searcher::new(EntityStore::new(store))
                .with_limit(limit)
                .with_threshold(threshold)
                .search(&query)?;
            print!("{}", SearchReport::new(&hits));
            Ok(())
        }
        Command::Files { series_uid } => {
            let files = EntityStore::new(store).series_files(&series_uid)?;
            print!("{}", FilesReport::new(&series_uid, &files));
            Ok(())
        }
    }
}

fn ingest(
    config: IngestConfig,
    store: Arc<dyn DocumentStore>,
    path: PathBuf,
    format: OutputFormat,
) -> Result<()> {
    let ingestor = Ingestor::new(Arc::new(config), store);
    let mut handle = ingestor.ingest(path);

    match format {
        OutputFormat::Json => {
            for event in handle.by_ref() {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => error!("Failed to serialize event: {}", e),
                }
            }
        }
        OutputFormat::Text => {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(PROGRESS_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            for event in handle.by_ref() {
                match event {
                    IngestEvent::Scanning { total_files } => bar.set_length(total_files as u64),
                    IngestEvent::Processing { current, .. } => bar.set_position(current as u64),
                    IngestEvent::Complete { .. } | IngestEvent::Failed { .. } => {
                        bar.finish_and_clear()
                    }
                }
            }
        }
    }

    let summary = handle.join()?;
    if format == OutputFormat::Text {
        print!("{}", IngestReport::new(&summary));
    }
    Ok(())
}

fn analyze(store: Arc<dyn DocumentStore>, report: Option<&Path>) -> Result<()> {
    let analysis = DatasetAnalyzer::new(EntityStore::new(store)).analyze()?;
    let text = AnalysisReport::new(&analysis).to_string();
    if let Some(path) = report {
        std::fs::write(path, &text)?;
        info!("Report written to {}", path.display());
    }
    print!("{}", text);
    Ok(())
}
