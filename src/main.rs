//! potrans - Batch translation of gettext catalogs
//!
//! Entry point: parses the command line, sets up logging and configuration,
//! then runs the requested command.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use potrans::batch::WorkPlan;
use potrans::catalog::PoCatalog;
use potrans::cli::{Args, Commands};
use potrans::config::{load_dotenv, Config};
use potrans::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Pick up the API key from a .env file before anything reads it
    let dotenv = std::env::current_dir().ok().and_then(|dir| load_dotenv(&dir));

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    if let Some(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("potrans.toml").exists() {
                info!("Found potrans.toml in current directory, loading...");
                Config::from_file("potrans.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::InitConfig { path } => {
            config.save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        Commands::Scan { input, limit } => {
            let catalog = PoCatalog::load(&input)?;
            let plan = WorkPlan::scan(&catalog, limit.or(config.batch.limit));
            let batch_size = config.batch.batch_size;

            println!("\nCatalog: {}", input.display());
            println!("{:<24} {:>8}", "Entries", catalog.len());
            println!("{:<24} {:>8}", "Scanned", plan.scanned);
            println!("{:<24} {:>8}", "Untranslated", plan.untranslated);
            println!("{:<24} {:>8}", "Unique texts", plan.unique_texts.len());
            println!("{:<24} {:>8}", format!("Batches (size {})", batch_size), plan.batch_count(batch_size));
        }
        Commands::Translate { input, output, batch_size, limit } => {
            apply_batch_overrides(&mut config, batch_size, limit)?;

            let workflow = match guarded(Workflow::new(config))? {
                Some(workflow) => workflow,
                None => return Ok(()),
            };

            let report = workflow.process_single_file(&input, &output).await?;
            info!(
                "Translated {}/{} unique texts ({} failed)",
                report.translated_texts, report.unique_texts, report.failed_texts
            );
        }
        Commands::Batch { source_dir, output_dir, batch_size, limit } => {
            apply_batch_overrides(&mut config, batch_size, limit)?;
            if let Some(dir) = source_dir {
                config.files.source_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.files.output_dir = dir;
            }

            let source_dir = config.files.source_dir.clone();
            let output_dir = config.files.output_dir.clone();

            let workflow = match guarded(Workflow::new(config))? {
                Some(workflow) => workflow,
                None => return Ok(()),
            };

            let summary = match guarded(workflow.process_directory(&source_dir, &output_dir).await)? {
                Some(summary) => summary,
                None => return Ok(()),
            };

            println!("\n{:<40} {:>8} {:>8} {:>8} {:>8}", "Catalog", "Unique", "Done", "Cached", "Failed");
            println!("{}", "-".repeat(76));
            for (path, report) in &summary.reports {
                let name = path.file_name().unwrap_or_default().to_string_lossy();
                println!(
                    "{:<40} {:>8} {:>8} {:>8} {:>8}",
                    name, report.unique_texts, report.translated_texts, report.cache_hits, report.failed_texts
                );
            }
            println!(
                "\n{} files processed, {} failed",
                summary.files_processed, summary.files_failed
            );
        }
    }

    info!("potrans completed successfully");
    Ok(())
}

/// Turn guard conditions into an informative early exit.
fn guarded<T>(result: potrans::error::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_guard() => {
            warn!("{}", e);
            eprintln!("{}; nothing to do.", e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn apply_batch_overrides(config: &mut Config, batch_size: Option<usize>, limit: Option<usize>) -> Result<()> {
    if let Some(size) = batch_size {
        config.batch.batch_size = size;
    }
    if limit.is_some() {
        config.batch.limit = limit;
    }
    config.validate()?;
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".potrans").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "potrans.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("potrans.log").display());

    Ok(())
}
