use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate every catalog in the source directory
    Batch {
        /// Directory containing .po/.pot files
        #[arg(short, long)]
        source_dir: Option<PathBuf>,

        /// Directory receiving the translated catalogs
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Unique strings per request
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Only consider the first N entries of each catalog
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Translate a single catalog file
    Translate {
        /// Input catalog
        #[arg(short, long)]
        input: PathBuf,

        /// Output catalog
        #[arg(short, long)]
        output: PathBuf,

        /// Unique strings per request
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Only consider the first N entries of the catalog
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Count untranslated entries without calling the translation service
    Scan {
        /// Input catalog
        #[arg(short, long)]
        input: PathBuf,

        /// Only consider the first N entries of the catalog
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "potrans.toml")]
        path: PathBuf,
    },
}
