use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::batch::{BatchOptions, BatchOrchestrator, FileReport};
use crate::cache::TranslationCache;
use crate::catalog::PoCatalog;
use crate::config::{Config, FilesConfig};
use crate::error::{Result, PotransError};
use crate::translate::Translator;

/// Outcome of one directory run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub reports: Vec<(PathBuf, FileReport)>,
}

pub struct Workflow {
    files: FilesConfig,
    orchestrator: BatchOrchestrator,
}

impl Workflow {
    /// Build the workflow against the configured remote service. Fails with
    /// a guard error when the API key is not set.
    pub fn new(config: Config) -> Result<Self> {
        let translator = Translator::from_config(&config.translate)?;
        Ok(Self::with_translator(config, translator))
    }

    pub fn with_translator(config: Config, translator: Translator) -> Self {
        let options = BatchOptions::from(&config.batch);
        Self {
            files: config.files,
            orchestrator: BatchOrchestrator::new(translator, options),
        }
    }

    /// Translate every catalog found directly inside `source_dir`, writing
    /// one output catalog per input into `output_dir`.
    pub async fn process_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        source_dir: P,
        output_dir: Q,
    ) -> Result<RunSummary> {
        let source_dir = source_dir.as_ref();
        let output_dir = output_dir.as_ref();

        let catalogs = discover_catalogs(source_dir, &self.files.extensions)?;
        info!("Found {} catalog files in {}", catalogs.len(), source_dir.display());

        fs::create_dir_all(output_dir).await?;

        let mut cache = TranslationCache::new();
        let mut summary = RunSummary::default();

        for input_path in catalogs {
            let output_path = match output_path_for(&input_path, output_dir, &self.files) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Failed to process {}: {}", input_path.display(), e);
                    summary.files_failed += 1;
                    continue;
                }
            };

            match self.process_file(&input_path, &output_path, &mut cache).await {
                Ok(report) => {
                    info!("Successfully processed: {}", input_path.display());
                    summary.files_processed += 1;
                    summary.reports.push((input_path, report));
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", input_path.display(), e);
                    summary.files_failed += 1;
                }
            }
        }

        info!(
            "Run finished: {} files processed, {} failed, {} cached translations",
            summary.files_processed,
            summary.files_failed,
            cache.len()
        );

        Ok(summary)
    }

    /// Translate a single catalog into `output_path`.
    pub async fn process_single_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
    ) -> Result<FileReport> {
        let output_path = output_path.as_ref();
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut cache = TranslationCache::new();
        self.process_file(input_path.as_ref(), output_path, &mut cache).await
    }

    async fn process_file(
        &self,
        input_path: &Path,
        output_path: &Path,
        cache: &mut TranslationCache,
    ) -> Result<FileReport> {
        info!("Processing {} -> {}", input_path.display(), output_path.display());

        let mut catalog = PoCatalog::load(input_path)?;
        self.orchestrator.process_catalog(&mut catalog, output_path, cache).await
    }
}

/// List catalog files directly inside `source_dir`, sorted by file name.
pub fn discover_catalogs(source_dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !source_dir.is_dir() {
        return Err(PotransError::SourceDirMissing(source_dir.display().to_string()));
    }

    let mut catalogs = Vec::new();
    for entry in WalkDir::new(source_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(ext_str) = entry.path().extension().and_then(|ext| ext.to_str()) {
            if extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext_str)) {
                catalogs.push(entry.path().to_path_buf());
            }
        }
    }

    if catalogs.is_empty() {
        return Err(PotransError::NoCatalogFiles(source_dir.display().to_string()));
    }

    Ok(catalogs)
}

/// `{output_dir}/{stem}{output_suffix}.{output_extension}`
pub fn output_path_for(input_path: &Path, output_dir: &Path, files: &FilesConfig) -> Result<PathBuf> {
    let stem = input_path
        .file_stem()
        .ok_or_else(|| PotransError::Config(format!("Invalid catalog filename: {}", input_path.display())))?
        .to_string_lossy();

    Ok(output_dir.join(format!(
        "{}{}.{}",
        stem, files.output_suffix, files.output_extension
    )))
}
