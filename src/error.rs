use thiserror::Error;

#[derive(Error, Debug)]
pub enum PotransError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("API key is not set: export {0} before running")]
    MissingCredential(String),

    #[error("Source directory does not exist: {0}")]
    SourceDirMissing(String),

    #[error("No catalog files found in {0}")]
    NoCatalogFiles(String),
}

impl PotransError {
    /// Guard conditions end the run early without processing any file.
    /// They are reported to the operator but are not failures.
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential(_) | Self::SourceDirMissing(_) | Self::NoCatalogFiles(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PotransError>;
