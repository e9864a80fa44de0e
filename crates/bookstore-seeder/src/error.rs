//! Error types for the seeder

use thiserror::Error;

/// Result type alias for seeding operations
pub type Result<T> = std::result::Result<T, SeedError>;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Download error: {0}")]
    Download(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error in {file} at line {line}: {message}")]
    Parse {
        file: String,
        line: u64,
        message: String,
    },

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SeedError {
    pub fn parse(file: impl Into<String>, line: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}
