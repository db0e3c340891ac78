use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Attribute probe failed for {path}: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource sampling failed: {0}")]
    ResourceSample(String),

    #[error("Backup failed for {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File operation failed for {path}: {source}")]
    FileOp {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory does not exist: {0}")]
    DirectoryMissing(PathBuf),

    #[error("Another run holds the lock file {0}")]
    Locked(PathBuf),
}
