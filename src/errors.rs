use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::data_processing::{SourceKind, Split};

/// Failures while reading raw sources or reading/writing processed artifacts.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("raw source '{kind}' is unavailable at {location}: {reason}")]
    MissingRaw {
        kind: SourceKind,
        location: String,
        reason: String,
    },
    #[error("processed data directory not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("no '{split}' artifacts found in {}", .dir.display())]
    EmptyDataset { split: Split, dir: PathBuf },
    #[error("artifact '{name}' is malformed: {reason}")]
    MalformedArtifact { name: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error(transparent)]
    Arrow(#[from] arrow_schema::ArrowError),
}

/// Failures talking to the feedback store.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("DATABASE_URL is not configured")]
    MissingUrl,
    #[error("feedback prompt must not be empty")]
    EmptyPrompt,
    #[error("cannot connect to feedback store: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("feedback query failed: {0}")]
    Query(#[source] sqlx::Error),
}

/// Failures of the incremental sync critical section.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("watermark file {} is corrupt: {reason}", .path.display())]
    CorruptWatermark { path: PathBuf, reason: String },
    #[error("another sync holds the lock at {} (remove it if no sync is running)", .0.display())]
    Locked(PathBuf),
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("cannot load configuration from {path}: {reason}")]
    Load { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("cannot load tokenizer '{origin}': {reason}")]
    Load { origin: String, reason: String },
    #[error("tokenizer '{0}' has no [PAD] token")]
    MissingPad(String),
}

/// Failures of the inference service.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("model is not loaded")]
    NotReady,
    #[error("question produced no tokens")]
    NoTokens,
    #[error("cannot load checkpoint from {path}: {reason}")]
    Checkpoint { path: String, reason: String },
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("artifact '{name}' not found under {}", .root.display())]
    MissingArtifact { name: String, root: PathBuf },
    #[error("artifact '{0}' has no versions")]
    NoVersions(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot save {what} to {path}: {reason}")]
    Save {
        what: &'static str,
        path: String,
        reason: String,
    },
}
