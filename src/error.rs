use chrono::NaiveDateTime;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigMissing(PathBuf),
    #[error("Configuration Error: {0}")]
    Config(String),
    #[error("Invalid time window: end ({end}) must be after start ({start})")]
    InvalidWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("No such file or directory: {}", .0.display())]
    SourceFileNotFound(PathBuf),
    #[error("Malformed record in {} at line {line}: {reason}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        reason: String,
    },
    #[error("Cannot compute {0} over an empty set of observations")]
    EmptyAggregationSet(String),
    #[error("Both data sources are disabled, nothing to report")]
    NothingToReport,
    #[error("Chart Error: {0}")]
    Chart(String),
    #[error("PDF Error: {0}")]
    Pdf(String),
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML Error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PipelineError {
    pub(crate) fn malformed(path: &std::path::Path, line: u64, reason: impl Into<String>) -> Self {
        PipelineError::MalformedRecord {
            path: path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
