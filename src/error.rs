use std::path::PathBuf;

use thiserror::Error;

use crate::store::batch::FailedSubmission;

/// Errors that end an ingestion or query run.
///
/// Individual record rejections are not errors: they surface as
/// [`FailedSubmission`] values and feed the retry loop.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("usage: {0}")]
    Usage(String),
    #[error("the file '{}' does not exist", .0.display())]
    FileNotFound(PathBuf),
    #[error("the file '{}' does not have a .json extension", .0.display())]
    InvalidFormat(PathBuf),
    #[error("vector store unavailable: {0}")]
    Connection(String),
    #[error("vector store returned {status}: {body}")]
    Store { status: u16, body: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("malformed JSON at record {index}: {source}")]
    Parse {
        index: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("retry made no progress; {remaining} record(s) still rejected")]
    StuckRetry {
        remaining: usize,
        stuck: Vec<FailedSubmission>,
    },
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
