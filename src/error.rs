use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BidsError {
    #[error("study root is not a readable directory: {0}")]
    InvalidRoot(PathBuf),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("missing upload project (pass --project or set it in bids-ingest.json)")]
    MissingProject,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to write output: {0}")]
    Output(String),
}
