//! Pipeline error taxonomy.
//!
//! Malformed records never surface here; they are skipped at parse time.
//! These variants are the per-artifact and process-level failures: an
//! unreadable artifact is retried next pass, a storage failure rolls back
//! and retries, a configuration error refuses to start.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unreadable artifact {}: {}", .path.display(), .source)]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage failure: {0}")]
    Storage(anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Storage(err)
    }
}
