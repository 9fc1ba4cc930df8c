use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a pipeline run. There are no retries anywhere;
/// every variant is fatal and requires an operator rerun.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input file is missing required column '{0}'")]
    Schema(String),

    #[error("failed to read CSV record: {0}")]
    Csv(#[from] csv::Error),

    #[error("no rows survived cleaning; nothing to aggregate")]
    EmptyAfterCleaning,

    #[error("cannot compute quintile scores for {metric}: {reason}")]
    DegenerateDistribution {
        metric: &'static str,
        reason: String,
    },

    #[error("no segment rule covers R={r}, F={f}")]
    UnlabeledScores { r: u8, f: u8 },

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet snapshot error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("snapshot {path} has unexpected layout: {reason}")]
    SnapshotSchema { path: PathBuf, reason: String },
}
