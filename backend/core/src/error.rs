use thiserror::Error;

use crate::types::ProblemId;

/// Top-level error type for StudySnap.
#[derive(Debug, Error)]
pub enum SnapError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("'{file_name}' is not an image")]
    NotAnImage { file_name: String },

    #[error("no files were selected")]
    NoFiles,

    #[error("No solution generated.")]
    EmptySolution,

    #[error("solve provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("problem {0} is already tracked")]
    DuplicateProblem(ProblemId),

    #[error("channel closed: {0}")]
    ChannelClosed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
