//! Application-wide error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Stage(#[from] StageFailure),

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {op} {}: {source}", path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API error: {0}")]
    ApiError(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_upload(msg: impl Into<String>) -> Self {
        Self::InvalidUpload(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Failure of a single pipeline stage.
///
/// Every variant names the stage so the job message identifies where the
/// pipeline stopped.
#[derive(Error, Debug)]
pub enum StageFailure {
    #[error("{stage} stage failed to launch: {source}")]
    Launch {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} stage could not be awaited: {source}")]
    Wait {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} stage exited with code {code}")]
    ExitCode { stage: &'static str, code: i32 },

    #[error("{stage} stage was terminated by signal {signal}")]
    Signal { stage: &'static str, signal: i32 },

    #[error("{stage} stage terminated abnormally")]
    Abnormal { stage: &'static str },

    #[error("{stage} stage panicked")]
    Panicked { stage: &'static str },
}

impl StageFailure {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Launch { stage, .. }
            | Self::Wait { stage, .. }
            | Self::ExitCode { stage, .. }
            | Self::Signal { stage, .. }
            | Self::Abnormal { stage }
            | Self::Panicked { stage } => stage,
        }
    }
}
