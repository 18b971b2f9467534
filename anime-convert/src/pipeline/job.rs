//! Job identity, status and record types.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Opaque, globally unique job identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh identity (UUID v4, 32 lowercase hex characters).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Job status.
///
/// Ordered: a record only ever moves to a later status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, pipeline not started yet.
    Queued,
    /// Pipeline is executing stages.
    Running,
    /// Result artifact published.
    Done,
    /// A stage or the publishing step failed.
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// `done` and `error` never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one conversion job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub status: JobStatus,
    /// Percentage, 0..=100.
    pub progress: u8,
    pub message: String,
    /// Absolute location of the published artifact. Only set when `done`.
    pub result: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Initial state of a freshly submitted job.
    pub fn queued() -> Self {
        let now = Utc::now();
        Self {
            status: JobStatus::Queued,
            progress: 0,
            message: "Queued".to_string(),
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge `update` into this record.
    ///
    /// The update is validated in full before any field changes, so a
    /// rejected update leaves the record untouched.
    pub fn apply(&mut self, update: JobUpdate) -> Result<()> {
        let next_status = update.status.unwrap_or(self.status);

        if self.status.is_terminal() {
            return Err(Error::invalid_transition(self.status, next_status));
        }
        if next_status < self.status {
            return Err(Error::invalid_transition(self.status, next_status));
        }

        let next_progress = match next_status {
            JobStatus::Done => 100,
            JobStatus::Error => 0,
            _ => update.progress.unwrap_or(self.progress).min(99),
        };
        if next_status == JobStatus::Running
            && self.status == JobStatus::Running
            && next_progress < self.progress
        {
            return Err(Error::validation(format!(
                "progress cannot go back from {} to {}",
                self.progress, next_progress
            )));
        }

        if update.result.is_some() && next_status != JobStatus::Done {
            return Err(Error::validation(format!(
                "result can only be set on a done job, not {}",
                next_status
            )));
        }
        if next_status == JobStatus::Done && update.result.is_none() {
            return Err(Error::validation("a done job requires a result"));
        }

        self.status = next_status;
        self.progress = next_progress;
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(result) = update.result {
            self.result = Some(result);
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Partial update of a [`JobRecord`]. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub result: Option<PathBuf>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_result(mut self, result: impl Into<PathBuf>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Running at `progress` with `message`.
    pub fn running(progress: u8, message: impl Into<String>) -> Self {
        Self::new()
            .with_status(JobStatus::Running)
            .with_progress(progress)
            .with_message(message)
    }

    /// Terminal success with the published artifact.
    pub fn done(result: impl Into<PathBuf>) -> Self {
        Self::new()
            .with_status(JobStatus::Done)
            .with_progress(100)
            .with_message("Completed")
            .with_result(result)
    }

    /// Terminal failure; progress resets to 0.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new()
            .with_status(JobStatus::Error)
            .with_progress(0)
            .with_message(message)
    }
}
