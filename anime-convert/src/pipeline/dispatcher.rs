//! Submission entry point.
//!
//! Validates an upload, persists it, creates the job record and starts the
//! pipeline without waiting for it.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::definition::{JobParams, Resolution};
use super::job::JobId;
use super::runner::PipelineRunner;
use super::store::JobStore;
use crate::utils::filename::{extension_of, sanitize_upload_name};
use crate::utils::fs;
use crate::{Error, Result};

/// Video container extensions accepted for conversion.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".mkv", ".webm", ".avi", ".ogg"];

/// Default style identifier.
pub const DEFAULT_STYLE: &str = "face_paint_512_v2";

/// Default resolution form value.
pub const DEFAULT_RESOLUTION: &str = "720";

/// A conversion request as received from a client.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Original filename, `None` when no file field was sent.
    pub file_name: Option<String>,
    pub payload: Bytes,
    pub style: Option<String>,
    pub resolution: Option<String>,
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub uploads_dir: PathBuf,
    pub default_style: String,
    /// Maximum number of pipelines running at once. 0 = unbounded.
    pub max_concurrent_jobs: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("backend_uploads"),
            default_style: DEFAULT_STYLE.to_string(),
            max_concurrent_jobs: 0,
        }
    }
}

/// Accepts submissions and starts one pipeline task per job.
#[derive(Debug)]
pub struct Dispatcher {
    config: DispatcherConfig,
    store: Arc<JobStore>,
    runner: Arc<PipelineRunner>,
    limiter: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, store: Arc<JobStore>, runner: Arc<PipelineRunner>) -> Self {
        let limiter = (config.max_concurrent_jobs > 0)
            .then(|| Arc::new(Semaphore::new(config.max_concurrent_jobs)));
        Self {
            config,
            store,
            runner,
            limiter,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Check the upload before any work is done.
    ///
    /// Returns the original filename.
    pub fn validate(submission: &Submission) -> Result<&str> {
        let file_name = submission
            .file_name
            .as_deref()
            .ok_or_else(|| Error::invalid_upload("No file"))?;
        if file_name.is_empty() {
            return Err(Error::invalid_upload("Empty filename"));
        }
        let allowed = extension_of(file_name)
            .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
        if !allowed {
            return Err(Error::invalid_upload("Unsupported file type"));
        }
        if submission.payload.is_empty() {
            return Err(Error::invalid_upload("Empty file"));
        }
        Ok(file_name)
    }

    fn params(&self, submission: &Submission) -> JobParams {
        let style = submission
            .style
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.config.default_style)
            .to_string();
        let resolution = submission.resolution.as_deref().unwrap_or(DEFAULT_RESOLUTION);
        JobParams {
            style,
            resolution: Resolution::from_param(resolution),
        }
    }

    /// Accept a submission and start its pipeline.
    ///
    /// Returns as soon as the job is recorded as `queued`; the pipeline runs
    /// on its own task.
    pub async fn submit(&self, submission: Submission) -> Result<JobId> {
        let file_name = Self::validate(&submission)?;
        let params = self.params(&submission);

        let job_id = JobId::generate();
        let stored_name = format!("{}_{}", job_id, sanitize_upload_name(file_name));
        let source = self.config.uploads_dir.join(stored_name);

        fs::ensure_dir_all_with_op("creating uploads directory", &self.config.uploads_dir).await?;
        tokio::fs::write(&source, &submission.payload)
            .await
            .map_err(|e| fs::io_error("saving upload", &source, e))?;
        debug!(job_id = %job_id, path = %source.display(), bytes = submission.payload.len(), "Upload saved");

        self.store.create(&job_id);
        info!(
            job_id = %job_id,
            style = %params.style,
            resolution = ?params.resolution,
            "Job queued"
        );

        let runner = Arc::clone(&self.runner);
        let limiter = self.limiter.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            // Held for the whole run; the job stays queued until acquired.
            let _permit = match limiter {
                Some(limiter) => limiter.acquire_owned().await.ok(),
                None => None,
            };
            runner.run(&id, &source, &params).await;
        });

        Ok(job_id)
    }
}
