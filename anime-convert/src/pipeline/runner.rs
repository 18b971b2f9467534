//! Drives one job through the pipeline.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{Instrument, error, info, info_span, warn};

use super::definition::{JobParams, STARTING_PROGRESS, StagePath};
use super::job::{JobId, JobUpdate};
use super::layout::JobLayout;
use super::stage::{Pipeline, StageContext};
use super::store::JobStore;
use crate::Result;
use crate::error::StageFailure;
use crate::utils::fs;

/// Executes the pipeline for a job and records every transition in the
/// [`JobStore`].
///
/// The runner is the only writer of a job's record after creation. No
/// failure escapes [`PipelineRunner::run`]; it ends up in the record.
#[derive(Debug)]
pub struct PipelineRunner {
    store: Arc<JobStore>,
    pipeline: Pipeline,
    results_dir: PathBuf,
    fps: u32,
}

impl PipelineRunner {
    pub fn new(
        store: Arc<JobStore>,
        pipeline: Pipeline,
        results_dir: impl Into<PathBuf>,
        fps: u32,
    ) -> Self {
        Self {
            store,
            pipeline,
            results_dir: results_dir.into(),
            fps,
        }
    }

    /// Run all stages for `job_id` and leave the record `done` or `error`.
    pub async fn run(&self, job_id: &JobId, source: &Path, params: &JobParams) {
        let span = info_span!("job", job_id = %job_id);

        async {
            match self.execute(job_id, source, params).await {
                Ok(result) => {
                    info!(result = %result.display(), "Job completed");
                    if let Err(e) = self.store.update(job_id, JobUpdate::done(&result)) {
                        warn!(error = %e, "Failed to record job completion");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Job failed");
                    if let Err(e) = self
                        .store
                        .update(job_id, JobUpdate::failed(format!("Error: {}", e)))
                    {
                        warn!(error = %e, "Failed to record job failure");
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, job_id: &JobId, source: &Path, params: &JobParams) -> Result<PathBuf> {
        self.store.update(
            job_id,
            JobUpdate::running(STARTING_PROGRESS, "Starting pipeline"),
        )?;

        let layout = JobLayout::new(&self.results_dir, job_id);
        fs::ensure_dir_all_with_op("creating job working directory", layout.work_dir()).await?;

        for step in self.pipeline.steps() {
            let descriptor = step.descriptor;
            self.store.update(
                job_id,
                JobUpdate::running(descriptor.start_progress, descriptor.label),
            )?;

            let ctx = StageContext::new(job_id, descriptor, &layout, source, params, self.fps);
            match descriptor.output {
                StagePath::Dir(_) => {
                    fs::ensure_dir_all_with_op("creating stage output directory", &ctx.output)
                        .await?
                }
                StagePath::FinalArtifact | StagePath::SourceVideo => {
                    fs::ensure_parent_dir(&ctx.output).await?
                }
            }

            info!(stage = descriptor.name, "Starting stage");
            // A panicking implementation fails the job instead of the task.
            match AssertUnwindSafe(step.stage.run(&ctx)).catch_unwind().await {
                Ok(outcome) => outcome?,
                Err(_) => {
                    return Err(StageFailure::Panicked {
                        stage: descriptor.name,
                    }
                    .into());
                }
            }

            self.store.update(
                job_id,
                JobUpdate::new().with_progress(descriptor.end_progress),
            )?;
        }

        self.publish(&layout).await
    }

    /// Copy the final artifact to its externally addressable location.
    async fn publish(&self, layout: &JobLayout) -> Result<PathBuf> {
        let result = layout.result_path();
        fs::copy_file(&layout.final_artifact(), &result).await?;
        tokio::fs::canonicalize(&result)
            .await
            .map_err(|e| fs::io_error("resolving result path", &result, e))
    }
}
