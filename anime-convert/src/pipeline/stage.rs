//! Stage trait and the assembled pipeline.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::definition::{ArgBindings, JobParams, STAGES, StageDescriptor};
use super::invoker::StageInvoker;
use super::job::JobId;
use super::layout::JobLayout;
use crate::error::StageFailure;

/// Everything a stage needs for one run.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub job_id: JobId,
    pub descriptor: &'static StageDescriptor,
    /// Resolved input path (directory or file).
    pub input: PathBuf,
    /// Resolved output path (directory or file).
    pub output: PathBuf,
    /// The uploaded source video.
    pub source: PathBuf,
    pub params: JobParams,
    pub fps: u32,
}

impl StageContext {
    pub fn new(
        job_id: &JobId,
        descriptor: &'static StageDescriptor,
        layout: &JobLayout,
        source: &Path,
        params: &JobParams,
        fps: u32,
    ) -> Self {
        Self {
            job_id: job_id.clone(),
            descriptor,
            input: descriptor.input.resolve(layout, source),
            output: descriptor.output.resolve(layout, source),
            source: source.to_path_buf(),
            params: params.clone(),
            fps,
        }
    }

    /// Argument list from the descriptor's template.
    pub fn args(&self) -> Vec<OsString> {
        self.descriptor.render_args(&ArgBindings {
            input: &self.input,
            output: &self.output,
            source: &self.source,
            params: &self.params,
            fps: self.fps,
        })
    }
}

/// One independently invokable step of the conversion.
///
/// Implementations communicate results through the filesystem only: a
/// successful run leaves its output at `ctx.output`.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn run(&self, ctx: &StageContext) -> Result<(), StageFailure>;
}

/// Stage backed by an external script.
#[derive(Debug, Clone)]
pub struct ScriptStage {
    executable: PathBuf,
    invoker: Arc<StageInvoker>,
}

impl ScriptStage {
    pub fn new(executable: impl Into<PathBuf>, invoker: Arc<StageInvoker>) -> Self {
        Self {
            executable: executable.into(),
            invoker,
        }
    }
}

#[async_trait]
impl Stage for ScriptStage {
    async fn run(&self, ctx: &StageContext) -> Result<(), StageFailure> {
        self.invoker
            .invoke(ctx.descriptor.name, &self.executable, &ctx.args())
            .await
    }
}

/// A descriptor paired with its implementation.
#[derive(Clone)]
pub struct PipelineStep {
    pub descriptor: &'static StageDescriptor,
    pub stage: Arc<dyn Stage>,
}

/// The ordered stages every job runs through.
#[derive(Clone)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// Pair every stage of the fixed definition with an implementation.
    ///
    /// Order always follows [`STAGES`]; only the implementations vary.
    pub fn build<F>(mut implementation: F) -> Self
    where
        F: FnMut(&'static StageDescriptor) -> Arc<dyn Stage>,
    {
        let steps = STAGES
            .iter()
            .map(|descriptor| PipelineStep {
                descriptor,
                stage: implementation(descriptor),
            })
            .collect();
        Self { steps }
    }

    /// Script-backed pipeline: each stage runs `<scripts_dir>/<script>`.
    pub fn from_scripts(scripts_dir: &Path, invoker: Arc<StageInvoker>) -> Self {
        Self::build(|descriptor| {
            Arc::new(ScriptStage::new(
                scripts_dir.join(descriptor.script),
                Arc::clone(&invoker),
            )) as Arc<dyn Stage>
        })
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|step| step.descriptor.name))
            .finish()
    }
}
