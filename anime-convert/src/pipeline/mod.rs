//! Conversion pipeline.
//!
//! - Fixed five-stage definition with per-stage progress checkpoints
//! - In-memory job store shared by runners and status readers
//! - Subprocess invocation of the stage scripts
//! - One background task per accepted submission
//! - Optional purging of old finished jobs

pub mod definition;
mod dispatcher;
mod invoker;
mod job;
mod layout;
mod purge;
mod runner;
mod stage;
mod store;

pub use definition::{JobParams, Resolution, STAGES, StageDescriptor};
pub use dispatcher::{
    ALLOWED_EXTENSIONS, DEFAULT_RESOLUTION, DEFAULT_STYLE, Dispatcher, DispatcherConfig,
    Submission,
};
pub use invoker::StageInvoker;
pub use job::{JobId, JobRecord, JobStatus, JobUpdate};
pub use layout::{ARTIFACT_SUFFIX, JobLayout};
pub use purge::{JobPurgeService, PurgeConfig};
pub use runner::PipelineRunner;
pub use stage::{Pipeline, PipelineStep, ScriptStage, Stage, StageContext};
pub use store::{JobStats, JobStore};
