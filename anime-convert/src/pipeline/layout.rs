//! Per-job filesystem layout.

use std::path::{Path, PathBuf};

use super::job::JobId;

/// Suffix of the final artifact file name.
pub const ARTIFACT_SUFFIX: &str = "_final_anime.mp4";

/// Locations owned by one job under the results directory.
///
/// ```text
/// <results>/<id>/frames/
/// <results>/<id>/frames_resized/
/// <results>/<id>/styled/
/// <results>/<id>/smoothed/
/// <results>/<id>/<id>_final_anime.mp4   (reassembly output)
/// <results>/<id>_final_anime.mp4        (published result)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    results_dir: PathBuf,
    work_dir: PathBuf,
    artifact_name: String,
}

impl JobLayout {
    pub fn new(results_dir: impl Into<PathBuf>, job_id: &JobId) -> Self {
        let results_dir = results_dir.into();
        let work_dir = results_dir.join(job_id.as_str());
        Self {
            results_dir,
            work_dir,
            artifact_name: format!("{}{}", job_id, ARTIFACT_SUFFIX),
        }
    }

    /// The job's working directory.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Subdirectory of the working directory.
    pub fn stage_dir(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    /// Artifact produced by the reassembly stage, inside the working directory.
    pub fn final_artifact(&self) -> PathBuf {
        self.work_dir.join(&self.artifact_name)
    }

    /// Published, externally addressable result.
    pub fn result_path(&self) -> PathBuf {
        self.results_dir.join(&self.artifact_name)
    }

    /// File name of the published result.
    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }
}
