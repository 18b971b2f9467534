//! Retention of finished jobs.
//!
//! Periodically removes terminal jobs older than the retention period
//! together with their working directory, published result and upload.
//!

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job::JobId;
use super::layout::JobLayout;
use super::store::JobStore;
use crate::Result;
use crate::utils::fs;

/// Configuration for job purging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeConfig {
    /// Hours to retain finished (done/error) jobs.
    /// Set to 0 to retain all jobs indefinitely.
    #[serde(default)]
    pub retention_hours: u64,

    /// Interval between purge checks in seconds.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

fn default_check_interval_secs() -> u64 {
    3600 // 1 hour
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            retention_hours: 0,
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

impl PurgeConfig {
    /// Set the retention period.
    pub fn with_retention_hours(mut self, hours: u64) -> Self {
        self.retention_hours = hours;
        self
    }

    /// Set the check interval.
    pub fn with_check_interval_secs(mut self, secs: u64) -> Self {
        self.check_interval_secs = secs;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.retention_hours > 0
    }

    /// Oldest `updated_at` a finished job may have at `now`.
    ///
    /// `None` when the retention period does not fit in a timestamp.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let hours = i64::try_from(self.retention_hours).ok()?;
        now.checked_sub_signed(chrono::Duration::try_hours(hours)?)
    }
}

/// Removes expired jobs and their files.
pub struct JobPurgeService {
    config: PurgeConfig,
    store: Arc<JobStore>,
    results_dir: PathBuf,
    uploads_dir: PathBuf,
}

impl JobPurgeService {
    pub fn new(
        config: PurgeConfig,
        store: Arc<JobStore>,
        results_dir: impl Into<PathBuf>,
        uploads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            store,
            results_dir: results_dir.into(),
            uploads_dir: uploads_dir.into(),
        }
    }

    /// Start the background purge loop.
    ///
    /// Does nothing when retention is disabled.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) {
        if !self.config.is_enabled() {
            info!("Job retention disabled, finished jobs are kept indefinitely");
            return;
        }

        info!(
            retention_hours = self.config.retention_hours,
            interval_secs = self.config.check_interval_secs,
            "Starting job purge service"
        );

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(self.config.check_interval_secs.max(1)));

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Job purge service shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(cutoff) = self.config.cutoff(Utc::now()) else {
                            warn!(
                                retention_hours = self.config.retention_hours,
                                "Retention period out of range, skipping purge"
                            );
                            continue;
                        };
                        match self.purge_before(cutoff).await {
                            Ok(0) => debug!("No expired jobs"),
                            Ok(count) => info!(count, "Purged expired jobs"),
                            Err(e) => error!(error = %e, "Job purge failed"),
                        }
                    }
                }
            }
        });
    }

    /// Purge terminal jobs last updated before `cutoff`.
    ///
    /// Returns the number of purged jobs.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut purged = 0;

        for job_id in self.store.expired(cutoff) {
            // The record goes first so nobody is handed a result being deleted.
            if self.store.remove_terminal(&job_id).is_none() {
                continue;
            }
            if let Err(e) = self.remove_files(&job_id).await {
                warn!(job_id = %job_id, error = %e, "Failed to remove job files");
            }
            purged += 1;
        }

        Ok(purged)
    }

    async fn remove_files(&self, job_id: &JobId) -> Result<()> {
        let layout = JobLayout::new(&self.results_dir, job_id);
        fs::remove_dir_all_if_exists(layout.work_dir()).await?;
        fs::remove_file_if_exists(&layout.result_path()).await?;
        remove_uploads(&self.uploads_dir, job_id).await?;
        debug!(job_id = %job_id, "Removed job files");
        Ok(())
    }
}

/// Delete `<uploads>/<id>_*`.
async fn remove_uploads(uploads_dir: &Path, job_id: &JobId) -> Result<()> {
    let prefix = format!("{}_", job_id);
    let mut entries = match tokio::fs::read_dir(uploads_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(fs::io_error("reading uploads directory", uploads_dir, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| fs::io_error("reading uploads directory", uploads_dir, e))?
    {
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if matches {
            fs::remove_file_if_exists(&entry.path()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::job::JobUpdate;
    use tempfile::TempDir;

    fn service(temp: &TempDir, store: &Arc<JobStore>) -> JobPurgeService {
        JobPurgeService::new(
            PurgeConfig::default().with_retention_hours(1),
            Arc::clone(store),
            temp.path().join("results"),
            temp.path().join("uploads"),
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = PurgeConfig::default();
        assert_eq!(config.retention_hours, 0);
        assert!(!config.is_enabled());
        assert_eq!(config.check_interval_secs, 3600);
        assert!(config.with_retention_hours(24).is_enabled());
    }

    #[test]
    fn test_cutoff() {
        let now = Utc::now();
        let config = PurgeConfig::default().with_retention_hours(24);
        assert_eq!(config.cutoff(now), Some(now - chrono::Duration::hours(24)));

        assert_eq!(
            PurgeConfig::default()
                .with_retention_hours(u64::MAX)
                .cutoff(now),
            None
        );
        assert_eq!(
            PurgeConfig::default()
                .with_retention_hours(i64::MAX as u64)
                .cutoff(now),
            None
        );
    }

    #[tokio::test]
    async fn test_out_of_range_retention_keeps_fresh_jobs() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(JobStore::new());
        let id = JobId::generate();
        store.create(&id);
        store.update(&id, JobUpdate::failed("Error: x")).unwrap();

        let service = Arc::new(JobPurgeService::new(
            PurgeConfig::default().with_retention_hours(u64::MAX),
            Arc::clone(&store),
            temp.path().join("results"),
            temp.path().join("uploads"),
        ));
        let cancel = CancellationToken::new();
        service.start(cancel.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        assert!(store.contains(&id));
    }

    #[tokio::test]
    async fn test_purge_removes_finished_job_and_files() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(JobStore::new());
        let service = service(&temp, &store);

        let id = JobId::generate();
        store.create(&id);
        let layout = JobLayout::new(temp.path().join("results"), &id);
        std::fs::create_dir_all(layout.stage_dir("frames")).unwrap();
        std::fs::write(layout.result_path(), b"video").unwrap();
        std::fs::create_dir_all(temp.path().join("uploads")).unwrap();
        let upload = temp.path().join("uploads").join(format!("{}_clip.mp4", id));
        let other = temp.path().join("uploads").join("someone_else.mp4");
        std::fs::write(&upload, b"in").unwrap();
        std::fs::write(&other, b"in").unwrap();
        store
            .update(&id, JobUpdate::done(layout.result_path()))
            .unwrap();

        let purged = service
            .purge_before(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(purged, 1);
        assert!(store.get(&id).is_none());
        assert!(!layout.work_dir().exists());
        assert!(!layout.result_path().exists());
        assert!(!upload.exists());
        assert!(other.exists());
    }

    #[tokio::test]
    async fn test_purge_keeps_active_and_recent_jobs() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(JobStore::new());
        let service = service(&temp, &store);

        let running = JobId::generate();
        let recent = JobId::generate();
        store.create(&running);
        store.create(&recent);
        store.update(&running, JobUpdate::running(10, "x")).unwrap();
        store.update(&recent, JobUpdate::failed("Error: x")).unwrap();

        let purged = service
            .purge_before(Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(purged, 0);
        assert!(store.contains(&running));
        assert!(store.contains(&recent));
    }
}
