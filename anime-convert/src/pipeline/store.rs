//! In-memory job store.
//!
//! The only state shared between pipeline runners and status readers.
//! A single lock guards the map; no IO happens while it is held.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use super::job::{JobId, JobRecord, JobStatus, JobUpdate};
use crate::{Error, Result};

/// Number of jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub queued: usize,
    pub running: usize,
    pub done: usize,
    pub error: usize,
}

impl JobStats {
    pub fn total(&self) -> usize {
        self.queued + self.running + self.done + self.error
    }
}

/// Concurrency-safe mapping from job identity to job record.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new `queued` record.
    ///
    /// Identities are generated to be unique; an existing record is
    /// replaced and the collision logged.
    pub fn create(&self, id: &JobId) {
        let mut jobs = self.jobs.write();
        match jobs.entry(id.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(JobRecord::queued());
            }
            Entry::Occupied(mut entry) => {
                warn!(job_id = %id, "Job id collision, replacing existing record");
                entry.insert(JobRecord::queued());
            }
        }
        debug!(job_id = %id, "Job created");
    }

    /// Merge `update` into the record for `id` atomically.
    ///
    /// Readers observe either the record before the update or after it,
    /// never a mix.
    pub fn update(&self, id: &JobId, update: JobUpdate) -> Result<()> {
        let mut jobs = self.jobs.write();
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| Error::not_found("Job", id.as_str()))?;
        record.apply(update)
    }

    /// Snapshot of the record for `id`.
    pub fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs.read().get(id).cloned()
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Count jobs per status.
    pub fn stats(&self) -> JobStats {
        let jobs = self.jobs.read();
        let mut stats = JobStats::default();
        for record in jobs.values() {
            match record.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Done => stats.done += 1,
                JobStatus::Error => stats.error += 1,
            }
        }
        stats
    }

    /// Terminal jobs last updated before `cutoff`.
    pub fn expired(&self, cutoff: DateTime<Utc>) -> Vec<JobId> {
        self.jobs
            .read()
            .iter()
            .filter(|(_, record)| record.status.is_terminal() && record.updated_at < cutoff)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Remove a terminal record. Queued or running jobs are kept.
    ///
    /// Returns the removed record.
    pub fn remove_terminal(&self, id: &JobId) -> Option<JobRecord> {
        let mut jobs = self.jobs.write();
        match jobs.entry(id.clone()) {
            Entry::Occupied(entry) if entry.get().status.is_terminal() => Some(entry.remove()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_create_and_get() {
        let store = JobStore::new();
        let id = JobId::generate();
        store.create(&id);

        let record = store.get(&id).unwrap();
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.progress, 0);
        assert_eq!(record.message, "Queued");
        assert!(record.result.is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_unknown_is_none() {
        let store = JobStore::new();
        assert!(store.get(&JobId::from("missing")).is_none());
    }

    #[test]
    fn test_update_unknown_is_not_found() {
        let store = JobStore::new();
        let err = store
            .update(&JobId::from("missing"), JobUpdate::running(1, "x"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_get_returns_snapshot() {
        let store = JobStore::new();
        let id = JobId::generate();
        store.create(&id);

        let snapshot = store.get(&id).unwrap();
        store.update(&id, JobUpdate::running(10, "Extracting frames")).unwrap();

        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Running);
    }

    #[test]
    fn test_rejected_update_leaves_record_unchanged() {
        let store = JobStore::new();
        let id = JobId::generate();
        store.create(&id);
        store.update(&id, JobUpdate::failed("Error: x")).unwrap();
        let before = store.get(&id).unwrap();

        assert!(store.update(&id, JobUpdate::running(50, "late")).is_err());
        assert_eq!(store.get(&id).unwrap(), before);
    }

    #[test]
    fn test_stats() {
        let store = JobStore::new();
        let a = JobId::generate();
        let b = JobId::generate();
        let c = JobId::generate();
        store.create(&a);
        store.create(&b);
        store.create(&c);
        store.update(&b, JobUpdate::running(10, "x")).unwrap();
        store.update(&c, JobUpdate::failed("Error: x")).unwrap();

        let stats = store.stats();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.error, 1);
        assert_eq!(stats.done, 0);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_expired_and_remove_only_terminal() {
        let store = JobStore::new();
        let finished = JobId::generate();
        let active = JobId::generate();
        store.create(&finished);
        store.create(&active);
        store.update(&finished, JobUpdate::failed("Error: x")).unwrap();
        store.update(&active, JobUpdate::running(10, "x")).unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.expired(cutoff), vec![finished.clone()]);

        assert!(store.remove_terminal(&active).is_none());
        assert!(store.remove_terminal(&finished).is_some());
        assert!(!store.contains(&finished));
        assert!(store.contains(&active));
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_records() {
        let store = Arc::new(JobStore::new());
        let id = JobId::generate();
        store.create(&id);
        store.update(&id, JobUpdate::running(1, "step 1")).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                let stop = Arc::clone(&stop);
                std::thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let record = store.get(&id).unwrap();
                        assert_eq!(record.message, format!("step {}", record.progress));
                    }
                })
            })
            .collect();

        for progress in 2..=99u8 {
            store
                .update(&id, JobUpdate::running(progress, format!("step {}", progress)))
                .unwrap();
        }
        stop.store(true, Ordering::Relaxed);

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
