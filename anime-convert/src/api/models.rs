//! API request/response payloads.

use serde::Serialize;

use crate::pipeline::{JobRecord, JobStats, JobStatus};

/// Response to an accepted submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub job_id: String,
}

/// Snapshot of a job as seen by clients.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    /// Filesystem path of the published result, `null` until done.
    pub result: Option<String>,
}

impl From<JobRecord> for JobStatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            status: record.status,
            progress: record.progress,
            message: record.message,
            result: record.result.map(|p| p.to_string_lossy().into_owned()),
        }
    }
}

/// Where to fetch a finished result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub download_url: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub jobs: JobStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_response_serialization() {
        let mut record = JobRecord::queued();
        let json = serde_json::to_value(JobStatusResponse::from(record.clone())).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["progress"], 0);
        assert!(json["result"].is_null());

        record.status = JobStatus::Done;
        record.progress = 100;
        record.result = Some(PathBuf::from("/r/x_final_anime.mp4"));
        let json = serde_json::to_value(JobStatusResponse::from(record)).unwrap();
        assert_eq!(json["status"], "done");
        assert_eq!(json["result"], "/r/x_final_anime.mp4");
    }

    #[test]
    fn test_camel_case_fields() {
        let json = serde_json::to_string(&ConvertResponse {
            job_id: "abc".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"jobId":"abc"}"#);

        let json = serde_json::to_string(&ResultResponse {
            download_url: "/download/a.mp4".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"downloadUrl":"/download/a.mp4"}"#);
    }
}
