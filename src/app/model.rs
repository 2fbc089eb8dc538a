use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::formats::{CrawlRequest, WorkerReport};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// One triggered crawl, as seen by the process that launched it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub request: CrawlRequest,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(request: CrawlRequest) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            request,
            worker_pid: None,
            total: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self, worker_pid: Option<u32>) {
        self.status = JobStatus::Running;
        self.worker_pid = worker_pid;
        self.started_at = Some(Utc::now());
    }

    /// Applies the worker's terminal report. Later reports overwrite earlier ones.
    pub fn apply_report(&mut self, report: &WorkerReport) {
        match report {
            WorkerReport::Done { total } => {
                self.status = JobStatus::Done;
                self.total = Some(*total);
                self.error = None;
            }
            WorkerReport::Error { error } => {
                self.status = JobStatus::Error;
                self.total = None;
                self.error = Some(error.clone());
            }
        }
        self.finished_at = Some(Utc::now());
    }
}
