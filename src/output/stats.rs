//! Job statistics gathered from storage

use crate::state::PageStatus;
use crate::storage::{CrawlJob, Storage, StorageResult};
use chrono::{DateTime, Utc};

/// Summary of one crawl job
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub job: CrawlJob,

    /// Pages recorded but not analyzed
    pub pages_discovered: u64,
    pub pages_analyzed: u64,
    pub pages_failed: u64,

    /// Wall-clock run time, once the job has finished
    pub duration_seconds: Option<i64>,

    /// `(url, error message)` of every failed page, in visit order
    pub failures: Vec<(String, String)>,
}

impl JobSummary {
    /// Share of recorded pages that did not fail, in percent
    pub fn success_rate(&self) -> f64 {
        let total = self.pages_discovered + self.pages_analyzed + self.pages_failed;
        if total == 0 {
            return 0.0;
        }
        (total - self.pages_failed) as f64 / total as f64 * 100.0
    }
}

/// Loads the summary of a job
pub fn load_job_summary(storage: &dyn Storage, job_id: i64) -> StorageResult<JobSummary> {
    let job = storage.get_job(job_id)?;

    let failures = storage
        .list_pages_by_job(job_id)?
        .into_iter()
        .filter(|p| p.status.is_failed())
        .map(|p| (p.url, p.error_message.unwrap_or_default()))
        .collect();

    let duration_seconds = match (&job.started_at, &job.completed_at) {
        (Some(started), Some(completed)) => {
            match (
                started.parse::<DateTime<Utc>>(),
                completed.parse::<DateTime<Utc>>(),
            ) {
                (Ok(s), Ok(c)) => Some((c - s).num_seconds()),
                _ => None,
            }
        }
        _ => None,
    };

    Ok(JobSummary {
        pages_discovered: storage.count_pages_by_status(job_id, PageStatus::Discovered)?,
        pages_analyzed: storage.count_pages_by_status(job_id, PageStatus::Analyzed)?,
        pages_failed: storage.count_pages_by_status(job_id, PageStatus::Failed)?,
        duration_seconds,
        failures,
        job,
    })
}
