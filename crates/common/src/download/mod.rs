//! Download jobs: PDF and EPUB files generated by the TaskManager
//!
//! A job is identified by the SHA-256 of its type, PI and LOGID, so asking
//! twice for the same file finds the same job. Generated files live under
//! `{folder}/{type}/{identifier}.{ext}` and expire `ttl_secs` after they were
//! last requested.

mod task_manager;

pub use task_manager::{TaskManagerApi, TaskManagerClient, TaskRequest, TaskStatus};

use crate::config::DownloadConfig;
use crate::db::models::{DownloadJob, DownloadJobType, JobStatus};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::metrics;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use validator::ValidateEmail;

/// Deterministic job identifier: SHA-256 hex of type, PI and LOGID
pub fn generate_identifier(job_type: DownloadJobType, pi: &str, logid: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(job_type.as_str().as_bytes());
    hasher.update(pi.as_bytes());
    hasher.update(logid.unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}

/// What to do with an incoming request given the job already stored for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPlan {
    /// Job is usable; only `last_requested` moves
    Reuse(DownloadJob),
    /// Job failed or expired; reset and submit again
    Resubmit(DownloadJob),
    Create,
}

pub fn plan_request(existing: Option<DownloadJob>, now: DateTime<Utc>) -> RequestPlan {
    match existing {
        None => RequestPlan::Create,
        Some(job) if needs_resubmit(&job, now) => RequestPlan::Resubmit(job),
        Some(job) => RequestPlan::Reuse(job),
    }
}

/// Failed and expired jobs have to go through the TaskManager again
pub fn needs_resubmit(job: &DownloadJob, now: DateTime<Utc>) -> bool {
    job.job_status() == JobStatus::Error || job.is_expired(now)
}

/// Job after a TaskManager status report; `ready` only counts when the file is on disk
pub fn apply_status(mut job: DownloadJob, report: &TaskStatus, file_exists: bool) -> DownloadJob {
    match report.job_status() {
        JobStatus::Ready if file_exists => {
            job.status = JobStatus::Ready.into();
            job.message = None;
            job.queue_position = None;
        }
        JobStatus::Ready => {
            job.status = JobStatus::Error.into();
            job.message = Some("Generated file is missing".to_string());
            job.queue_position = None;
        }
        JobStatus::Initialized | JobStatus::Waiting => {
            job.status = JobStatus::Waiting.into();
            job.queue_position = report.queue_position;
        }
        JobStatus::Error => {
            job.status = JobStatus::Error.into();
            job.message = report.message.clone().or_else(|| Some("Generation failed".to_string()));
            job.queue_position = None;
        }
        JobStatus::Undefined => {
            job.status = JobStatus::Undefined.into();
        }
    }
    job
}

/// Delete a job file; a file that is already gone is not an error
pub fn remove_job_file(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn task_request(job: &DownloadJob, job_type: DownloadJobType, folder: &Path) -> TaskRequest {
    TaskRequest {
        identifier: job.identifier.clone(),
        job_type,
        pi: job.pi.clone(),
        logid: job.logid.clone(),
        target_path: job.file_path(folder).to_string_lossy().into_owned(),
    }
}

/// Download job lifecycle on top of the repository and the TaskManager
#[derive(Clone)]
pub struct DownloadService {
    repo: Repository,
    task_manager: Arc<dyn TaskManagerApi>,
    folder: PathBuf,
    ttl_secs: i64,
}

impl DownloadService {
    pub fn new(repo: Repository, task_manager: Arc<dyn TaskManagerApi>, config: &DownloadConfig) -> Self {
        Self {
            repo,
            task_manager,
            folder: PathBuf::from(&config.folder),
            ttl_secs: i64::try_from(config.ttl_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Find or create the job for a file and make sure the TaskManager works on it
    pub async fn request_download(
        &self,
        job_type: DownloadJobType,
        pi: &str,
        logid: Option<&str>,
        email: Option<&str>,
    ) -> Result<DownloadJob> {
        if pi.trim().is_empty() {
            return Err(AppError::validation("A download needs a record identifier"));
        }
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        if let Some(address) = email {
            if !address.validate_email() {
                return Err(AppError::Validation {
                    message: format!("Invalid email address '{}'", address),
                    field: Some("email".to_string()),
                });
            }
        }

        let identifier = generate_identifier(job_type, pi, logid);
        let existing = self.repo.find_download_job_on_primary(&identifier).await?;
        let now = Utc::now();

        let job = match plan_request(existing, now) {
            RequestPlan::Reuse(job) => self.reuse(job, now).await?,
            RequestPlan::Resubmit(job) => self.resubmit(job, job_type, now).await?,
            RequestPlan::Create => {
                let (job, inserted) = self
                    .repo
                    .create_download_job(
                        job_type,
                        identifier.clone(),
                        pi.to_string(),
                        logid.map(String::from),
                        self.ttl_secs,
                    )
                    .await?;
                if inserted {
                    info!(identifier = %identifier, pi = %pi, job_type = job_type.as_str(), "Created download job");
                    self.submit(job, job_type).await?
                } else if needs_resubmit(&job, now) {
                    self.resubmit(job, job_type, now).await?
                } else {
                    info!(identifier = %identifier, "Download job was created by a concurrent request");
                    self.reuse(job, now).await?
                }
            }
        };

        if let Some(address) = email {
            self.repo.add_download_job_observer(job.id, address).await?;
        }

        Ok(job)
    }

    async fn reuse(&self, mut job: DownloadJob, now: DateTime<Utc>) -> Result<DownloadJob> {
        job.last_requested = now.into();
        self.repo.update_download_job(job.clone()).await?;
        Ok(job)
    }

    async fn resubmit(&self, mut job: DownloadJob, job_type: DownloadJobType, now: DateTime<Utc>) -> Result<DownloadJob> {
        info!(identifier = %job.identifier, pi = %job.pi, "Resubmitting failed or expired download job");
        if let Err(e) = remove_job_file(&job.file_path(&self.folder)) {
            warn!(identifier = %job.identifier, error = %e, "Failed to delete stale download file");
        }
        job.status = JobStatus::Initialized.into();
        job.message = None;
        job.queue_position = None;
        job.last_requested = now.into();
        job.ttl_secs = self.ttl_secs;
        self.submit(job, job_type).await
    }

    /// Hand a job to the TaskManager; a refused submission is stored as an error
    async fn submit(&self, mut job: DownloadJob, job_type: DownloadJobType) -> Result<DownloadJob> {
        let task = task_request(&job, job_type, &self.folder);

        match self.task_manager.submit(&task).await {
            Ok(report) => {
                job.status = JobStatus::Waiting.into();
                job.queue_position = report.queue_position;
                self.repo.update_download_job(job.clone()).await?;
                metrics::record_download_job(job_type.as_str(), JobStatus::Waiting.as_str());
                Ok(job)
            }
            Err(e) => {
                job.status = JobStatus::Error.into();
                job.message = Some(e.to_string());
                self.repo.update_download_job(job).await?;
                metrics::record_download_job(job_type.as_str(), JobStatus::Error.as_str());
                Err(e)
            }
        }
    }

    /// Ask the TaskManager for the current state of a job and store it
    pub async fn refresh_status(&self, job: DownloadJob) -> Result<DownloadJob> {
        let report = self.task_manager.status(&job.identifier).await?;
        let file_exists = job.file_path(&self.folder).is_file();
        let previous = job.job_status();
        let job = apply_status(job, &report, file_exists);

        if job.job_status() != previous {
            info!(
                identifier = %job.identifier,
                from = previous.as_str(),
                to = %job.status,
                "Download job status changed"
            );
            metrics::record_download_job(&job.job_type, &job.status);
        }

        self.repo.update_download_job(job.clone()).await?;
        Ok(job)
    }

    /// Delete expired jobs and their files; returns the number of deleted jobs
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut deleted = 0;

        for job in self.repo.download_jobs().await? {
            if !job.is_expired(now) {
                continue;
            }
            let path = job.file_path(&self.folder);
            if let Err(e) = remove_job_file(&path) {
                warn!(identifier = %job.identifier, path = %path.display(), error = %e, "Failed to delete download file");
                continue;
            }
            if self.repo.delete_download_job(job.id).await? {
                deleted += 1;
            }
        }

        if deleted > 0 {
            info!(deleted, "Removed expired download jobs");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn job(status: JobStatus) -> DownloadJob {
        DownloadJob {
            id: 7,
            job_type: "pdf".into(),
            identifier: generate_identifier(DownloadJobType::Pdf, "PPN1", None),
            pi: "PPN1".into(),
            logid: None,
            status: status.into(),
            message: None,
            last_requested: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap().into(),
            ttl_secs: 600,
            queue_position: None,
        }
    }

    fn report(status: &str, queue_position: Option<i32>) -> TaskStatus {
        TaskStatus {
            status: status.into(),
            message: None,
            queue_position,
        }
    }

    #[test]
    fn test_identifier_is_deterministic() {
        let a = generate_identifier(DownloadJobType::Pdf, "PPN1", Some("LOG_0003"));
        assert_eq!(a.len(), 64);
        assert_eq!(a, generate_identifier(DownloadJobType::Pdf, "PPN1", Some("LOG_0003")));
        assert_ne!(a, generate_identifier(DownloadJobType::Epub, "PPN1", Some("LOG_0003")));
        assert_ne!(a, generate_identifier(DownloadJobType::Pdf, "PPN1", None));
    }

    #[test]
    fn test_plan_request() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(plan_request(None, created), RequestPlan::Create);
        assert!(matches!(
            plan_request(Some(job(JobStatus::Waiting)), created + Duration::minutes(5)),
            RequestPlan::Reuse(_)
        ));
        assert!(matches!(
            plan_request(Some(job(JobStatus::Ready)), created + Duration::minutes(11)),
            RequestPlan::Resubmit(_)
        ));
        assert!(matches!(
            plan_request(Some(job(JobStatus::Error)), created),
            RequestPlan::Resubmit(_)
        ));
    }

    #[test]
    fn test_concurrently_created_job_is_reused() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let fresh = job(JobStatus::Initialized);
        assert!(!needs_resubmit(&fresh, created));
        assert!(matches!(plan_request(Some(fresh), created), RequestPlan::Reuse(_)));
        assert!(needs_resubmit(&job(JobStatus::Error), created));
    }

    #[test]
    fn test_ready_requires_file() {
        let ready = apply_status(job(JobStatus::Waiting), &report("READY", None), true);
        assert_eq!(ready.job_status(), JobStatus::Ready);

        let missing = apply_status(job(JobStatus::Waiting), &report("READY", None), false);
        assert_eq!(missing.job_status(), JobStatus::Error);
        assert!(missing.message.is_some());
    }

    #[test]
    fn test_waiting_keeps_queue_position() {
        let waiting = apply_status(job(JobStatus::Initialized), &report("waiting", Some(4)), false);
        assert_eq!(waiting.job_status(), JobStatus::Waiting);
        assert_eq!(waiting.queue_position, Some(4));

        let failed = apply_status(
            waiting,
            &TaskStatus {
                status: "error".into(),
                message: Some("out of memory".into()),
                queue_position: None,
            },
            false,
        );
        assert_eq!(failed.message.as_deref(), Some("out of memory"));
        assert_eq!(failed.queue_position, None);
    }

    #[test]
    fn test_task_request_targets_job_file() {
        let job = job(JobStatus::Initialized);
        let task = task_request(&job, DownloadJobType::Pdf, Path::new("/data/downloads"));
        assert_eq!(task.target_path, format!("/data/downloads/pdf/{}.pdf", job.identifier));
        assert_eq!(task.pi, "PPN1");
    }

    #[test]
    fn test_remove_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(JobStatus::Ready);
        let path = job.file_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        assert!(remove_job_file(&path).unwrap());
        assert!(!path.exists());
        assert!(!remove_job_file(&path).unwrap());
    }
}
